//! NIP-01 kind classification and well-known kind numbers.

/// Profile metadata.
pub const KIND_PROFILE: u32 = 0;
/// Encrypted direct message.
pub const KIND_DIRECT_MESSAGE: u32 = 4;
/// Reputation query sent to the oracle.
pub const KIND_REPUTATION_REQUEST: u32 = 5312;
/// Reputation result returned by the oracle.
pub const KIND_REPUTATION_RESULT: u32 = 6312;
/// Job feedback; the oracle uses it to report errors.
pub const KIND_JOB_FEEDBACK: u32 = 7000;

/// How the relay persists an event of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    /// Append-only; every event is kept.
    Regular,
    /// One live event per (author, kind).
    Replaceable,
    /// Delivered but never stored.
    Ephemeral,
    /// One live event per (author, kind, `d` tag).
    Addressable,
}

impl KindClass {
    /// Classifies a kind number.
    pub fn of(kind: u32) -> Self {
        match kind {
            0 | 3 | 10_000..=19_999 => Self::Replaceable,
            20_000..=29_999 => Self::Ephemeral,
            30_000..=39_999 => Self::Addressable,
            _ => Self::Regular,
        }
    }

    /// Whether newer events supersede older ones under the same key.
    pub fn is_replaceable(self) -> bool {
        matches!(self, Self::Replaceable | Self::Addressable)
    }

    /// Returns the canonical lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Replaceable => "replaceable",
            Self::Ephemeral => "ephemeral",
            Self::Addressable => "addressable",
        }
    }
}

impl std::fmt::Display for KindClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
