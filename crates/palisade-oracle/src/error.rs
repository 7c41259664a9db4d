//! Error types for the reputation oracle client.

use palisade_types::KeyError;

/// Errors that can occur while asking the oracle for a rank.
///
/// Every variant leaves the caller's decision indeterminate: none of them
/// says anything about the queried pubkey's reputation.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// No response arrived within the configured deadline.
    #[error("timeout waiting for oracle response")]
    OracleTimeout,

    /// The oracle answered with a job error.
    #[error("oracle rejected request: {0}")]
    OracleRejected(String),

    /// The oracle answered but did not rank the queried pubkey.
    #[error("pubkey not found in oracle response")]
    PubkeyNotRanked,

    /// The response could not be interpreted.
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),

    /// The oracle relay refused the request event.
    #[error("oracle relay rejected request: {0}")]
    PublishRejected(String),

    /// Connecting to or talking with the oracle relay failed.
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The oracle relay closed the connection before answering.
    #[error("oracle connection closed")]
    ConnectionClosed,

    /// The request event could not be signed.
    #[error("failed to sign oracle request: {0}")]
    Signing(#[from] KeyError),
}
