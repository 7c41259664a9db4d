//! Subscription filter wire shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Constraints describing which events a subscriber wants.
///
/// All fields are optional; set-valued fields are ORed within themselves and
/// ANDed with each other. The relay enforces ceilings on every set when the
/// filter is compiled.
///
/// ```json
/// {"authors": ["6e46..."], "kinds": [32267], "tags": {"d": ["com.example"]}, "limit": 10}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Event ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    /// Author pubkeys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Kind numbers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    /// Tag name to accepted values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Vec<String>>,
    /// Inclusive lower bound on `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    /// Inclusive upper bound on `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    /// Free-text search over indexed text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Requested maximum number of results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

impl Filter {
    /// Adds an author.
    pub fn author(mut self, pubkey: impl Into<String>) -> Self {
        self.authors.push(pubkey.into());
        self
    }

    /// Adds a kind.
    pub fn kind(mut self, kind: u32) -> Self {
        self.kinds.push(kind);
        self
    }

    /// Adds an accepted value for tag `name`.
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Sets the requested limit.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}
