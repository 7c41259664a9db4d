//! Signed event record and tag helpers.

use serde::{Deserialize, Serialize};

use crate::kind::KindClass;

/// A single tag: a short array whose first element names the tag.
///
/// `["p", "<hex pubkey>"]`, `["d", "com.example.app"]` and
/// `["param", "target", "<hex pubkey>"]` are all tags. Unknown tags are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// Builds a tag from string slices.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// The tag name, or `""` for an empty tag.
    pub fn name(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    /// The first value after the name, if any.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }
}

/// An immutable signed event as stored and served by the relay.
///
/// ```json
/// {
///   "id": "4376c6...",
///   "pubkey": "6e468422...",
///   "created_at": 1700000000,
///   "kind": 32267,
///   "tags": [["d", "com.example.app"], ["name", "Example"]],
///   "content": "An example application",
///   "sig": "908a15e4..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Hex sha256 of the canonical serialization.
    pub id: String,
    /// Author x-only public key (hex).
    pub pubkey: String,
    /// Unix timestamp in seconds.
    pub created_at: i64,
    /// Kind number.
    pub kind: u32,
    /// Ordered tag list.
    pub tags: Vec<Tag>,
    /// Free text body.
    pub content: String,
    /// Schnorr signature over `id` (hex).
    pub sig: String,
}

impl Event {
    /// Persistence class of this event's kind.
    pub fn kind_class(&self) -> KindClass {
        KindClass::of(self.kind)
    }

    /// Iterates over the first values of every tag named `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.name() == name)
            .filter_map(Tag::value)
    }

    /// The `d` tag value; addressable events without one use `""`.
    pub fn d_tag(&self) -> &str {
        self.tag_values("d").next().unwrap_or("")
    }
}

/// The author-controlled part of an event, before id and signature exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Kind number.
    pub kind: u32,
    /// Unix timestamp in seconds.
    pub created_at: i64,
    /// Ordered tag list.
    pub tags: Vec<Tag>,
    /// Free text body.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with_tags(tags: Vec<Tag>) -> Event {
        Event {
            id: "aa".into(),
            pubkey: "bb".into(),
            created_at: 1,
            kind: 30063,
            tags,
            content: String::new(),
            sig: String::new(),
        }
    }

    #[test]
    fn tags_serialize_as_nested_arrays() {
        let ev = event_with_tags(vec![Tag::new(["d", "app"]), Tag::new(["t", "nostr"])]);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["tags"], serde_json::json!([["d", "app"], ["t", "nostr"]]));
    }

    #[test]
    fn d_tag_defaults_to_empty() {
        let ev = event_with_tags(vec![Tag::new(["t", "x"])]);
        assert_eq!(ev.d_tag(), "");

        let ev = event_with_tags(vec![Tag::new(["d", "slug"]), Tag::new(["d", "other"])]);
        assert_eq!(ev.d_tag(), "slug");
    }

    #[test]
    fn tag_values_skips_valueless_tags() {
        let ev = event_with_tags(vec![
            Tag::new(["p"]),
            Tag::new(["p", "one"]),
            Tag::new(["e", "x"]),
            Tag::new(["p", "two"]),
        ]);
        let values: Vec<&str> = ev.tag_values("p").collect();
        assert_eq!(values, vec!["one", "two"]);
    }
}
