//! Derived index contents: tag tokens and full-text documents.

use std::collections::BTreeSet;

use palisade_types::{Event, KindClass};

/// Multi-character tag names that are indexed for exact matching.
pub const INDEXED_TAG_NAMES: &[&str] = &["repository", "url", "version"];

/// Tag names whose values are added to the full-text document.
pub const TEXT_TAG_NAMES: &[&str] = &[
    "title",
    "description",
    "name",
    "summary",
    "alt",
    "t",
    "d",
    "f",
];

/// Kinds whose `content` is free text worth indexing.
pub const TEXT_KINDS: &[u32] = &[1, 1111, 30023, 32267];

/// Whether tag `name` has entries in the exact-match index.
pub fn is_indexed_tag(name: &str) -> bool {
    name.chars().count() == 1 || INDEXED_TAG_NAMES.contains(&name)
}

/// The index token for a tag name and value.
pub fn tag_token(name: &str, value: &str) -> String {
    format!("{name}:{value}")
}

/// Distinct tokens to index for `ev`.
///
/// Addressable events always carry a `d:` token, using `""` when the event
/// has no `d` tag, so they can be found by their address.
pub fn tag_tokens(ev: &Event) -> BTreeSet<String> {
    let mut tokens: BTreeSet<String> = ev
        .tags
        .iter()
        .filter(|t| is_indexed_tag(t.name()))
        .filter_map(|t| t.value().map(|v| tag_token(t.name(), v)))
        .collect();
    if ev.kind_class() == KindClass::Addressable {
        tokens.insert(tag_token("d", ev.d_tag()));
    }
    tokens
}

/// The full-text document for `ev`, or `""` when there is nothing to index.
pub fn search_text(ev: &Event) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if TEXT_KINDS.contains(&ev.kind) && !ev.content.trim().is_empty() {
        parts.push(&ev.content);
    }
    parts.extend(
        ev.tags
            .iter()
            .filter(|t| TEXT_TAG_NAMES.contains(&t.name()))
            .filter_map(|t| t.value())
            .filter(|v| !v.trim().is_empty()),
    );
    parts.join(" ")
}
