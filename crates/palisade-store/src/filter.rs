//! Filter compilation.
//!
//! Turns an untrusted [`Filter`] into one parameterised `WHERE` clause over
//! the `events` table. Values are never interpolated: every id, author,
//! kind, tag token, bound, and search pattern is a bind parameter. Ceilings
//! on each set-valued field are checked up front; the first violation
//! rejects the whole filter.
//!
//! Tag constraints use exact `name:value` tokens from `event_tags`. Only
//! names the index actually holds (single-character names and the
//! [`INDEXED_TAG_NAMES`](crate::index::INDEXED_TAG_NAMES) allow-list) become
//! conditions; any other name is validated and counted but otherwise ignored.

use palisade_types::Filter;
use rusqlite::types::Value;

use crate::error::FilterError;
use crate::index::{is_indexed_tag, tag_token};

/// Server-side ceilings applied to every filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Limit used when the request omits one or asks for an out-of-range value.
    pub default_limit: i64,
    /// Largest limit a request may ask for.
    pub max_limit: i64,
    /// Maximum number of `ids`.
    pub max_ids: usize,
    /// Maximum number of `authors`.
    pub max_authors: usize,
    /// Maximum number of `kinds`.
    pub max_kinds: usize,
    /// Maximum number of tag values summed over all tag names.
    pub max_tag_values: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 500,
            max_ids: 500,
            max_authors: 500,
            max_kinds: 10,
            max_tag_values: 10,
        }
    }
}

impl QueryLimits {
    /// Resolves a requested limit against the server ceilings.
    pub fn resolve(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(n) if (1..=self.max_limit).contains(&n) => n,
            _ => self.default_limit.clamp(1, self.max_limit.max(1)),
        }
    }
}

/// A validated filter ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    clause: String,
    params: Vec<Value>,
    limit: i64,
}

const SELECT_COLUMNS: &str = "id, pubkey, created_at, kind, tags, content, sig";

impl CompiledQuery {
    /// The `WHERE` clause, with `?N` placeholders.
    pub fn clause(&self) -> &str {
        &self.clause
    }

    /// The resolved result cap.
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Full ordered, limited `SELECT` statement.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {SELECT_COLUMNS} FROM events WHERE {} ORDER BY created_at DESC, id ASC LIMIT ?{}",
            self.clause,
            self.params.len() + 1
        )
    }

    /// Bind parameters for [`select_sql`](Self::select_sql), limit last.
    pub fn select_params(&self) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(self.limit));
        params
    }

    /// `COUNT(*)` statement over the same predicate, without the limit.
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM events WHERE {}", self.clause)
    }

    /// Bind parameters for [`count_sql`](Self::count_sql).
    pub fn count_params(&self) -> &[Value] {
        &self.params
    }
}

struct ClauseBuilder {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl ClauseBuilder {
    fn placeholders(&mut self, values: impl IntoIterator<Item = Value>) -> String {
        let mut marks = Vec::new();
        for value in values {
            self.params.push(value);
            marks.push(format!("?{}", self.params.len()));
        }
        marks.join(", ")
    }

    fn push_in(&mut self, column: &str, values: impl IntoIterator<Item = Value>) {
        let marks = self.placeholders(values);
        self.clauses.push(format!("{column} IN ({marks})"));
    }

    fn push_cmp(&mut self, expr: &str, value: Value) {
        self.params.push(value);
        self.clauses.push(format!("{expr} ?{}", self.params.len()));
    }
}

/// Compiles `filter` against `limits`.
///
/// # Errors
///
/// Returns the first [`FilterError`] encountered; nothing is executed.
pub fn compile_filter(filter: &Filter, limits: &QueryLimits) -> Result<CompiledQuery, FilterError> {
    let mut b = ClauseBuilder {
        clauses: Vec::new(),
        params: Vec::new(),
    };

    if !filter.ids.is_empty() {
        if filter.ids.len() > limits.max_ids {
            return Err(FilterError::TooManyIds);
        }
        b.push_in("id", filter.ids.iter().cloned().map(Value::Text));
    }

    if !filter.authors.is_empty() {
        if filter.authors.len() > limits.max_authors {
            return Err(FilterError::TooManyAuthors);
        }
        b.push_in("pubkey", filter.authors.iter().cloned().map(Value::Text));
    }

    if !filter.kinds.is_empty() {
        if filter.kinds.len() > limits.max_kinds {
            return Err(FilterError::TooManyKinds);
        }
        b.push_in(
            "kind",
            filter.kinds.iter().map(|k| Value::Integer(i64::from(*k))),
        );
    }

    let mut total_tag_values = 0;
    for (name, values) in &filter.tags {
        if values.is_empty() {
            return Err(FilterError::EmptyTagSet);
        }
        total_tag_values += values.len();
        if total_tag_values > limits.max_tag_values {
            return Err(FilterError::TooManyTagValues);
        }
        if !is_indexed_tag(name) {
            continue;
        }
        // Each tag name is an independent condition; values within it are ORed.
        let marks = b.placeholders(values.iter().map(|v| Value::Text(tag_token(name, v))));
        b.clauses.push(format!(
            "EXISTS (SELECT 1 FROM event_tags WHERE event_tags.event_row = events.row_id AND event_tags.value IN ({marks}))"
        ));
    }

    if let Some(since) = filter.since {
        b.push_cmp("created_at >=", Value::Integer(since));
    }
    if let Some(until) = filter.until {
        b.push_cmp("created_at <=", Value::Integer(until));
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // Trigram MATCH needs at least one full trigram; shorter terms fall
        // back to an escaped LIKE scan.
        let predicate = if search.chars().count() >= 3 {
            b.params.push(Value::Text(fts_phrase(search)));
            format!("event_fts MATCH ?{}", b.params.len())
        } else {
            b.params.push(Value::Text(format!("%{}%", escape_like(search))));
            format!("text LIKE ?{} ESCAPE '\\'", b.params.len())
        };
        b.clauses.push(format!(
            "row_id IN (SELECT rowid FROM event_fts WHERE {predicate})"
        ));
    }

    if b.clauses.is_empty() {
        b.clauses.push("1 = 1".to_string());
    }

    Ok(CompiledQuery {
        clause: b.clauses.join(" AND "),
        params: b.params,
        limit: limits.resolve(filter.limit),
    })
}

/// Quotes `input` as a single FTS5 phrase.
fn fts_phrase(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}

fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
