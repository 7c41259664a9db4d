//! NIP-01 frames exchanged with the oracle relay.

use palisade_types::{Event, Filter};
use serde_json::{json, Value};

use crate::error::OracleError;

/// A frame sent to a relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `["EVENT", <event>]`
    Event(Event),
    /// `["REQ", <sub id>, <filter>...]`
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },
    /// `["CLOSE", <sub id>]`
    Close(String),
}

impl ClientMessage {
    /// Encodes the frame as JSON text.
    pub fn to_json(&self) -> Result<String, OracleError> {
        let value = match self {
            Self::Event(ev) => json!(["EVENT", ev]),
            Self::Req {
                subscription_id,
                filters,
            } => {
                let mut frame = vec![json!("REQ"), json!(subscription_id)];
                for filter in filters {
                    frame.push(filter_to_wire(filter));
                }
                Value::Array(frame)
            }
            Self::Close(id) => json!(["CLOSE", id]),
        };
        Ok(value.to_string())
    }
}

/// Wire form of a filter: tag constraints become `#<name>` keys.
fn filter_to_wire(filter: &Filter) -> Value {
    let mut map = serde_json::Map::new();
    if !filter.ids.is_empty() {
        map.insert("ids".into(), json!(filter.ids));
    }
    if !filter.authors.is_empty() {
        map.insert("authors".into(), json!(filter.authors));
    }
    if !filter.kinds.is_empty() {
        map.insert("kinds".into(), json!(filter.kinds));
    }
    for (name, values) in &filter.tags {
        map.insert(format!("#{name}"), json!(values));
    }
    if let Some(since) = filter.since {
        map.insert("since".into(), json!(since));
    }
    if let Some(until) = filter.until {
        map.insert("until".into(), json!(until));
    }
    if let Some(search) = &filter.search {
        map.insert("search".into(), json!(search));
    }
    if let Some(limit) = filter.limit {
        map.insert("limit".into(), json!(limit));
    }
    Value::Object(map)
}

/// A frame received from a relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    /// `["EVENT", <sub id>, <event>]`
    Event {
        subscription_id: String,
        event: Box<Event>,
    },
    /// `["OK", <event id>, <accepted>, <message>]`
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    /// `["EOSE", <sub id>]`
    Eose(String),
    /// `["CLOSED", <sub id>, <message>]`
    Closed {
        subscription_id: String,
        message: String,
    },
    /// `["NOTICE", <message>]`
    Notice(String),
}

impl RelayMessage {
    /// Parses a text frame. Frames of unknown type yield `Ok(None)`.
    pub fn parse(text: &str) -> Result<Option<Self>, OracleError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| OracleError::InvalidResponse(format!("malformed frame: {e}")))?;
        let Some(frame) = value.as_array() else {
            return Err(OracleError::InvalidResponse("frame is not an array".into()));
        };
        let str_at = |i: usize| frame.get(i).and_then(Value::as_str).map(str::to_string);
        let missing = |what: &str| OracleError::InvalidResponse(format!("frame missing {what}"));

        let msg = match frame.first().and_then(Value::as_str) {
            Some("EVENT") => {
                let subscription_id = str_at(1).ok_or_else(|| missing("subscription id"))?;
                let raw = frame.get(2).cloned().ok_or_else(|| missing("event"))?;
                let event: Event = serde_json::from_value(raw)
                    .map_err(|e| OracleError::InvalidResponse(format!("malformed event: {e}")))?;
                Self::Event {
                    subscription_id,
                    event: Box::new(event),
                }
            }
            Some("OK") => Self::Ok {
                event_id: str_at(1).ok_or_else(|| missing("event id"))?,
                accepted: frame
                    .get(2)
                    .and_then(Value::as_bool)
                    .ok_or_else(|| missing("accepted flag"))?,
                message: str_at(3).unwrap_or_default(),
            },
            Some("EOSE") => Self::Eose(str_at(1).ok_or_else(|| missing("subscription id"))?),
            Some("CLOSED") => Self::Closed {
                subscription_id: str_at(1).ok_or_else(|| missing("subscription id"))?,
                message: str_at(2).unwrap_or_default(),
            },
            Some("NOTICE") => Self::Notice(str_at(1).unwrap_or_default()),
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }
}
