//! Partial-update semantics for per-user info documents.
//!
//! A write carries a flat set of top-level fields. Each field replaces the
//! stored value under the same key; keys not mentioned are kept. Nested values
//! are stored as given and never merged recursively.

use serde_json::{Map, Value};

use crate::{Error, Result, store::Document};

/// Field of an info document that holds the caller's object.
pub const INFO_FIELD: &str = "info";

/// How an info write reaches the store.
#[derive(Clone, Debug, PartialEq)]
pub enum InfoWrite {
    /// No fields supplied: plain lookup, which may miss.
    Read,
    /// At least one field supplied: one atomic upsert that creates the record
    /// on first write.
    Upsert { set: Vec<(String, Value)> },
}

impl InfoWrite {
    pub fn plan(info: &Map<String, Value>) -> Self {
        if info.is_empty() {
            Self::Read
        } else {
            Self::Upsert {
                set: build_update_set(info),
            }
        }
    }
}

/// Maps each top-level key `k` of `info` to the dotted path `info.k`.
///
/// ```
/// use serde_json::json;
/// use usernode::build_update_set;
///
/// let info = json!({"theme": "dark", "tags": ["a"]});
/// let set = build_update_set(info.as_object().unwrap());
/// assert_eq!(set.len(), 2);
/// assert!(set.contains(&("info.theme".to_string(), json!("dark"))));
/// ```
pub fn build_update_set(info: &Map<String, Value>) -> Vec<(String, Value)> {
    info.iter()
        .map(|(key, value)| (format!("{INFO_FIELD}.{key}"), value.clone()))
        .collect()
}

/// Overlays `info` onto the `info` object of `stored`.
///
/// Used to shape a response from whatever the store returned after a write:
/// the result always reflects the fields just written even if the store's
/// echo was partial or missing. A missing or non-object `info` is replaced by
/// an empty object before overlaying.
pub fn merge_for_response(stored: Option<Document>, info: &Map<String, Value>) -> Document {
    let mut doc = stored.unwrap_or_default();
    let slot = doc
        .entry(INFO_FIELD)
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(target) = slot {
        for (key, value) in info {
            target.insert(key.clone(), value.clone());
        }
    }
    doc
}

/// Parses the wire form of an info payload.
///
/// An empty string carries no fields. Anything else must be a JSON object
/// whose keys are usable as single path segments: non-empty, no `.`, and not
/// starting with `$`.
pub fn parse_info(raw: &str) -> Result<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let info = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(info)) => info,
        Ok(_) => return Err(Error::bad_input("info must be a JSON object")),
        Err(err) => return Err(Error::bad_input(format!("invalid info: {err}"))),
    };
    if let Some(key) = info
        .keys()
        .find(|key| key.is_empty() || key.contains('.') || key.starts_with('$'))
    {
        return Err(Error::bad_input(format!("invalid info key {key:?}")));
    }
    Ok(info)
}
