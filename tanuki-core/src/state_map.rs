//! State mapping - flattening API responses into resource attributes
//!
//! Each resource has one pure function turning its API response into a
//! `StateMap`. Nullable response fields map to `Value::Null`, never to a zero
//! value, so "unset" and "empty" stay distinguishable.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::resource::Value;
use crate::resource_data::ResourceData;
use crate::schema::TypeError;

/// Attribute name to value, applied in key order
pub type StateMap = BTreeMap<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StateMapError {
    #[error("error setting state for {field} to {value:?}: unknown attribute")]
    UnknownAttribute { field: String, value: Value },
    #[error("error setting state for {field} to {value:?}: {source}")]
    InvalidValue {
        field: String,
        value: Value,
        source: TypeError,
    },
}

/// Write every entry of `map` into `d`, stopping at the first rejected field
pub fn apply_state_map(map: StateMap, d: &mut ResourceData) -> Result<(), StateMapError> {
    for (field, value) in map {
        d.set(&field, value)?;
    }
    Ok(())
}

/// RFC 3339 text for a timestamp, or null
pub fn timestamp(value: Option<&DateTime<Utc>>) -> Value {
    value
        .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .unwrap_or(Value::Null)
}

/// `YYYY-MM-DD` text for a date, or null
pub fn date(value: Option<&NaiveDate>) -> Value {
    value
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

/// Build a `StateMap` from `(name, value)` pairs
pub fn state_map<const N: usize>(entries: [(&str, Value); N]) -> StateMap {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
