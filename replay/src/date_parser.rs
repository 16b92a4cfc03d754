//! Implements (de)serialization for the date fields found in replay documents and
//! the persisted index. Dates decode from an RFC 3339 string, the site's older
//! `YYYY-MM-DD HH:MM:SS` format (always UTC), or a unix timestamp.
//!
//! Subsequent writes always use RFC 3339, so re-reading a persisted index yields
//! identical values.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Attempts to read a date out of an arbitrary JSON value.
pub fn parse_value(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(timestamp) = value.as_i64() {
        return Utc.timestamp_opt(timestamp, 0).single();
    }

    value.as_str().and_then(parse_str)
}

/// Attempts RFC 3339 first, falling back to the legacy site format.
pub fn parse_str(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(text, LEGACY_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn format(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn serialize<S>(datetime: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    format(datetime).serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    parse_value(&value).ok_or_else(|| serde::de::Error::custom(format!("Invalid date value: {:?}", value)))
}

/// The same handling for fields that may be absent or `null`.
pub mod optional {
    use super::*;

    pub fn serialize<S>(datetime: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        datetime.as_ref().map(format).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            value => parse_value(&value)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("Invalid date value: {:?}", value))),
        }
    }
}
