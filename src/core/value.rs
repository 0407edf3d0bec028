use chrono::{DateTime, NaiveDateTime, Utc};

use crate::core::{Result, StoreError};

/// Wire format for every timestamp column.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Soft-delete sentinel for rows that were never deleted.
pub const MAX_DATETIME: &str = "9999-12-31 23:59:59";

/// A bound statement parameter.
///
/// Records keep every attribute as text; typed variants exist so that
/// limits and timestamps can be bound without formatting at call sites.
/// Backends normalize timestamps with [`format_datetime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

pub fn format_datetime(ts: DateTime<Utc>) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

/// Current UTC time truncated to whole seconds, in wire format.
pub fn now_utc_string() -> String {
    format_datetime(Utc::now())
}

pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT) {
        return Ok(DateTime::from_naive_utc_and_offset(parsed, Utc));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    Err(StoreError::invalid_argument(format!(
        "unsupported timestamp format: {raw}"
    )))
}
