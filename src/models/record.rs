//! Field extraction helpers for records arriving as JSON maps over the
//! record service. Timestamps travel as RFC 3339 text.

use crate::error::app_error::AppError;
use crate::store::engine::RecordMap;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

fn missing(field: &str) -> AppError {
    AppError::Upstream(format!("Record is missing field '{}'", field))
}

pub(crate) fn require_uuid(record: &RecordMap, field: &str) -> Result<Uuid, AppError> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(Uuid::parse_str(s)?),
        _ => Err(missing(field)),
    }
}

pub(crate) fn require_str(record: &RecordMap, field: &str) -> Result<String, AppError> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(missing(field)),
    }
}

pub(crate) fn opt_str(record: &RecordMap, field: &str) -> Option<String> {
    match record.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

pub(crate) fn require_bool(record: &RecordMap, field: &str) -> Result<bool, AppError> {
    match record.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        _ => Err(missing(field)),
    }
}

pub(crate) fn require_timestamp(record: &RecordMap, field: &str) -> Result<DateTime<Utc>, AppError> {
    opt_timestamp(record, field)?.ok_or_else(|| missing(field))
}

pub(crate) fn opt_timestamp(record: &RecordMap, field: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    match record.get(field) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| AppError::Upstream(format!("Record field '{}' is not a valid timestamp", field))),
        _ => Ok(None),
    }
}
