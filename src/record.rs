//! Typed access to loosely structured transaction records.

use crate::constants::{
    dotted, AMOUNT_PATH, EVENT_ID_PATH, EVENT_TS_PATH, ORDER_ID_PATH, PAYMENT_ID_PATH, STATUS_PATH,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("missing field `{0}`")]
    Missing(String),

    #[error("field `{0}` is not a scalar value")]
    NotScalar(String),

    #[error("field `{0}` is not numeric")]
    NotNumeric(String),
}

/// Walk `path` through nested objects.
pub fn lookup<'a>(record: &'a Value, path: &[&str]) -> Result<&'a Value, FieldError> {
    let mut current = record;
    for segment in path {
        current = current
            .as_object()
            .and_then(|obj| obj.get(*segment))
            .ok_or_else(|| FieldError::Missing(dotted(path)))?;
    }
    Ok(current)
}

/// Mutable counterpart of [`lookup`].
pub fn lookup_mut<'a>(record: &'a mut Value, path: &[&str]) -> Result<&'a mut Value, FieldError> {
    let mut current = record;
    for segment in path {
        current = current
            .as_object_mut()
            .and_then(|obj| obj.get_mut(*segment))
            .ok_or_else(|| FieldError::Missing(dotted(path)))?;
    }
    Ok(current)
}

/// The key used to upsert a record in the archive.
///
/// Only a non-empty string or non-zero number counts as an identifier;
/// anything else means the record is archived with a plain insert.
pub fn archive_key(record: &Value) -> Option<String> {
    match lookup(record, EVENT_ID_PATH).ok()? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// A single SQL-compatible value taken from a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl Scalar {
    fn from_field(record: &Value, path: &[&str]) -> Result<Self, FieldError> {
        match lookup(record, path)? {
            Value::Null => Ok(Scalar::Null),
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
            Value::Number(n) => Ok(match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Real(n.as_f64().unwrap_or_default()),
            }),
            Value::String(s) => Ok(Scalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(FieldError::NotScalar(dotted(path))),
        }
    }
}

/// The six-column projection written to the relational store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredRow {
    pub event_id: Scalar,
    pub order_id: Scalar,
    pub payment_id: Scalar,
    pub amount_usd: f64,
    pub status: Scalar,
    pub created_at: Scalar,
}

impl StructuredRow {
    pub fn project(record: &Value) -> Result<Self, FieldError> {
        let amount_usd = lookup(record, AMOUNT_PATH)?
            .as_f64()
            .ok_or_else(|| FieldError::NotNumeric(dotted(AMOUNT_PATH)))?;
        debug_assert!(amount_usd >= 0.0, "normalized amounts are non-negative");

        Ok(Self {
            event_id: Scalar::from_field(record, EVENT_ID_PATH)?,
            order_id: Scalar::from_field(record, ORDER_ID_PATH)?,
            payment_id: Scalar::from_field(record, PAYMENT_ID_PATH)?,
            amount_usd,
            status: Scalar::from_field(record, STATUS_PATH)?,
            created_at: Scalar::from_field(record, EVENT_TS_PATH)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "event": {"id": "evt-1", "ts": "2024-03-01T10:00:00Z"},
            "entity": {"order": {"id": "ord-9"}, "payment": {"id": 77}},
            "payload": {"Amount": 12.5, "status": "captured"}
        })
    }

    #[test]
    fn lookup_walks_nested_objects() {
        let record = sample();
        assert_eq!(lookup(&record, ORDER_ID_PATH), Ok(&json!("ord-9")));
        assert_eq!(
            lookup(&record, &["entity", "refund", "id"]),
            Err(FieldError::Missing("entity.refund.id".to_string()))
        );
        // A scalar in the middle of the path is a missing field, not a panic
        assert!(lookup(&record, &["event", "id", "x"]).is_err());
    }

    #[test]
    fn projects_six_columns() {
        let row = StructuredRow::project(&sample()).unwrap();
        assert_eq!(row.event_id, Scalar::Text("evt-1".into()));
        assert_eq!(row.order_id, Scalar::Text("ord-9".into()));
        assert_eq!(row.payment_id, Scalar::Int(77));
        assert_eq!(row.amount_usd, 12.5);
        assert_eq!(row.status, Scalar::Text("captured".into()));
        assert_eq!(row.created_at, Scalar::Text("2024-03-01T10:00:00Z".into()));
    }

    #[test]
    fn projection_reports_the_missing_path() {
        let mut record = sample();
        record["entity"]["order"].as_object_mut().unwrap().remove("id");
        assert_eq!(
            StructuredRow::project(&record),
            Err(FieldError::Missing("entity.order.id".to_string()))
        );
    }

    #[test]
    fn projection_rejects_nested_values() {
        let mut record = sample();
        record["payload"]["status"] = json!({"code": 1});
        assert_eq!(
            StructuredRow::project(&record),
            Err(FieldError::NotScalar("payload.status".to_string()))
        );
    }

    #[test]
    fn archive_key_requires_a_truthy_id() {
        assert_eq!(archive_key(&sample()), Some("evt-1".to_string()));
        assert_eq!(archive_key(&json!({"event": {"id": 42}})), Some("42".to_string()));
        assert_eq!(archive_key(&json!({"event": {"id": ""}})), None);
        assert_eq!(archive_key(&json!({"event": {"id": 0}})), None);
        assert_eq!(archive_key(&json!({"payload": {}})), None);
    }
}
