use crate::error::app_error::AppError;
use crate::schema::TableSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators supported by list filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl FilterOp {
    pub fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Structured filter expression, AND-combined. This replaces the raw
/// boolean condition strings of the wire contract's ancestry: field names
/// are checked against the registry and values only ever reach the backend
/// as bound parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterExpr {
    pub conditions: Vec<Condition>,
}

impl FilterExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and(field, FilterOp::Eq, value)
    }

    pub fn and(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parses the wire form of a filter. Two shapes are accepted: a JSON
    /// object treated as an equality map (`{"email": "a@x.com"}`), and an
    /// array of explicit conditions (`[{"field":..,"op":..,"value":..}]`).
    pub fn parse(text: &str) -> Result<Self, AppError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| AppError::BadRequest(format!("Invalid filter: {}", e)))?;

        match value {
            Value::Object(map) => {
                let mut expr = FilterExpr::new();
                for (field, value) in map {
                    expr.conditions.push(Condition {
                        field,
                        op: FilterOp::Eq,
                        value,
                    });
                }
                Ok(expr)
            }
            Value::Array(_) => serde_json::from_value(value)
                .map_err(|e| AppError::BadRequest(format!("Invalid filter: {}", e))),
            _ => Err(AppError::BadRequest("Filter must be a JSON object or array".to_string())),
        }
    }

    /// Serialized wire form, always the explicit condition-array shape.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(&self.conditions).unwrap_or_else(|_| "[]".to_string())
    }

    /// Checks every referenced field against the table shape. Rejecting
    /// unknown fields here is what keeps identifiers out of attacker hands.
    pub fn validate(&self, schema: &TableSchema) -> Result<(), AppError> {
        for condition in &self.conditions {
            if schema.column(&condition.field).is_none() {
                return Err(AppError::SchemaViolation(format!(
                    "Unknown filter field {} for table {}",
                    condition.field, schema.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parses_equality_map() {
        let expr = FilterExpr::parse(r#"{"email": "a@x.com", "is_active": true}"#).unwrap();
        assert_eq!(expr.conditions.len(), 2);
        assert!(expr.conditions.iter().all(|c| c.op == FilterOp::Eq));
    }

    #[test]
    fn parses_condition_array() {
        let expr = FilterExpr::parse(r#"[{"field":"created_at","op":"gte","value":"2026-01-01T00:00:00Z"}]"#).unwrap();
        assert_eq!(expr.conditions.len(), 1);
        assert_eq!(expr.conditions[0].op, FilterOp::Gte);
    }

    #[test]
    fn rejects_scalar_filter() {
        assert!(FilterExpr::parse("\"email = 'x'\"").is_err());
        assert!(FilterExpr::parse("42").is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(FilterExpr::parse("{not json").is_err());
    }

    #[test]
    fn validate_rejects_unknown_field() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup("users").unwrap();
        let expr = FilterExpr::eq("email; DROP TABLE users", "x");
        assert!(matches!(expr.validate(schema), Err(AppError::SchemaViolation(_))));
    }

    #[test]
    fn validate_accepts_declared_fields() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup("user_sessions").unwrap();
        let expr = FilterExpr::eq("user_id", "d3b8f5a0-0000-0000-0000-000000000000").and("is_active", FilterOp::Eq, true);
        assert!(expr.validate(schema).is_ok());
    }

    #[test]
    fn wire_round_trip() {
        let expr = FilterExpr::eq("username", "alice").and("created_at", FilterOp::Lt, json!("2026-08-01T00:00:00Z"));
        let parsed = FilterExpr::parse(&expr.to_wire()).unwrap();
        assert_eq!(parsed.conditions.len(), 2);
        assert_eq!(parsed.conditions[1].op, FilterOp::Lt);
    }

    proptest! {
        // Whatever string ends up in a value position, parsing the wire
        // form must reproduce it verbatim instead of splicing it into SQL.
        #[test]
        fn values_survive_wire_round_trip(value in ".*") {
            let expr = FilterExpr::eq("email", value.clone());
            let parsed = FilterExpr::parse(&expr.to_wire()).unwrap();
            prop_assert_eq!(parsed.conditions[0].value.as_str().unwrap(), value.as_str());
        }
    }
}
