//! # Aggregation Compiler
//!
//! Translates aggregation requests (`count`, `sum`, `avg`, ...) into the
//! backend's aggregation-spec list.

use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::QueryError;

/// One aggregation request from the DSL: `{"sum": ["price", "total_price"]}`.
///
/// The kind set is open; anything other than `count` takes a target field as
/// its first argument and an optional result-name alias as its second.
/// `count` takes only the optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub kind: String,
    pub args: Vec<Value>,
}

impl<'de> Deserialize<'de> for AggregationSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::deserialize(deserializer)?;
        let mut entries = map.into_iter();
        let (kind, payload) = entries
            .next()
            .ok_or_else(|| D::Error::custom("aggregation must carry exactly one kind key"))?;
        if entries.next().is_some() {
            return Err(D::Error::custom(
                "aggregation must carry exactly one kind key",
            ));
        }
        let args: Vec<Value> = serde_json::from_value(payload).map_err(|e| {
            D::Error::custom(format!("aggregation '{kind}' has a malformed payload: {e}"))
        })?;
        Ok(Self { kind, args })
    }
}

impl AggregationSpec {
    /// Compile into the backend aggregation object.
    pub fn compile(&self) -> Result<Value, QueryError> {
        let mut compiled = Map::new();
        compiled.insert("type".into(), Value::String(self.kind.clone()));

        if self.kind == "count" {
            if let Some(name) = self.args.first() {
                compiled.insert("name".into(), Value::String(self.string_arg(name, "name")?));
            }
        } else {
            let field = self
                .args
                .first()
                .ok_or_else(|| self.malformed("missing target field"))?;
            let field = self.string_arg(field, "field")?;
            compiled.insert("field".into(), Value::String(format!("properties.{field}")));
            if let Some(name) = self.args.get(1) {
                compiled.insert("name".into(), Value::String(self.string_arg(name, "name")?));
            }
        }
        Ok(Value::Object(compiled))
    }

    fn string_arg(&self, value: &Value, role: &str) -> Result<String, QueryError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.malformed(&format!("{role} must be a string")))
    }

    fn malformed(&self, reason: &str) -> QueryError {
        QueryError::MalformedAggregation {
            kind: self.kind.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Compile a list of aggregation requests, preserving input order.
///
/// Order determines the key order of the backend's response aggregation
/// block, which downstream pairing with group-by axes relies on.
pub fn compile_aggregations(specs: &[AggregationSpec]) -> Result<Vec<Value>, QueryError> {
    specs.iter().map(AggregationSpec::compile).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: Value) -> AggregationSpec {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_count_without_name() {
        let compiled = parse(json!({"count": []})).compile().unwrap();
        assert_eq!(compiled, json!({"type": "count"}));
    }

    #[test]
    fn test_count_with_name() {
        let compiled = parse(json!({"count": ["total"]})).compile().unwrap();
        assert_eq!(compiled, json!({"type": "count", "name": "total"}));
    }

    #[test]
    fn test_field_aggregation_derives_property_path() {
        let compiled = parse(json!({"sum": ["price"]})).compile().unwrap();
        assert_eq!(compiled, json!({"type": "sum", "field": "properties.price"}));
    }

    #[test]
    fn test_field_aggregation_with_name() {
        let compiled = parse(json!({"avg": ["price", "avg_price"]})).compile().unwrap();
        assert_eq!(
            compiled,
            json!({"type": "avg", "field": "properties.price", "name": "avg_price"})
        );
    }

    #[test]
    fn test_output_order_matches_input_order() {
        let specs = vec![
            parse(json!({"max": ["score"]})),
            parse(json!({"count": []})),
            parse(json!({"approximateDistinct": ["owner", "owners"]})),
        ];
        let compiled = compile_aggregations(&specs).unwrap();
        assert_eq!(compiled[0]["type"], "max");
        assert_eq!(compiled[1], json!({"type": "count"}));
        assert_eq!(compiled[2]["name"], "owners");
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let err = parse(json!({"sum": []})).compile().unwrap_err();
        assert!(err.to_string().contains("missing target field"));
    }
}
