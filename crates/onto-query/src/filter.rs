//! # Predicate Compiler
//!
//! Translates one DSL filter condition (leaf comparison or boolean
//! combinator) into the backend's nested predicate tree.

use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// A single filter condition: a boolean combinator over further conditions,
/// or a leaf comparison against one field.
///
/// Comparison operator names (`equals`, `greaterThan`, `contains`, ...) are
/// backend-defined and pass through verbatim; only `and`/`or`/`not` are
/// interpreted here.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
    Not(Vec<FilterCondition>),
    Compare {
        op: String,
        field: String,
        value: Value,
    },
}

impl FilterCondition {
    /// Compile into the backend predicate tree.
    ///
    /// Combinators emit `{"type": tag, "value": [children...]}` depth-first
    /// with child order preserved; leaves emit `{"type", "field", "value"}`.
    pub fn compile(&self) -> Value {
        match self {
            Self::And(children) => compile_combinator("and", children),
            Self::Or(children) => compile_combinator("or", children),
            Self::Not(children) => compile_combinator("not", children),
            Self::Compare { op, field, value } => json!({
                "type": op,
                "field": field,
                "value": value,
            }),
        }
    }
}

fn compile_combinator(tag: &str, children: &[FilterCondition]) -> Value {
    let compiled: Vec<Value> = children.iter().map(FilterCondition::compile).collect();
    json!({ "type": tag, "value": compiled })
}

impl<'de> Deserialize<'de> for FilterCondition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::deserialize(deserializer)?;
        let mut entries = map.into_iter();
        let (tag, payload) = entries
            .next()
            .ok_or_else(|| D::Error::custom("filter condition must carry exactly one tag key"))?;
        if entries.next().is_some() {
            return Err(D::Error::custom(
                "filter condition must carry exactly one tag key",
            ));
        }

        match tag.as_str() {
            "and" | "or" | "not" => {
                let children: Vec<FilterCondition> =
                    serde_json::from_value(payload).map_err(|e| {
                        D::Error::custom(format!("combinator '{tag}' has malformed children: {e}"))
                    })?;
                if children.is_empty() {
                    return Err(D::Error::custom(format!(
                        "combinator '{tag}' has no child conditions"
                    )));
                }
                Ok(match tag.as_str() {
                    "and" => Self::And(children),
                    "or" => Self::Or(children),
                    _ => Self::Not(children),
                })
            }
            op => {
                let mut args: Vec<Value> = serde_json::from_value(payload).map_err(|e| {
                    D::Error::custom(format!("comparison '{op}' has a malformed payload: {e}"))
                })?;
                if args.len() != 2 {
                    return Err(D::Error::custom(format!(
                        "comparison '{op}' expects [field, value], got {} element(s)",
                        args.len()
                    )));
                }
                let value = args.pop().unwrap_or(Value::Null);
                let field = match args.pop() {
                    Some(Value::String(field)) => field,
                    _ => {
                        return Err(D::Error::custom(format!(
                            "comparison '{op}' requires a string field name"
                        )))
                    }
                };
                Ok(Self::Compare {
                    op: op.to_string(),
                    field,
                    value,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: Value) -> FilterCondition {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_leaf_comparison() {
        let cond = parse(json!({"equals": ["status", "open"]}));
        assert_eq!(
            cond.compile(),
            json!({"type": "equals", "field": "status", "value": "open"})
        );
    }

    #[test]
    fn test_unknown_operator_passes_through() {
        let cond = parse(json!({"isNullPhrase": ["owner", true]}));
        assert_eq!(
            cond.compile(),
            json!({"type": "isNullPhrase", "field": "owner", "value": true})
        );
    }

    #[test]
    fn test_boolean_nesting_preserves_shape_and_order() {
        let cond = parse(json!({
            "and": [
                {"equals": ["a", 1]},
                {"or": [{"equals": ["b", 2]}, {"equals": ["c", 3]}]},
            ]
        }));
        assert_eq!(
            cond.compile(),
            json!({
                "type": "and",
                "value": [
                    {"type": "equals", "field": "a", "value": 1},
                    {
                        "type": "or",
                        "value": [
                            {"type": "equals", "field": "b", "value": 2},
                            {"type": "equals", "field": "c", "value": 3},
                        ]
                    },
                ]
            })
        );
    }

    #[test]
    fn test_not_keeps_child_order() {
        let cond = parse(json!({"not": [{"equals": ["x", 1]}, {"equals": ["y", 2]}]}));
        let compiled = cond.compile();
        let children = compiled["value"].as_array().unwrap();
        assert_eq!(children[0]["field"], "x");
        assert_eq!(children[1]["field"], "y");
    }

    #[test]
    fn test_list_valued_leaf() {
        let cond = parse(json!({"in": ["region", ["emea", "apac"]]}));
        assert_eq!(
            cond.compile(),
            json!({"type": "in", "field": "region", "value": ["emea", "apac"]})
        );
    }

    #[test]
    fn test_empty_combinator_rejected() {
        let err = serde_json::from_value::<FilterCondition>(json!({"and": []})).unwrap_err();
        assert!(err.to_string().contains("no child conditions"));
    }

    #[test]
    fn test_leaf_missing_value_rejected() {
        let err = serde_json::from_value::<FilterCondition>(json!({"equals": ["field"]}))
            .unwrap_err();
        assert!(err.to_string().contains("expects [field, value]"));
    }

    #[test]
    fn test_multi_key_node_rejected() {
        let raw = json!({"equals": ["a", 1], "or": [{"equals": ["b", 2]}]});
        assert!(serde_json::from_value::<FilterCondition>(raw).is_err());
    }

    #[test]
    fn test_non_string_field_rejected() {
        let err =
            serde_json::from_value::<FilterCondition>(json!({"equals": [7, 1]})).unwrap_err();
        assert!(err.to_string().contains("string field name"));
    }
}
