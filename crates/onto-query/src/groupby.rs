//! # Group-By Compiler
//!
//! Translates grouping directives (exact value, numeric/time ranges, fixed
//! width buckets, duration buckets) into the backend's group-by list.

use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// One grouping directive from the DSL.
///
/// Unknown tags deserialize to [`GroupByDirective::Unsupported`] and are
/// dropped at compile time rather than rejected, so directives for backend
/// bucket kinds this client does not know about pass through harmlessly.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupByDirective {
    Exact { field: String },
    Ranges { field: String, ranges: Vec<(Value, Value)> },
    Duration { field: String, duration: Value },
    FixedWidth { field: String, width: Value },
    Unsupported { tag: String },
}

impl<'de> Deserialize<'de> for GroupByDirective {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::deserialize(deserializer)?;
        let mut entries = map.into_iter();
        let (tag, payload) = entries
            .next()
            .ok_or_else(|| D::Error::custom("group-by directive must carry exactly one tag key"))?;
        if entries.next().is_some() {
            return Err(D::Error::custom(
                "group-by directive must carry exactly one tag key",
            ));
        }

        let args: Vec<Value> = match tag.as_str() {
            "exact" | "ranges" | "duration" | "fixedWidth" => serde_json::from_value(payload)
                .map_err(|e| {
                    D::Error::custom(format!("group-by '{tag}' has a malformed payload: {e}"))
                })?,
            _ => return Ok(Self::Unsupported { tag }),
        };

        let field = match args.first() {
            Some(Value::String(field)) => field.clone(),
            _ => {
                return Err(D::Error::custom(format!(
                    "group-by '{tag}' requires a string field name"
                )))
            }
        };

        match tag.as_str() {
            "exact" => Ok(Self::Exact { field }),
            "ranges" => {
                let ranges: Vec<(Value, Value)> = args
                    .get(1)
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| {
                        D::Error::custom(format!(
                            "group-by 'ranges' expects [field, [[start, end], ...]]: {e}"
                        ))
                    })?
                    .ok_or_else(|| {
                        D::Error::custom("group-by 'ranges' expects [field, [[start, end], ...]]")
                    })?;
                Ok(Self::Ranges { field, ranges })
            }
            "duration" => {
                let duration = args.get(1).cloned().ok_or_else(|| {
                    D::Error::custom("group-by 'duration' expects [field, unit]")
                })?;
                Ok(Self::Duration { field, duration })
            }
            _ => {
                let width = args.get(1).cloned().ok_or_else(|| {
                    D::Error::custom("group-by 'fixedWidth' expects [field, width]")
                })?;
                Ok(Self::FixedWidth { field, width })
            }
        }
    }
}

impl GroupByDirective {
    /// Compile into the backend group-by object. `None` for unsupported tags.
    pub fn compile(&self) -> Option<Value> {
        match self {
            Self::Exact { field } => Some(json!({"type": "exact", "field": field})),
            Self::Ranges { field, ranges } => {
                let buckets: Vec<Value> = ranges
                    .iter()
                    .map(|(start, end)| json!({"startValue": start, "endValue": end}))
                    .collect();
                Some(json!({"type": "ranges", "field": field, "ranges": buckets}))
            }
            Self::Duration { field, duration } => {
                Some(json!({"type": "duration", "field": field, "duration": duration}))
            }
            Self::FixedWidth { field, width } => {
                Some(json!({"type": "fixedWidth", "field": field, "fixedWidth": width}))
            }
            Self::Unsupported { tag } => {
                tracing::debug!("dropping unsupported group-by directive '{tag}'");
                None
            }
        }
    }
}

/// Compile a directive list, preserving order and dropping unsupported tags.
pub fn compile_group_by(directives: &[GroupByDirective]) -> Vec<Value> {
    directives
        .iter()
        .filter_map(GroupByDirective::compile)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: Value) -> GroupByDirective {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_exact() {
        let compiled = compile_group_by(&[parse(json!({"exact": ["status"]}))]);
        assert_eq!(compiled, vec![json!({"type": "exact", "field": "status"})]);
    }

    #[test]
    fn test_ranges_preserve_bucket_order() {
        let compiled = compile_group_by(&[parse(json!({
            "ranges": ["age", [[0, 18], [18, 65], [65, 120]]]
        }))]);
        assert_eq!(
            compiled[0],
            json!({
                "type": "ranges",
                "field": "age",
                "ranges": [
                    {"startValue": 0, "endValue": 18},
                    {"startValue": 18, "endValue": 65},
                    {"startValue": 65, "endValue": 120},
                ]
            })
        );
    }

    #[test]
    fn test_duration() {
        let compiled = compile_group_by(&[parse(json!({"duration": ["created_at", "days"]}))]);
        assert_eq!(
            compiled[0],
            json!({"type": "duration", "field": "created_at", "duration": "days"})
        );
    }

    #[test]
    fn test_fixed_width() {
        let compiled = compile_group_by(&[parse(json!({"fixedWidth": ["price", 10]}))]);
        assert_eq!(
            compiled[0],
            json!({"type": "fixedWidth", "field": "price", "fixedWidth": 10})
        );
    }

    #[test]
    fn test_unknown_tag_is_dropped_not_rejected() {
        let directives = vec![
            parse(json!({"exact": ["status"]})),
            parse(json!({"histogram": ["price", 10]})),
        ];
        let compiled = compile_group_by(&directives);
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0]["type"], "exact");
    }

    #[test]
    fn test_known_tag_with_malformed_payload_rejected() {
        let err = serde_json::from_value::<GroupByDirective>(json!({"duration": ["ts"]}))
            .unwrap_err();
        assert!(err.to_string().contains("expects [field, unit]"));
    }
}
