//! # Request Assembler
//!
//! Combines select list, sort spec, page size, and compiled predicate tree
//! into one request payload, and separately assembles aggregation requests.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::aggregate::{compile_aggregations, AggregationSpec};
use crate::filter::FilterCondition;
use crate::groupby::{compile_group_by, GroupByDirective};
use crate::QueryError;

/// One assembled request. Serializes to the backend's payload shape with
/// every unset field omitted; the same struct backs both the GET path (folded
/// into query parameters by the executor) and the POST search body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBy {
    pub fields: Vec<SortField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SortField {
    pub field: String,
    /// Sort direction, passed to the backend verbatim (`"asc"` / `"desc"`).
    pub direction: Value,
}

/// Assemble the payload for the list and search operations.
///
/// Sort keys are honored only when they also appear in `select` (all keys
/// when `select` is empty). Multiple top-level conditions collapse to the
/// last entry; callers wanting conjunction wrap them in a single `and` node.
pub fn assemble_query(
    conditions: &[FilterCondition],
    select: &[String],
    sort: &Map<String, Value>,
    page_size: Option<u32>,
) -> RequestPayload {
    let mut payload = RequestPayload {
        page_size,
        ..RequestPayload::default()
    };

    if !select.is_empty() {
        payload.select = Some(select.to_vec());
    }

    if !sort.is_empty() {
        let fields: Vec<SortField> = sort
            .iter()
            .filter(|(key, _)| select.is_empty() || select.contains(*key))
            .map(|(key, direction)| SortField {
                field: key.clone(),
                direction: direction.clone(),
            })
            .collect();
        payload.order_by = Some(OrderBy { fields });
    }

    for condition in conditions {
        payload.where_clause = Some(condition.compile());
    }

    payload
}

/// Assemble the body for the aggregate operation.
///
/// `groupBy` is present whenever directives were supplied, even if every one
/// was dropped as unsupported; `aggregation` (the backend's singular key) and
/// `where` are present only when their inputs are non-empty.
pub fn assemble_aggregate(
    conditions: &[FilterCondition],
    group_by: &[GroupByDirective],
    aggregations: &[AggregationSpec],
) -> Result<Value, QueryError> {
    let mut body = Map::new();

    if !group_by.is_empty() {
        body.insert("groupBy".into(), Value::Array(compile_group_by(group_by)));
    }
    if !aggregations.is_empty() {
        body.insert(
            "aggregation".into(),
            Value::Array(compile_aggregations(aggregations)?),
        );
    }
    if !conditions.is_empty() {
        let filtered = assemble_query(conditions, &[], &Map::new(), None);
        if let Some(where_clause) = filtered.where_clause {
            body.insert("where".into(), where_clause);
        }
    }

    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sort_spec(raw: Value) -> Map<String, Value> {
        raw.as_object().unwrap().clone()
    }

    fn conditions(raw: Value) -> Vec<FilterCondition> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let payload = assemble_query(&[], &[], &Map::new(), None);
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({}));
    }

    #[test]
    fn test_full_search_payload_shape() {
        let select = vec!["a".to_string(), "b".to_string()];
        let sort = sort_spec(json!({"a": "asc"}));
        let conds = conditions(json!([{"equals": ["a", 1]}]));
        let payload = assemble_query(&conds, &select, &sort, Some(25));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "pageSize": 25,
                "select": ["a", "b"],
                "orderBy": {"fields": [{"field": "a", "direction": "asc"}]},
                "where": {"type": "equals", "field": "a", "value": 1},
            })
        );
    }

    #[test]
    fn test_sort_keys_filtered_by_select() {
        let select = vec!["a".to_string(), "b".to_string()];
        let sort = sort_spec(json!({"a": "asc", "c": "desc"}));
        let payload = assemble_query(&[], &select, &sort, None);
        let fields = &payload.order_by.unwrap().fields;
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "a");
    }

    #[test]
    fn test_empty_select_keeps_all_sort_keys() {
        let sort = sort_spec(json!({"a": "asc", "c": "desc"}));
        let payload = assemble_query(&[], &[], &sort, None);
        assert_eq!(payload.order_by.unwrap().fields.len(), 2);
        assert!(payload.select.is_none());
    }

    // Pins the inherited semantics for multiple top-level entries: the last
    // one determines `where`. Switching to implicit conjunction is a
    // deliberate compatibility break, not a cleanup.
    #[test]
    fn test_last_condition_wins() {
        let conds = conditions(json!([
            {"equals": ["a", 1]},
            {"equals": ["b", 2]},
        ]));
        let payload = assemble_query(&conds, &[], &Map::new(), None);
        assert_eq!(
            payload.where_clause.unwrap(),
            json!({"type": "equals", "field": "b", "value": 2})
        );
    }

    #[test]
    fn test_aggregate_body_keys() {
        let conds = conditions(json!([{"greaterThan": ["amount", 100]}]));
        let groups: Vec<GroupByDirective> =
            serde_json::from_value(json!([{"exact": ["region"]}])).unwrap();
        let aggs: Vec<AggregationSpec> =
            serde_json::from_value(json!([{"count": []}, {"sum": ["amount", "total"]}])).unwrap();
        let body = assemble_aggregate(&conds, &groups, &aggs).unwrap();
        assert_eq!(
            body,
            json!({
                "groupBy": [{"type": "exact", "field": "region"}],
                "aggregation": [
                    {"type": "count"},
                    {"type": "sum", "field": "properties.amount", "name": "total"},
                ],
                "where": {"type": "greaterThan", "field": "amount", "value": 100},
            })
        );
    }

    #[test]
    fn test_aggregate_empty_inputs_omit_keys() {
        let body = assemble_aggregate(&[], &[], &[]).unwrap();
        assert_eq!(body, json!({}));
    }

    #[test]
    fn test_aggregate_all_unsupported_groups_still_emit_key() {
        let groups: Vec<GroupByDirective> =
            serde_json::from_value(json!([{"histogram": ["price", 10]}])).unwrap();
        let body = assemble_aggregate(&[], &groups, &[]).unwrap();
        assert_eq!(body, json!({"groupBy": []}));
    }
}
