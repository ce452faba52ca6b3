//! # Ontology Tools
//!
//! Thin MCP adapters over the query core. Each tool builds DSL inputs from
//! the caller's structured parameters, runs the compiler/assembler/driver
//! pipeline (or a single request for get/apply), and wraps the outcome in the
//! uniform `{success, message, items|item, total, limit, pageSize}` envelope.
//! A failed backend call is still a *successful* tool call carrying
//! `success: false`, so a conversing agent can recover and continue.

use rmcp::handler::server::tool::{Parameters, ToolRouter};
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;

use onto_client::OntologyClient;
use onto_query::{
    assemble_aggregate, assemble_query, paginate, AggregationSpec, FilterCondition,
    GroupByDirective,
};

const DEFAULT_LIMIT: usize = 100;
const DEFAULT_PAGE_SIZE: u32 = 100;

// =============================================================================
// Tool Parameters
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListObjectTypesParams {
    #[schemars(description = "Maximum number of object types to return")]
    pub limit: Option<usize>,
    #[schemars(description = "Number of items per page")]
    pub page_size: Option<u32>,
    #[schemars(description = "Ontology to query (defaults to the configured ontology)")]
    pub ontology: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetObjectTypeParams {
    #[schemars(description = "ID of the object type to retrieve")]
    pub object_type_id: String,
    #[schemars(description = "Ontology to query (defaults to the configured ontology)")]
    pub ontology: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListObjectsParams {
    #[schemars(description = "ID of the object type to list objects from")]
    pub object_type_id: String,
    #[schemars(description = "Maximum number of objects to return")]
    pub limit: Option<usize>,
    #[schemars(description = "Number of items per page")]
    pub page_size: Option<u32>,
    #[schemars(description = "Ontology to query (defaults to the configured ontology)")]
    pub ontology: Option<String>,
    #[schemars(description = "Properties to include in the response")]
    pub properties: Option<Vec<String>>,
    #[schemars(description = "Sort criteria: property name to \"asc\" or \"desc\"")]
    pub sort: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetObjectParams {
    #[schemars(description = "ID of the object type to retrieve the object from")]
    pub object_type_id: String,
    #[schemars(description = "Primary key of the object to retrieve")]
    pub primary_key: String,
    #[schemars(description = "Ontology to query (defaults to the configured ontology)")]
    pub ontology: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchObjectsParams {
    #[schemars(description = "ID of the object type to search")]
    pub object_type_id: String,
    #[schemars(
        description = "Filter conditions, e.g. [{\"and\": [{\"equals\": [\"status\", \"open\"]}]}]"
    )]
    pub query: Vec<Value>,
    #[schemars(description = "Maximum number of objects to return")]
    pub limit: Option<usize>,
    #[schemars(description = "Number of items per page")]
    pub page_size: Option<u32>,
    #[schemars(description = "Ontology to query (defaults to the configured ontology)")]
    pub ontology: Option<String>,
    #[schemars(description = "Properties to include in the response")]
    pub properties: Option<Vec<String>>,
    #[schemars(description = "Sort criteria: property name to \"asc\" or \"desc\"")]
    pub sort: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AggregateObjectsParams {
    #[schemars(description = "ID of the object type to aggregate")]
    pub object_type_id: String,
    #[schemars(description = "Grouping directives, e.g. [{\"exact\": [\"region\"]}]")]
    pub groupby: Option<Vec<Value>>,
    #[schemars(description = "Aggregations, e.g. [{\"count\": []}, {\"sum\": [\"price\"]}]")]
    pub aggregation: Option<Vec<Value>>,
    #[schemars(description = "Filter conditions applied before aggregation")]
    pub query: Option<Vec<Value>>,
    #[schemars(description = "Ontology to query (defaults to the configured ontology)")]
    pub ontology: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ApplyActionParams {
    #[schemars(description = "ID of the action to apply")]
    pub action_id: String,
    #[schemars(description = "Input parameters for the action")]
    pub inputs: Option<Map<String, Value>>,
    #[schemars(description = "Ontology to act on (defaults to the configured ontology)")]
    pub ontology: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ApplyBatchActionsParams {
    #[schemars(description = "ID of the action to apply")]
    pub action_id: String,
    #[schemars(description = "List of input parameter sets, one per action application")]
    pub inputs: Option<Vec<Value>>,
    #[schemars(description = "Ontology to act on (defaults to the configured ontology)")]
    pub ontology: Option<String>,
}

// =============================================================================
// Service
// =============================================================================

/// The MCP service: explicit context object holding the backend client and
/// the tool router, constructed once at startup.
#[derive(Clone)]
pub struct OntologyService {
    client: Arc<OntologyClient>,
    tool_router: ToolRouter<Self>,
}

impl OntologyService {
    pub fn new(client: Arc<OntologyClient>) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    fn ontology(&self, requested: Option<String>) -> String {
        requested.unwrap_or_else(|| self.client.default_ontology().to_string())
    }
}

#[tool_handler]
impl ServerHandler for OntologyService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Query an ontology backend: list and inspect object types, list, search, \
                 and aggregate objects with nested filter conditions, and apply actions. \
                 Every tool returns a JSON envelope with a 'success' flag and a message; \
                 inspect 'success' before using 'items' or 'item'."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

fn envelope(value: Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

/// Parse raw DSL nodes into their typed form, failing on the first malformed
/// node with a message naming it.
fn parse_dsl<T: DeserializeOwned>(raw: Vec<Value>) -> Result<Vec<T>, serde_json::Error> {
    raw.into_iter().map(serde_json::from_value).collect()
}

/// Success envelope for the paginated listing and search tools. `noun` is the
/// message subject ("Object Types" or "Objects").
fn retrieved_envelope(noun: &str, items: Vec<Value>, limit: usize, page_size: u32) -> Value {
    let total = items.len();
    json!({
        "success": true,
        "message": format!("Retrieved {total} {noun}"),
        "items": items,
        "total": total,
        "limit": limit,
        "pageSize": page_size,
    })
}

/// Success envelope for the aggregate tool; carries no paging fields.
fn aggregated_envelope(response: &Value) -> Value {
    let items = response.get("data").cloned().unwrap_or_else(|| json!([]));
    let total = items.as_array().map(Vec::len).unwrap_or(0);
    json!({
        "success": true,
        "message": format!("Aggregated {total} Objects"),
        "items": items,
        "total": total,
    })
}

/// Success envelope for the batch action tool; `items` is the backend's raw
/// response object, not a row list.
fn batch_applied_envelope(action_id: &str, response: Value) -> Value {
    json!({
        "success": true,
        "message": format!("Applied Batch Action {action_id}"),
        "items": response,
    })
}

// =============================================================================
// Tool Implementations
// =============================================================================

#[tool_router]
impl OntologyService {
    #[tool(description = "List object types from a given ontology.")]
    pub async fn list_object_types(
        &self,
        Parameters(params): Parameters<ListObjectTypesParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
        let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let ontology = self.ontology(params.ontology);

        let payload = assemble_query(&[], &[], &Map::new(), Some(page_size));
        let executor = self
            .client
            .get_executor(self.client.object_types_url(&ontology));

        match paginate(&executor, payload, limit).await {
            Ok(items) => envelope(retrieved_envelope("Object Types", items, limit, page_size)),
            Err(e) => {
                tracing::error!("Error listing Object Types: {e}");
                envelope(json!({
                    "success": false,
                    "message": format!("Error listing Object Types: {e}"),
                    "items": [],
                    "total": 0,
                    "limit": limit,
                    "pageSize": page_size,
                }))
            }
        }
    }

    #[tool(description = "Retrieve one object type from a given ontology.")]
    pub async fn get_object_type(
        &self,
        Parameters(params): Parameters<GetObjectTypeParams>,
    ) -> Result<CallToolResult, McpError> {
        let ontology = self.ontology(params.ontology);
        let url = self
            .client
            .object_type_url(&ontology, &params.object_type_id);

        match self.client.get_json(&url).await {
            Ok(item) => {
                let display_name = item
                    .get("displayName")
                    .and_then(Value::as_str)
                    .unwrap_or(&params.object_type_id)
                    .to_string();
                envelope(json!({
                    "success": true,
                    "message": format!("Retrieved {display_name} Object Types"),
                    "item": item,
                }))
            }
            Err(e) => {
                tracing::error!(
                    "Error Retrieving {} Object Type: {e}",
                    params.object_type_id
                );
                envelope(json!({
                    "success": false,
                    "message": format!(
                        "Error Retrieving {} Object Type: {e}",
                        params.object_type_id
                    ),
                    "item": null,
                }))
            }
        }
    }

    #[tool(description = "List objects of a given object type.")]
    pub async fn list_objects(
        &self,
        Parameters(params): Parameters<ListObjectsParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
        let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let ontology = self.ontology(params.ontology);
        let select = params.properties.unwrap_or_default();
        let sort = params.sort.unwrap_or_default();

        let payload = assemble_query(&[], &select, &sort, Some(page_size));
        let executor = self
            .client
            .get_executor(self.client.objects_url(&ontology, &params.object_type_id));

        match paginate(&executor, payload, limit).await {
            Ok(items) => envelope(retrieved_envelope("Objects", items, limit, page_size)),
            Err(e) => {
                tracing::error!("Error listing Objects: {e}");
                envelope(json!({
                    "success": false,
                    "message": format!("Error listing Objects: {e}"),
                    "items": [],
                    "total": 0,
                    "limit": limit,
                    "pageSize": page_size,
                }))
            }
        }
    }

    #[tool(description = "Retrieve one object by primary key.")]
    pub async fn get_object(
        &self,
        Parameters(params): Parameters<GetObjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let ontology = self.ontology(params.ontology);
        let url = self
            .client
            .object_url(&ontology, &params.object_type_id, &params.primary_key);

        match self.client.get_json(&url).await {
            Ok(item) => {
                let primary_key = item
                    .get("__primaryKey")
                    .and_then(Value::as_str)
                    .unwrap_or(&params.primary_key)
                    .to_string();
                envelope(json!({
                    "success": true,
                    "message": format!("Retrieved {primary_key} Object"),
                    "item": item,
                }))
            }
            Err(e) => {
                tracing::error!("Error Retrieving {} Object: {e}", params.primary_key);
                envelope(json!({
                    "success": false,
                    "message": format!("Error Retrieving {} Object: {e}", params.primary_key),
                    "item": null,
                }))
            }
        }
    }

    #[tool(
        description = "Search objects of a given object type with nested filter conditions \
                       (boolean combinators 'and'/'or'/'not' over comparisons like \
                       {\"equals\": [\"field\", value]})."
    )]
    pub async fn search_objects(
        &self,
        Parameters(params): Parameters<SearchObjectsParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
        let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let ontology = self.ontology(params.ontology);
        let select = params.properties.unwrap_or_default();
        let sort = params.sort.unwrap_or_default();

        let search_failure = |e: &dyn std::fmt::Display| {
            tracing::error!("Error searching Objects: {e}");
            envelope(json!({
                "success": false,
                "message": format!("Error searching Objects: {e}"),
                "items": [],
                "total": 0,
            }))
        };

        let conditions: Vec<FilterCondition> = match parse_dsl(params.query) {
            Ok(conditions) => conditions,
            Err(e) => return search_failure(&e),
        };

        let payload = assemble_query(&conditions, &select, &sort, Some(page_size));
        let executor = self
            .client
            .post_executor(self.client.search_url(&ontology, &params.object_type_id));

        match paginate(&executor, payload, limit).await {
            Ok(items) => envelope(retrieved_envelope("Objects", items, limit, page_size)),
            Err(e) => search_failure(&e),
        }
    }

    #[tool(
        description = "Aggregate objects of a given object type: count/sum/avg/min/max over \
                       optional group-by buckets (exact, ranges, duration, fixedWidth) and \
                       optional filter conditions."
    )]
    pub async fn aggregate_objects(
        &self,
        Parameters(params): Parameters<AggregateObjectsParams>,
    ) -> Result<CallToolResult, McpError> {
        let ontology = self.ontology(params.ontology);

        let aggregate_failure = |e: &dyn std::fmt::Display| {
            tracing::error!("Error aggregating Objects: {e}");
            envelope(json!({
                "success": false,
                "message": format!("Error aggregating Objects: {e}"),
                "items": [],
                "total": 0,
            }))
        };

        let conditions: Vec<FilterCondition> =
            match parse_dsl(params.query.unwrap_or_default()) {
                Ok(conditions) => conditions,
                Err(e) => return aggregate_failure(&e),
            };
        let group_by: Vec<GroupByDirective> =
            match parse_dsl(params.groupby.unwrap_or_default()) {
                Ok(group_by) => group_by,
                Err(e) => return aggregate_failure(&e),
            };
        let aggregations: Vec<AggregationSpec> =
            match parse_dsl(params.aggregation.unwrap_or_default()) {
                Ok(aggregations) => aggregations,
                Err(e) => return aggregate_failure(&e),
            };

        let body = match assemble_aggregate(&conditions, &group_by, &aggregations) {
            Ok(body) => body,
            Err(e) => return aggregate_failure(&e),
        };

        let url = self
            .client
            .aggregate_url(&ontology, &params.object_type_id);
        match self.client.post_json(&url, &body).await {
            Ok(response) => envelope(aggregated_envelope(&response)),
            Err(e) => aggregate_failure(&e),
        }
    }

    #[tool(description = "Apply an ontology action with the given input parameters.")]
    pub async fn apply_action(
        &self,
        Parameters(params): Parameters<ApplyActionParams>,
    ) -> Result<CallToolResult, McpError> {
        let ontology = self.ontology(params.ontology);
        let mut body = Map::new();
        if let Some(inputs) = params.inputs {
            body.insert("parameters".into(), Value::Object(inputs));
        }

        let url = self.client.action_url(&ontology, &params.action_id);
        match self.client.post_json(&url, &Value::Object(body)).await {
            Ok(item) => envelope(json!({
                "success": true,
                "message": format!("Applied Action {}", params.action_id),
                "item": item,
            })),
            Err(e) => {
                tracing::error!("Error applying Action {}: {e}", params.action_id);
                envelope(json!({
                    "success": false,
                    "message": format!("Error applying Action {}: {e}", params.action_id),
                    "item": null,
                }))
            }
        }
    }

    #[tool(description = "Apply an ontology action to a batch of input parameter sets.")]
    pub async fn apply_batch_actions(
        &self,
        Parameters(params): Parameters<ApplyBatchActionsParams>,
    ) -> Result<CallToolResult, McpError> {
        let ontology = self.ontology(params.ontology);
        let mut body = Map::new();
        if let Some(inputs) = params.inputs.filter(|inputs| !inputs.is_empty()) {
            let requests: Vec<Value> = inputs
                .into_iter()
                .map(|input| json!({"parameters": input}))
                .collect();
            body.insert("requests".into(), Value::Array(requests));
        }

        let url = self.client.batch_action_url(&ontology, &params.action_id);
        match self.client.post_json(&url, &Value::Object(body)).await {
            Ok(response) => envelope(batch_applied_envelope(&params.action_id, response)),
            Err(e) => {
                tracing::error!("Error applying Batch Action {}: {e}", params.action_id);
                envelope(json!({
                    "success": false,
                    "message": format!("Error applying Batch Action {}: {e}", params.action_id),
                    "items": [],
                }))
            }
        }
    }
}
