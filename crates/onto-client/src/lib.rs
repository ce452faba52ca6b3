//! # Ontology Backend Client
//!
//! The two collaborator capabilities the query core consumes: an
//! `authorize()` primitive (OAuth2 client-credentials grant against the
//! configured token endpoint) and `RequestExecutor` implementations over
//! reqwest — GET with the payload folded into query parameters for listing
//! operations, POST with the payload as JSON body for search and aggregate.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use onto_query::{BoxError, RequestExecutor, RequestPayload};

/// Errors from configuration, credential acquisition, or transport.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("missing required environment variable {0}")]
    Config(&'static str),

    #[error("credential material is not header-safe: {0}")]
    Credential(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Backend connection settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the ontology API, e.g. `https://host.example.com`.
    pub api_endpoint: String,
    /// Default ontology queried when a tool call names none.
    pub ontology_id: String,
    /// OAuth2 token endpoint for the client-credentials grant.
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ClientError> {
        Ok(Self {
            api_endpoint: require("ONTOLOGY_API_ENDPOINT")?,
            ontology_id: require("ONTOLOGY_ID")?,
            token_endpoint: require("ONTOLOGY_TOKEN_ENDPOINT")?,
            client_id: require("ONTOLOGY_CLIENT_ID")?,
            client_secret: require("ONTOLOGY_CLIENT_SECRET")?,
        })
    }
}

fn require(var: &'static str) -> Result<String, ClientError> {
    std::env::var(var).map_err(|_| ClientError::Config(var))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Shared HTTP client for the ontology backend. Credentials are fetched per
/// operation and never cached or logged.
pub struct OntologyClient {
    http: reqwest::Client,
    config: Config,
}

impl OntologyClient {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn default_ontology(&self) -> &str {
        &self.config.ontology_id
    }

    /// Acquire a bearer token and build the request headers.
    pub async fn authorize(&self) -> Result<HeaderMap, ClientError> {
        tracing::debug!("requesting access token from {}", self.config.token_endpoint);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let token: TokenResponse = response.json().await?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .map_err(|e| ClientError::Credential(e.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// One authorized GET returning parsed JSON. Used by the single-object
    /// operations that never paginate.
    pub async fn get_json(&self, url: &str) -> Result<Value, ClientError> {
        let headers = self.authorize().await?;
        let response = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// One authorized POST with a JSON body, returning parsed JSON.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ClientError> {
        let headers = self.authorize().await?;
        let response = self
            .http
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Executor for paginated listing operations against `url`.
    pub fn get_executor<'a>(&'a self, url: String) -> GetExecutor<'a> {
        GetExecutor { client: self, url }
    }

    /// Executor for paginated search operations against `url`.
    pub fn post_executor<'a>(&'a self, url: String) -> PostExecutor<'a> {
        PostExecutor { client: self, url }
    }

    // Backend routes.

    fn base(&self) -> &str {
        self.config.api_endpoint.trim_end_matches('/')
    }

    pub fn object_types_url(&self, ontology: &str) -> String {
        format!("{}/api/v2/ontologies/{ontology}/objectTypes", self.base())
    }

    pub fn object_type_url(&self, ontology: &str, object_type_id: &str) -> String {
        format!(
            "{}/api/v2/ontologies/{ontology}/objectTypes/{object_type_id}",
            self.base()
        )
    }

    pub fn objects_url(&self, ontology: &str, object_type_id: &str) -> String {
        format!(
            "{}/api/v2/ontologies/{ontology}/objects/{object_type_id}",
            self.base()
        )
    }

    pub fn object_url(&self, ontology: &str, object_type_id: &str, primary_key: &str) -> String {
        format!(
            "{}/api/v2/ontologies/{ontology}/objectTypes/{object_type_id}/{primary_key}",
            self.base()
        )
    }

    pub fn search_url(&self, ontology: &str, object_type_id: &str) -> String {
        format!("{}/search", self.objects_url(ontology, object_type_id))
    }

    pub fn aggregate_url(&self, ontology: &str, object_type_id: &str) -> String {
        format!("{}/aggregate", self.objects_url(ontology, object_type_id))
    }

    pub fn action_url(&self, ontology: &str, action_id: &str) -> String {
        format!(
            "{}/api/v2/ontologies/{ontology}/actions/{action_id}/apply",
            self.base()
        )
    }

    pub fn batch_action_url(&self, ontology: &str, action_id: &str) -> String {
        format!(
            "{}/api/v2/ontologies/{ontology}/actions/{action_id}/applyBatch",
            self.base()
        )
    }
}

/// GET-side executor: the payload travels as query parameters.
pub struct GetExecutor<'a> {
    client: &'a OntologyClient,
    url: String,
}

#[async_trait::async_trait]
impl RequestExecutor for GetExecutor<'_> {
    async fn execute(&self, payload: &RequestPayload) -> Result<Value, BoxError> {
        let headers = self.client.authorize().await?;
        let params = fold_query_params(payload);
        let response = self
            .client
            .http
            .get(&self.url)
            .headers(headers)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// POST-side executor: the payload travels as the JSON body.
pub struct PostExecutor<'a> {
    client: &'a OntologyClient,
    url: String,
}

#[async_trait::async_trait]
impl RequestExecutor for PostExecutor<'_> {
    async fn execute(&self, payload: &RequestPayload) -> Result<Value, BoxError> {
        let headers = self.client.authorize().await?;
        let response = self
            .client
            .http
            .post(&self.url)
            .headers(headers)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Fold a request payload into GET query parameters: `select` becomes
/// repeated pairs, `orderBy` a comma-joined list of `p.<field>:<direction>`
/// entries. The listing path never carries a `where` clause, so it is not
/// folded.
fn fold_query_params(payload: &RequestPayload) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if let Some(page_size) = payload.page_size {
        params.push(("pageSize".to_string(), page_size.to_string()));
    }
    if let Some(select) = &payload.select {
        for field in select {
            params.push(("select".to_string(), field.clone()));
        }
    }
    if let Some(order_by) = &payload.order_by {
        let rendered: Vec<String> = order_by
            .fields
            .iter()
            .map(|sf| format!("p.{}:{}", sf.field, direction_str(&sf.direction)))
            .collect();
        params.push(("orderBy".to_string(), rendered.join(",")));
    }
    if let Some(token) = &payload.page_token {
        params.push(("pageToken".to_string(), token.clone()));
    }

    params
}

fn direction_str(direction: &Value) -> String {
    match direction {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn sample_config() -> Config {
        Config {
            api_endpoint: "https://onto.example.com/".into(),
            ontology_id: "ontology-1".into(),
            token_endpoint: "https://auth.example.com/token".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
        }
    }

    #[test]
    fn test_urls_normalize_trailing_slash() {
        let client = OntologyClient::new(sample_config());
        assert_eq!(
            client.object_types_url("ont"),
            "https://onto.example.com/api/v2/ontologies/ont/objectTypes"
        );
        assert_eq!(
            client.search_url("ont", "Ticket"),
            "https://onto.example.com/api/v2/ontologies/ont/objects/Ticket/search"
        );
        assert_eq!(
            client.batch_action_url("ont", "close-ticket"),
            "https://onto.example.com/api/v2/ontologies/ont/actions/close-ticket/applyBatch"
        );
    }

    #[test]
    fn test_fold_query_params() {
        let mut sort = Map::new();
        sort.insert("a".into(), json!("asc"));
        sort.insert("b".into(), json!("desc"));
        let payload = onto_query::assemble_query(
            &[],
            &["a".to_string(), "b".to_string()],
            &sort,
            Some(100),
        );
        let params = fold_query_params(&payload);
        assert_eq!(
            params,
            vec![
                ("pageSize".to_string(), "100".to_string()),
                ("select".to_string(), "a".to_string()),
                ("select".to_string(), "b".to_string()),
                ("orderBy".to_string(), "p.a:asc,p.b:desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_fold_includes_page_token() {
        let payload = RequestPayload {
            page_token: Some("tok".into()),
            ..RequestPayload::default()
        };
        assert_eq!(
            fold_query_params(&payload),
            vec![("pageToken".to_string(), "tok".to_string())]
        );
    }
}
