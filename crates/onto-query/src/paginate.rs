//! # Pagination Driver
//!
//! Repeatedly issues a compiled request through an injected executor,
//! follows the opaque continuation token, and accumulates rows until the
//! caller's limit is reached or the token chain ends.

use serde_json::Value;

use crate::request::RequestPayload;
use crate::{BoxError, QueryError};

/// Hard ceiling on pagination rounds per call. A backend that keeps handing
/// out tokens without ever satisfying the limit trips [`QueryError::RoundLimit`]
/// instead of looping forever.
pub const MAX_PAGE_ROUNDS: usize = 64;

/// One network round trip: send an assembled payload, get parsed JSON back.
///
/// Implementations own transport, auth header attachment, and any retry
/// policy; the driver applies none of its own and propagates failures
/// immediately.
#[async_trait::async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, payload: &RequestPayload) -> Result<Value, BoxError>;
}

/// Drive `executor` until `limit` rows are accumulated or the backend stops
/// returning a continuation token. Returns at most `limit` rows; pages
/// already fetched are never discarded except by the final truncation.
///
/// A response with no `data` key counts as zero rows. `limit == 0` issues no
/// requests at all.
pub async fn paginate(
    executor: &dyn RequestExecutor,
    mut payload: RequestPayload,
    limit: usize,
) -> Result<Vec<Value>, QueryError> {
    let mut rows: Vec<Value> = Vec::new();
    let mut rounds = 0usize;

    while rows.len() < limit {
        if rounds >= MAX_PAGE_ROUNDS {
            return Err(QueryError::RoundLimit(rounds));
        }
        rounds += 1;

        let response = executor
            .execute(&payload)
            .await
            .map_err(QueryError::Request)?;

        if let Some(page) = response.get("data").and_then(Value::as_array) {
            tracing::debug!(round = rounds, page_rows = page.len(), "fetched page");
            rows.extend(page.iter().cloned());
        }

        match response.get("nextPageToken").and_then(Value::as_str) {
            Some(token) => payload.page_token = Some(token.to_string()),
            None => break,
        }
    }

    rows.truncate(limit);
    Ok(rows)
}
