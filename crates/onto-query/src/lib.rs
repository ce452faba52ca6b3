//! # Ontology Query Core
//!
//! Compiles a small filter/aggregation DSL into the JSON request shape of a
//! paginated ontology REST backend, and drives repeated requests until a
//! caller-specified result count is reached.
//!
//! The DSL arrives as single-key JSON objects whose key is the node tag:
//! ```text
//! {"and": [{"equals": ["status", "open"]}, {"greaterThan": ["amount", 100]}]}
//! {"sum": ["price", "total_price"]}
//! {"ranges": ["age", [[0, 18], [18, 65]]]}
//! ```
//! Deserialization turns those into proper tagged unions; compilation is pure
//! structural recursion with no network or credential state. Only the
//! pagination driver touches the outside world, through an injected
//! [`RequestExecutor`].

pub mod aggregate;
pub mod filter;
pub mod groupby;
pub mod paginate;
pub mod request;

pub use aggregate::{compile_aggregations, AggregationSpec};
pub use filter::FilterCondition;
pub use groupby::{compile_group_by, GroupByDirective};
pub use paginate::{paginate, RequestExecutor, MAX_PAGE_ROUNDS};
pub use request::{assemble_aggregate, assemble_query, OrderBy, RequestPayload, SortField};

/// Boxed error returned by executor implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the compilers and the pagination driver.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// An aggregation spec was missing its target field or carried a
    /// non-string field/name argument.
    #[error("malformed aggregation '{kind}': {reason}")]
    MalformedAggregation { kind: String, reason: String },

    /// The injected executor failed. No retry is attempted here; retry
    /// policy belongs to the executor itself.
    #[error("request failed: {0}")]
    Request(#[source] BoxError),

    /// The backend kept returning continuation tokens past the round
    /// safeguard without satisfying the limit.
    #[error("pagination aborted after {0} rounds with the page-token chain still unexhausted")]
    RoundLimit(usize),
}
