//! # onto-mcp — Ontology MCP server
//!
//! Exposes a remote ontology backend to LLM agents over MCP stdio: object
//! type discovery, filtered/paginated object listing and search, aggregation
//! with group-by buckets, and action application.
//!
//! Configuration comes from the environment: `ONTOLOGY_API_ENDPOINT`,
//! `ONTOLOGY_ID`, `ONTOLOGY_TOKEN_ENDPOINT`, `ONTOLOGY_CLIENT_ID`,
//! `ONTOLOGY_CLIENT_SECRET`.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onto_client::{Config, OntologyClient};

mod tools;

use tools::OntologyService;

#[derive(Parser)]
#[command(name = "onto-mcp", version, about = "Ontology MCP server")]
struct Args {
    /// Default ontology, overriding ONTOLOGY_ID
    #[arg(long)]
    ontology: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr: stdout is the MCP transport.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "onto_mcp=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(ontology) = args.ontology {
        config.ontology_id = ontology;
    }

    tracing::info!(
        endpoint = %config.api_endpoint,
        ontology = %config.ontology_id,
        "starting ontology MCP server on stdio"
    );

    let client = Arc::new(OntologyClient::new(config));
    let service = OntologyService::new(client).serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
