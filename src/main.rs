use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use ragline::config::Settings;
use ragline::index::{HttpVectorIndex, IndexSpec, Metric};
use ragline::pipeline::{RagOrchestrator, RetryPolicy};
use ragline::providers::{HttpEmbeddingProvider, HttpLanguageModel};
use ragline::server::{self, AppState};
use ragline::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();
    tracing::info!(
        index = %settings.vector_index_name,
        top_k = settings.top_k,
        "starting ragline"
    );

    let client = reqwest::Client::new();
    let embedder = Arc::new(HttpEmbeddingProvider::new(
        client.clone(),
        settings.embedding_endpoint.clone(),
        settings.vector_index_dimension,
    ));
    let index = Arc::new(HttpVectorIndex::new(
        client.clone(),
        settings.vector_index_endpoint.clone(),
    ));
    let llm = Arc::new(HttpLanguageModel::new(client, settings.llm_endpoint.clone()));
    let store = Arc::new(SqliteStore::connect(&settings.database_url).await?);

    let index_spec = IndexSpec {
        name: settings.vector_index_name.clone(),
        dimension: settings.vector_index_dimension,
        metric: Metric::parse_or_cosine(&settings.vector_index_metric),
    };

    let orchestrator = RagOrchestrator::new(embedder, index, llm, store, index_spec)
        .with_top_k(settings.top_k)
        .with_deadline(settings.request_timeout)
        .with_retry_policy(RetryPolicy {
            max_attempts: settings.max_retries,
            ..RetryPolicy::default()
        });

    let app = server::router(AppState {
        orchestrator: Arc::new(orchestrator),
    });

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
