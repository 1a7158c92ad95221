//! Process configuration resolved from the environment.

use std::time::Duration;

/// Runtime settings for the service.
///
/// Every value has a code-level default so the service boots in development
/// without a populated environment. The vector index name is a single fixed
/// value for the process lifetime; it is never derived per request.
#[derive(Clone, Debug)]
pub struct Settings {
    pub embedding_endpoint: String,
    pub vector_index_endpoint: String,
    pub vector_index_name: String,
    pub vector_index_dimension: usize,
    pub vector_index_metric: String,
    pub llm_endpoint: String,
    pub top_k: usize,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub database_url: String,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_endpoint: "http://127.0.0.1:8081/embed".to_string(),
            vector_index_endpoint: "http://127.0.0.1:8082".to_string(),
            vector_index_name: "ragline-chat".to_string(),
            vector_index_dimension: 1536,
            vector_index_metric: "cosine".to_string(),
            llm_endpoint: "http://127.0.0.1:8083/generate".to_string(),
            top_k: 4,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            database_url: "sqlite://ragline.db".to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Settings {
    /// Resolve settings from the environment, falling back to defaults.
    ///
    /// Loads `.env` first (ignored when absent) so local development mirrors
    /// deployed configuration.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            embedding_endpoint: env_or("EMBEDDING_ENDPOINT", defaults.embedding_endpoint),
            vector_index_endpoint: env_or(
                "VECTOR_INDEX_ENDPOINT",
                defaults.vector_index_endpoint,
            ),
            vector_index_name: env_or("VECTOR_INDEX_NAME", defaults.vector_index_name),
            vector_index_dimension: env_parse(
                "VECTOR_INDEX_DIMENSION",
                defaults.vector_index_dimension,
            ),
            vector_index_metric: env_or("VECTOR_INDEX_METRIC", defaults.vector_index_metric),
            llm_endpoint: env_or("LLM_ENDPOINT", defaults.llm_endpoint),
            top_k: env_parse("TOP_K", defaults.top_k),
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries),
            database_url: env_or("DATABASE_URL", defaults.database_url),
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
