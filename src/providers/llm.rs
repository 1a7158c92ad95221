//! Language-model provider adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::LanguageModel;
use crate::errors::RagError;

/// HTTP adapter for a remote completion service.
///
/// `POST {endpoint}` with `{"prompt": text}`, expecting `{"text": answer}`.
/// A 429 maps to [`RagError::RateLimited`], carrying the `Retry-After` header
/// (seconds) as the retry hint when present. Other failures map to
/// [`RagError::ProviderUnavailable`].
#[derive(Clone)]
pub struct HttpLanguageModel {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

impl HttpLanguageModel {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn unavailable(message: impl Into<String>) -> RagError {
        RagError::ProviderUnavailable {
            provider: "language model",
            message: message.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    #[instrument(skip(self, prompt), fields(endpoint = %self.endpoint, prompt_len = prompt.len()), err)]
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt })
            .send()
            .await
            .map_err(|err| Self::unavailable(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(RagError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, body, "language model returned error payload");
            return Err(Self::unavailable(format!("status {status}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| Self::unavailable(format!("malformed response: {err}")))?;

        Ok(parsed.text)
    }
}
