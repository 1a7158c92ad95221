//! HTTP transport for the pipeline.
//!
//! Thin layer over [`RagOrchestrator`]: parse the request, run the pipeline,
//! map the stage-tagged error onto a status code. Client faults map to 400,
//! everything else to 500. Error payloads carry a human-readable message and
//! the numeric code; provider internals stay in the logs.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, RagError};
use crate::pipeline::{ChatRequest, RagOrchestrator};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RagOrchestrator>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/embed", post(embed))
        .with_state(state)
}

#[derive(Deserialize)]
struct ChatBody {
    user_id: String,
    message: String,
}

#[derive(Serialize)]
struct ChatReply {
    answer: String,
}

#[derive(Deserialize)]
struct EmbedBody {
    document: String,
}

#[derive(Serialize)]
struct EmbedReply {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorReply {
    error: String,
    code: u16,
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Response {
    match state
        .orchestrator
        .chat(ChatRequest {
            user_id: body.user_id,
            message: body.message,
        })
        .await
    {
        Ok(outcome) => Json(ChatReply {
            answer: outcome.answer,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

async fn embed(State(state): State<AppState>, Json(body): Json<EmbedBody>) -> Response {
    match state.orchestrator.ingest(&body.document).await {
        Ok(_) => Json(EmbedReply { message: "ok" }).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: PipelineError) -> Response {
    let (status, message) = match &err.source {
        RagError::InvalidInput(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
        RagError::UnknownUser(user_id) => {
            (StatusCode::BAD_REQUEST, format!("unknown user: {user_id}"))
        }
        RagError::Timeout => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "request deadline exceeded".to_string(),
        ),
        // Internal details are logged, never echoed to the caller.
        _ => {
            tracing::error!(stage = %err.stage, error = %err.source, "pipeline failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    };
    (
        status,
        Json(ErrorReply {
            error: message,
            code: status.as_u16(),
        }),
    )
        .into_response()
}
