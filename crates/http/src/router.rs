use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use serde_json::json;

use engine::{EngineHandle, InvocationRequest, ResponseEnvelope};

pub struct RuntimeState {
    pub engine: EngineHandle,
}

pub fn app_router(state: Arc<RuntimeState>) -> Router {
    Router::new()
        .route("/health", get(health).fallback(not_found))
        .route("/invoke", post(invoke).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy", "runtime": "javascript"}))
}

/// Always answers 200; the envelope's `statusCode` carries the outcome.
async fn invoke(State(state): State<Arc<RuntimeState>>, body: Bytes) -> impl IntoResponse {
    let request = match InvocationRequest::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!("[http] rejected invoke body: {}", err);
            let message = format!("Invalid request body: {}", err);
            return Json(ResponseEnvelope::failure(message.clone(), message));
        }
    };

    let envelope = match state.engine.invoke(request).await {
        Ok(outcome) => outcome.into_response(),
        Err(err) => {
            tracing::error!("[http] engine unavailable: {}", err);
            ResponseEnvelope::failure(err.clone(), err)
        }
    };
    Json(envelope)
}

async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}
