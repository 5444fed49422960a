//! HTTP error envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{error, warn};

use posterflow_core::PosterError;

#[derive(Debug)]
pub enum ApiError {
    Poster(PosterError),
    /// A turn is already running for the session.
    Busy(String),
    NotFound(String),
}

impl From<PosterError> for ApiError {
    fn from(err: PosterError) -> Self {
        Self::Poster(err)
    }
}

/// Short message shown to a user for `err`.
pub fn user_message(err: &PosterError) -> String {
    match err {
        PosterError::InvalidInput(msg) => msg.clone(),
        PosterError::ConfigurationMissing(missing) => format!(
            "Job service configuration missing. Please set {} in your environment.",
            missing.join(" and ")
        ),
        PosterError::UpstreamSubmissionFailed { .. } => "Job submission failed".into(),
        e if e.is_poll_failure() => "Generation job did not complete".into(),
        PosterError::AssetLoad(_) => "Generated image could not be loaded".into(),
        PosterError::Transport(_) => "Job service unreachable".into(),
        _ => "Unexpected server error".into(),
    }
}

/// JSON body for `err`: `{ error, kind, status?, details? }`.
pub fn envelope(err: &PosterError) -> Value {
    let mut body = json!({
        "error": user_message(err),
        "kind": err.kind(),
    });
    if let PosterError::UpstreamSubmissionFailed { status, .. } = err {
        body["status"] = json!(status);
    }
    if let Some(details) = err.details() {
        body["details"] = json!(details);
    }
    body
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Poster(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    error!(kind = err.kind(), %err, "Request failed");
                } else {
                    warn!(kind = err.kind(), %err, "Request rejected");
                }
                #[cfg(feature = "metrics")]
                crate::metrics::record_error(err.kind());
                (status, Json(envelope(&err))).into_response()
            }
            Self::Busy(session_id) => (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "A generation is already running for this session.",
                    "kind": "busy",
                    "sessionId": session_id,
                })),
            )
                .into_response(),
            Self::NotFound(session_id) => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "Session not found",
                    "kind": "not_found",
                    "sessionId": session_id,
                })),
            )
                .into_response(),
        }
    }
}
