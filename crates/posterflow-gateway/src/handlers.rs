//! HTTP handlers.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use posterflow_canvas::Viewport;
use posterflow_core::PosterError;
use posterflow_core::types::{CanvasContext, INVALID_INSTRUCTION};

use crate::error::ApiError;
use crate::sessions::TurnGuard;
use crate::state::GatewayState;
use crate::turn::run_turn;

type ApiResult<T> = Result<T, ApiError>;

pub async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    let sessions = state.sessions.len().await;

    Json(json!({
        "status": "ok",
        "version": version,
        "sessions": sessions,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    }))
}

/// Parse a JSON body leniently: anything unparseable is an invalid instruction.
fn parse_body(body: &Bytes) -> Result<Value, PosterError> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .filter(Value::is_object)
        .ok_or_else(|| PosterError::InvalidInput(INVALID_INSTRUCTION.into()))
}

fn instruction_of(body: &Value) -> &str {
    body.get("instruction")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// The body's instruction, rejected if blank.
fn required_instruction(body: &Value) -> Result<&str, PosterError> {
    let instruction = instruction_of(body);
    if instruction.trim().is_empty() {
        return Err(PosterError::InvalidInput(INVALID_INSTRUCTION.into()));
    }
    Ok(instruction)
}

/// `POST /api/poster-gen`: one stateless generation.
pub async fn poster_gen_handler(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    // Configuration is checked before the request body is looked at.
    let orchestrator = state.orchestrator()?;

    let body = parse_body(&body)?;
    let canvas_context = match body.get("canvasContext").or_else(|| body.get("canvas_context")) {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value::<CanvasContext>(raw.clone()).map_err(|_| {
                PosterError::InvalidInput("Invalid 'canvasContext' in request body.".into())
            })?,
        ),
    };

    let generation = orchestrator
        .submit(instruction_of(&body), canvas_context)
        .await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_generation(&generation);

    let generation = generation?;
    let mut response = serde_json::to_value(&generation).map_err(PosterError::from)?;
    response["success"] = json!(true);
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub viewport: Option<ViewportSize>,
}

fn viewport_of(size: Option<ViewportSize>) -> Viewport {
    size.filter(|s| s.width > 0.0 && s.height > 0.0)
        .map(|s| Viewport::new(s.width, s.height))
        .unwrap_or_default()
}

/// `POST /api/sessions`: create an empty poster session.
pub async fn create_session_handler(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: CreateSessionRequest = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| PosterError::InvalidInput(format!("Invalid session request: {e}")))?
    };
    let session_id = uuid::Uuid::new_v4().to_string();
    state
        .sessions
        .get_or_create(&session_id, viewport_of(request.viewport))
        .await;
    Ok((StatusCode::CREATED, Json(json!({ "sessionId": session_id }))))
}

pub async fn list_sessions_handler(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    Json(json!({ "sessions": state.sessions.ids().await }))
}

/// `GET /api/sessions/{id}`: surface snapshot plus session state.
pub async fn get_session_handler(
    State(state): State<Arc<GatewayState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let entry = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(session_id.clone()))?;
    let snapshot = entry.snapshot().await;
    Ok(Json(serde_json::to_value(snapshot).map_err(PosterError::from)?))
}

pub async fn delete_session_handler(
    State(state): State<Arc<GatewayState>>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.sessions.remove(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(session_id))
    }
}

/// `POST /api/sessions/{id}/turn`: generate and apply to the session's poster.
/// The session is created on first use.
pub async fn session_turn_handler(
    State(state): State<Arc<GatewayState>>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let orchestrator = state.orchestrator()?;
    let body = parse_body(&body)?;
    // Validated before the session lookup so a bad request creates nothing.
    let instruction = required_instruction(&body)?;
    let viewport = body
        .get("viewport")
        .cloned()
        .and_then(|v| serde_json::from_value::<ViewportSize>(v).ok());

    let entry = state.sessions.get_or_create(&session_id, viewport_of(viewport)).await;
    let guard = TurnGuard::acquire(&entry.session).ok_or_else(|| {
        debug!(session_id = %session_id, "Turn rejected, session busy");
        ApiError::Busy(session_id.clone())
    })?;

    info!(session_id = %session_id, "Turn started");
    let report = run_turn(
        guard,
        &orchestrator,
        &state.reconciler(),
        &entry.surface,
        instruction,
    )
    .await?;

    let mut response = serde_json::to_value(&report).map_err(PosterError::from)?;
    response["success"] = json!(true);
    response["sessionId"] = json!(session_id);
    Ok(Json(response))
}
