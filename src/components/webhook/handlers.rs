use super::AppState;
use crate::components::calendar_sync::{PassOutcome, ResourceState, WebhookOutcome};
use crate::error::Error;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

pub const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
pub const RESOURCE_ID_HEADER: &str = "x-goog-resource-id";
pub const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";
pub const CHANNEL_TOKEN_HEADER: &str = "x-goog-channel-token";

/// Error body returned by every handler
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        error!("Calendar sync request failed: {}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn outcome_json(outcome: &PassOutcome) -> Value {
    match outcome {
        PassOutcome::Completed { pull, push } => json!({
            "status": "success",
            "pull": pull,
            "push": push,
        }),
        PassOutcome::Failed(message) => json!({
            "status": "error",
            "error": message,
        }),
        PassOutcome::AlreadyRunning => json!({ "status": "already_running" }),
    }
}

pub async fn health_handler() -> &'static str {
    "OK"
}

/// Google Calendar push notification
pub async fn google_webhook_handler(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    if let Some(expected) = state.webhook_token.as_deref() {
        if header(&headers, CHANNEL_TOKEN_HEADER) != Some(expected) {
            warn!("Rejected webhook with a missing or wrong channel token");
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid channel token"));
        }
    }

    let resource_state = header(&headers, RESOURCE_STATE_HEADER)
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Missing resource state"))?
        .parse::<ResourceState>()
        .map_err(|e: Error| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    debug!(
        channel_id = header(&headers, CHANNEL_ID_HEADER).unwrap_or("-"),
        resource_id = header(&headers, RESOURCE_ID_HEADER).unwrap_or("-"),
        state = %resource_state,
        "Received Google Calendar notification"
    );

    let body = match state.sync.webhook(resource_state).await? {
        WebhookOutcome::Acknowledged => json!({ "status": "ok", "state": resource_state.to_string() }),
        WebhookOutcome::Pulled(outcome) => json!({
            "status": "ok",
            "state": resource_state.to_string(),
            "sync": outcome_json(&outcome),
        }),
    };
    Ok(Json(body))
}

pub async fn sync_now_handler(State(state): State<AppState>) -> ApiResult {
    let outcome = state.sync.sync_now().await?;
    Ok(Json(outcome_json(&outcome)))
}

pub async fn pull_handler(State(state): State<AppState>) -> ApiResult {
    let outcome = state.sync.pull_manual().await?;
    Ok(Json(outcome_json(&outcome)))
}

pub async fn event_created_handler(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult {
    let stats = state.sync.event_created(&event_id).await?;
    Ok(Json(json!({ "eventId": event_id, "push": stats })))
}

pub async fn event_updated_handler(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult {
    if !state.sync.event_updated(&event_id).await? {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Event not found"));
    }
    Ok(Json(json!({ "eventId": event_id, "needsSync": true })))
}

pub async fn event_deleted_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> ApiResult {
    state.sync.event_deleted(&external_id).await?;
    Ok(Json(json!({ "status": "ok" })))
}
