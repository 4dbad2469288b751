//! HTTP handlers for the detection API.

use axum::{
  extract::{rejection::JsonRejection, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use detection_engine::types::ErrorOutput;
use detection_engine::{AggregateReport, EngineError, InboundDetection};
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::error;

use crate::state::AppState;
use crate::types::{AlertStatus, IngestResponse};

/// Request failure rendered as an `ErrorOutput` body.
pub enum ApiError {
  Engine(EngineError),
  /// Body was not a valid `InboundDetection`.
  Body(JsonRejection),
  /// A detached write task panicked or was aborted.
  Task(JoinError),
}

impl From<EngineError> for ApiError {
  fn from(e: EngineError) -> Self {
    Self::Engine(e)
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self {
    Self::Body(e)
  }
}

impl From<JoinError> for ApiError {
  fn from(e: JoinError) -> Self {
    Self::Task(e)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match self {
      ApiError::Engine(e) => {
        let status = match &e {
          EngineError::Validation { .. } | EngineError::MalformedTimestamp { .. } | EngineError::Json(_) => {
            StatusCode::BAD_REQUEST
          }
          EngineError::OutOfOrder { .. } => StatusCode::CONFLICT,
          EngineError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
          EngineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
          error!(error = %e, "request failed");
        }
        (status, ErrorOutput::from(&e))
      }
      ApiError::Body(rejection) => {
        // Well-formed JSON of the wrong shape is a field problem; anything else is unreadable.
        let kind = match &rejection {
          JsonRejection::JsonDataError(_) => "validation",
          _ => "json",
        };
        let body = ErrorOutput::new(kind, rejection.body_text()).with_field("body");
        (StatusCode::BAD_REQUEST, body)
      }
      ApiError::Task(e) => {
        error!(error = %e, "write task failed");
        (StatusCode::INTERNAL_SERVER_ERROR, ErrorOutput::new("internal", e.to_string()))
      }
    };
    (status, Json(body)).into_response()
  }
}

pub async fn health() -> &'static str {
  "ok"
}

/// The write runs on its own task: once the store append commits, the apply
/// and snapshot publish finish even if the client goes away.
pub async fn ingest(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<InboundDetection>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
  let Json(payload) = payload?;
  let alert = tokio::spawn(async move {
    let mut detector = state.detector().lock().await;
    let alert = detector.ingest(&payload).await?;
    state.publish(&detector);
    Ok::<_, EngineError>(alert)
  })
  .await??;
  Ok(Json(IngestResponse {
    accepted: true,
    alert,
  }))
}

pub async fn aggregate(State(state): State<Arc<AppState>>) -> Result<Json<AggregateReport>, ApiError> {
  let detector = state.detector().lock().await;
  Ok(Json(detector.aggregate().await?))
}

/// Latest incremental intervals, without waiting on writers.
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<AggregateReport> {
  Json((*state.snapshot()).clone())
}

pub async fn alert_status(State(state): State<Arc<AppState>>) -> Json<AlertStatus> {
  let detector = state.detector().lock().await;
  let engine = detector.engine();
  Json(AlertStatus {
    consecutive_count: engine.alert_state().consecutive_count,
    threshold: engine.config().alert_threshold,
    level: engine.alert_level(),
  })
}

pub async fn clear(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
  tokio::spawn(async move {
    let mut detector = state.detector().lock().await;
    detector.clear().await?;
    state.publish(&detector);
    Ok::<_, EngineError>(())
  })
  .await??;
  Ok(StatusCode::NO_CONTENT)
}
