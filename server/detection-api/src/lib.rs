//! Detection Activity API
//!
//! HTTP service that ingests detections, persists them to the event log and
//! serves merged activity intervals plus the sustained-activity alert state.
//! Bind to 127.0.0.1 by default (internal only).

mod handlers;
mod state;
mod store;
mod types;

use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;

pub use handlers::{aggregate, alert_status, clear, health, ingest, snapshot, ApiError};
pub use state::{AppState, Detector};
pub use store::{EventLog, MemoryEventLog, PgEventStore};
pub use types::{AlertStatus, IngestResponse};

pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/ingest", post(ingest))
    .route("/aggregate", get(aggregate))
    .route("/snapshot", get(snapshot))
    .route("/alert", get(alert_status))
    .route("/clear", post(clear))
    .layer(CorsLayer::permissive())
    .with_state(state)
}
