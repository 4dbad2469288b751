//! Request/response types for the detection API.

use detection_engine::types::{AlertLevel, AlertNotice};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
  pub accepted: bool,
  pub alert: Option<AlertNotice>,
}

#[derive(Debug, Serialize)]
pub struct AlertStatus {
  pub consecutive_count: u32,
  pub threshold: u32,
  pub level: AlertLevel,
}
