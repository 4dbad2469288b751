//! Core types for the detection engine (JSON contracts + internal models).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract — what the caller sends)
// ---------------------------------------------------------------------------

/// One inbound detection line. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundDetection {
  pub timestamp: String,
  #[serde(rename = "type", alias = "detection_type")]
  pub detection_type: String,
}

impl InboundDetection {
  pub fn new(timestamp: impl Into<String>, detection_type: impl Into<String>) -> Self {
    Self {
      timestamp: timestamp.into(),
      detection_type: detection_type.into(),
    }
  }
}

// ---------------------------------------------------------------------------
// Internal models
// ---------------------------------------------------------------------------

/// A validated detection. Immutable once admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
  pub timestamp: DateTime<Utc>,
  #[serde(rename = "type")]
  pub detection_type: String,
}

impl DetectionEvent {
  pub fn new(timestamp: DateTime<Utc>, detection_type: impl Into<String>) -> Self {
    Self {
      timestamp,
      detection_type: detection_type.into(),
    }
  }
}

/// Semantic bucket that raw detection types map into.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Group(pub String);

impl Group {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Group {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A merged span of sustained activity. `start <= end`; zero width is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl Interval {
  pub fn point(ts: DateTime<Utc>) -> Self {
    Self { start: ts, end: ts }
  }

  pub fn duration(&self) -> Duration {
    self.end - self.start
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
  BelowThreshold,
  AtOrAboveThreshold,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract — what we emit)
// ---------------------------------------------------------------------------

/// Group name -> ordered `(start, end)` pairs, formatted `YYYY-MM-DDTHH:MM:SS`.
/// Every configured group is present, even with no intervals. Keys are
/// sorted by group name.
pub type AggregateReport = BTreeMap<String, Vec<(String, String)>>;

/// Emitted on every event while the watched run is at or above threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertNotice {
  pub alert: bool,
  pub message: String,
  pub group: String,
  pub detection_type: String,
  pub timestamp: String,
  pub consecutive_count: u32,
}

/// Structured error output for rejected input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub kind: String,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      error: true,
      kind: kind.into(),
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}

impl From<&crate::error::EngineError> for ErrorOutput {
  fn from(e: &crate::error::EngineError) -> Self {
    match e {
      crate::error::EngineError::Validation { field, reason } => {
        ErrorOutput::new(e.kind(), reason.clone()).with_field(field.clone())
      }
      crate::error::EngineError::MalformedTimestamp { .. } => {
        ErrorOutput::new(e.kind(), e.to_string()).with_field("timestamp")
      }
      _ => ErrorOutput::new(e.kind(), e.to_string()),
    }
  }
}
