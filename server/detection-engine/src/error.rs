//! Structured error types for the detection engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("malformed timestamp {input:?}: {reason}")]
  MalformedTimestamp { input: String, reason: String },

  #[error("out of order: {group} event at {timestamp} precedes last seen {last_seen}")]
  OutOfOrder {
    group: String,
    timestamp: String,
    last_seen: String,
  },

  #[error("store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("config: {0}")]
  Config(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn malformed_timestamp(input: &str, reason: impl Into<String>) -> Self {
    Self::MalformedTimestamp {
      input: input.to_string(),
      reason: reason.into(),
    }
  }

  pub fn store(msg: impl Into<String>) -> Self {
    Self::StoreUnavailable(msg.into())
  }

  pub fn config(msg: impl Into<String>) -> Self {
    Self::Config(msg.into())
  }

  /// Stable machine-readable tag, used in error output lines.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Validation { .. } => "validation",
      Self::MalformedTimestamp { .. } => "malformed_timestamp",
      Self::OutOfOrder { .. } => "out_of_order",
      Self::StoreUnavailable(_) => "store_unavailable",
      Self::Config(_) => "config",
      Self::Json(_) => "json",
    }
  }
}
