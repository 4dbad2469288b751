//! Detection Activity Engine — deterministic aggregation and alerting.
//!
//! Classifies timestamped detections into semantic groups, merges bursts of
//! same-group events into activity intervals, and raises a level-triggered
//! alert while a run of watched-group events stays at or above a threshold.
//!
//! No network; storage sits behind the `EventStore` trait.

pub mod aggregate;
pub mod alert;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod time;
pub mod types;

pub use aggregate::{AggregationState, IntervalAggregator};
pub use alert::{AlertMonitor, AlertState};
pub use classify::Classifier;
pub use config::{Config, GroupRule};
pub use engine::Engine;
pub use error::EngineError;
pub use pipeline::{IngestOutcome, Pipeline};
pub use store::{EventStore, JsonlStore, MemoryStore};
pub use types::{AggregateReport, AlertNotice, DetectionEvent, Group, InboundDetection};
