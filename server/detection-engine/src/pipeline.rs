//! Ingest / aggregate / clear over an engine paired with a durable store.

use tracing::warn;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::store::EventStore;
use crate::types::{AggregateReport, AlertNotice, DetectionEvent, InboundDetection};

/// Result of one accepted detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
  pub event: DetectionEvent,
  pub alert: Option<AlertNotice>,
}

pub struct Pipeline<S: EventStore> {
  engine: Engine,
  store: S,
}

impl<S: EventStore> Pipeline<S> {
  /// Build the engine and catch it up with whatever the store already holds.
  pub fn open(config: Config, store: S) -> Result<Self, EngineError> {
    let mut engine = Engine::new(config)?;
    let history = store.scan_ordered()?;
    engine.rebuild(&history)?;
    Ok(Self { engine, store })
  }

  pub fn engine(&self) -> &Engine {
    &self.engine
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Either the event lands in the store and both views, or nowhere.
  pub fn ingest(&mut self, timestamp: &str, detection_type: &str) -> Result<IngestOutcome, EngineError> {
    self.ingest_raw(&InboundDetection::new(timestamp, detection_type))
  }

  pub fn ingest_raw(&mut self, raw: &InboundDetection) -> Result<IngestOutcome, EngineError> {
    let event = self.engine.admit(raw)?;
    if let Err(e) = self.store.append(&event) {
      warn!(error = %e, "append failed; detection not applied");
      return Err(e);
    }
    let alert = self.engine.apply(&event)?;
    Ok(IngestOutcome { event, alert })
  }

  /// Recompute intervals from a full ordered scan of the store.
  pub fn aggregate(&self) -> Result<AggregateReport, EngineError> {
    let events = self.store.scan_ordered()?;
    self.engine.aggregate_batch(&events)
  }

  /// Empty the store, then return the engine to its initial state.
  pub fn clear(&mut self) -> Result<(), EngineError> {
    self.store.clear()?;
    self.engine.reset();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;

  /// Store that refuses every append.
  struct BrokenStore;

  impl EventStore for BrokenStore {
    fn append(&mut self, _event: &DetectionEvent) -> Result<(), EngineError> {
      Err(EngineError::store("connection refused"))
    }

    fn scan_ordered(&self) -> Result<Vec<DetectionEvent>, EngineError> {
      Ok(Vec::new())
    }

    fn clear(&mut self) -> Result<(), EngineError> {
      Ok(())
    }
  }

  #[test]
  fn append_failure_leaves_state_untouched() {
    let mut pipeline = Pipeline::open(Config::default(), BrokenStore).unwrap();
    let err = pipeline.ingest("2023-08-10T18:30:00", "pedestrian").unwrap_err();
    assert_eq!(err.kind(), "store_unavailable");
    assert_eq!(pipeline.engine().aggregation().interval_count(), 0);
    assert_eq!(pipeline.engine().alert_state().consecutive_count, 0);
  }

  #[test]
  fn rejected_detection_is_not_stored() {
    let mut pipeline = Pipeline::open(Config::default(), MemoryStore::new()).unwrap();
    assert!(pipeline.ingest("garbage", "pedestrian").is_err());
    assert!(pipeline.ingest("2023-08-10T18:30:00", "").is_err());
    assert!(pipeline.store().is_empty());
  }

  #[test]
  fn open_rebuilds_from_existing_history() {
    let mut store = MemoryStore::new();
    let mut seed = Pipeline::open(Config::default(), MemoryStore::new()).unwrap();
    for ts in ["18:30:00", "18:30:30"] {
      let outcome = seed.ingest(&format!("2023-08-10T{}", ts), "pedestrian").unwrap();
      store.append(&outcome.event).unwrap();
    }

    let mut pipeline = Pipeline::open(Config::default(), store).unwrap();
    assert_eq!(pipeline.engine().report(), seed.engine().report());
    // History bounds the admissible order for the group.
    let err = pipeline.ingest("2023-08-10T18:29:00", "pedestrian").unwrap_err();
    assert_eq!(err.kind(), "out_of_order");
  }

  #[test]
  fn clear_resets_store_and_engine() {
    let mut pipeline = Pipeline::open(Config::default(), MemoryStore::new()).unwrap();
    pipeline.ingest("2023-08-10T18:30:00", "car").unwrap();
    pipeline.clear().unwrap();
    assert!(pipeline.store().is_empty());
    let report = pipeline.aggregate().unwrap();
    assert!(report["vehicles"].is_empty());
    assert!(report["people"].is_empty());
  }
}
