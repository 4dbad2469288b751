//! Shared service state: the engine and its event log behind one lock.

use std::sync::{Arc, RwLock};

use detection_engine::{AggregateReport, AlertNotice, Config, Engine, EngineError, InboundDetection};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::store::EventLog;

/// Everything a write touches. Only reachable through `AppState::detector`.
pub struct Detector {
  engine: Engine,
  log: Box<dyn EventLog>,
}

impl Detector {
  /// Admit, persist, then apply. Nothing is applied if the append fails.
  pub async fn ingest(&mut self, raw: &InboundDetection) -> Result<Option<AlertNotice>, EngineError> {
    let event = self.engine.admit(raw)?;
    if let Err(e) = self.log.append(&event).await {
      warn!(error = %e, "append failed; detection not applied");
      return Err(e);
    }
    self.engine.apply(&event)
  }

  /// Batch recompute over the full ordered scan of the log.
  pub async fn aggregate(&self) -> Result<AggregateReport, EngineError> {
    let events = self.log.scan_ordered().await?;
    self.engine.aggregate_batch(&events)
  }

  pub async fn clear(&mut self) -> Result<(), EngineError> {
    self.log.clear().await?;
    self.engine.reset();
    info!("cleared detections");
    Ok(())
  }

  pub fn engine(&self) -> &Engine {
    &self.engine
  }
}

pub struct AppState {
  /// Single ordering authority for every fold/observe.
  detector: Mutex<Detector>,
  /// Incremental report as of the last write, readable without the writer lock.
  snapshot: RwLock<Arc<AggregateReport>>,
}

impl AppState {
  /// Build the engine and catch it up with the log's history.
  pub async fn open(config: Config, log: Box<dyn EventLog>) -> Result<Self, EngineError> {
    let mut engine = Engine::new(config)?;
    let history = log.scan_ordered().await?;
    engine.rebuild(&history)?;
    let snapshot = RwLock::new(Arc::new(engine.report()));
    Ok(Self {
      detector: Mutex::new(Detector { engine, log }),
      snapshot,
    })
  }

  pub fn detector(&self) -> &Mutex<Detector> {
    &self.detector
  }

  pub fn snapshot(&self) -> Arc<AggregateReport> {
    match self.snapshot.read() {
      Ok(guard) => Arc::clone(&*guard),
      Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
    }
  }

  /// Publish the detector's current report as the read snapshot.
  pub fn publish(&self, detector: &Detector) {
    let report = Arc::new(detector.engine().report());
    match self.snapshot.write() {
      Ok(mut guard) => *guard = report,
      Err(poisoned) => *poisoned.into_inner() = report,
    }
  }
}
