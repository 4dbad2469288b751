//! Core engine: owns aggregation + alert state, admits and applies events.
//!
//! Single writer. `admit` validates without touching state so callers can
//! persist the event in between; `apply` then folds it into both views.

use tracing::{info, warn};

use crate::aggregate::{AggregationState, IntervalAggregator};
use crate::alert::{AlertMonitor, AlertState};
use crate::classify::Classifier;
use crate::config::Config;
use crate::error::EngineError;
use crate::time::{format_timestamp, parse_timestamp};
use crate::types::*;

pub struct Engine {
  config: Config,
  aggregator: IntervalAggregator,
  monitor: AlertMonitor,
  aggregation: AggregationState,
  alert: AlertState,
}

impl Engine {
  pub fn new(config: Config) -> Result<Self, EngineError> {
    config.validate()?;
    Ok(Self::build(config))
  }

  pub fn with_defaults() -> Self {
    Self::build(Config::default())
  }

  fn build(config: Config) -> Self {
    let classifier = Classifier::from_config(&config);
    let aggregator = IntervalAggregator::new(classifier.clone(), config.merge_gap());
    let monitor = AlertMonitor::new(
      classifier,
      config.watched_groups.iter().cloned().map(Group::new),
      config.alert_threshold,
    );
    Self {
      aggregation: aggregator.empty_state(),
      config,
      aggregator,
      monitor,
      alert: AlertState::default(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn classifier(&self) -> &Classifier {
    self.aggregator.classifier()
  }

  pub fn aggregation(&self) -> &AggregationState {
    &self.aggregation
  }

  pub fn alert_state(&self) -> AlertState {
    self.alert
  }

  pub fn alert_level(&self) -> AlertLevel {
    self.alert.level(self.monitor.threshold())
  }

  /// Validate an inbound detection against current state. Mutates nothing.
  pub fn admit(&self, raw: &InboundDetection) -> Result<DetectionEvent, EngineError> {
    let result = self.admit_inner(raw);
    if let Err(e) = &result {
      warn!(kind = e.kind(), error = %e, "rejected detection");
    }
    result
  }

  fn admit_inner(&self, raw: &InboundDetection) -> Result<DetectionEvent, EngineError> {
    let detection_type = raw.detection_type.trim();
    if detection_type.is_empty() {
      return Err(EngineError::validation("type", "must not be empty"));
    }
    let timestamp = parse_timestamp(&raw.timestamp)?;
    let group = self.classifier().classify(detection_type);
    self.aggregator.check_order(&self.aggregation, group, timestamp)?;
    Ok(DetectionEvent::new(timestamp, detection_type))
  }

  /// Fold an admitted event into both views.
  ///
  /// Returns `Ok(Some(notice))` when the alert fires for this event.
  pub fn apply(&mut self, event: &DetectionEvent) -> Result<Option<AlertNotice>, EngineError> {
    self.aggregator.fold(&mut self.aggregation, event)?;

    let (next, fired) = self.monitor.observe(self.alert, event);
    self.alert = next;
    if !fired {
      return Ok(None);
    }

    let group = self.classifier().classify(&event.detection_type).clone();
    let notice = AlertNotice {
      alert: true,
      message: format!(
        "Unusual activity - {} detected for a long time ({} consecutive)",
        group, next.consecutive_count
      ),
      group: group.0,
      detection_type: event.detection_type.clone(),
      timestamp: format_timestamp(&event.timestamp),
      consecutive_count: next.consecutive_count,
    };
    info!(
      group = %notice.group,
      timestamp = %notice.timestamp,
      consecutive = notice.consecutive_count,
      "ALERT"
    );
    Ok(Some(notice))
  }

  /// `admit` + `apply`, for callers without a store.
  pub fn process(&mut self, raw: &InboundDetection) -> Result<Option<AlertNotice>, EngineError> {
    let event = self.admit(raw)?;
    self.apply(&event)
  }

  /// Re-derive aggregation from a full ordered scan. The alert run restarts
  /// from zero: it describes live runs, not history.
  pub fn rebuild(&mut self, events: &[DetectionEvent]) -> Result<(), EngineError> {
    self.aggregation = self.aggregator.aggregate(events)?;
    self.alert = AlertState::default();
    info!(
      events = events.len(),
      intervals = self.aggregation.interval_count(),
      "rebuilt aggregation"
    );
    Ok(())
  }

  /// Batch aggregation over `events` without touching engine state.
  pub fn aggregate_batch(&self, events: &[DetectionEvent]) -> Result<AggregateReport, EngineError> {
    Ok(self.aggregator.aggregate(events)?.report())
  }

  pub fn reset(&mut self) {
    self.aggregation = self.aggregator.empty_state();
    self.alert = AlertState::default();
  }

  /// Current incremental aggregation, formatted.
  pub fn report(&self) -> AggregateReport {
    self.aggregation.report()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn inbound(ts: &str, kind: &str) -> InboundDetection {
    InboundDetection::new(format!("2023-08-10T{}", ts), kind)
  }

  #[test]
  fn fifth_consecutive_person_fires() {
    let mut engine = Engine::with_defaults();
    for ts in ["18:30:00", "18:30:10", "18:30:20", "18:30:30"] {
      assert!(engine.process(&inbound(ts, "pedestrian")).unwrap().is_none());
    }
    let notice = engine.process(&inbound("18:30:40", "bicycle")).unwrap().unwrap();
    assert!(notice.alert);
    assert_eq!(notice.group, "people");
    assert_eq!(notice.detection_type, "bicycle");
    assert_eq!(notice.timestamp, "2023-08-10T18:30:40");
    assert_eq!(notice.consecutive_count, 5);
    assert_eq!(engine.alert_level(), AlertLevel::AtOrAboveThreshold);
  }

  #[test]
  fn empty_type_is_rejected_without_mutation() {
    let mut engine = Engine::with_defaults();
    let err = engine.process(&inbound("18:30:00", "  ")).unwrap_err();
    assert!(err.to_string().contains("type"));
    assert_eq!(engine.aggregation().interval_count(), 0);
  }

  #[test]
  fn malformed_timestamp_is_rejected_without_mutation() {
    let mut engine = Engine::with_defaults();
    engine.process(&inbound("18:30:00", "pedestrian")).unwrap();
    let before = engine.report();

    let err = engine
      .process(&InboundDetection::new("yesterday", "pedestrian"))
      .unwrap_err();
    assert_eq!(err.kind(), "malformed_timestamp");
    assert_eq!(engine.report(), before);
    assert_eq!(engine.alert_state().consecutive_count, 1);
  }

  #[test]
  fn out_of_order_rejection_keeps_alert_run() {
    let mut engine = Engine::with_defaults();
    engine.process(&inbound("18:31:00", "pedestrian")).unwrap();
    let err = engine.process(&inbound("18:30:00", "pedestrian")).unwrap_err();
    assert_eq!(err.kind(), "out_of_order");
    assert_eq!(engine.alert_state().consecutive_count, 1);
  }

  #[test]
  fn reset_returns_to_initial_state() {
    let mut engine = Engine::with_defaults();
    engine.process(&inbound("18:30:00", "pedestrian")).unwrap();
    engine.reset();
    assert_eq!(engine.alert_state(), AlertState::default());
    assert!(engine.report().values().all(|v| v.is_empty()));
    // Earlier timestamps are acceptable again after a reset.
    engine.process(&inbound("18:00:00", "pedestrian")).unwrap();
  }

  #[test]
  fn invalid_config_is_rejected() {
    let config = Config {
      alert_threshold: 0,
      ..Config::default()
    };
    assert!(Engine::new(config).is_err());
  }
}
