//! Per-group interval merging: incremental fold and batch aggregation.
//!
//! Events must arrive in non-decreasing timestamp order within each group.
//! An event older than its group's last interval end is rejected and leaves
//! the state untouched; the aggregator never sorts.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::classify::Classifier;
use crate::error::EngineError;
use crate::time::format_timestamp;
use crate::types::{AggregateReport, DetectionEvent, Group, Interval};

/// Group -> ordered, non-overlapping intervals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregationState {
  groups: BTreeMap<Group, Vec<Interval>>,
}

impl AggregationState {
  /// Empty state with an (empty) interval list for every group.
  pub fn new(groups: &[Group]) -> Self {
    Self {
      groups: groups.iter().map(|g| (g.clone(), Vec::new())).collect(),
    }
  }

  pub fn intervals(&self, group: &Group) -> &[Interval] {
    self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
  }

  /// End of the group's most recent interval, i.e. its latest accepted timestamp.
  pub fn last_seen(&self, group: &Group) -> Option<DateTime<Utc>> {
    self.intervals(group).last().map(|iv| iv.end)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Group, &[Interval])> {
    self.groups.iter().map(|(g, v)| (g, v.as_slice()))
  }

  pub fn interval_count(&self) -> usize {
    self.groups.values().map(Vec::len).sum()
  }

  /// Keys come out sorted by group name, not in configured order.
  pub fn report(&self) -> AggregateReport {
    self
      .groups
      .iter()
      .map(|(group, intervals)| {
        let spans = intervals
          .iter()
          .map(|iv| (format_timestamp(&iv.start), format_timestamp(&iv.end)))
          .collect();
        (group.0.clone(), spans)
      })
      .collect()
  }
}

/// Folds classified events into interval lists.
#[derive(Debug, Clone)]
pub struct IntervalAggregator {
  classifier: Classifier,
  merge_gap: Duration,
}

impl IntervalAggregator {
  pub fn new(classifier: Classifier, merge_gap: Duration) -> Self {
    Self {
      classifier,
      merge_gap,
    }
  }

  pub fn classifier(&self) -> &Classifier {
    &self.classifier
  }

  pub fn empty_state(&self) -> AggregationState {
    AggregationState::new(self.classifier.groups())
  }

  /// Reject `ts` if it precedes the group's last accepted timestamp.
  pub fn check_order(
    &self,
    state: &AggregationState,
    group: &Group,
    ts: DateTime<Utc>,
  ) -> Result<(), EngineError> {
    match state.last_seen(group) {
      Some(last) if ts < last => Err(EngineError::OutOfOrder {
        group: group.0.clone(),
        timestamp: format_timestamp(&ts),
        last_seen: format_timestamp(&last),
      }),
      _ => Ok(()),
    }
  }

  /// Fold one event into `state`.
  ///
  /// - First event of a group opens `[ts, ts]`.
  /// - `ts - last.end <= merge_gap` (ties included) extends the last interval.
  /// - Otherwise a new interval opens and the previous one is closed for good.
  pub fn fold(&self, state: &mut AggregationState, event: &DetectionEvent) -> Result<(), EngineError> {
    let group = self.classifier.classify(&event.detection_type);
    self.check_order(state, group, event.timestamp)?;

    let ts = event.timestamp;
    let intervals = state.groups.entry(group.clone()).or_default();
    match intervals.last_mut() {
      Some(last) if ts - last.end <= self.merge_gap => {
        last.end = last.end.max(ts);
        debug!(group = %group, end = %format_timestamp(&last.end), "extended interval");
      }
      _ => {
        intervals.push(Interval::point(ts));
        debug!(group = %group, start = %format_timestamp(&ts), "opened interval");
      }
    }
    Ok(())
  }

  /// Batch form: the same fold applied over `events` from an empty state.
  pub fn aggregate<'a, I>(&self, events: I) -> Result<AggregationState, EngineError>
  where
    I: IntoIterator<Item = &'a DetectionEvent>,
  {
    let mut state = self.empty_state();
    for event in events {
      self.fold(&mut state, event)?;
    }
    Ok(state)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use chrono::TimeZone;

  fn aggregator() -> IntervalAggregator {
    let config = Config::default();
    IntervalAggregator::new(Classifier::from_config(&config), config.merge_gap())
  }

  fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 8, 10, h, m, s).unwrap()
  }

  fn ev(h: u32, m: u32, s: u32, kind: &str) -> DetectionEvent {
    DetectionEvent::new(at(h, m, s), kind)
  }

  fn people() -> Group {
    Group::new("people")
  }

  #[test]
  fn first_event_opens_zero_width_interval() {
    let agg = aggregator();
    let state = agg.aggregate(&[ev(18, 30, 30, "pedestrian")]).unwrap();
    let ivs = state.intervals(&people());
    assert_eq!(ivs.len(), 1);
    assert_eq!(ivs[0].start, ivs[0].end);
    assert_eq!(
      state.report()["people"],
      vec![("2023-08-10T18:30:30".to_string(), "2023-08-10T18:30:30".to_string())]
    );
  }

  #[test]
  fn gap_at_threshold_merges() {
    let agg = aggregator();
    let state = agg
      .aggregate(&[ev(18, 30, 0, "pedestrian"), ev(18, 31, 0, "pedestrian")])
      .unwrap();
    let ivs = state.intervals(&people());
    assert_eq!(ivs.len(), 1);
    assert_eq!(ivs[0].start, at(18, 30, 0));
    assert_eq!(ivs[0].end, at(18, 31, 0));
    assert_eq!(ivs[0].duration(), Duration::minutes(1));
  }

  #[test]
  fn gap_over_threshold_splits() {
    let agg = aggregator();
    let state = agg
      .aggregate(&[ev(18, 30, 0, "pedestrian"), ev(18, 31, 1, "pedestrian")])
      .unwrap();
    assert_eq!(state.intervals(&people()).len(), 2);
  }

  #[test]
  fn equal_timestamps_merge() {
    let agg = aggregator();
    let state = agg
      .aggregate(&[ev(18, 30, 0, "car"), ev(18, 30, 0, "truck")])
      .unwrap();
    assert_eq!(state.intervals(&Group::new("vehicles")).len(), 1);
  }

  #[test]
  fn groups_merge_independently() {
    let agg = aggregator();
    let state = agg
      .aggregate(&[
        ev(18, 30, 0, "pedestrian"),
        ev(18, 30, 30, "car"),
        ev(18, 30, 50, "bicycle"),
      ])
      .unwrap();
    assert_eq!(state.intervals(&people()).len(), 1);
    assert_eq!(state.intervals(&people())[0].end, at(18, 30, 50));
    assert_eq!(state.intervals(&Group::new("vehicles")).len(), 1);
    assert_eq!(state.interval_count(), 2);
  }

  #[test]
  fn empty_groups_are_reported() {
    let agg = aggregator();
    let none: Vec<DetectionEvent> = Vec::new();
    let report = agg.aggregate(&none).unwrap().report();
    assert_eq!(report.len(), 2);
    assert!(report["people"].is_empty());
    assert!(report["vehicles"].is_empty());
  }

  #[test]
  fn report_keys_are_sorted_by_name() {
    let config = Config {
      groups: vec![
        crate::config::GroupRule::new("zebras", &["zebra"]),
        crate::config::GroupRule::new("ants", &["ant"]),
      ],
      default_group: "misc".into(),
      watched_groups: Vec::new(),
      ..Config::default()
    };
    let agg = IntervalAggregator::new(Classifier::from_config(&config), config.merge_gap());
    let none: Vec<DetectionEvent> = Vec::new();
    let report = agg.aggregate(&none).unwrap().report();
    let keys: Vec<&str> = report.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["ants", "misc", "zebras"]);

    let json = serde_json::to_string(&report).unwrap();
    assert_eq!(json, r#"{"ants":[],"misc":[],"zebras":[]}"#);
  }

  #[test]
  fn out_of_order_event_fails_closed() {
    let agg = aggregator();
    let mut state = agg.empty_state();
    agg.fold(&mut state, &ev(18, 35, 0, "pedestrian")).unwrap();
    let before = state.clone();

    let err = agg.fold(&mut state, &ev(18, 34, 0, "pedestrian")).unwrap_err();
    assert!(matches!(err, EngineError::OutOfOrder { .. }));
    assert_eq!(state, before);
  }

  #[test]
  fn order_is_only_enforced_within_a_group() {
    let agg = aggregator();
    let mut state = agg.empty_state();
    agg.fold(&mut state, &ev(18, 35, 0, "pedestrian")).unwrap();
    agg.fold(&mut state, &ev(18, 34, 0, "car")).unwrap();
    assert_eq!(state.interval_count(), 2);
  }

  #[test]
  fn zero_gap_only_merges_simultaneous_events() {
    let config = Config::default();
    let agg = IntervalAggregator::new(Classifier::from_config(&config), Duration::zero());
    let state = agg
      .aggregate(&[
        ev(18, 30, 0, "pedestrian"),
        ev(18, 30, 0, "pedestrian"),
        ev(18, 30, 1, "pedestrian"),
      ])
      .unwrap();
    assert_eq!(state.intervals(&people()).len(), 2);
  }
}
