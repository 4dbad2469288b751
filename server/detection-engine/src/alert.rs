//! Run-length alerting over the live event stream.

use std::collections::BTreeSet;

use crate::classify::Classifier;
use crate::types::{AlertLevel, DetectionEvent, Group};

/// Consecutive watched events seen so far, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertState {
  pub consecutive_count: u32,
}

impl AlertState {
  pub fn level(&self, threshold: u32) -> AlertLevel {
    if self.consecutive_count >= threshold {
      AlertLevel::AtOrAboveThreshold
    } else {
      AlertLevel::BelowThreshold
    }
  }
}

/// Level-triggered: fires on every watched event once the run reaches the
/// threshold, and any unwatched event resets the run to zero. Deduplication
/// of repeated firings is left to whoever consumes the signal.
#[derive(Debug, Clone)]
pub struct AlertMonitor {
  classifier: Classifier,
  watched: BTreeSet<Group>,
  threshold: u32,
}

impl AlertMonitor {
  pub fn new(classifier: Classifier, watched: impl IntoIterator<Item = Group>, threshold: u32) -> Self {
    Self {
      classifier,
      watched: watched.into_iter().collect(),
      threshold,
    }
  }

  pub fn threshold(&self) -> u32 {
    self.threshold
  }

  pub fn is_watched(&self, group: &Group) -> bool {
    self.watched.contains(group)
  }

  /// Returns the next state and whether the alert fires for this event.
  pub fn observe(&self, state: AlertState, event: &DetectionEvent) -> (AlertState, bool) {
    let group = self.classifier.classify(&event.detection_type);
    let consecutive_count = if self.is_watched(group) {
      state.consecutive_count.saturating_add(1)
    } else {
      0
    };
    let next = AlertState { consecutive_count };
    (next, consecutive_count >= self.threshold)
  }
}
