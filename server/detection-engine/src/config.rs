//! Engine configuration with sane defaults.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One semantic group and the raw detection labels that map into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRule {
  pub name: String,
  #[serde(default)]
  pub labels: Vec<String>,
}

impl GroupRule {
  pub fn new(name: &str, labels: &[&str]) -> Self {
    Self {
      name: name.to_string(),
      labels: labels.iter().map(|l| l.to_string()).collect(),
    }
  }
}

/// Tunable thresholds and the classification table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Max distance between consecutive same-group events to share an interval.
  pub merge_gap_seconds: i64,
  /// Run length at which the sustained-activity alert starts firing.
  pub alert_threshold: u32,
  /// Group enumeration. Classification follows this order; report keys are sorted by name.
  pub groups: Vec<GroupRule>,
  /// Group for labels not listed in any rule.
  pub default_group: String,
  /// Groups whose consecutive events count toward the alert run.
  pub watched_groups: Vec<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      merge_gap_seconds: 60,
      alert_threshold: 5,
      groups: vec![
        GroupRule::new("people", &["pedestrian", "bicycle"]),
        GroupRule::new("vehicles", &[]),
      ],
      default_group: "vehicles".to_string(),
      watched_groups: vec!["people".to_string()],
    }
  }
}

impl Config {
  /// Parse a JSON config; absent fields take their defaults.
  pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
    let config: Config = serde_json::from_str(raw)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
      .map_err(|e| EngineError::config(format!("cannot read {}: {}", path.display(), e)))?;
    Self::from_json_str(&raw)
  }

  /// Saturates at `Duration::MAX`; `validate` rejects gaps that would.
  pub fn merge_gap(&self) -> Duration {
    Duration::try_seconds(self.merge_gap_seconds).unwrap_or(Duration::MAX)
  }

  /// Group names in configured order; the default group is appended if no rule names it.
  pub fn group_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.groups.iter().map(|g| g.name.clone()).collect();
    if !names.iter().any(|n| *n == self.default_group) {
      names.push(self.default_group.clone());
    }
    names
  }

  pub fn validate(&self) -> Result<(), EngineError> {
    if self.merge_gap_seconds < 0 {
      return Err(EngineError::config("merge_gap_seconds must be >= 0"));
    }
    if Duration::try_seconds(self.merge_gap_seconds).is_none() {
      return Err(EngineError::config(format!(
        "merge_gap_seconds {} is out of range",
        self.merge_gap_seconds
      )));
    }
    if self.alert_threshold == 0 {
      return Err(EngineError::config("alert_threshold must be >= 1"));
    }
    if self.default_group.trim().is_empty() {
      return Err(EngineError::config("default_group must not be empty"));
    }

    let mut seen_groups = HashSet::new();
    let mut label_owner: HashMap<&str, &str> = HashMap::new();
    for rule in &self.groups {
      if rule.name.trim().is_empty() {
        return Err(EngineError::config("group name must not be empty"));
      }
      if !seen_groups.insert(rule.name.as_str()) {
        return Err(EngineError::config(format!("duplicate group {:?}", rule.name)));
      }
      for label in &rule.labels {
        if let Some(owner) = label_owner.insert(label.as_str(), rule.name.as_str()) {
          if owner != rule.name {
            return Err(EngineError::config(format!(
              "label {:?} mapped to both {:?} and {:?}",
              label, owner, rule.name
            )));
          }
        }
      }
    }

    let known = self.group_names();
    for watched in &self.watched_groups {
      if !known.contains(watched) {
        return Err(EngineError::config(format!("watched group {:?} is not configured", watched)));
      }
    }
    Ok(())
  }
}
