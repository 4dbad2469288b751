//! Map raw detection labels onto semantic groups.

use std::collections::HashMap;

use crate::config::Config;
use crate::types::Group;

/// Label -> group lookup with a fallback group. Total: never fails.
#[derive(Debug, Clone)]
pub struct Classifier {
  table: HashMap<String, Group>,
  groups: Vec<Group>,
  default_group: Group,
}

impl Classifier {
  pub fn from_config(config: &Config) -> Self {
    let mut table = HashMap::new();
    for rule in &config.groups {
      for label in &rule.labels {
        table.insert(label.clone(), Group::new(rule.name.clone()));
      }
    }
    Self {
      table,
      groups: config.group_names().into_iter().map(Group::new).collect(),
      default_group: Group::new(config.default_group.clone()),
    }
  }

  /// Exact, case-sensitive match; anything unmapped lands in the default group.
  pub fn classify(&self, label: &str) -> &Group {
    self.table.get(label).unwrap_or(&self.default_group)
  }

  /// The fixed group enumeration, in configured order.
  pub fn groups(&self) -> &[Group] {
    &self.groups
  }

  pub fn default_group(&self) -> &Group {
    &self.default_group
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GroupRule;

  #[test]
  fn default_table_matches_people_and_vehicles() {
    let c = Classifier::from_config(&Config::default());
    assert_eq!(c.classify("pedestrian").as_str(), "people");
    assert_eq!(c.classify("bicycle").as_str(), "people");
    assert_eq!(c.classify("car").as_str(), "vehicles");
    assert_eq!(c.classify("truck").as_str(), "vehicles");
  }

  #[test]
  fn unknown_label_falls_back_deterministically() {
    let c = Classifier::from_config(&Config::default());
    let first = c.classify("drone").clone();
    for _ in 0..3 {
      assert_eq!(c.classify("drone"), &first);
    }
    assert_eq!(first, *c.default_group());
  }

  #[test]
  fn matching_is_case_sensitive() {
    let c = Classifier::from_config(&Config::default());
    assert_eq!(c.classify("Pedestrian").as_str(), "vehicles");
  }

  #[test]
  fn singleton_groups_give_ungrouped_behaviour() {
    let config = Config {
      groups: vec![
        GroupRule::new("pedestrian", &["pedestrian"]),
        GroupRule::new("bicycle", &["bicycle"]),
        GroupRule::new("car", &["car"]),
      ],
      default_group: "other".into(),
      watched_groups: vec!["pedestrian".into()],
      ..Config::default()
    };
    let c = Classifier::from_config(&config);
    assert_eq!(c.classify("bicycle").as_str(), "bicycle");
    assert_eq!(c.classify("car").as_str(), "car");
    let names: Vec<&str> = c.groups().iter().map(|g| g.as_str()).collect();
    assert_eq!(names, vec!["pedestrian", "bicycle", "car", "other"]);
  }
}
