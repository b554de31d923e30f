// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./labels_test.rs"]
mod labels_test;

use std::fmt::Display;

// Well known label names used by the upstream collector.
pub const METRIC_NAME_LABEL: &str = "__name__";
pub const JOB_LABEL: &str = "job";
pub const INSTANCE_LABEL: &str = "instance";
pub const BUCKET_LABEL: &str = "le";
pub const QUANTILE_LABEL: &str = "quantile";

//
// Label
//

// A single (name, value) pair within a label set.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Label {
  pub name: String,
  pub value: String,
}

impl Label {
  #[must_use]
  pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
    }
  }
}

impl Display for Label {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}={}", self.name, self.value)
  }
}

//
// LabelSet
//

// An ordered set of labels with unique names, kept sorted by name so that lookups can binary
// search and so that equality and hashing are independent of insertion order.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct LabelSet {
  labels: Vec<Label>,
}

impl LabelSet {
  #[must_use]
  pub fn new(mut labels: Vec<Label>) -> Self {
    labels.sort_unstable();
    labels.dedup_by(|a, b| a.name == b.name);
    Self { labels }
  }

  // Convenience constructor from (name, value) pairs, mirroring how label sets are written out
  // in configuration and tests.
  #[must_use]
  pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
    Self::new(
      pairs
        .iter()
        .map(|(name, value)| Label::new(*name, *value))
        .collect(),
    )
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .labels
      .binary_search_by(|l| l.name.as_str().cmp(name))
      .ok()
      .map(|i| self.labels[i].value.as_str())
  }

  // A label with an empty value is considered absent, matching the upstream collector which
  // treats empty labels as deleted.
  #[must_use]
  pub fn has(&self, name: &str) -> bool {
    self.get(name).is_some_and(|value| !value.is_empty())
  }

  pub fn iter(&self) -> impl Iterator<Item = &Label> {
    self.labels.iter()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.labels.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

impl Display for LabelSet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "(")?;
    for label in &self.labels {
      write!(f, "[{label}]")?;
    }
    write!(f, ")")
  }
}

impl<'a> IntoIterator for &'a LabelSet {
  type IntoIter = std::slice::Iter<'a, Label>;
  type Item = &'a Label;

  fn into_iter(self) -> Self::IntoIter {
    self.labels.iter()
  }
}
