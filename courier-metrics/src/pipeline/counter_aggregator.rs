// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./counter_aggregator_test.rs"]
mod counter_aggregator_test;

use anyhow::bail;
use courier_common::labels::LabelSet;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

//
// Config
//

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CounterAggregatorConfig {
  pub counters: Vec<AggregatedCounterConfig>,
}

// A single rollup counter: every cumulative series matching all matchers contributes its raw
// deltas to the named output series.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AggregatedCounterConfig {
  pub metric_name: String,
  pub matchers: Vec<LabelMatcherConfig>,
}

// No deny_unknown_fields here: it cannot coexist with the flattened match type.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LabelMatcherConfig {
  pub label: String,
  #[serde(flatten)]
  pub match_type: MatchType,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MatchType {
  Equal { value: String },
  Regex { regex: String },
}

//
// Matcher
//

enum Matcher {
  Equal { label: String, value: String },
  Regex { label: String, regex: regex::Regex },
}

impl Matcher {
  fn matches(&self, labels: &LabelSet) -> bool {
    match self {
      Self::Equal { label, value } => labels.get(label) == Some(value.as_str()),
      Self::Regex { label, regex } => labels.get(label).is_some_and(|v| regex.is_match(v)),
    }
  }
}

//
// AggregatedCounter
//

struct CounterState {
  accumulated: f64,
  last_update_ms: i64,
}

struct AggregatedCounter {
  metric_name: String,
  matchers: Vec<Matcher>,
  state: Mutex<CounterState>,
}

//
// CounterSnapshot
//

// One drained rollup value: the delta sum accumulated since the previous flush.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterSnapshot {
  pub metric_name: String,
  pub value: f64,
  pub last_update_ms: i64,
}

//
// CounterTracker
//

// Attached to a cumulative series record at cache refresh time. Observation is fire and
// forget; it can never fail the pipeline.
#[derive(Clone)]
pub struct CounterTracker {
  sinks: Vec<Arc<AggregatedCounter>>,
}

impl std::fmt::Debug for CounterTracker {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CounterTracker")
      .field("sinks", &self.sinks.len())
      .finish()
  }
}

impl CounterTracker {
  pub fn observe(&self, delta: f64, timestamp_ms: i64) {
    if delta < 0.0 {
      log::debug!("ignoring negative counter delta {delta}");
      return;
    }
    for sink in &self.sinks {
      let mut state = sink.state.lock();
      state.accumulated += delta;
      state.last_update_ms = state.last_update_ms.max(timestamp_ms);
    }
  }
}

//
// CounterAggregator
//

// Accumulates raw counter deltas for locally precomputed rollup series. The sample builder
// feeds it on every counter or histogram count that passes reset handling; an external
// publisher drains it via flush().
pub struct CounterAggregator {
  counters: Vec<Arc<AggregatedCounter>>,
}

impl CounterAggregator {
  pub fn new(config: &CounterAggregatorConfig) -> anyhow::Result<Arc<Self>> {
    let mut counters = vec![];
    for counter in &config.counters {
      if counter.matchers.is_empty() {
        bail!(
          "aggregated counter \"{}\" must have at least one matcher",
          counter.metric_name
        );
      }
      let matchers = counter
        .matchers
        .iter()
        .map(|matcher| -> anyhow::Result<Matcher> {
          Ok(match &matcher.match_type {
            MatchType::Equal { value } => Matcher::Equal {
              label: matcher.label.clone(),
              value: value.clone(),
            },
            MatchType::Regex { regex } => Matcher::Regex {
              label: matcher.label.clone(),
              regex: regex::Regex::new(regex)?,
            },
          })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
      counters.push(Arc::new(AggregatedCounter {
        metric_name: counter.metric_name.clone(),
        matchers,
        state: Mutex::new(CounterState {
          accumulated: 0.0,
          last_update_ms: 0,
        }),
      }));
    }
    Ok(Arc::new(Self { counters }))
  }

  // Match a series' raw labels against all configured counters. Returns None when nothing
  // matches so unmatched series carry no tracker at all.
  #[must_use]
  pub fn tracker(&self, labels: &LabelSet) -> Option<CounterTracker> {
    let sinks: Vec<_> = self
      .counters
      .iter()
      .filter(|counter| counter.matchers.iter().all(|m| m.matches(labels)))
      .cloned()
      .collect();
    if sinks.is_empty() {
      None
    } else {
      Some(CounterTracker { sinks })
    }
  }

  // Drain accumulated deltas. Counters that saw no updates since the previous flush are
  // reported with a zero value so publishers can emit continuous series.
  #[must_use]
  pub fn flush(&self) -> Vec<CounterSnapshot> {
    self
      .counters
      .iter()
      .map(|counter| {
        let mut state = counter.state.lock();
        let snapshot = CounterSnapshot {
          metric_name: counter.metric_name.clone(),
          value: state.accumulated,
          last_update_ms: state.last_update_ms,
        };
        state.accumulated = 0.0;
        snapshot
      })
      .collect()
  }
}
