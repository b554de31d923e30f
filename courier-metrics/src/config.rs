// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

use crate::pipeline::counter_aggregator::CounterAggregatorConfig;
use crate::pipeline::resource_map::{ResourceMap, default_mappings};
use serde::Deserialize;

pub const DEFAULT_METRIC_PREFIX: &str = "external.googleapis.com/prometheus";

//
// Config
//

// Pipeline configuration. Everything is optional; an empty file yields a pipeline that writes
// under the default external metric prefix using the built-in resource mappings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub metric_prefix: String,
  pub use_gke_resource: bool,
  pub resource_maps: Vec<ResourceMap>,
  pub counter_aggregator: CounterAggregatorConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      metric_prefix: DEFAULT_METRIC_PREFIX.to_string(),
      use_gke_resource: false,
      resource_maps: vec![],
      counter_aggregator: CounterAggregatorConfig::default(),
    }
  }
}

impl Config {
  // The full ordered candidate list: user supplied mappings are consulted before the
  // built-ins, and use_gke_resource selects which built-in set applies.
  #[must_use]
  pub fn resource_mappings(&self) -> Vec<ResourceMap> {
    self
      .resource_maps
      .iter()
      .cloned()
      .chain(default_mappings(self.use_gke_resource))
      .collect()
  }
}

pub fn load_from_file(path: &str) -> anyhow::Result<Config> {
  let file_contents = std::fs::read_to_string(path)?;
  Ok(serde_yaml::from_str(&file_contents)?)
}
