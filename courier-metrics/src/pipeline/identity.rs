// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./identity_test.rs"]
mod identity_test;

use courier_protobuf::protos::monitoring::TimeSeries;
use itertools::Itertools;
use std::collections::HashMap;
use xxhash_rust::xxh64::Xxh64;

// Deterministic 64-bit fingerprint of an output series identity: resource type, resource
// labels, metric type, and metric labels, with label pairs folded in name order so the result
// does not depend on map iteration order. Stable across runs and platforms; downstream
// deduplication persists these hashes.
#[must_use]
pub fn hash_series(series: &TimeSeries) -> u64 {
  let mut hasher = Xxh64::new(0);
  if let Some(resource) = &series.resource {
    hash_str(&mut hasher, &resource.r#type);
    hash_labels(&mut hasher, &resource.labels);
  }
  if let Some(metric) = &series.metric {
    hash_str(&mut hasher, &metric.r#type);
    hash_labels(&mut hasher, &metric.labels);
  }
  hasher.digest()
}

fn hash_labels(hasher: &mut Xxh64, labels: &HashMap<String, String>) {
  for (name, value) in labels.iter().sorted() {
    hash_str(hasher, name);
    hash_str(hasher, value);
  }
}

// Each component is terminated so that adjacent fields cannot alias each other.
fn hash_str(hasher: &mut Xxh64, value: &str) {
  hasher.update(value.as_bytes());
  hasher.update(&[0xff]);
}
