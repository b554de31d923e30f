// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use async_trait::async_trait;
use courier_common::labels::LabelSet;
#[cfg(test)]
use mockall::automock;

//
// Target
//

// A scrape target resolved by (job, instance). The final labels are the post-relabel identity
// labels injected into every sample of the target. The discovered labels are the original
// pre-relabel labels, including the __resource_* and __meta_* labels consumed by resource
// mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Target {
  pub labels: LabelSet,
  pub discovered_labels: LabelSet,
}

//
// TargetGetter
//

// Resolves the target a sample originated from. Implementations may block on I/O; the series
// cache races calls against the batch's shutdown signal.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TargetGetter: Send + Sync {
  async fn get(&self, labels: &LabelSet) -> anyhow::Result<Option<Target>>;
}
