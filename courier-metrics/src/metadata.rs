// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use async_trait::async_trait;
use courier_protobuf::protos::api::metric_descriptor::ValueType;
#[cfg(test)]
use mockall::automock;

//
// MetricType
//

// Metric family type as exposed by the scraped target, common across the text and proto
// exposition formats.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MetricType {
  Gauge,
  Counter,
  Summary,
  Histogram,
  Untyped,
}

//
// MetadataEntry
//

// Metadata for a single metric family of a single target.
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataEntry {
  pub metric: String,
  pub metric_type: MetricType,
  pub value_type: Option<ValueType>,
}

impl MetadataEntry {
  #[must_use]
  pub fn new(metric: &str, metric_type: MetricType, value_type: Option<ValueType>) -> Self {
    Self {
      metric: metric.to_string(),
      metric_type,
      value_type,
    }
  }

  // The value type to render scalar samples with. Unset metadata defaults to double.
  #[must_use]
  pub fn scalar_value_type(&self) -> ValueType {
    match self.value_type {
      None | Some(ValueType::Unspecified) => ValueType::Double,
      Some(value_type) => value_type,
    }
  }
}

//
// MetadataGetter
//

// Resolves metric metadata per (job, instance, metric). Implementations may block on I/O; the
// series cache races calls against the batch's shutdown signal.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetadataGetter: Send + Sync {
  async fn get(
    &self,
    job: &str,
    instance: &str,
    metric: &str,
  ) -> anyhow::Result<Option<MetadataEntry>>;
}
