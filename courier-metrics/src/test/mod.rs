// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::metadata::{MetadataEntry, MetadataGetter, MetricType};
use crate::pipeline::counter_aggregator::{CounterAggregator, CounterAggregatorConfig};
use crate::pipeline::resource_map::{ResourceMap, const_label};
use crate::pipeline::sample_builder::SampleBuilder;
use crate::pipeline::series_cache::SeriesCache;
use crate::pipeline::RawSample;
use crate::targets::{Target, TargetGetter};
use async_trait::async_trait;
use courier_common::labels::{INSTANCE_LABEL, JOB_LABEL, LabelSet};
use courier_common::shutdown::ShutdownSignal;
use courier_common::stats::Collector;
use courier_protobuf::protos::api::metric_descriptor::{MetricKind, ValueType};
use courier_protobuf::protos::api::{Metric, MonitoredResource};
use courier_protobuf::protos::monitoring::typed_value::Value;
use courier_protobuf::protos::monitoring::{TimeSeries, TypedValue};
use std::collections::HashMap;
use std::sync::Arc;

//
// TargetMap
//

// A TargetGetter indexing targets by job/instance, mirroring how the scrape-discovery
// collaborator resolves them.
#[derive(Default)]
pub struct TargetMap {
  targets: HashMap<String, Target>,
}

impl TargetMap {
  #[must_use]
  pub fn new(entries: Vec<(&str, Target)>) -> Arc<Self> {
    Arc::new(Self {
      targets: entries
        .into_iter()
        .map(|(key, target)| (key.to_string(), target))
        .collect(),
    })
  }
}

#[async_trait]
impl TargetGetter for TargetMap {
  async fn get(&self, labels: &LabelSet) -> anyhow::Result<Option<Target>> {
    let key = format!(
      "{}/{}",
      labels.get(JOB_LABEL).unwrap_or_default(),
      labels.get(INSTANCE_LABEL).unwrap_or_default()
    );
    Ok(self.targets.get(&key).cloned())
  }
}

//
// MetadataMap
//

// A MetadataGetter for exact job/instance/metric matches.
#[derive(Default)]
pub struct MetadataMap {
  entries: HashMap<String, MetadataEntry>,
}

impl MetadataMap {
  #[must_use]
  pub fn new(entries: Vec<(&str, MetadataEntry)>) -> Arc<Self> {
    Arc::new(Self {
      entries: entries
        .into_iter()
        .map(|(key, entry)| (key.to_string(), entry))
        .collect(),
    })
  }
}

#[async_trait]
impl MetadataGetter for MetadataMap {
  async fn get(
    &self,
    job: &str,
    instance: &str,
    metric: &str,
  ) -> anyhow::Result<Option<MetadataEntry>> {
    Ok(self.entries.get(&format!("{job}/{instance}/{metric}")).cloned())
  }
}

#[must_use]
pub fn make_target(labels: &[(&str, &str)], discovered: &[(&str, &str)]) -> Target {
  Target {
    labels: LabelSet::from_pairs(labels),
    discovered_labels: LabelSet::from_pairs(discovered),
  }
}

#[must_use]
pub fn make_entry(metric: &str, metric_type: MetricType, value_type: Option<ValueType>) -> MetadataEntry {
  MetadataEntry::new(metric, metric_type, value_type)
}

// The resource map fixture shared by most pipeline tests: a two-label candidate, a one-label
// candidate, and one keyed on a metric label.
#[must_use]
pub fn test_resource_maps() -> Vec<ResourceMap> {
  vec![
    ResourceMap::new(
      "resource1",
      vec![
        const_label("resource_a", "__resource_a"),
        const_label("resource_b", "__resource_b"),
      ],
    ),
    ResourceMap::new("resource2", vec![const_label("resource_a", "__resource_a")]),
    ResourceMap::new(
      "resource3",
      vec![const_label("resource_a", "metric_label")],
    ),
  ]
}

#[must_use]
pub fn make_cache(
  targets: Arc<dyn TargetGetter>,
  metadata: Arc<dyn MetadataGetter>,
  resource_maps: Vec<ResourceMap>,
  metric_prefix: &str,
) -> SeriesCache {
  make_cache_with_aggregator(
    targets,
    metadata,
    resource_maps,
    metric_prefix,
    CounterAggregator::new(&CounterAggregatorConfig::default()).unwrap(),
  )
}

#[must_use]
pub fn make_cache_with_aggregator(
  targets: Arc<dyn TargetGetter>,
  metadata: Arc<dyn MetadataGetter>,
  resource_maps: Vec<ResourceMap>,
  metric_prefix: &str,
  counter_aggregator: Arc<CounterAggregator>,
) -> SeriesCache {
  SeriesCache::new(
    &Collector::default().scope("test"),
    targets,
    metadata,
    resource_maps,
    metric_prefix.to_string(),
    counter_aggregator,
  )
}

#[must_use]
pub fn make_builder(series: SeriesCache) -> SampleBuilder {
  SampleBuilder::new(&Collector::default().scope("test"), series)
}

// Drive the builder across a whole batch, collecting one output slot and one identity hash
// per input sample.
pub async fn run_builder(
  builder: &mut SampleBuilder,
  shutdown: &ShutdownSignal,
  samples: &[RawSample],
) -> (Vec<Option<TimeSeries>>, Vec<u64>) {
  let mut outputs = vec![];
  let mut hashes = vec![];
  let mut remaining = samples;
  while !remaining.is_empty() {
    let (output, hash, tail) = builder.next(shutdown, remaining).await.unwrap();
    outputs.push(output);
    hashes.push(hash);
    remaining = tail;
  }
  (outputs, hashes)
}

fn label_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
  pairs
    .iter()
    .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
    .collect()
}

// Construct a fully formed expected output series.
#[must_use]
pub fn expected_series(
  resource: (&str, &[(&str, &str)]),
  metric: (&str, &[(&str, &str)]),
  metric_kind: MetricKind,
  value_type: ValueType,
  start_ms: Option<i64>,
  end_ms: i64,
  value: Value,
) -> TimeSeries {
  let mut series = TimeSeries {
    resource: Some(MonitoredResource {
      r#type: resource.0.to_string(),
      labels: label_map(resource.1),
    }),
    metric: Some(Metric {
      r#type: metric.0.to_string(),
      labels: label_map(metric.1),
    }),
    metric_kind: metric_kind as i32,
    value_type: value_type as i32,
    points: vec![],
  };
  series
    .points
    .push(crate::protos::gcm::point(start_ms, end_ms, value));
  series
}

// Pull the single typed value back out of an emitted series.
#[must_use]
pub fn point_value(series: &TimeSeries) -> &Value {
  match &series.points[0].value {
    Some(TypedValue { value: Some(value) }) => value,
    _ => unreachable!("series has no value"),
  }
}
