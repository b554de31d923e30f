// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./series_cache_test.rs"]
mod series_cache_test;

use super::BuildError;
use super::aggregator::{
  BUCKET_SUFFIX,
  COUNT_SUFFIX,
  SUM_SUFFIX,
  SeriesFamily,
  TOTAL_SUFFIX,
  parse_bucket_bound,
  strip_compound_suffix,
};
use super::counter_aggregator::{CounterAggregator, CounterTracker};
use super::identity::hash_series;
use super::resource_map::{ResourceMap, map_to_resource};
use crate::metadata::{MetadataEntry, MetadataGetter, MetricType};
use crate::targets::TargetGetter;
use courier_common::labels::{
  BUCKET_LABEL,
  INSTANCE_LABEL,
  JOB_LABEL,
  LabelSet,
  METRIC_NAME_LABEL,
};
use courier_common::shutdown::ShutdownSignal;
use courier_common::stats::Scope;
use courier_protobuf::protos::api::metric_descriptor::{MetricKind, ValueType};
use courier_protobuf::protos::api::Metric;
use courier_protobuf::protos::monitoring::TimeSeries;
use prometheus::{IntCounter, IntGauge};
use std::sync::Arc;

type HashMap<Key, Value> = std::collections::HashMap<Key, Value, ahash::RandomState>;

// Residual metric label sets above this cardinality cannot be represented downstream and drop
// the whole series.
pub const MAX_LABEL_COUNT: usize = 10;

//
// DropReason
//

// Why a series produces no output. The record is kept so that repeated samples for the ref
// short-circuit instead of re-running futile lookups.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DropReason {
  TooManyLabels,
  NoTarget,
  NoMetadata,
  NoResourceMatch,
  Unsupported,
}

//
// ResetState
//

// Reset tracking for one cumulative series: the timestamp the current epoch began, the value
// observed at that point, and the most recent observation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResetState {
  started: bool,
  reset_timestamp_ms: i64,
  reset_value: f64,
  last_value: f64,
  last_timestamp_ms: i64,
}

// A reset-adjusted cumulative observation. The value is relative to the epoch start; the delta
// is the raw increment since the previous observation, fed to the counter aggregator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResetAdjusted {
  pub reset_timestamp_ms: i64,
  pub value: f64,
  pub delta: f64,
}

impl ResetState {
  #[must_use]
  pub const fn started(&self) -> bool {
    self.started
  }

  #[must_use]
  pub const fn last_value(&self) -> f64 {
    self.last_value
  }

  #[must_use]
  pub const fn last_timestamp_ms(&self) -> i64 {
    self.last_timestamp_ms
  }

  #[must_use]
  pub const fn reset_timestamp_ms(&self) -> i64 {
    self.reset_timestamp_ms
  }

  // First observation of a series: it becomes the epoch baseline and emits nothing.
  pub fn seed(&mut self, timestamp_ms: i64, value: f64) {
    self.started = true;
    self.reset_timestamp_ms = timestamp_ms;
    self.reset_value = value;
    self.last_value = value;
    self.last_timestamp_ms = timestamp_ms;
  }

  // A new epoch started somewhere between the previous and current observation. Backdating the
  // epoch start by one millisecond keeps the interval non-empty without requiring
  // sub-millisecond precision from the source. The new epoch counts from zero.
  pub fn reset_to(&mut self, timestamp_ms: i64, value: f64) {
    self.started = true;
    self.reset_timestamp_ms = timestamp_ms - 1;
    self.reset_value = 0.0;
    self.last_value = value;
    self.last_timestamp_ms = timestamp_ms;
  }

  // Record a continuation observation and return the epoch-relative value. An unstarted state
  // adopts a zero baseline; callers that need seeding semantics check started() first.
  pub fn advance(&mut self, timestamp_ms: i64, value: f64) -> f64 {
    if !self.started {
      self.started = true;
      self.reset_timestamp_ms = timestamp_ms;
      self.reset_value = 0.0;
    }
    self.last_value = value;
    self.last_timestamp_ms = timestamp_ms;
    value - self.reset_value
  }

  // Full reset handling for scalar cumulative series: seed, reset, or continue.
  pub fn adjust(&mut self, timestamp_ms: i64, value: f64) -> Option<ResetAdjusted> {
    if !self.started {
      self.seed(timestamp_ms, value);
      return None;
    }
    if value < self.last_value {
      self.reset_to(timestamp_ms, value);
      return Some(ResetAdjusted {
        reset_timestamp_ms: self.reset_timestamp_ms,
        value,
        delta: value,
      });
    }
    let delta = value - self.last_value;
    self.last_value = value;
    self.last_timestamp_ms = timestamp_ms;
    Some(ResetAdjusted {
      reset_timestamp_ms: self.reset_timestamp_ms,
      value: value - self.reset_value,
      delta,
    })
  }
}

//
// ReadySeries
//

// The translated identity of a series that can produce output: the output skeleton (identity
// fields only, no points), its family, and per-series cumulative state.
#[derive(Clone, Debug)]
pub struct ReadySeries {
  pub family: SeriesFamily,
  pub identity_hash: u64,
  pub metric_kind: MetricKind,
  pub value_type: ValueType,
  base: TimeSeries,
  reset: ResetState,
  tracker: Option<CounterTracker>,
}

impl ReadySeries {
  // Clone of the identity skeleton, ready to receive the emitted point.
  #[must_use]
  pub fn base_series(&self) -> TimeSeries {
    self.base.clone()
  }

  #[must_use]
  pub const fn reset(&self) -> &ResetState {
    &self.reset
  }
}

//
// SeriesStatus
//

#[derive(Clone, Debug)]
pub enum SeriesStatus {
  Dropped(DropReason),
  Ready(ReadySeries),
}

//
// SeriesRecord
//

// One cache entry: the raw write ahead log labels, the log generation that produced them, the
// collaborator epoch the translation was computed under, and the translation itself.
#[derive(Debug)]
pub struct SeriesRecord {
  labels: LabelSet,
  wal_generation: u64,
  epoch: u64,
  status: SeriesStatus,
}

impl SeriesRecord {
  #[must_use]
  pub const fn status(&self) -> &SeriesStatus {
    &self.status
  }

  #[must_use]
  pub const fn labels(&self) -> &LabelSet {
    &self.labels
  }
}

//
// SeriesSnapshot
//

// Point-in-time view of one cache entry for diagnostics. Decoupled from the live record so
// that enumeration never exposes interior state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesSnapshot {
  pub series_ref: u64,
  pub metric_type: Option<String>,
  pub drop_reason: Option<DropReason>,
}

//
// Stats
//

struct Stats {
  cache_size: IntGauge,
  refreshes: IntCounter,
  dropped_no_target: IntCounter,
  dropped_no_metadata: IntCounter,
  dropped_no_resource_match: IntCounter,
  dropped_too_many_labels: IntCounter,
  dropped_unsupported: IntCounter,
}

impl Stats {
  fn new(scope: &Scope) -> Self {
    let scope = scope.scope("series_cache");
    Self {
      cache_size: scope.gauge("cache_size"),
      refreshes: scope.counter("refreshes"),
      dropped_no_target: scope.counter("dropped_no_target"),
      dropped_no_metadata: scope.counter("dropped_no_metadata"),
      dropped_no_resource_match: scope.counter("dropped_no_resource_match"),
      dropped_too_many_labels: scope.counter("dropped_too_many_labels"),
      dropped_unsupported: scope.counter("dropped_unsupported"),
    }
  }

  fn note_status(&self, status: &SeriesStatus) {
    match status {
      SeriesStatus::Ready(_) => {},
      SeriesStatus::Dropped(DropReason::NoTarget) => self.dropped_no_target.inc(),
      SeriesStatus::Dropped(DropReason::NoMetadata) => self.dropped_no_metadata.inc(),
      SeriesStatus::Dropped(DropReason::NoResourceMatch) => self.dropped_no_resource_match.inc(),
      SeriesStatus::Dropped(DropReason::TooManyLabels) => self.dropped_too_many_labels.inc(),
      SeriesStatus::Dropped(DropReason::Unsupported) => self.dropped_unsupported.inc(),
    }
  }
}

//
// SampleInterval
//

// The most recently emitted interval per output identity. A new point is accepted if it
// extends the same epoch or starts a later one; anything else overlaps an already emitted
// interval and is rejected.
#[derive(Clone, Copy, Debug)]
struct SampleInterval {
  start_ms: i64,
  end_ms: i64,
}

impl SampleInterval {
  const fn accepts(&self, start_ms: i64, end_ms: i64) -> bool {
    (start_ms == self.start_ms && end_ms > self.end_ms)
      || (start_ms > self.start_ms && start_ms >= self.end_ms)
  }
}

//
// Classification
//

struct Classified {
  family: SeriesFamily,
  output_name: String,
  metric_kind: MetricKind,
  value_type: ValueType,
}

enum Classification {
  Classified(Classified),
  NoMetadata,
  Unsupported,
}

//
// SeriesCache
//

// Keyed store from write ahead log series reference to prepared series record. Entries are
// installed by the log reader via set() and consumed by the sample builder via get(). The
// cache is mutated only by the pipeline thread; concurrent diagnostics go through snapshot().
pub struct SeriesCache {
  targets: Arc<dyn TargetGetter>,
  metadata: Arc<dyn MetadataGetter>,
  resource_maps: Vec<ResourceMap>,
  metric_prefix: String,
  counter_aggregator: Arc<CounterAggregator>,
  entries: HashMap<u64, SeriesRecord>,
  intervals: HashMap<u64, SampleInterval>,
  epoch: u64,
  stats: Stats,
}

impl SeriesCache {
  #[must_use]
  pub fn new(
    scope: &Scope,
    targets: Arc<dyn TargetGetter>,
    metadata: Arc<dyn MetadataGetter>,
    resource_maps: Vec<ResourceMap>,
    metric_prefix: String,
    counter_aggregator: Arc<CounterAggregator>,
  ) -> Self {
    Self {
      targets,
      metadata,
      resource_maps,
      metric_prefix,
      counter_aggregator,
      entries: HashMap::default(),
      intervals: HashMap::default(),
      epoch: 0,
      stats: Stats::new(scope),
    }
  }

  // Install or replace the record for a series reference. Called by the log reader whenever
  // the log (re)emits the series' labels.
  pub async fn set(
    &mut self,
    shutdown: &ShutdownSignal,
    series_ref: u64,
    labels: LabelSet,
    generation: u64,
  ) -> Result<(), BuildError> {
    let status = self.build_record(shutdown, &labels).await?;
    self.stats.refreshes.inc();
    self.stats.note_status(&status);
    self.entries.insert(
      series_ref,
      SeriesRecord {
        labels,
        wal_generation: generation,
        epoch: self.epoch,
        status,
      },
    );
    self.stats.cache_size.set(self.entries.len() as i64);
    Ok(())
  }

  // Look up a record, recomputing the translation first if the collaborator epoch moved since
  // it was built. A ref the log never announced returns None and the sample is dropped.
  pub async fn get(
    &mut self,
    shutdown: &ShutdownSignal,
    series_ref: u64,
  ) -> Result<Option<&SeriesRecord>, BuildError> {
    let labels = match self.entries.get(&series_ref) {
      None => return Ok(None),
      Some(entry) if entry.epoch == self.epoch => return Ok(self.entries.get(&series_ref)),
      Some(entry) => entry.labels.clone(),
    };

    log::debug!("recomputing series {series_ref} after collaborator change");
    let mut status = self.build_record(shutdown, &labels).await?;
    self.stats.refreshes.inc();
    self.stats.note_status(&status);
    if let Some(entry) = self.entries.get_mut(&series_ref) {
      // Cumulative state survives a recompute as long as the output identity is unchanged.
      if let (SeriesStatus::Ready(old), SeriesStatus::Ready(new)) = (&entry.status, &mut status) {
        if old.identity_hash == new.identity_hash {
          new.reset = old.reset;
        }
      }
      entry.status = status;
      entry.epoch = self.epoch;
    }
    Ok(self.entries.get(&series_ref))
  }

  // Run scalar reset handling for a cumulative series. Returns None while seeding and for
  // unknown or dropped refs.
  pub fn get_reset_adjusted(
    &mut self,
    series_ref: u64,
    timestamp_ms: i64,
    value: f64,
  ) -> Option<ResetAdjusted> {
    self
      .reset_state(series_ref)
      .and_then(|reset| reset.adjust(timestamp_ms, value))
  }

  pub fn reset_state(&mut self, series_ref: u64) -> Option<&mut ResetState> {
    match self.entries.get_mut(&series_ref) {
      Some(SeriesRecord {
        status: SeriesStatus::Ready(ready),
        ..
      }) => Some(&mut ready.reset),
      _ => None,
    }
  }

  #[must_use]
  pub fn base_series(&self, series_ref: u64) -> Option<TimeSeries> {
    match self.entries.get(&series_ref) {
      Some(SeriesRecord {
        status: SeriesStatus::Ready(ready),
        ..
      }) => Some(ready.base_series()),
      _ => None,
    }
  }

  #[must_use]
  pub fn counter_tracker(&self, series_ref: u64) -> Option<CounterTracker> {
    match self.entries.get(&series_ref) {
      Some(SeriesRecord {
        status: SeriesStatus::Ready(ready),
        ..
      }) => ready.tracker.clone(),
      _ => None,
    }
  }

  // Record the interval about to be emitted for an output identity, rejecting it if it
  // overlaps the previously emitted one. Two refs collapsing onto one identity (e.g. two
  // upstream instances mapping to a single monitored resource) resolve to whichever series
  // emits first.
  pub fn update_sample_interval(&mut self, identity_hash: u64, start_ms: i64, end_ms: i64) -> bool {
    match self.intervals.get_mut(&identity_hash) {
      Some(interval) => {
        if interval.accepts(start_ms, end_ms) {
          *interval = SampleInterval { start_ms, end_ms };
          true
        } else {
          log::trace!("rejecting overlapping interval for identity {identity_hash:x}");
          false
        }
      },
      None => {
        self
          .intervals
          .insert(identity_hash, SampleInterval { start_ms, end_ms });
        true
      },
    }
  }

  // Drop all records installed by log generations before the threshold.
  pub fn garbage_collect(&mut self, min_generation: u64) {
    let before = self.entries.len();
    self
      .entries
      .retain(|_, entry| entry.wal_generation >= min_generation);
    log::debug!(
      "garbage collected {} series below generation {min_generation}",
      before - self.entries.len()
    );
    self.stats.cache_size.set(self.entries.len() as i64);
  }

  // Mark every record stale. Called when the target or metadata collaborators report changed
  // answers; records are recomputed lazily on next access.
  pub fn invalidate(&mut self) {
    self.epoch += 1;
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  #[must_use]
  pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
    let mut snapshots: Vec<_> = self
      .entries
      .iter()
      .map(|(series_ref, entry)| match &entry.status {
        SeriesStatus::Ready(ready) => SeriesSnapshot {
          series_ref: *series_ref,
          metric_type: ready.base.metric.as_ref().map(|m| m.r#type.clone()),
          drop_reason: None,
        },
        SeriesStatus::Dropped(reason) => SeriesSnapshot {
          series_ref: *series_ref,
          metric_type: None,
          drop_reason: Some(*reason),
        },
      })
      .collect();
    snapshots.sort_unstable_by_key(|snapshot| snapshot.series_ref);
    snapshots
  }

  async fn target_get(
    &self,
    shutdown: &ShutdownSignal,
    labels: &LabelSet,
  ) -> Result<Option<crate::targets::Target>, BuildError> {
    tokio::select! {
      () = shutdown.cancelled() => Err(BuildError::Cancelled),
      result = self.targets.get(labels) => result.map_err(BuildError::TargetLookup),
    }
  }

  async fn metadata_get(
    &self,
    shutdown: &ShutdownSignal,
    job: &str,
    instance: &str,
    metric: &str,
  ) -> Result<Option<MetadataEntry>, BuildError> {
    tokio::select! {
      () = shutdown.cancelled() => Err(BuildError::Cancelled),
      result = self.metadata.get(job, instance, metric) => result.map_err(BuildError::MetadataLookup),
    }
  }

  // Translate raw series labels into an output series record, consulting the target and
  // metadata collaborators and the resource map.
  async fn build_record(
    &self,
    shutdown: &ShutdownSignal,
    labels: &LabelSet,
  ) -> Result<SeriesStatus, BuildError> {
    let Some(metric_name) = labels.get(METRIC_NAME_LABEL) else {
      log::debug!("series without a metric name: {labels}");
      return Ok(SeriesStatus::Dropped(DropReason::Unsupported));
    };
    let metric_name = metric_name.to_string();
    let job = labels.get(JOB_LABEL).unwrap_or_default().to_string();
    let instance = labels.get(INSTANCE_LABEL).unwrap_or_default().to_string();

    let Some(target) = self.target_get(shutdown, labels).await? else {
      log::debug!("no target for series {labels}");
      return Ok(SeriesStatus::Dropped(DropReason::NoTarget));
    };

    let classified = match self
      .classify(shutdown, &job, &instance, &metric_name, labels)
      .await?
    {
      Classification::Classified(classified) => classified,
      Classification::NoMetadata => {
        log::debug!("no metadata for series {labels}");
        return Ok(SeriesStatus::Dropped(DropReason::NoMetadata));
      },
      Classification::Unsupported => {
        log::debug!("unsupported series shape: {labels}");
        return Ok(SeriesStatus::Dropped(DropReason::Unsupported));
      },
    };

    let Some(translated) = map_to_resource(&self.resource_maps, labels, &target.discovered_labels)
    else {
      log::debug!("no resource mapping matched series {labels}");
      return Ok(SeriesStatus::Dropped(DropReason::NoResourceMatch));
    };

    let mut residual = std::collections::HashMap::new();
    for label in labels {
      if label.name == METRIC_NAME_LABEL
        || target.labels.get(&label.name).is_some()
        || translated.consumed_sample_labels.contains(&label.name)
      {
        continue;
      }
      // The bucket bound is the constituent selector within a histogram, not part of the
      // output identity.
      if matches!(classified.family, SeriesFamily::HistogramBucket(_))
        && label.name == BUCKET_LABEL
      {
        continue;
      }
      residual.insert(label.name.clone(), label.value.clone());
    }
    if residual.len() > MAX_LABEL_COUNT {
      return Ok(SeriesStatus::Dropped(DropReason::TooManyLabels));
    }

    let base = TimeSeries {
      metric: Some(Metric {
        r#type: format!("{}/{}", self.metric_prefix, classified.output_name),
        labels: residual,
      }),
      resource: Some(translated.resource),
      metric_kind: classified.metric_kind as i32,
      value_type: classified.value_type as i32,
      points: vec![],
    };
    let identity_hash = hash_series(&base);

    let tracker = match classified.family {
      SeriesFamily::CounterScalar | SeriesFamily::HistogramCount => {
        self.counter_aggregator.tracker(labels)
      },
      _ => None,
    };

    Ok(SeriesStatus::Ready(ReadySeries {
      family: classified.family,
      identity_hash,
      metric_kind: classified.metric_kind,
      value_type: classified.value_type,
      base,
      reset: ResetState::default(),
      tracker,
    }))
  }

  // Resolve metadata for a metric name and derive the series family. Lookup order: the full
  // name; the name with a _total suffix stripped; the base name of a compound family suffix.
  async fn classify(
    &self,
    shutdown: &ShutdownSignal,
    job: &str,
    instance: &str,
    metric_name: &str,
    labels: &LabelSet,
  ) -> Result<Classification, BuildError> {
    if let Some(entry) = self
      .metadata_get(shutdown, job, instance, metric_name)
      .await?
    {
      return Ok(Self::classify_with_metadata(metric_name, "", &entry, labels));
    }

    if let Some(base) = metric_name.strip_suffix(TOTAL_SUFFIX) {
      if !base.is_empty() {
        if let Some(entry) = self.metadata_get(shutdown, job, instance, base).await? {
          // A counter under the stripped name keeps that name on the output; anything else
          // falls back to an untyped gauge under the original name.
          return Ok(if entry.metric_type == MetricType::Counter {
            Classification::Classified(Classified {
              family: SeriesFamily::CounterScalar,
              output_name: base.to_string(),
              metric_kind: MetricKind::Cumulative,
              value_type: entry.scalar_value_type(),
            })
          } else {
            Classification::Classified(Classified {
              family: SeriesFamily::GaugeScalar,
              output_name: metric_name.to_string(),
              metric_kind: MetricKind::Gauge,
              value_type: ValueType::Double,
            })
          });
        }
      }
    }

    if let Some((base, suffix)) = strip_compound_suffix(metric_name) {
      if let Some(entry) = self.metadata_get(shutdown, job, instance, base).await? {
        if matches!(
          entry.metric_type,
          MetricType::Summary | MetricType::Histogram
        ) {
          return Ok(Self::classify_with_metadata(
            metric_name,
            suffix,
            &entry,
            labels,
          ));
        }
      }
    }

    Ok(Classification::NoMetadata)
  }

  fn classify_with_metadata(
    metric_name: &str,
    suffix: &str,
    entry: &MetadataEntry,
    labels: &LabelSet,
  ) -> Classification {
    let base = metric_name
      .strip_suffix(suffix)
      .unwrap_or(metric_name)
      .to_string();

    let classified = match (entry.metric_type, suffix) {
      (MetricType::Gauge | MetricType::Untyped, "") => Classified {
        // A gauge whose name extends another family's base name with an unrecognized suffix
        // is still its own series; tag it so that histogram assembly never considers it.
        family: if strip_compound_suffix(metric_name).is_some() {
          SeriesFamily::HistogramGaugeSibling
        } else {
          SeriesFamily::GaugeScalar
        },
        output_name: metric_name.to_string(),
        metric_kind: MetricKind::Gauge,
        value_type: entry.scalar_value_type(),
      },
      (MetricType::Counter, "") => Classified {
        family: SeriesFamily::CounterScalar,
        output_name: metric_name.to_string(),
        metric_kind: MetricKind::Cumulative,
        value_type: entry.scalar_value_type(),
      },
      // A summary's base-name series carries the quantile label and reports as a gauge.
      (MetricType::Summary, "") => Classified {
        family: SeriesFamily::SummaryQuantile,
        output_name: metric_name.to_string(),
        metric_kind: MetricKind::Gauge,
        value_type: ValueType::Double,
      },
      (MetricType::Summary, SUM_SUFFIX) => Classified {
        family: SeriesFamily::SummarySum,
        output_name: metric_name.to_string(),
        metric_kind: MetricKind::Cumulative,
        value_type: ValueType::Double,
      },
      (MetricType::Summary, COUNT_SUFFIX) => Classified {
        family: SeriesFamily::SummaryCount,
        output_name: metric_name.to_string(),
        metric_kind: MetricKind::Cumulative,
        value_type: ValueType::Int64,
      },
      (MetricType::Histogram, SUM_SUFFIX) => Classified {
        family: SeriesFamily::HistogramSum,
        output_name: base,
        metric_kind: MetricKind::Cumulative,
        value_type: ValueType::Distribution,
      },
      (MetricType::Histogram, COUNT_SUFFIX) => Classified {
        family: SeriesFamily::HistogramCount,
        output_name: base,
        metric_kind: MetricKind::Cumulative,
        value_type: ValueType::Distribution,
      },
      (MetricType::Histogram, BUCKET_SUFFIX) => {
        let Some(upper) = labels.get(BUCKET_LABEL).and_then(parse_bucket_bound) else {
          return Classification::Unsupported;
        };
        Classified {
          family: SeriesFamily::HistogramBucket(upper),
          output_name: base,
          metric_kind: MetricKind::Cumulative,
          value_type: ValueType::Distribution,
        }
      },
      _ => return Classification::Unsupported,
    };
    Classification::Classified(classified)
  }
}
