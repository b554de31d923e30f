// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./sample_builder_test.rs"]
mod sample_builder_test;

use super::aggregator::{BucketValue, DistributionInput, SeriesFamily, assemble_distribution};
use super::series_cache::{SeriesCache, SeriesStatus};
use super::{BuildError, RawSample};
use crate::protos::gcm;
use courier_common::shutdown::ShutdownSignal;
use courier_common::stats::Scope;
use courier_protobuf::protos::monitoring::TimeSeries;
use courier_protobuf::protos::monitoring::typed_value::Value;
use prometheus::IntCounter;

type HashSet<Value> = std::collections::HashSet<Value, ahash::RandomState>;

//
// Stats
//

struct Stats {
  emitted: IntCounter,
  skipped_nan: IntCounter,
  skipped_unknown_ref: IntCounter,
  skipped_dropped_series: IntCounter,
  skipped_reset_seed: IntCounter,
  skipped_overlap: IntCounter,
  skipped_invalid_interval: IntCounter,
  skipped_unsupported_value: IntCounter,
  histogram_missing_count: IntCounter,
}

impl Stats {
  fn new(scope: &Scope) -> Self {
    let scope = scope.scope("sample_builder");
    Self {
      emitted: scope.counter("emitted"),
      skipped_nan: scope.counter("skipped_nan"),
      skipped_unknown_ref: scope.counter("skipped_unknown_ref"),
      skipped_dropped_series: scope.counter("skipped_dropped_series"),
      skipped_reset_seed: scope.counter("skipped_reset_seed"),
      skipped_overlap: scope.counter("skipped_overlap"),
      skipped_invalid_interval: scope.counter("skipped_invalid_interval"),
      skipped_unsupported_value: scope.counter("skipped_unsupported_value"),
      histogram_missing_count: scope.counter("histogram_missing_count"),
    }
  }
}

//
// SampleBuilder
//

// The pipeline head. Consumes raw samples in batch order and emits at most one completed
// output series per input sample. Compound families consume sibling samples from the same
// batch; every consumed sibling keeps a nil output slot at its own position so callers see
// exactly one output per input.
pub struct SampleBuilder {
  series: SeriesCache,
  consumed: HashSet<(u64, i64)>,
  stats: Stats,
}

impl SampleBuilder {
  #[must_use]
  pub fn new(scope: &Scope, series: SeriesCache) -> Self {
    Self {
      series,
      consumed: HashSet::default(),
      stats: Stats::new(scope),
    }
  }

  #[must_use]
  pub const fn series_cache(&self) -> &SeriesCache {
    &self.series
  }

  pub fn series_cache_mut(&mut self) -> &mut SeriesCache {
    &mut self.series
  }

  // Process the batch head. Returns the emitted series (or None for a skipped sample), the
  // output identity hash (0 when nothing was emitted), and the unprocessed remainder of the
  // batch. On error the head is not consumed and the caller may retry the same batch.
  pub async fn next<'a>(
    &mut self,
    shutdown: &ShutdownSignal,
    samples: &'a [RawSample],
  ) -> Result<(Option<TimeSeries>, u64, &'a [RawSample]), BuildError> {
    let Some((&sample, tail)) = samples.split_first() else {
      return Ok((None, 0, samples));
    };

    // A sibling consumed by an earlier compound assembly keeps its output position as a skip.
    if self
      .consumed
      .remove(&(sample.series_ref, sample.timestamp_ms))
    {
      return Ok((None, 0, tail));
    }

    if sample.value.is_nan() {
      self.stats.skipped_nan.inc();
      return Ok((None, 0, tail));
    }

    let Some(record) = self.series.get(shutdown, sample.series_ref).await? else {
      // The log never announced this ref. The cache is built lazily, so this is a skip rather
      // than an error.
      self.stats.skipped_unknown_ref.inc();
      return Ok((None, 0, tail));
    };
    let (family, identity_hash, value_type, base) = match record.status() {
      SeriesStatus::Dropped(_) => {
        self.stats.skipped_dropped_series.inc();
        return Ok((None, 0, tail));
      },
      SeriesStatus::Ready(ready) => (
        ready.family,
        ready.identity_hash,
        ready.value_type,
        ready.base_series(),
      ),
    };

    match family {
      SeriesFamily::GaugeScalar
      | SeriesFamily::SummaryQuantile
      | SeriesFamily::HistogramGaugeSibling => {
        let Some(value) = gcm::scalar_value(value_type, sample.value) else {
          self.stats.skipped_unsupported_value.inc();
          return Ok((None, 0, tail));
        };
        let mut series = base;
        series
          .points
          .push(gcm::point(None, sample.timestamp_ms, value));
        self.stats.emitted.inc();
        Ok((Some(series), identity_hash, tail))
      },
      SeriesFamily::CounterScalar | SeriesFamily::SummarySum | SeriesFamily::SummaryCount => {
        let Some(adjusted) =
          self
            .series
            .get_reset_adjusted(sample.series_ref, sample.timestamp_ms, sample.value)
        else {
          self.stats.skipped_reset_seed.inc();
          return Ok((None, 0, tail));
        };
        let Some(value) = gcm::scalar_value(value_type, adjusted.value) else {
          self.stats.skipped_unsupported_value.inc();
          return Ok((None, 0, tail));
        };
        // A continuation that lands on the epoch start would produce an empty interval.
        if adjusted.reset_timestamp_ms >= sample.timestamp_ms {
          self.stats.skipped_invalid_interval.inc();
          return Ok((None, 0, tail));
        }
        if !self.series.update_sample_interval(
          identity_hash,
          adjusted.reset_timestamp_ms,
          sample.timestamp_ms,
        ) {
          self.stats.skipped_overlap.inc();
          return Ok((None, 0, tail));
        }
        if family == SeriesFamily::CounterScalar {
          if let Some(tracker) = self.series.counter_tracker(sample.series_ref) {
            tracker.observe(adjusted.delta, sample.timestamp_ms);
          }
        }
        let mut series = base;
        series.points.push(gcm::point(
          Some(adjusted.reset_timestamp_ms),
          sample.timestamp_ms,
          value,
        ));
        self.stats.emitted.inc();
        Ok((Some(series), identity_hash, tail))
      },
      SeriesFamily::HistogramSum
      | SeriesFamily::HistogramCount
      | SeriesFamily::HistogramBucket(_) => {
        self
          .build_distribution(shutdown, sample, tail, identity_hash, base)
          .await
      },
    }
  }

  // Join the head histogram constituent with its siblings: every later sample in the batch
  // with the same base identity and timestamp. The whole histogram emits one distribution
  // point; reset handling is keyed on the count constituent.
  async fn build_distribution<'a>(
    &mut self,
    shutdown: &ShutdownSignal,
    head: RawSample,
    tail: &'a [RawSample],
    identity_hash: u64,
    base: TimeSeries,
  ) -> Result<(Option<TimeSeries>, u64, &'a [RawSample]), BuildError> {
    let timestamp_ms = head.timestamp_ms;

    let mut sum: Option<(u64, f64)> = None;
    let mut count: Option<(u64, f64)> = None;
    let mut buckets: Vec<(u64, f64, f64)> = vec![];
    let mut siblings: Vec<(u64, i64)> = vec![];
    let mut saw_nan = false;

    for (position, sample) in std::iter::once(head)
      .chain(tail.iter().copied())
      .enumerate()
    {
      if sample.timestamp_ms != timestamp_ms {
        continue;
      }
      let key = (sample.series_ref, sample.timestamp_ms);
      if position > 0 && self.consumed.contains(&key) {
        continue;
      }
      let Some(record) = self.series.get(shutdown, sample.series_ref).await? else {
        continue;
      };
      let SeriesStatus::Ready(ready) = record.status() else {
        continue;
      };
      if !ready.family.is_histogram_part() || ready.identity_hash != identity_hash {
        continue;
      }
      let family = ready.family;

      if sample.value.is_nan() {
        saw_nan = true;
      } else {
        match family {
          SeriesFamily::HistogramSum => {
            if sum.is_none() {
              sum = Some((sample.series_ref, sample.value));
            }
          },
          SeriesFamily::HistogramCount => {
            if count.is_none() {
              count = Some((sample.series_ref, sample.value));
            }
          },
          SeriesFamily::HistogramBucket(upper) => {
            buckets.push((sample.series_ref, upper, sample.value));
          },
          _ => {},
        }
      }
      if position > 0 {
        siblings.push(key);
      }
    }

    // Siblings are consumed regardless of the outcome so they keep nil output slots at their
    // own batch positions.
    for key in &siblings {
      self.consumed.insert(*key);
    }

    // Stale markers arrive as NaN across all constituents; drop the histogram at this
    // timestamp without perturbing reset state.
    if saw_nan {
      self.stats.skipped_nan.inc();
      return Ok((None, 0, tail));
    }

    let Some((count_ref, count_value)) = count else {
      log::debug!("histogram at {timestamp_ms} has no count constituent, dropping");
      self.stats.histogram_missing_count.inc();
      return Ok((None, 0, tail));
    };

    let started = self
      .series
      .reset_state(count_ref)
      .is_some_and(|reset| reset.started());
    if !started {
      // First observation of the histogram. Seed every constituent as the epoch baseline.
      for (series_ref, value) in constituents(sum, count_ref, count_value, &buckets) {
        if let Some(reset) = self.series.reset_state(series_ref) {
          reset.seed(timestamp_ms, value);
        }
      }
      self.stats.skipped_reset_seed.inc();
      return Ok((None, 0, tail));
    }

    let prev_count = self
      .series
      .reset_state(count_ref)
      .map_or(0.0, |reset| reset.last_value());

    let (start_ms, adjusted_count, count_delta, adjusted_sum, adjusted_buckets) =
      if count_value < prev_count {
        // The histogram as a whole reset; every constituent starts a new epoch from zero and
        // reports its raw value.
        for (series_ref, value) in constituents(sum, count_ref, count_value, &buckets) {
          if let Some(reset) = self.series.reset_state(series_ref) {
            reset.reset_to(timestamp_ms, value);
          }
        }
        let adjusted_buckets = buckets
          .iter()
          .map(|(_, upper, value)| BucketValue {
            upper: *upper,
            count: *value,
          })
          .collect();
        (
          timestamp_ms - 1,
          count_value,
          count_value,
          sum.map_or(0.0, |(_, value)| value),
          adjusted_buckets,
        )
      } else {
        let adjusted_sum = match sum {
          Some((series_ref, value)) => self
            .series
            .reset_state(series_ref)
            .map_or(0.0, |reset| reset.advance(timestamp_ms, value)),
          None => 0.0,
        };
        let adjusted_buckets = buckets
          .iter()
          .map(|(series_ref, upper, value)| BucketValue {
            upper: *upper,
            count: self
              .series
              .reset_state(*series_ref)
              .map_or(0.0, |reset| reset.advance(timestamp_ms, *value)),
          })
          .collect();
        let (start_ms, adjusted_count) = self
          .series
          .reset_state(count_ref)
          .map_or((timestamp_ms, count_value), |reset| {
            let adjusted = reset.advance(timestamp_ms, count_value);
            (reset.reset_timestamp_ms(), adjusted)
          });
        (
          start_ms,
          adjusted_count,
          count_value - prev_count,
          adjusted_sum,
          adjusted_buckets,
        )
      };

    if start_ms >= timestamp_ms {
      self.stats.skipped_invalid_interval.inc();
      return Ok((None, 0, tail));
    }
    if !self
      .series
      .update_sample_interval(identity_hash, start_ms, timestamp_ms)
    {
      self.stats.skipped_overlap.inc();
      return Ok((None, 0, tail));
    }
    if let Some(tracker) = self.series.counter_tracker(count_ref) {
      tracker.observe(count_delta, timestamp_ms);
    }

    let distribution = assemble_distribution(&DistributionInput {
      count: adjusted_count,
      sum: adjusted_sum,
      buckets: adjusted_buckets,
    });
    let mut series = base;
    series.points.push(gcm::point(
      Some(start_ms),
      timestamp_ms,
      Value::DistributionValue(distribution),
    ));
    self.stats.emitted.inc();
    Ok((Some(series), identity_hash, tail))
  }
}

// Flatten the gathered constituents into (series_ref, raw value) pairs for state updates.
fn constituents(
  sum: Option<(u64, f64)>,
  count_ref: u64,
  count_value: f64,
  buckets: &[(u64, f64, f64)],
) -> Vec<(u64, f64)> {
  let mut all = vec![(count_ref, count_value)];
  if let Some(pair) = sum {
    all.push(pair);
  }
  all.extend(buckets.iter().map(|(series_ref, _, value)| (*series_ref, *value)));
  all
}
