// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./aggregator_test.rs"]
mod aggregator_test;

use courier_protobuf::protos::api::distribution::bucket_options::{Explicit, Options};
use courier_protobuf::protos::api::distribution::BucketOptions;
use courier_protobuf::protos::api::Distribution;
use itertools::Itertools;

pub const SUM_SUFFIX: &str = "_sum";
pub const COUNT_SUFFIX: &str = "_count";
pub const BUCKET_SUFFIX: &str = "_bucket";
pub const TOTAL_SUFFIX: &str = "_total";

//
// SeriesFamily
//

// How a single low-level series participates in the output stream. Scalar families emit one
// output series per input series; histogram parts are joined into a single distribution series
// keyed on the base metric name.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SeriesFamily {
  GaugeScalar,
  CounterScalar,
  SummarySum,
  SummaryCount,
  SummaryQuantile,
  HistogramSum,
  HistogramCount,
  HistogramBucket(f64),
  // A self-standing metric whose name happens to extend a histogram's base name with an
  // unrecognized suffix. Behaves exactly like a gauge scalar.
  HistogramGaugeSibling,
}

impl SeriesFamily {
  #[must_use]
  pub const fn is_histogram_part(&self) -> bool {
    matches!(
      self,
      Self::HistogramSum | Self::HistogramCount | Self::HistogramBucket(_)
    )
  }
}

// Split a metric name into (base, suffix) when the suffix denotes a compound family
// constituent.
#[must_use]
pub fn strip_compound_suffix(name: &str) -> Option<(&str, &str)> {
  for suffix in [BUCKET_SUFFIX, SUM_SUFFIX, COUNT_SUFFIX] {
    if let Some(base) = name.strip_suffix(suffix) {
      if !base.is_empty() {
        return Some((base, suffix));
      }
    }
  }
  None
}

// Parse a bucket upper bound. The text exposition format spells infinity as "+Inf", which the
// float parser accepts directly.
#[must_use]
pub fn parse_bucket_bound(value: &str) -> Option<f64> {
  value.parse::<f64>().ok().filter(|bound| !bound.is_nan())
}

//
// BucketValue
//

// One reset-adjusted cumulative bucket observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketValue {
  pub upper: f64,
  pub count: f64,
}

//
// DistributionInput
//

// The reset-adjusted constituents of one histogram at one timestamp. Bucket counts are
// cumulative in the Prometheus style; ordering is arbitrary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistributionInput {
  pub count: f64,
  pub sum: f64,
  pub buckets: Vec<BucketValue>,
}

// Assemble a distribution value from scattered cumulative buckets: sort by upper bound, strip
// the +Inf bound from the explicit bounds list, and convert cumulative counts into per-bucket
// counts. The +Inf bucket count always equals the total count; an absent explicit +Inf bucket
// is synthesized. Histograms with no buckets at all produce empty bounds and counts.
#[must_use]
pub fn assemble_distribution(input: &DistributionInput) -> Distribution {
  let mut buckets: Vec<BucketValue> = input
    .buckets
    .iter()
    .copied()
    .sorted_by(|a, b| a.upper.total_cmp(&b.upper))
    .collect();

  if !buckets.is_empty() {
    if buckets.last().is_some_and(|last| last.upper.is_infinite()) {
      if let Some(last) = buckets.last_mut() {
        last.count = input.count;
      }
    } else {
      buckets.push(BucketValue {
        upper: f64::INFINITY,
        count: input.count,
      });
    }
  }

  let mean = if input.count == 0.0 {
    0.0
  } else {
    input.sum / input.count
  };

  let mut bounds = vec![];
  let mut bucket_counts = vec![];
  let mut sum_of_squared_deviation = 0.0;
  let mut prev_bound = 0.0;
  let mut prev_count = 0.0;
  for bucket in &buckets {
    let delta = bucket.count - prev_count;
    // In the absence of the underlying sample distribution, each bucket's population sits at
    // the bucket midpoint; the +Inf bucket collapses onto its lower bound.
    let midpoint = if bucket.upper.is_infinite() {
      prev_bound
    } else {
      (prev_bound + bucket.upper) / 2.0
    };
    sum_of_squared_deviation += delta * (midpoint - mean) * (midpoint - mean);
    bucket_counts.push(delta as i64);
    if bucket.upper.is_finite() {
      bounds.push(bucket.upper);
      prev_bound = bucket.upper;
    }
    prev_count = bucket.count;
  }

  Distribution {
    count: input.count as i64,
    mean,
    sum_of_squared_deviation,
    bucket_options: Some(BucketOptions {
      options: Some(Options::ExplicitBuckets(Explicit { bounds })),
    }),
    bucket_counts,
  }
}
