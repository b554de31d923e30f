// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::{
  BucketValue,
  DistributionInput,
  assemble_distribution,
  parse_bucket_bound,
  strip_compound_suffix,
};
use courier_protobuf::protos::api::distribution::bucket_options::Options;

fn bounds_of(distribution: &courier_protobuf::protos::api::Distribution) -> Vec<f64> {
  match distribution
    .bucket_options
    .as_ref()
    .unwrap()
    .options
    .as_ref()
    .unwrap()
  {
    Options::ExplicitBuckets(explicit) => explicit.bounds.clone(),
    Options::LinearBuckets(_) | Options::ExponentialBuckets(_) => unreachable!(),
  }
}

#[test]
fn compound_suffixes() {
  assert_eq!(Some(("metric1", "_sum")), strip_compound_suffix("metric1_sum"));
  assert_eq!(
    Some(("metric1", "_count")),
    strip_compound_suffix("metric1_count")
  );
  assert_eq!(
    Some(("metric1", "_bucket")),
    strip_compound_suffix("metric1_bucket")
  );
  assert_eq!(None, strip_compound_suffix("metric1_total"));
  assert_eq!(None, strip_compound_suffix("metric1"));
  // A bare suffix is not a compound name.
  assert_eq!(None, strip_compound_suffix("_sum"));
}

#[test]
fn bucket_bounds() {
  assert_eq!(Some(0.5), parse_bucket_bound("0.5"));
  assert_eq!(Some(f64::INFINITY), parse_bucket_bound("+Inf"));
  assert_eq!(None, parse_bucket_bound("abc"));
  assert_eq!(None, parse_bucket_bound("NaN"));
}

// Bounds [0.1, 0.5, 1, 2.5, +Inf] with cumulative counts [2, 4, 5, 7, 11], a total count of 11
// and a sum of 68.3.
#[test]
fn distribution_reconstruction() {
  let input = DistributionInput {
    count: 11.0,
    sum: 68.3,
    // Deliberately out of order to exercise sorting.
    buckets: vec![
      BucketValue {
        upper: 1.0,
        count: 5.0,
      },
      BucketValue {
        upper: 0.1,
        count: 2.0,
      },
      BucketValue {
        upper: f64::INFINITY,
        count: 11.0,
      },
      BucketValue {
        upper: 2.5,
        count: 7.0,
      },
      BucketValue {
        upper: 0.5,
        count: 4.0,
      },
    ],
  };

  let distribution = assemble_distribution(&input);
  assert_eq!(11, distribution.count);
  assert!((distribution.mean - 6.209_090_909_090_91).abs() < 1e-12);
  assert!((distribution.sum_of_squared_deviation - 270.301_590_909_091).abs() < 1e-9);
  assert_eq!(vec![0.1, 0.5, 1.0, 2.5], bounds_of(&distribution));
  assert_eq!(vec![2, 2, 1, 2, 4], distribution.bucket_counts);
}

#[test]
fn synthesized_inf_bucket() {
  let input = DistributionInput {
    count: 10.0,
    sum: 10.0,
    buckets: vec![
      BucketValue {
        upper: 1.0,
        count: 4.0,
      },
      BucketValue {
        upper: 2.0,
        count: 7.0,
      },
    ],
  };

  let distribution = assemble_distribution(&input);
  assert_eq!(vec![1.0, 2.0], bounds_of(&distribution));
  // The +Inf bucket holds the remainder up to the total count.
  assert_eq!(vec![4, 3, 3], distribution.bucket_counts);
}

#[test]
fn explicit_inf_bucket_defers_to_count() {
  let input = DistributionInput {
    count: 9.0,
    sum: 9.0,
    buckets: vec![
      BucketValue {
        upper: 1.0,
        count: 4.0,
      },
      // Stale +Inf observation; the count series is authoritative.
      BucketValue {
        upper: f64::INFINITY,
        count: 8.0,
      },
    ],
  };

  let distribution = assemble_distribution(&input);
  assert_eq!(vec![4, 5], distribution.bucket_counts);
}

#[test]
fn no_buckets() {
  let input = DistributionInput {
    count: 3.0,
    sum: 15.0,
    buckets: vec![],
  };

  let distribution = assemble_distribution(&input);
  assert_eq!(3, distribution.count);
  assert_eq!(5.0, distribution.mean);
  assert_eq!(0.0, distribution.sum_of_squared_deviation);
  assert!(bounds_of(&distribution).is_empty());
  assert!(distribution.bucket_counts.is_empty());
}

#[test]
fn zero_count() {
  let input = DistributionInput {
    count: 0.0,
    sum: 0.0,
    buckets: vec![],
  };

  let distribution = assemble_distribution(&input);
  assert_eq!(0, distribution.count);
  assert_eq!(0.0, distribution.mean);
}
