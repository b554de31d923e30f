// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod aggregator;
pub mod counter_aggregator;
pub mod identity;
pub mod resource_map;
pub mod sample_builder;
pub mod series_cache;

//
// RawSample
//

// A raw numeric sample from the write ahead log. The series reference is opaque and stable
// within a single log generation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawSample {
  pub series_ref: u64,
  pub timestamp_ms: i64,
  pub value: f64,
}

impl RawSample {
  #[must_use]
  pub const fn new(series_ref: u64, timestamp_ms: i64, value: f64) -> Self {
    Self {
      series_ref,
      timestamp_ms,
      value,
    }
  }
}

//
// BuildError
//

// Pipeline level failures. Per-sample drop decisions are not errors; a build error means the
// current batch head was not consumed and the caller may retry with the same batch.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
  #[error("pipeline cancelled")]
  Cancelled,
  #[error("target lookup failed: {0}")]
  TargetLookup(anyhow::Error),
  #[error("metadata lookup failed: {0}")]
  MetadataLookup(anyhow::Error),
}
