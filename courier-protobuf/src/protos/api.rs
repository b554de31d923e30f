// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

// Mirrors of google/api/metric.proto, google/api/monitored_resource.proto, and
// google/api/distribution.proto. Only the fields produced by the pipeline are carried; ranges
// and exemplars are omitted.

use std::collections::HashMap;

//
// MonitoredResource
//

/// An object representing a resource that can be used for monitoring, logging, billing, or
/// other purposes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MonitoredResource {
  #[prost(string, tag = "1")]
  pub r#type: ::prost::alloc::string::String,
  #[prost(map = "string, string", tag = "2")]
  pub labels: HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

//
// Metric
//

/// A specific metric, identified by specifying values for all of the labels of a
/// `MetricDescriptor`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metric {
  #[prost(string, tag = "3")]
  pub r#type: ::prost::alloc::string::String,
  #[prost(map = "string, string", tag = "2")]
  pub labels: HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

pub mod metric_descriptor {
  /// The kind of measurement. It describes how the data is reported.
  #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
  #[repr(i32)]
  pub enum MetricKind {
    Unspecified = 0,
    Gauge = 1,
    Delta = 2,
    Cumulative = 3,
  }

  /// The value type of a metric.
  #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
  #[repr(i32)]
  pub enum ValueType {
    Unspecified = 0,
    Bool = 1,
    Int64 = 2,
    Double = 3,
    String = 4,
    Distribution = 5,
    Money = 6,
  }
}

//
// Distribution
//

/// `Distribution` contains summary statistics for a population of values along with a histogram
/// over a set of buckets defined by `bucket_options`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Distribution {
  #[prost(int64, tag = "1")]
  pub count: i64,
  #[prost(double, tag = "2")]
  pub mean: f64,
  #[prost(double, tag = "3")]
  pub sum_of_squared_deviation: f64,
  #[prost(message, optional, tag = "6")]
  pub bucket_options: Option<distribution::BucketOptions>,
  #[prost(int64, repeated, tag = "7")]
  pub bucket_counts: ::prost::alloc::vec::Vec<i64>,
}

pub mod distribution {
  /// `BucketOptions` describes the bucket boundaries used to create a histogram.
  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct BucketOptions {
    #[prost(oneof = "bucket_options::Options", tags = "1, 2, 3")]
    pub options: Option<bucket_options::Options>,
  }

  pub mod bucket_options {
    /// Specifies a linear sequence of buckets that all have the same width.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Linear {
      #[prost(int32, tag = "1")]
      pub num_finite_buckets: i32,
      #[prost(double, tag = "2")]
      pub width: f64,
      #[prost(double, tag = "3")]
      pub offset: f64,
    }

    /// Specifies an exponential sequence of buckets that have a width proportional to the value
    /// of the lower bound.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Exponential {
      #[prost(int32, tag = "1")]
      pub num_finite_buckets: i32,
      #[prost(double, tag = "2")]
      pub growth_factor: f64,
      #[prost(double, tag = "3")]
      pub scale: f64,
    }

    /// Specifies a set of buckets with arbitrary upper bounds.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Explicit {
      #[prost(double, repeated, tag = "1")]
      pub bounds: ::prost::alloc::vec::Vec<f64>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Options {
      #[prost(message, tag = "1")]
      LinearBuckets(Linear),
      #[prost(message, tag = "2")]
      ExponentialBuckets(Exponential),
      #[prost(message, tag = "3")]
      ExplicitBuckets(Explicit),
    }
  }
}
