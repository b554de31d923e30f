// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

// Mirrors of google/monitoring/v3/common.proto and google/monitoring/v3/metric.proto.

use super::api::{Metric, MonitoredResource};

//
// TypedValue
//

/// A single strongly-typed value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypedValue {
  #[prost(oneof = "typed_value::Value", tags = "1, 2, 3, 4, 5")]
  pub value: Option<typed_value::Value>,
}

pub mod typed_value {
  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Value {
    #[prost(bool, tag = "1")]
    BoolValue(bool),
    #[prost(int64, tag = "2")]
    Int64Value(i64),
    #[prost(double, tag = "3")]
    DoubleValue(f64),
    #[prost(string, tag = "4")]
    StringValue(::prost::alloc::string::String),
    #[prost(message, tag = "5")]
    DistributionValue(super::super::api::Distribution),
  }
}

//
// TimeInterval
//

/// A time interval extending just after a start time through an end time. The start time must
/// not be later than the end time. A missing start time denotes a point in time.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TimeInterval {
  #[prost(message, optional, tag = "2")]
  pub end_time: Option<::prost_types::Timestamp>,
  #[prost(message, optional, tag = "1")]
  pub start_time: Option<::prost_types::Timestamp>,
}

//
// Point
//

/// A single data point in a time series.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Point {
  #[prost(message, optional, tag = "1")]
  pub interval: Option<TimeInterval>,
  #[prost(message, optional, tag = "2")]
  pub value: Option<TypedValue>,
}

//
// TimeSeries
//

/// A collection of data points that describes the time-varying values of a metric.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TimeSeries {
  #[prost(message, optional, tag = "1")]
  pub metric: Option<Metric>,
  #[prost(message, optional, tag = "2")]
  pub resource: Option<MonitoredResource>,
  #[prost(enumeration = "super::api::metric_descriptor::MetricKind", tag = "3")]
  pub metric_kind: i32,
  #[prost(enumeration = "super::api::metric_descriptor::ValueType", tag = "4")]
  pub value_type: i32,
  #[prost(message, repeated, tag = "5")]
  pub points: ::prost::alloc::vec::Vec<Point>,
}
