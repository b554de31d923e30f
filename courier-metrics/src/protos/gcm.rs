// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./gcm_test.rs"]
mod gcm_test;

use courier_protobuf::protos::api::metric_descriptor::ValueType;
use courier_protobuf::protos::monitoring::typed_value::Value;
use courier_protobuf::protos::monitoring::{Point, TimeInterval, TypedValue};
use prost_types::Timestamp;

// Convert a millisecond unix timestamp into the (seconds, nanos) wire representation. Division
// is euclidean so that pre-epoch timestamps borrow correctly instead of producing negative
// nanos.
#[must_use]
pub fn timestamp_from_ms(t_ms: i64) -> Timestamp {
  Timestamp {
    seconds: t_ms.div_euclid(1000),
    nanos: (t_ms.rem_euclid(1000) * 1_000_000) as i32,
  }
}

// Render a scalar sample with the series' value type. Integer value types truncate toward
// zero. Value types that have no scalar rendering return None and the sample is dropped.
#[must_use]
pub fn scalar_value(value_type: ValueType, value: f64) -> Option<Value> {
  match value_type {
    ValueType::Double => Some(Value::DoubleValue(value)),
    ValueType::Int64 => Some(Value::Int64Value(value as i64)),
    ValueType::Unspecified
    | ValueType::Bool
    | ValueType::String
    | ValueType::Distribution
    | ValueType::Money => None,
  }
}

// Build the single point of an output time series. Gauges carry no start time; cumulative
// points carry the reset timestamp.
#[must_use]
pub fn point(start_ms: Option<i64>, end_ms: i64, value: Value) -> Point {
  Point {
    interval: Some(TimeInterval {
      end_time: Some(timestamp_from_ms(end_ms)),
      start_time: start_ms.map(timestamp_from_ms),
    }),
    value: Some(TypedValue { value: Some(value) }),
  }
}
