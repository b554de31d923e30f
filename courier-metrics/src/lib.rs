// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod config;
pub mod metadata;
pub mod pipeline;
pub mod protos;
pub mod targets;
#[cfg(test)]
pub mod test;

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  courier_common::global_initialize();
}
