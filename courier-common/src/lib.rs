// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod labels;
pub mod shutdown;
pub mod stats;

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  global_initialize();
}

// Process wide initialization. Safe to call multiple times, subsequent calls are no-ops.
pub fn global_initialize() {
  let _ignored = env_logger::builder().format_timestamp_millis().try_init();
}
