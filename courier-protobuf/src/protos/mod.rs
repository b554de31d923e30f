// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

// Hand maintained prost mirrors of the subset of the googleapis definitions that appear on the
// produced wire format. Field numbers and types must match the upstream protos exactly:
// https://github.com/googleapis/googleapis/tree/master/google/api
// https://github.com/googleapis/googleapis/tree/master/google/monitoring/v3

pub mod api;
pub mod monitoring;
