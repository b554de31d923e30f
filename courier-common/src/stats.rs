// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./stats_test.rs"]
mod stats_test;

use prometheus::{IntCounter, IntGauge, Registry};

//
// Collector
//

// Top level owner of the self-stats registry. Components receive a Scope and never touch the
// registry directly.
#[derive(Clone, Default)]
pub struct Collector {
  registry: Registry,
}

impl Collector {
  #[must_use]
  pub fn scope(&self, name: &str) -> Scope {
    Scope {
      registry: self.registry.clone(),
      prefix: name.to_string(),
    }
  }

  #[must_use]
  pub const fn registry(&self) -> &Registry {
    &self.registry
  }
}

//
// Scope
//

// A named stats scope. Nested scopes concatenate their names so that every stat carries its
// component path.
#[derive(Clone)]
pub struct Scope {
  registry: Registry,
  prefix: String,
}

impl Scope {
  #[must_use]
  pub fn scope(&self, name: &str) -> Self {
    Self {
      registry: self.registry.clone(),
      prefix: format!("{}_{name}", self.prefix),
    }
  }

  fn full_name(&self, name: &str) -> String {
    format!("{}_{name}", self.prefix)
  }

  #[must_use]
  pub fn counter(&self, name: &str) -> IntCounter {
    let counter = IntCounter::new(self.full_name(name), name.to_string()).unwrap();
    // Registration can only fail on a duplicate name, in which case the unregistered stat still
    // counts, it just won't be exported twice.
    let _ignored = self.registry.register(Box::new(counter.clone()));
    counter
  }

  #[must_use]
  pub fn gauge(&self, name: &str) -> IntGauge {
    let gauge = IntGauge::new(self.full_name(name), name.to_string()).unwrap();
    let _ignored = self.registry.register(Box::new(gauge.clone()));
    gauge
  }
}
