// courier - bitdrift's Prometheus to Cloud Monitoring forwarder
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./shutdown_test.rs"]
mod shutdown_test;

use tokio::sync::watch;

//
// ShutdownTrigger
//

// Owner side of a shutdown signal. Dropping the trigger also cancels all associated signals so
// that components cannot outlive their owner.
pub struct ShutdownTrigger {
  tx: watch::Sender<bool>,
}

impl Default for ShutdownTrigger {
  fn default() -> Self {
    let (tx, _) = watch::channel(false);
    Self { tx }
  }
}

impl ShutdownTrigger {
  #[must_use]
  pub fn signal(&self) -> ShutdownSignal {
    ShutdownSignal {
      rx: self.tx.subscribe(),
    }
  }

  pub fn shutdown(&self) {
    let _ignored = self.tx.send(true);
  }
}

//
// ShutdownSignal
//

// Receiver side of a shutdown signal, carried alongside each unit of work so that blocking
// operations can be raced against cancellation.
#[derive(Clone)]
pub struct ShutdownSignal {
  rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    *self.rx.borrow()
  }

  pub async fn cancelled(&self) {
    let mut rx = self.rx.clone();
    loop {
      if *rx.borrow_and_update() {
        return;
      }
      if rx.changed().await.is_err() {
        return;
      }
    }
  }
}
