//! Connectivity signal.
//!
//! The host environment (browser shell, OS network monitor, health prober)
//! publishes online/offline transitions here; the cache service subscribes
//! and drains its queue on the offline-to-online edge.

use tokio::sync::watch;

/// Broadcast source for the online/offline flag.
pub struct ConnectivityWatcher {
  tx: watch::Sender<bool>,
}

impl ConnectivityWatcher {
  pub fn new(initially_online: bool) -> Self {
    let (tx, _) = watch::channel(initially_online);
    Self { tx }
  }

  /// Subscribe to transitions. The receiver always holds the latest value.
  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.tx.subscribe()
  }

  pub fn set_online(&self) {
    // send_if_modified suppresses duplicate notifications for repeated
    // online events from the platform
    self.tx.send_if_modified(|online| {
      let changed = !*online;
      *online = true;
      changed
    });
  }

  pub fn set_offline(&self) {
    self.tx.send_if_modified(|online| {
      let changed = *online;
      *online = false;
      changed
    });
  }

  pub fn is_online(&self) -> bool {
    *self.tx.borrow()
  }
}

impl Default for ConnectivityWatcher {
  fn default() -> Self {
    Self::new(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_transitions_are_observed() {
    let watcher = ConnectivityWatcher::new(true);
    let mut rx = watcher.subscribe();

    watcher.set_offline();
    rx.changed().await.unwrap();
    assert!(!*rx.borrow());

    watcher.set_online();
    rx.changed().await.unwrap();
    assert!(*rx.borrow());
  }

  #[test]
  fn test_duplicate_events_do_not_notify() {
    let watcher = ConnectivityWatcher::new(true);
    let rx = watcher.subscribe();

    watcher.set_online();
    assert!(!rx.has_changed().unwrap());
    assert!(watcher.is_online());
  }
}
