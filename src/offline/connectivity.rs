//! Observable connectivity state.
//!
//! A single shared state object replaces the ambient online/offline global:
//! components hold a clone, mutate it from connectivity events, and observe it
//! through a watch subscription. Dropping the receiver detaches the watcher,
//! so there are no dangling listeners.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Point-in-time view of the connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivitySnapshot {
  /// Whether the network is currently believed reachable.
  pub online: bool,
  /// Whether local persistent storage finished initializing.
  pub storage_ready: bool,
}

/// Shared connectivity state, cheap to clone.
#[derive(Clone)]
pub struct ConnectivityState {
  tx: Arc<watch::Sender<ConnectivitySnapshot>>,
}

impl ConnectivityState {
  pub fn new(online: bool) -> Self {
    let (tx, _rx) = watch::channel(ConnectivitySnapshot {
      online,
      storage_ready: false,
    });
    Self { tx: Arc::new(tx) }
  }

  /// Record a connectivity transition. Mutated only from platform
  /// online/offline signals (or the daemon's probe loop standing in for them).
  pub fn set_online(&self, online: bool) {
    self.tx.send_if_modified(|state| {
      if state.online == online {
        return false;
      }
      debug!(online, "connectivity changed");
      state.online = online;
      true
    });
  }

  /// Mark local persistent storage as initialized.
  pub fn mark_ready(&self) {
    self.tx.send_if_modified(|state| {
      if state.storage_ready {
        return false;
      }
      state.storage_ready = true;
      true
    });
  }

  pub fn is_online(&self) -> bool {
    self.tx.borrow().online
  }

  pub fn is_ready(&self) -> bool {
    self.tx.borrow().storage_ready
  }

  /// Subscribe to state changes. The subscription ends when the receiver is
  /// dropped.
  pub fn subscribe(&self) -> watch::Receiver<ConnectivitySnapshot> {
    self.tx.subscribe()
  }
}
