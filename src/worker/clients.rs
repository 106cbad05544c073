//! Registry of open clients and the broadcast channel to them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Messages broadcast to clients. Tag only, no payload; consumed by the UI
/// side purely for logging and status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
  SyncStarted,
  SyncComplete,
}

/// Receiving side handed to a client on registration.
pub struct ClientHandle {
  pub id: u64,
  rx: mpsc::UnboundedReceiver<ClientMessage>,
}

impl ClientHandle {
  /// Next broadcast message, or `None` once the worker side is gone.
  pub async fn next(&mut self) -> Option<ClientMessage> {
    self.rx.recv().await
  }

  /// Non-blocking variant for polling in a render loop.
  #[allow(dead_code)]
  pub fn try_next(&mut self) -> Option<ClientMessage> {
    self.rx.try_recv().ok()
  }
}

struct RegisteredClient {
  id: u64,
  controlled: bool,
  tx: mpsc::UnboundedSender<ClientMessage>,
}

/// Tracks every open client connection.
#[derive(Default)]
pub struct ClientRegistry {
  clients: Mutex<Vec<RegisteredClient>>,
  next_id: AtomicU64,
}

impl ClientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  // Poisoning only happens after a panic elsewhere; the registry state is
  // still coherent, so recover the lock instead of propagating.
  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RegisteredClient>> {
    self.clients.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Register a client and hand back its message channel.
  pub fn register(&self) -> ClientHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);

    self.lock().push(RegisteredClient {
      id,
      controlled: false,
      tx,
    });

    ClientHandle { id, rx }
  }

  pub fn unregister(&self, id: u64) {
    self.lock().retain(|client| client.id != id);
  }

  /// Takeover: mark every open client as controlled by the current worker
  /// generation, without requiring re-registration.
  pub fn claim_all(&self) {
    let mut clients = self.lock();
    for client in clients.iter_mut() {
      client.controlled = true;
    }
    debug!(clients = clients.len(), "claimed all clients");
  }

  /// Send a message to every open client, pruning closed channels.
  pub fn broadcast(&self, message: ClientMessage) {
    self.lock().retain(|client| client.tx.send(message).is_ok());
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn controlled_count(&self) -> usize {
    self
      .lock()
      .iter()
      .filter(|client| client.controlled)
      .count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_broadcast_reaches_every_client() {
    let registry = ClientRegistry::new();
    let mut first = registry.register();
    let mut second = registry.register();

    registry.broadcast(ClientMessage::SyncStarted);

    assert_eq!(first.next().await, Some(ClientMessage::SyncStarted));
    assert_eq!(second.next().await, Some(ClientMessage::SyncStarted));
  }

  #[test]
  fn test_dropped_clients_are_pruned_on_broadcast() {
    let registry = ClientRegistry::new();
    let first = registry.register();
    let _second = registry.register();

    drop(first);
    registry.broadcast(ClientMessage::SyncComplete);

    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn test_claim_all_marks_every_client() {
    let registry = ClientRegistry::new();
    let _a = registry.register();
    let _b = registry.register();
    assert_eq!(registry.controlled_count(), 0);

    registry.claim_all();
    assert_eq!(registry.controlled_count(), 2);
  }

  #[test]
  fn test_unregister_removes_client() {
    let registry = ClientRegistry::new();
    let handle = registry.register();
    let _other = registry.register();

    registry.unregister(handle.id);
    assert_eq!(registry.len(), 1);
  }
}
