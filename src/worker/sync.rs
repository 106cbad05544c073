//! Sync coordinator: drains the pending queue and broadcasts progress.

use color_eyre::{eyre::eyre, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::net::{Fetch, FetchRequest, ResourceKind};
use crate::offline::{OfflineStore, PendingSyncItem};

use super::clients::{ClientMessage, ClientRegistry};

/// A queue item that failed to replay, with its cause. Kept explicit so
/// callers and tests can see failures instead of a silent catch.
#[derive(Debug)]
pub struct SyncFailure {
  pub item: PendingSyncItem,
  pub cause: String,
}

/// Outcome of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
  pub replayed: usize,
  pub failures: Vec<SyncFailure>,
}

impl SyncReport {
  pub fn is_clean(&self) -> bool {
    self.failures.is_empty()
  }
}

/// Replays queued writes against the live API when triggered, and keeps every
/// open client informed.
///
/// Failed items stay queued; the next connectivity-restored trigger retries
/// them. There is deliberately no internal retry loop.
pub struct SyncCoordinator<N> {
  fetcher: Arc<N>,
  store: Arc<OfflineStore>,
  registry: Arc<ClientRegistry>,
  base: Url,
  task_name: String,
  registered: AtomicBool,
}

impl<N: Fetch> SyncCoordinator<N> {
  pub fn new(
    fetcher: Arc<N>,
    store: Arc<OfflineStore>,
    registry: Arc<ClientRegistry>,
    base: Url,
    task_name: &str,
  ) -> Self {
    Self {
      fetcher,
      store,
      registry,
      base,
      task_name: task_name.to_string(),
      registered: AtomicBool::new(false),
    }
  }

  /// Register the background sync task, typically on a connectivity-restored
  /// event. Dispatching the task later runs the sync pass.
  pub fn register(&self) {
    self.registered.store(true, Ordering::SeqCst);
    debug!(task = %self.task_name, "background sync task registered");
  }

  /// Dispatch a named sync task. The name must match the registered task
  /// exactly; the platform may dispatch directly without prior registration.
  pub async fn dispatch(&self, task: &str) -> Result<SyncReport> {
    if task != self.task_name {
      return Err(eyre!("Unknown sync task '{}'", task));
    }
    let was_registered = self.registered.swap(false, Ordering::SeqCst);
    debug!(task, was_registered, "sync task dispatched");
    Ok(self.run().await)
  }

  /// One full sync pass: notify clients, replay the queue, notify again.
  ///
  /// `SyncComplete` goes out regardless of replay outcome so no client waits
  /// forever on a completion signal.
  pub async fn run(&self) -> SyncReport {
    self.registry.broadcast(ClientMessage::SyncStarted);

    let report = self.replay_queue().await;
    for failure in &report.failures {
      warn!(
        id = failure.item.id,
        url = %failure.item.url,
        queued_at = %failure.item.queued_at,
        cause = %failure.cause,
        "replay failed, item stays queued"
      );
    }
    info!(
      replayed = report.replayed,
      failed = report.failures.len(),
      "sync pass finished"
    );

    self.registry.broadcast(ClientMessage::SyncComplete);
    report
  }

  /// Drain the queue in FIFO order. Items are removed only after confirmed
  /// replay; failures are collected, never raised.
  async fn replay_queue(&self) -> SyncReport {
    let mut report = SyncReport::default();

    let items = match self.store.pending() {
      Ok(items) => items,
      Err(err) => {
        warn!(error = %err, "could not read pending queue");
        return report;
      }
    };

    for item in items {
      match self.replay_item(&item).await {
        Ok(()) => match self.store.remove(item.id) {
          Ok(()) => report.replayed += 1,
          Err(err) => report.failures.push(SyncFailure {
            item,
            cause: format!("replayed but not dequeued: {}", err),
          }),
        },
        Err(err) => report.failures.push(SyncFailure {
          item,
          cause: err.to_string(),
        }),
      }
    }

    report
  }

  async fn replay_item(&self, item: &PendingSyncItem) -> Result<()> {
    // Queued URLs are usually app-relative paths.
    let url = match Url::parse(&item.url) {
      Ok(absolute) => absolute,
      Err(_) => self
        .base
        .join(&item.url)
        .map_err(|e| eyre!("Invalid queued URL '{}': {}", item.url, e))?,
    };

    let req = FetchRequest {
      method: item.method.clone(),
      url,
      kind: ResourceKind::Data,
      body: item.body.clone(),
    };

    let response = self.fetcher.fetch(&req).await?;
    if !response.is_success() {
      return Err(eyre!("Replay returned status {}", response.status));
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::{FetchResponse, MockFetch};
  use crate::offline::QueuedWrite;

  const TASK: &str = "sync-inspections";

  fn setup() -> (Arc<MockFetch>, Arc<OfflineStore>, Arc<ClientRegistry>) {
    (
      Arc::new(MockFetch::new()),
      Arc::new(OfflineStore::open_in_memory().unwrap()),
      Arc::new(ClientRegistry::new()),
    )
  }

  fn coordinator(
    fetcher: &Arc<MockFetch>,
    store: &Arc<OfflineStore>,
    registry: &Arc<ClientRegistry>,
  ) -> SyncCoordinator<MockFetch> {
    SyncCoordinator::new(
      Arc::clone(fetcher),
      Arc::clone(store),
      Arc::clone(registry),
      Url::parse("https://vhc.example/").unwrap(),
      TASK,
    )
  }

  fn queued(url: &str) -> QueuedWrite {
    QueuedWrite {
      method: "POST".to_string(),
      url: url.to_string(),
      body: Some(b"{}".to_vec()),
    }
  }

  #[tokio::test]
  async fn test_dispatch_rejects_unknown_task_name() {
    let (fetcher, store, registry) = setup();
    let coordinator = coordinator(&fetcher, &store, &registry);

    assert!(coordinator.dispatch("some-other-task").await.is_err());
    // No broadcast happened for the rejected task.
    let mut client = registry.register();
    assert!(client.try_next().is_none());
  }

  #[tokio::test]
  async fn test_replay_drains_queue_fifo_and_dequeues() {
    let (fetcher, store, registry) = setup();
    store.enqueue(&queued("/api/reports/1")).unwrap();
    store.enqueue(&queued("/api/reports/2")).unwrap();
    fetcher.respond(
      "https://vhc.example/api/reports/1",
      FetchResponse::new(201, "Created", Vec::new()),
    );
    fetcher.respond(
      "https://vhc.example/api/reports/2",
      FetchResponse::new(201, "Created", Vec::new()),
    );

    let report = coordinator(&fetcher, &store, &registry)
      .dispatch(TASK)
      .await
      .unwrap();

    assert_eq!(report.replayed, 2);
    assert!(report.is_clean());
    assert_eq!(store.queue_len().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_failed_items_stay_queued_with_cause() {
    let (fetcher, store, registry) = setup();
    store.enqueue(&queued("/api/reports/1")).unwrap();
    store.enqueue(&queued("/api/reports/2")).unwrap();
    // Only the second item has a live route.
    fetcher.respond(
      "https://vhc.example/api/reports/2",
      FetchResponse::new(201, "Created", Vec::new()),
    );

    let report = coordinator(&fetcher, &store, &registry)
      .dispatch(TASK)
      .await
      .unwrap();

    assert_eq!(report.replayed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item.url, "/api/reports/1");
    assert_eq!(store.queue_len().unwrap(), 1);
  }

  #[tokio::test]
  async fn test_clients_get_started_then_complete_even_when_replay_fails() {
    let (fetcher, store, registry) = setup();
    let mut first = registry.register();
    let mut second = registry.register();
    store.enqueue(&queued("/api/reports/1")).unwrap();
    fetcher.set_unreachable(true);

    let report = coordinator(&fetcher, &store, &registry)
      .dispatch(TASK)
      .await
      .unwrap();
    assert!(!report.is_clean());

    for client in [&mut first, &mut second] {
      assert_eq!(client.next().await, Some(ClientMessage::SyncStarted));
      assert_eq!(client.next().await, Some(ClientMessage::SyncComplete));
    }
  }

  #[tokio::test]
  async fn test_non_success_replay_counts_as_failure() {
    let (fetcher, store, registry) = setup();
    store.enqueue(&queued("/api/reports/1")).unwrap();
    fetcher.respond(
      "https://vhc.example/api/reports/1",
      FetchResponse::new(409, "Conflict", Vec::new()),
    );

    let report = coordinator(&fetcher, &store, &registry)
      .dispatch(TASK)
      .await
      .unwrap();

    assert_eq!(report.replayed, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(store.queue_len().unwrap(), 1);
  }
}
