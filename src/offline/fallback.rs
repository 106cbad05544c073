//! Offline-first wrapper for application reads and writes.
//!
//! Sits between the UI layer and the network: prefers live operations while
//! online, always mirrors results into local storage, and degrades to local
//! persistence plus a queued replay when the network is unavailable.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::connectivity::ConnectivityState;
use super::store::{OfflineStore, QueuedWrite};

/// Where the data in a fallback outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
  /// Live network result, mirrored locally.
  Network,
  /// Local mirror, served because the network path was unavailable.
  Local,
  /// Write completed offline: persisted locally and queued for replay.
  OfflineQueued,
}

/// Result of a fallback operation, tagged with its source.
#[derive(Debug, Clone)]
pub struct FallbackOutcome<T> {
  pub data: T,
  pub source: FallbackSource,
}

impl<T> FallbackOutcome<T> {
  fn from_network(data: T) -> Self {
    Self {
      data,
      source: FallbackSource::Network,
    }
  }

  fn from_local(data: T) -> Self {
    Self {
      data,
      source: FallbackSource::Local,
    }
  }

  fn offline_queued(data: T) -> Self {
    Self {
      data,
      source: FallbackSource::OfflineQueued,
    }
  }

  /// Whether this operation completed without reaching the network.
  pub fn is_offline(&self) -> bool {
    self.source == FallbackSource::OfflineQueued
  }
}

/// Offline-first helper wrapping reads and writes.
#[derive(Clone)]
pub struct OfflineFirst {
  connectivity: ConnectivityState,
  store: Arc<OfflineStore>,
}

impl OfflineFirst {
  pub fn new(connectivity: ConnectivityState, store: Arc<OfflineStore>) -> Self {
    Self {
      connectivity,
      store,
    }
  }

  fn ensure_ready(&self) -> Result<()> {
    if !self.connectivity.is_ready() {
      return Err(eyre!("Offline storage is not initialized"));
    }
    Ok(())
  }

  /// Save a value with offline fallback.
  ///
  /// Online: run the network write, mirror its result locally, return it. If
  /// the network write fails, persist the input locally, enqueue the replay
  /// (when one is given), and re-raise the original error; the caller decides
  /// whether the degraded write is acceptable.
  ///
  /// Offline: persist + enqueue unconditionally and return an
  /// offline-completed outcome instead of an error.
  pub async fn save<T, F, Fut>(
    &self,
    key: &str,
    value: &T,
    replay: Option<QueuedWrite>,
    network_op: F,
  ) -> Result<FallbackOutcome<T>>
  where
    T: Serialize + Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    self.ensure_ready()?;

    if !self.connectivity.is_online() {
      self.persist_and_queue(key, value, replay)?;
      debug!(key, "saved offline, queued for sync");
      return Ok(FallbackOutcome::offline_queued(value.clone()));
    }

    match network_op().await {
      Ok(fresh) => {
        // Mirror the authoritative result as a durability step.
        self.store.put_record(key, &serde_json::to_vec(&fresh)?)?;
        Ok(FallbackOutcome::from_network(fresh))
      }
      Err(err) => {
        warn!(key, error = %err, "online save failed, persisting locally");
        self.persist_and_queue(key, value, replay)?;
        Err(err)
      }
    }
  }

  /// Load a value with offline fallback.
  ///
  /// Online: fetch live, mirror locally, return. If the fetch fails, fall
  /// back to the local mirror; with no mirror the original error propagates.
  /// Offline: serve the local mirror or fail.
  pub async fn get<T, F, Fut>(&self, key: &str, network_op: F) -> Result<FallbackOutcome<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    self.ensure_ready()?;

    if !self.connectivity.is_online() {
      let data = self
        .store
        .get_record(key)?
        .ok_or_else(|| eyre!("No offline copy of {}", key))?;
      return Ok(FallbackOutcome::from_local(serde_json::from_slice(&data)?));
    }

    match network_op().await {
      Ok(fresh) => {
        self.store.put_record(key, &serde_json::to_vec(&fresh)?)?;
        Ok(FallbackOutcome::from_network(fresh))
      }
      Err(err) => match self.store.get_record(key)? {
        Some(data) => {
          warn!(key, error = %err, "live fetch failed, serving local mirror");
          Ok(FallbackOutcome::from_local(serde_json::from_slice(&data)?))
        }
        None => Err(err),
      },
    }
  }

  fn persist_and_queue<T: Serialize>(
    &self,
    key: &str,
    value: &T,
    replay: Option<QueuedWrite>,
  ) -> Result<()> {
    self.store.put_record(key, &serde_json::to_vec(value)?)?;
    if let Some(write) = replay {
      self.store.enqueue(&write)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn helper(online: bool, ready: bool) -> (OfflineFirst, Arc<OfflineStore>, ConnectivityState) {
    let connectivity = ConnectivityState::new(online);
    if ready {
      connectivity.mark_ready();
    }
    let store = Arc::new(OfflineStore::open_in_memory().unwrap());
    (
      OfflineFirst::new(connectivity.clone(), Arc::clone(&store)),
      store,
      connectivity,
    )
  }

  fn replay_write() -> QueuedWrite {
    QueuedWrite {
      method: "POST".to_string(),
      url: "/api/reports".to_string(),
      body: Some(b"{\"report\":1}".to_vec()),
    }
  }

  #[tokio::test]
  async fn test_save_fails_fast_before_initialization() {
    let (helper, _store, _conn) = helper(true, false);

    let result = helper
      .save("report:1", &"draft".to_string(), None, || async {
        Ok("fresh".to_string())
      })
      .await;

    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_offline_save_persists_queues_and_marks_offline() {
    let (helper, store, _conn) = helper(false, true);
    let calls = AtomicUsize::new(0);

    let outcome = helper
      .save("report:1", &"draft".to_string(), Some(replay_write()), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok("never".to_string()) }
      })
      .await
      .unwrap();

    // No network attempt, local persist, queued item, offline marker.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(outcome.is_offline());
    assert_eq!(outcome.data, "draft");
    assert_eq!(store.queue_len().unwrap(), 1);
    assert!(store.get_record("report:1").unwrap().is_some());
  }

  #[tokio::test]
  async fn test_online_save_mirrors_network_result() {
    let (helper, store, _conn) = helper(true, true);

    let outcome = helper
      .save("report:1", &"draft".to_string(), Some(replay_write()), || async {
        Ok("accepted".to_string())
      })
      .await
      .unwrap();

    assert_eq!(outcome.source, FallbackSource::Network);
    assert_eq!(outcome.data, "accepted");
    // Mirror holds the authoritative result, nothing queued.
    let mirrored: String =
      serde_json::from_slice(&store.get_record("report:1").unwrap().unwrap()).unwrap();
    assert_eq!(mirrored, "accepted");
    assert_eq!(store.queue_len().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_failed_online_save_degrades_and_reraises() {
    let (helper, store, _conn) = helper(true, true);

    let result = helper
      .save("report:1", &"draft".to_string(), Some(replay_write()), || async {
        Err::<String, _>(eyre!("server unreachable"))
      })
      .await;

    // Original error propagates, but the degraded write happened.
    assert!(result.is_err());
    assert_eq!(store.queue_len().unwrap(), 1);
    assert!(store.get_record("report:1").unwrap().is_some());
  }

  #[tokio::test]
  async fn test_offline_get_serves_local_mirror() {
    let (helper, store, _conn) = helper(false, true);
    store
      .put_record("job:9", &serde_json::to_vec(&"cached".to_string()).unwrap())
      .unwrap();

    let outcome = helper
      .get("job:9", || async { Ok("never".to_string()) })
      .await
      .unwrap();

    assert_eq!(outcome.source, FallbackSource::Local);
    assert_eq!(outcome.data, "cached");
  }

  #[tokio::test]
  async fn test_online_get_falls_back_to_mirror_on_failure() {
    let (helper, store, _conn) = helper(true, true);
    store
      .put_record("job:9", &serde_json::to_vec(&"cached".to_string()).unwrap())
      .unwrap();

    let outcome = helper
      .get("job:9", || async { Err::<String, _>(eyre!("timeout")) })
      .await
      .unwrap();

    assert_eq!(outcome.source, FallbackSource::Local);
  }
}
