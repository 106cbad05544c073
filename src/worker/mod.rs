//! The offline worker: request interception, lifecycle, and sync.
//!
//! `Worker::handle` is the interception point: every outgoing request is
//! classified by the router and dispatched to one of three strategies, each
//! reading and writing its own cache namespace.

mod clients;
mod lifecycle;
mod router;
mod strategy;
mod sync;

pub use clients::{ClientHandle, ClientMessage, ClientRegistry};
pub use lifecycle::{LifecycleManager, LifecycleState};
pub use router::{classify, Strategy};
pub use sync::{SyncCoordinator, SyncFailure, SyncReport};

use color_eyre::Result;
use std::sync::Arc;

use crate::cache::{CacheClass, CacheNames, CacheStore};
use crate::net::{Fetch, FetchRequest, FetchResponse};
use crate::offline::ConnectivityState;

/// Request-handling facade over the store, the fetcher, and the strategies.
pub struct Worker<S, N> {
  store: Arc<S>,
  fetcher: Arc<N>,
  names: CacheNames,
  api_prefix: String,
  connectivity: ConnectivityState,
}

impl<S: CacheStore, N: Fetch> Worker<S, N> {
  pub fn new(
    store: Arc<S>,
    fetcher: Arc<N>,
    names: CacheNames,
    api_prefix: &str,
    connectivity: ConnectivityState,
  ) -> Self {
    Self {
      store,
      fetcher,
      names,
      api_prefix: api_prefix.to_string(),
      connectivity,
    }
  }

  /// Intercept one request: classify it and run the matching strategy.
  pub async fn handle(&self, req: &FetchRequest) -> Result<FetchResponse> {
    match classify(req, &self.api_prefix) {
      Strategy::Api => {
        strategy::api_network_first(
          self.store.as_ref(),
          self.fetcher.as_ref(),
          &self.connectivity,
          &self.names.name_of(CacheClass::Api),
          req,
        )
        .await
      }
      Strategy::Image => {
        strategy::image_cache_first(
          self.store.as_ref(),
          self.fetcher.as_ref(),
          &self.names.name_of(CacheClass::Image),
          req,
        )
        .await
      }
      Strategy::Static => {
        strategy::static_network_first(
          self.store.as_ref(),
          self.fetcher.as_ref(),
          &self.names.name_of(CacheClass::Static),
          req,
        )
        .await
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStore;
  use crate::net::MockFetch;
  use url::Url;

  fn worker(online: bool) -> (Worker<SqliteStore, MockFetch>, Arc<MockFetch>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let fetcher = Arc::new(MockFetch::new());
    let worker = Worker::new(
      Arc::clone(&store),
      Arc::clone(&fetcher),
      CacheNames::new("v1"),
      "/api/",
      ConnectivityState::new(online),
    );
    (worker, fetcher, store)
  }

  #[tokio::test]
  async fn test_handle_routes_to_the_right_namespace() {
    let (worker, fetcher, store) = worker(true);
    fetcher.respond(
      "https://vhc.example/api/jobs",
      FetchResponse::new(200, "OK", b"jobs".to_vec()),
    );
    fetcher.respond(
      "https://vhc.example/logo.png",
      FetchResponse::new(200, "OK", b"png".to_vec()),
    );

    let api = FetchRequest::get(Url::parse("https://vhc.example/api/jobs").unwrap());
    let image = FetchRequest::get(Url::parse("https://vhc.example/logo.png").unwrap());
    worker.handle(&api).await.unwrap();
    worker.handle(&image).await.unwrap();

    assert!(store.get("vhc-api-v1", &api.identity()).unwrap().is_some());
    assert!(store.get("vhc-images-v1", &image.identity()).unwrap().is_some());
  }

  #[tokio::test]
  async fn test_handle_serves_offline_static_fallback() {
    let (worker, fetcher, _store) = worker(false);
    fetcher.set_unreachable(true);

    let req = FetchRequest::get(Url::parse("https://vhc.example/").unwrap());
    let response = worker.handle(&req).await.unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(response.status_text, "Offline");
  }
}
