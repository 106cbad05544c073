//! The three fetch strategies.
//!
//! Each is a pure async function over the cache store, the fetcher, and (for
//! API requests) the connectivity state, so they are unit-testable without a
//! live network. Within one invocation the cache write always completes
//! before the response is returned.

use color_eyre::Result;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::net::{Fetch, FetchRequest, FetchResponse};
use crate::offline::ConnectivityState;

/// Network-first for API requests.
///
/// Successful responses are snapshotted before being returned. On a transport
/// error the cached copy is served only under confirmed offline; if the
/// connectivity state still claims online the failure is ambiguous (likely a
/// server-side problem) and the original error is re-raised rather than
/// masked with stale data.
pub async fn api_network_first<S: CacheStore, N: Fetch>(
  store: &S,
  fetcher: &N,
  connectivity: &ConnectivityState,
  namespace: &str,
  req: &FetchRequest,
) -> Result<FetchResponse> {
  match fetcher.fetch(req).await {
    Ok(response) => {
      if response.is_success() {
        store.put(namespace, &req.identity(), &response)?;
      }
      Ok(response)
    }
    Err(err) => {
      if !connectivity.is_online() {
        if let Some(cached) = store.get(namespace, &req.identity())? {
          debug!(
            url = %req.url,
            captured_at = %cached.captured_at,
            "offline, serving cached API response"
          );
          return Ok(cached.response);
        }
      }
      Err(err)
    }
  }
}

/// Cache-first for images.
///
/// A hit returns immediately with no network roundtrip. A miss fetches and
/// stores; an unreachable image with no cached copy synthesizes a 404 so a
/// rendering surface never sees an error.
pub async fn image_cache_first<S: CacheStore, N: Fetch>(
  store: &S,
  fetcher: &N,
  namespace: &str,
  req: &FetchRequest,
) -> Result<FetchResponse> {
  if let Some(cached) = store.get(namespace, &req.identity())? {
    return Ok(cached.response);
  }

  match fetcher.fetch(req).await {
    Ok(response) => {
      if response.is_success() {
        store.put(namespace, &req.identity(), &response)?;
      }
      Ok(response)
    }
    Err(err) => {
      warn!(url = %req.url, error = %err, "image unreachable and not cached");
      Ok(FetchResponse::missing())
    }
  }
}

/// Network-first for static assets, with the cache as backup.
///
/// Assets self-update whenever a network path exists; fully offline the app
/// still boots from cache, and with no cached copy either a fixed
/// 503/"Offline" response surfaces.
pub async fn static_network_first<S: CacheStore, N: Fetch>(
  store: &S,
  fetcher: &N,
  namespace: &str,
  req: &FetchRequest,
) -> Result<FetchResponse> {
  match fetcher.fetch(req).await {
    Ok(response) => {
      if response.is_success() {
        store.put(namespace, &req.identity(), &response)?;
      }
      Ok(response)
    }
    Err(err) => match store.get(namespace, &req.identity())? {
      Some(cached) => {
        debug!(
          url = %req.url,
          captured_at = %cached.captured_at,
          "network down, serving cached static asset"
        );
        Ok(cached.response)
      }
      None => {
        warn!(url = %req.url, error = %err, "static asset unreachable and not cached");
        Ok(FetchResponse::offline())
      }
    },
  }
}
