//! The outbound fetch abstraction and its reqwest-backed implementation.

use std::future::Future;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};

use super::types::{FetchRequest, FetchResponse};

/// Abstraction over the live network.
///
/// Strategies, the lifecycle manager, and the sync coordinator all go through
/// this trait so tests can inject scripted fetchers.
pub trait Fetch: Send + Sync {
  fn fetch(&self, req: &FetchRequest) -> impl Future<Output = Result<FetchResponse>> + Send;
}

/// Real HTTP client backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("roadside/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Fetch for HttpFetcher {
  fn fetch(&self, req: &FetchRequest) -> impl Future<Output = Result<FetchResponse>> + Send {
    async move {
      let method = reqwest::Method::from_bytes(req.method.as_bytes())
        .map_err(|e| eyre!("Invalid HTTP method '{}': {}", req.method, e))?;

      let mut builder = self.client.request(method, req.url.clone());
      if let Some(body) = &req.body {
        builder = builder.body(body.clone());
      }

      let response = builder
        .send()
        .await
        .map_err(|e| eyre!("Request to {} failed: {}", req.url, e))?;

      let status = response.status();
      let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
          value
            .to_str()
            .ok()
            .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

      let body = response
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read response body from {}: {}", req.url, e))?
        .to_vec();

      Ok(FetchResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
      })
    }
  }
}

#[cfg(test)]
pub(crate) mod mock {
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use std::sync::Mutex;

  use super::*;

  /// Scripted fetcher for tests: serves canned responses per URL and counts
  /// every call. Unmapped URLs behave like a connection failure.
  pub struct MockFetch {
    responses: Mutex<HashMap<String, FetchResponse>>,
    calls: AtomicUsize,
    fail_all: AtomicBool,
  }

  impl MockFetch {
    pub fn new() -> Self {
      Self {
        responses: Mutex::new(HashMap::new()),
        calls: AtomicUsize::new(0),
        fail_all: AtomicBool::new(false),
      }
    }

    /// Script a response for an exact URL.
    pub fn respond(&self, url: &str, response: FetchResponse) {
      self
        .responses
        .lock()
        .unwrap()
        .insert(url.to_string(), response);
    }

    /// Make every subsequent fetch fail, as if the network dropped.
    pub fn set_unreachable(&self, unreachable: bool) {
      self.fail_all.store(unreachable, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  impl Fetch for MockFetch {
    fn fetch(&self, req: &FetchRequest) -> impl Future<Output = Result<FetchResponse>> + Send {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let result = if self.fail_all.load(Ordering::SeqCst) {
        Err(eyre!("connection refused: {}", req.url))
      } else {
        match self.responses.lock().unwrap().get(req.url.as_str()) {
          Some(response) => Ok(response.clone()),
          None => Err(eyre!("no route to {}", req.url)),
        }
      };
      async move { result }
    }
  }
}
