//! Request and response types shared by the router, strategies, and client.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of resource a request is asking for.
///
/// Mirrors the destination hint a browsing context attaches to a request.
/// `Other` is the default when the caller has no hint; the router then falls
/// back to extension sniffing for images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ResourceKind {
  Document,
  Style,
  Script,
  Image,
  Font,
  Data,
  Other,
}

/// An outgoing request as seen by the worker.
#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub method: String,
  pub url: Url,
  pub kind: ResourceKind,
  pub body: Option<Vec<u8>>,
}

impl FetchRequest {
  /// Create a GET request with no resource hint.
  pub fn get(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
      kind: ResourceKind::Other,
      body: None,
    }
  }

  pub fn with_kind(mut self, kind: ResourceKind) -> Self {
    self.kind = kind;
    self
  }

  /// Normalized request identity used as the cache key: uppercased method
  /// plus the URL with any fragment stripped.
  pub fn identity(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    format!("{} {}", self.method.to_uppercase(), url)
  }
}

/// A response snapshot: everything the cache needs to replay it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl FetchResponse {
  pub fn new(status: u16, status_text: &str, body: Vec<u8>) -> Self {
    Self {
      status,
      status_text: status_text.to_string(),
      headers: Vec::new(),
      body,
    }
  }

  /// 2xx statuses count as success; only these are worth caching.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Synthesized response for a static asset that is unreachable and has no
  /// cached copy.
  pub fn offline() -> Self {
    Self::new(503, "Offline", b"Offline".to_vec())
  }

  /// Synthesized response for an image that is unreachable and has no cached
  /// copy. Image absence must never surface as an error to a renderer.
  pub fn missing() -> Self {
    Self::new(404, "Not Found", Vec::new())
  }
}
