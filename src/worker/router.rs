//! Pure request classification.

use crate::net::{FetchRequest, ResourceKind};

/// The three handling strategies a request can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Network-first with cache fallback under confirmed offline.
  Api,
  /// Cache-first; images are immutable enough that staleness is acceptable.
  Image,
  /// Network-first with the cache as a boot-from-offline backup.
  Static,
}

/// Extensions treated as images when the caller gave no resource hint.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"];

/// Classify a request into exactly one strategy.
///
/// API prefix wins over resource kind; everything unrecognized is static, so
/// classification never fails.
pub fn classify(req: &FetchRequest, api_prefix: &str) -> Strategy {
  if req.url.path().starts_with(api_prefix) {
    return Strategy::Api;
  }

  if req.kind == ResourceKind::Image || has_image_extension(req.url.path()) {
    return Strategy::Image;
  }

  Strategy::Static
}

fn has_image_extension(path: &str) -> bool {
  path
    .rsplit_once('.')
    .map(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn request(path: &str, kind: ResourceKind) -> FetchRequest {
    let url = Url::parse(&format!("https://vhc.example{}", path)).unwrap();
    FetchRequest::get(url).with_kind(kind)
  }

  #[test]
  fn test_api_prefix_routes_to_api() {
    let req = request("/api/jobs", ResourceKind::Data);
    assert_eq!(classify(&req, "/api/"), Strategy::Api);
  }

  #[test]
  fn test_api_prefix_wins_over_image_kind() {
    let req = request("/api/photos/1.png", ResourceKind::Image);
    assert_eq!(classify(&req, "/api/"), Strategy::Api);
  }

  #[test]
  fn test_image_kind_routes_to_image() {
    let req = request("/assets/logo", ResourceKind::Image);
    assert_eq!(classify(&req, "/api/"), Strategy::Image);
  }

  #[test]
  fn test_image_extension_routes_to_image() {
    let req = request("/assets/Logo.PNG", ResourceKind::Other);
    assert_eq!(classify(&req, "/api/"), Strategy::Image);
  }

  #[test]
  fn test_everything_else_is_static() {
    assert_eq!(
      classify(&request("/", ResourceKind::Document), "/api/"),
      Strategy::Static
    );
    assert_eq!(
      classify(&request("/app.js", ResourceKind::Script), "/api/"),
      Strategy::Static
    );
    assert_eq!(
      classify(&request("/styles.css", ResourceKind::Style), "/api/"),
      Strategy::Static
    );
  }
}
