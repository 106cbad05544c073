//! Cache namespace classes and their generation-tagged physical names.

use serde::{Deserialize, Serialize};

/// The three cache classes the worker maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheClass {
  Static,
  Api,
  Image,
}

impl CacheClass {
  pub const ALL: [CacheClass; 3] = [CacheClass::Static, CacheClass::Api, CacheClass::Image];

  pub fn as_str(&self) -> &'static str {
    match self {
      CacheClass::Static => "static",
      CacheClass::Api => "api",
      CacheClass::Image => "images",
    }
  }
}

/// Resolves the physical name for each cache class in the current generation.
///
/// Physical names embed a version suffix (the generation tag). Activation
/// compares names by literal string equality, so the tag must stay stable
/// across a deploy or every cache is invalidated.
#[derive(Debug, Clone)]
pub struct CacheNames {
  version: String,
}

impl CacheNames {
  pub fn new(version: &str) -> Self {
    Self {
      version: version.to_string(),
    }
  }

  /// Physical name for a class, e.g. `vhc-static-v1`.
  pub fn name_of(&self, class: CacheClass) -> String {
    format!("vhc-{}-{}", class.as_str(), self.version)
  }

  /// All three current-generation names.
  pub fn current(&self) -> [String; 3] {
    CacheClass::ALL.map(|class| self.name_of(class))
  }

  /// Whether a physical name belongs to the current generation.
  pub fn is_current(&self, name: &str) -> bool {
    self.current().iter().any(|current| current == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_names_carry_generation_tag() {
    let names = CacheNames::new("v2");
    assert_eq!(names.name_of(CacheClass::Static), "vhc-static-v2");
    assert_eq!(names.name_of(CacheClass::Api), "vhc-api-v2");
    assert_eq!(names.name_of(CacheClass::Image), "vhc-images-v2");
  }

  #[test]
  fn test_is_current_is_literal_comparison() {
    let names = CacheNames::new("v2");
    assert!(names.is_current("vhc-api-v2"));
    assert!(!names.is_current("vhc-api-v1"));
    assert!(!names.is_current("vhc-api-v2-extra"));
  }
}
