//! Worker lifecycle: install, activate, takeover.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::cache::{CacheClass, CacheNames, CacheStore};
use crate::net::{Fetch, FetchRequest};

use super::clients::ClientRegistry;

/// Lifecycle states, in order. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Installing,
  Installed,
  Activating,
  Active,
}

/// Drives install and activation of a worker generation.
pub struct LifecycleManager<S, N> {
  store: Arc<S>,
  fetcher: Arc<N>,
  names: CacheNames,
  registry: Arc<ClientRegistry>,
  state: LifecycleState,
  skip_waiting: bool,
}

impl<S: CacheStore, N: Fetch> LifecycleManager<S, N> {
  pub fn new(
    store: Arc<S>,
    fetcher: Arc<N>,
    names: CacheNames,
    registry: Arc<ClientRegistry>,
  ) -> Self {
    Self {
      store,
      fetcher,
      names,
      registry,
      state: LifecycleState::Installing,
      skip_waiting: false,
    }
  }

  pub fn state(&self) -> LifecycleState {
    self.state
  }

  /// Install: pre-warm the static namespace with the precache manifest and
  /// eagerly open the other two namespaces.
  ///
  /// Any storage or precache failure aborts installation; recovery is the
  /// caller retrying on the next start, not business logic here.
  pub async fn install(&mut self, manifest: &[String], base: &Url) -> Result<()> {
    self.state = LifecycleState::Installing;

    for class in CacheClass::ALL {
      self.store.open_namespace(&self.names.name_of(class))?;
    }

    let static_namespace = self.names.name_of(CacheClass::Static);
    for path in manifest {
      let url = base
        .join(path)
        .map_err(|e| eyre!("Invalid precache path '{}': {}", path, e))?;
      let req = FetchRequest::get(url);

      let response = self.fetcher.fetch(&req).await?;
      if !response.is_success() {
        return Err(eyre!(
          "Precache fetch for {} returned status {}",
          path,
          response.status
        ));
      }
      self.store.put(&static_namespace, &req.identity(), &response)?;
    }

    // Take control without waiting for every open client to close.
    self.skip_waiting = true;
    self.state = LifecycleState::Installed;
    info!(assets = manifest.len(), "install complete");

    Ok(())
  }

  /// Activate: purge every namespace whose name is not current-generation,
  /// then claim all open clients. Idempotent; a second run deletes nothing.
  ///
  /// Returns the number of stale namespaces purged.
  pub fn activate(&mut self) -> Result<usize> {
    self.state = LifecycleState::Activating;

    let mut purged = 0;
    for name in self.store.list_namespaces()? {
      if !self.names.is_current(&name) {
        warn!(namespace = %name, "purging stale cache generation");
        self.store.delete_namespace(&name)?;
        purged += 1;
      }
    }

    self.registry.claim_all();
    self.state = LifecycleState::Active;
    info!(
      purged,
      clients = self.registry.len(),
      claimed = self.registry.controlled_count(),
      "activation complete"
    );

    Ok(purged)
  }
}
