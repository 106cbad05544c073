//! Implementations of the CLI subcommands.

use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::cache::{CacheNames, CacheStore, SqliteStore};
use crate::config::Config;
use crate::net::{Fetch, FetchRequest, HttpFetcher, ResourceKind};
use crate::offline::{ConnectivityState, FallbackSource, OfflineFirst, OfflineStore, QueuedWrite};
use crate::worker::{ClientRegistry, LifecycleManager, SyncCoordinator, Worker};

/// Shared setup for every subcommand.
struct Runtime {
  store: Arc<SqliteStore>,
  fetcher: Arc<HttpFetcher>,
  names: CacheNames,
  base: Url,
}

fn bootstrap(config: &Config) -> Result<Runtime> {
  Ok(Runtime {
    store: Arc::new(SqliteStore::open_at(&config.cache_db_path()?)?),
    fetcher: Arc::new(HttpFetcher::new()?),
    names: CacheNames::new(&config.cache.version),
    base: config.upstream.base()?,
  })
}

/// One connectivity probe against the upstream root.
async fn probe(fetcher: &HttpFetcher, base: &Url) -> bool {
  let mut req = FetchRequest::get(base.clone());
  req.method = "HEAD".to_string();
  fetcher.fetch(&req).await.is_ok()
}

/// `run`: install, activate, then watch connectivity and trigger sync passes.
pub async fn run(config: Config) -> Result<()> {
  let runtime = bootstrap(&config)?;
  let registry = Arc::new(ClientRegistry::new());
  let connectivity = ConnectivityState::new(true);

  let mut lifecycle = LifecycleManager::new(
    Arc::clone(&runtime.store),
    Arc::clone(&runtime.fetcher),
    runtime.names.clone(),
    Arc::clone(&registry),
  );
  lifecycle.install(&config.cache.precache, &runtime.base).await?;
  lifecycle.activate()?;
  info!(state = ?lifecycle.state(), "worker took control");

  // Offline storage failure degrades to online-only mode instead of aborting.
  let coordinator = match OfflineStore::open_at(&config.offline_db_path()?) {
    Ok(store) => {
      connectivity.mark_ready();
      Some(SyncCoordinator::new(
        Arc::clone(&runtime.fetcher),
        Arc::new(store),
        Arc::clone(&registry),
        runtime.base.clone(),
        &config.sync.task_name,
      ))
    }
    Err(err) => {
      warn!(error = %err, "offline storage unavailable, running online-only");
      None
    }
  };

  // Log every connectivity transition as a subscriber would observe it.
  let mut watcher = connectivity.subscribe();
  tokio::spawn(async move {
    while watcher.changed().await.is_ok() {
      let snapshot = *watcher.borrow();
      info!(online = snapshot.online, ready = snapshot.storage_ready, "connectivity state");
    }
  });

  // The daemon is its own client: it receives the same sync broadcasts any
  // open UI would.
  let mut client = registry.register();
  let client_id = client.id;

  let mut interval = tokio::time::interval(Duration::from_secs(config.sync.probe_interval_secs));
  let mut was_online = connectivity.is_online();
  info!(upstream = %runtime.base, "daemon started");

  loop {
    tokio::select! {
      _ = interval.tick() => {
        let online = probe(&runtime.fetcher, &runtime.base).await;
        connectivity.set_online(online);

        if online && !was_online {
          info!("connectivity restored");
          if let Some(coordinator) = &coordinator {
            coordinator.register();
            let report = coordinator.dispatch(&config.sync.task_name).await?;
            if !report.is_clean() {
              warn!(failed = report.failures.len(), "sync pass left items queued");
            }
          }
        }
        was_online = online;
      }
      Some(message) = client.next() => {
        info!(?message, "sync broadcast");
      }
      _ = tokio::signal::ctrl_c() => {
        info!("shutting down");
        registry.unregister(client_id);
        return Ok(());
      }
    }
  }
}

/// `sync`: one-shot drain of the pending queue.
pub async fn sync_once(config: Config) -> Result<()> {
  let runtime = bootstrap(&config)?;
  let offline = Arc::new(OfflineStore::open_at(&config.offline_db_path()?)?);
  let registry = Arc::new(ClientRegistry::new());

  let coordinator = SyncCoordinator::new(
    Arc::clone(&runtime.fetcher),
    offline,
    registry,
    runtime.base,
    &config.sync.task_name,
  );

  let report = coordinator.dispatch(&config.sync.task_name).await?;
  println!(
    "replayed {} item(s), {} failure(s)",
    report.replayed,
    report.failures.len()
  );
  for failure in &report.failures {
    println!("  {} {} -> {}", failure.item.method, failure.item.url, failure.cause);
  }

  Ok(())
}

/// `fetch`: run one request through the worker's strategies and print it.
pub async fn fetch(config: Config, path: &str, kind: ResourceKind) -> Result<()> {
  let runtime = bootstrap(&config)?;
  let connectivity = ConnectivityState::new(true);
  // Confirm connectivity first so the API strategy's offline branch is real.
  connectivity.set_online(probe(&runtime.fetcher, &runtime.base).await);

  let worker = Worker::new(
    Arc::clone(&runtime.store),
    Arc::clone(&runtime.fetcher),
    runtime.names.clone(),
    &config.cache.api_prefix,
    connectivity,
  );

  let url = runtime.base.join(path)?;
  let req = FetchRequest::get(url).with_kind(kind);

  let response = worker.handle(&req).await?;
  eprintln!("{} {}", response.status, response.status_text);
  std::io::stdout().write_all(&response.body)?;

  Ok(())
}

/// Offline-first helper shared by `save` and `get`.
async fn offline_first(config: &Config, runtime: &Runtime) -> Result<OfflineFirst> {
  let connectivity = ConnectivityState::new(true);
  connectivity.set_online(probe(&runtime.fetcher, &runtime.base).await);

  let store = Arc::new(OfflineStore::open_at(&config.offline_db_path()?)?);
  connectivity.mark_ready();

  Ok(OfflineFirst::new(connectivity, store))
}

/// `save`: write a record with offline fallback.
///
/// Online, the record is posted upstream and the response mirrored locally.
/// Offline, it is persisted locally and queued for the next sync pass.
pub async fn save(config: Config, key: &str, path: &str, data: &str) -> Result<()> {
  let runtime = bootstrap(&config)?;
  let helper = offline_first(&config, &runtime).await?;

  let value: serde_json::Value =
    serde_json::from_str(data).map_err(|e| eyre!("Invalid JSON payload: {}", e))?;
  let url = runtime.base.join(path)?;

  let replay = QueuedWrite {
    method: "POST".to_string(),
    url: path.to_string(),
    body: Some(data.as_bytes().to_vec()),
  };

  let fetcher = Arc::clone(&runtime.fetcher);
  let body = data.as_bytes().to_vec();
  let outcome = helper
    .save(key, &value, Some(replay), || async move {
      let req = FetchRequest {
        method: "POST".to_string(),
        url,
        kind: ResourceKind::Data,
        body: Some(body),
      };
      let response = fetcher.fetch(&req).await?;
      if !response.is_success() {
        return Err(eyre!("Save returned status {}", response.status));
      }
      if response.body.is_empty() {
        Ok(serde_json::Value::Null)
      } else {
        Ok(serde_json::from_slice(&response.body)?)
      }
    })
    .await?;

  if outcome.is_offline() {
    println!("saved offline, queued for sync");
  } else {
    println!("saved upstream");
  }

  Ok(())
}

/// `get`: read a record, falling back to the local mirror when the upstream
/// is unreachable.
pub async fn get(config: Config, key: &str, path: &str) -> Result<()> {
  let runtime = bootstrap(&config)?;
  let helper = offline_first(&config, &runtime).await?;

  let url = runtime.base.join(path)?;
  let fetcher = Arc::clone(&runtime.fetcher);
  let outcome = helper
    .get::<serde_json::Value, _, _>(key, || async move {
      let req = FetchRequest::get(url).with_kind(ResourceKind::Data);
      let response = fetcher.fetch(&req).await?;
      if !response.is_success() {
        return Err(eyre!("Fetch returned status {}", response.status));
      }
      Ok(serde_json::from_slice(&response.body)?)
    })
    .await?;

  if outcome.source == FallbackSource::Local {
    eprintln!("(served from local mirror)");
  }
  println!("{}", serde_json::to_string_pretty(&outcome.data)?);

  Ok(())
}

/// `status`: namespace and queue overview.
pub fn status(config: Config) -> Result<()> {
  let store = SqliteStore::open_at(&config.cache_db_path()?)?;
  let names = CacheNames::new(&config.cache.version);

  println!("cache namespaces (current generation: {})", config.cache.version);
  let namespaces = store.list_namespaces()?;
  if namespaces.is_empty() {
    println!("  (none)");
  }
  for name in namespaces {
    let marker = if names.is_current(&name) { "" } else { "  [stale]" };
    println!("  {:<24} {:>5} entries{}", name, store.namespace_len(&name)?, marker);
  }

  let offline = OfflineStore::open_at(&config.offline_db_path()?)?;
  println!("pending sync queue: {} item(s)", offline.queue_len()?);

  Ok(())
}

/// `clear`: drop every cache namespace, current generation included.
pub fn clear(config: Config) -> Result<()> {
  let store = SqliteStore::open_at(&config.cache_db_path()?)?;

  let mut deleted = 0;
  for name in store.list_namespaces()? {
    store.delete_namespace(&name)?;
    deleted += 1;
  }
  println!("deleted {} namespace(s)", deleted);

  Ok(())
}
