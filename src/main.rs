mod cache;
mod commands;
mod config;
mod net;
mod offline;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "roadside")]
#[command(about = "Offline-first request caching and sync agent")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/roadside/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install, activate, then watch connectivity and sync on reconnect
  Run,
  /// Drain the pending sync queue once and exit
  Sync,
  /// Run one request through the offline worker and print the response
  Fetch {
    /// Request path relative to the upstream base URL
    path: String,
    /// Resource kind hint, e.g. image
    #[arg(long, value_enum, default_value = "other")]
    kind: net::ResourceKind,
  },
  /// Save a record with offline fallback
  Save {
    /// Local record key, e.g. "report:42"
    key: String,
    /// Upstream path the record is posted to
    path: String,
    /// JSON payload
    data: String,
  },
  /// Read a record, falling back to the local mirror
  Get {
    /// Local record key
    key: String,
    /// Upstream path the record is fetched from
    path: String,
  },
  /// Show cache namespaces and queue depth
  Status,
  /// Delete every cache namespace
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;

  // The daemon logs to a file; one-shot commands log to stderr.
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let _guard = if matches!(args.command, Command::Run) {
    let appender = tracing_appender::rolling::daily(config.log_dir()?, "roadside.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(writer)
      .with_ansi(false)
      .init();
    Some(guard)
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
    None
  };

  match args.command {
    Command::Run => commands::run(config).await,
    Command::Sync => commands::sync_once(config).await,
    Command::Fetch { path, kind } => commands::fetch(config, &path, kind).await,
    Command::Save { key, path, data } => commands::save(config, &key, &path, &data).await,
    Command::Get { key, path } => commands::get(config, &key, &path).await,
    Command::Status => commands::status(config),
    Command::Clear => commands::clear(config),
  }
}
