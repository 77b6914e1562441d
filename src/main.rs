mod app;
mod assistant;
mod cache;
mod commands;
mod config;
mod derive;
mod event;
mod gateway;
mod query;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lifeos")]
#[command(about = "A terminal dashboard for tasks, health, relationships and more")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/lifeos/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Primary API base URL
  #[arg(long, env = "LIFEOS_API_URL")]
  api_url: Option<String>,

  /// Agent API base URL
  #[arg(long, env = "LIFEOS_AGENT_URL")]
  agent_url: Option<String>,
}

/// Log to a file; the terminal belongs to the UI. `RUST_LOG` overrides the
/// default level.
fn init_logging(config: &config::Config) -> Result<WorkerGuard> {
  let path = config.log_path();
  let dir = path
    .parent()
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."));
  std::fs::create_dir_all(&dir)?;
  let file_name = path
    .file_name()
    .map(|n| n.to_os_string())
    .unwrap_or_else(|| "lifeos.log".into());

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lifeos=info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration, then let flags and environment win
  let config = config::Config::load(args.config.as_deref())?
    .with_overrides(args.api_url, args.agent_url);
  config.validate()?;

  let _guard = init_logging(&config)?;
  tracing::info!(api = %config.api_url, agent = %config.agent_url, "config loaded");

  // Initialize and run the app
  let mut app = app::App::new(&config)?;
  app.run().await?;

  Ok(())
}
