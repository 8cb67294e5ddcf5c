//! `worldline` binary
//!
//! Runs one session: the local mock simulator when no remote authority is
//! configured, otherwise hydration, polling and the push channel against it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use worldline_core::config::WorldlineConfig;
use worldline_core::metrics::render_prometheus;
use worldline_core::scheduler::SystemClock;
use worldline_core::snapshot;
use worldline_core::transition::{Transition, apply};
use worldline_remote::client::HttpRemote;
use worldline_session::{Session, SessionHandle};

#[derive(Debug, Parser)]
#[command(name = "worldline", version, about = "Reconcile a simulation world model from local and remote sources")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote authority base URL; overrides `remote.base_url`.
    #[arg(long)]
    remote: Option<String>,

    /// Log filter when `RUST_LOG` is unset; overrides `general.log_level`.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs.
    #[arg(long)]
    json: bool,

    /// Start the local simulation running.
    #[arg(long)]
    run: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Write a snapshot of the final world to this file.
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => WorldlineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => WorldlineConfig::default(),
    };
    if let Some(url) = args.remote {
        config.remote.base_url = Some(url);
    }
    if let Some(level) = args.log_level {
        config.general.log_level = level;
    }
    config.validate().context("invalid configuration")?;
    init_tracing(&config.general.log_level, args.json || config.general.log_format == "json");

    let remote = HttpRemote::from_config(&config.remote).context("building HTTP client")?;
    let session = Session::new(config, remote, SystemClock::new());
    let counters = std::sync::Arc::clone(session.counters());
    let (handle, commands) = SessionHandle::channel(64);
    let driver = tokio::spawn(session.run(commands));

    if args.run {
        handle.toggle_run().await;
    }
    match args.duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?,
    }
    handle.shutdown().await;
    let world = driver.await.context("session task panicked")?;

    info!(tick = world.tick, agents = world.agents.len(), feed = world.feed.len(), "Session finished");
    info!("Sync counters:\n{}", render_prometheus(&counters));

    if let Some(path) = args.snapshot_out {
        let id = uuid::Uuid::new_v4().to_string();
        let transition = Transition::CreateSnapshot { id: id.clone(), name: "final".into(), created_at: chrono::Utc::now() };
        let world = apply(world, transition);
        let json = snapshot::export_by_id(&world, &id)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Snapshot written");
    }
    Ok(())
}
