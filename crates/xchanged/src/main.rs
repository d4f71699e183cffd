//! xchanged - SkillXchange marketplace daemon
//!
//! Main entry point for the daemon binary.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use xchange_core::config::ConfigError;
use xchange_core::{Config, SortMode};
use xchanged::Daemon;

#[derive(Parser)]
#[command(name = "xchanged", about = "SkillXchange marketplace daemon", version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file (defaults to .xchange/config when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bearer token required by the HTTP API
    #[arg(long, env = "XCHANGED_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Sort mode when a request names none (recent, reputation, verified)
    #[arg(long)]
    default_sort: Option<SortMode>,

    /// Start without the demonstration listings and session
    #[arg(long)]
    no_seed: bool,

    /// Skip the tagging step when posting skills
    #[arg(long)]
    no_tagging: bool,
}

impl Cli {
    /// Resolve config: CLI flags > --config file > .xchange/config > defaults.
    fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::from_workspace(Path::new("."))?,
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(token) = &self.auth_token {
            config.auth_token = Some(token.clone());
        }
        if let Some(sort) = self.default_sort {
            config.default_sort = sort;
        }
        if self.no_seed {
            config.seed_demo_data = false;
        }
        if self.no_tagging {
            config.tagging_enabled = false;
        }
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Run the async main.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    runtime.block_on(async {
        let daemon = match Daemon::new(config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("failed to initialize daemon: {}", e);
                std::process::exit(1);
            }
        };

        let run = daemon.run();
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => {
                if let Err(e) = result {
                    error!("daemon error: {}", e);
                    std::process::exit(1);
                }
                return;
            }
            () = shutdown_signal() => {
                daemon.shutdown();
            }
        }

        if let Err(e) = run.await {
            error!("daemon error during shutdown: {}", e);
        }
    });
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, initiating graceful shutdown");
    }
}
