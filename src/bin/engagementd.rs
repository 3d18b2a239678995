//! engagementd - classroom engagement scoring daemon
//!
//! This daemon:
//! 1. Loads configuration and the tracker backend once at startup
//! 2. Serves the trigger API (`POST /api/ml/process-demo/`)
//! 3. Runs at most one scoring pass at a time on a background worker
//! 4. Serves the annotated video and metrics document once written

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;

use engagement_kernel::{
    api::{ApiConfig, ApiServer},
    EngagementService, EngineConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Classroom engagement scoring daemon")]
struct Args {
    /// Config file (JSON, or TOML by extension). Overrides ENGAGEMENT_CONFIG.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Listen address for the trigger API.
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };
    log::info!(
        "input={} video={} metrics={} backend={}",
        cfg.input_path,
        cfg.output_video_path.display(),
        cfg.output_metrics_path.display(),
        cfg.backend.name
    );

    let service = EngagementService::from_config(&cfg)?;
    let api_config = ApiConfig {
        addr: args.addr.unwrap_or_else(|| cfg.api_addr.clone()),
    };
    let api_handle = ApiServer::new(api_config, service.clone()).spawn()?;
    log::info!("engagementd running. trigger api on {}", api_handle.addr);

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .map_err(|e| anyhow!("failed to install ctrl-c handler: {}", e))?;
    shutdown_rx
        .recv()
        .map_err(|_| anyhow!("shutdown channel closed"))?;

    log::info!("shutting down");
    if service.is_running() {
        log::warn!("a run is still in progress; its artifacts may be incomplete");
    }
    api_handle.stop()?;
    Ok(())
}
