//! process_video - score one classroom video in the foreground.
//!
//! Writes the annotated video and the per-frame metrics document, then
//! prints a short summary.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use engagement_kernel::{
    ui::{Ui, UiMode},
    EngagementService, EngineConfig, TriggerOutcome,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Score engagement for one classroom video")]
struct Args {
    /// Input video (.y4m, stub://name?frames=N, or any FFmpeg-readable file
    /// when built with `ingest-file-ffmpeg`).
    #[arg(long)]
    input: Option<String>,

    /// Annotated output video (.y4m).
    #[arg(long, value_name = "PATH")]
    output_video: Option<PathBuf>,

    /// Metrics document output (.json).
    #[arg(long, value_name = "PATH")]
    output_metrics: Option<PathBuf>,

    /// Tracker backend: `stub` or `replay`.
    #[arg(long)]
    backend: Option<String>,

    /// Recorded tracker output for the `replay` backend.
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Config file (JSON, or TOML by extension).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Progress output style.
    #[arg(long, value_enum, default_value = "auto")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::new(args.ui);

    let cfg = ui.run_stage("Load configuration", || {
        let mut cfg = match &args.config {
            Some(path) => EngineConfig::load_from(path)?,
            None => EngineConfig::load()?,
        };
        if let Some(input) = args.input {
            cfg.input_path = input;
        }
        if let Some(path) = args.output_video {
            cfg.output_video_path = path;
        }
        if let Some(path) = args.output_metrics {
            cfg.output_metrics_path = path;
        }
        if let Some(replay) = args.replay {
            cfg.backend.name = "replay".to_string();
            cfg.backend.replay_path = replay;
        }
        if let Some(backend) = args.backend {
            cfg.backend.name = backend;
        }
        cfg.validate()?;
        Ok(cfg)
    })?;

    let service = ui.run_stage("Load tracker", || EngagementService::from_config(&cfg))?;

    let report = ui.run_stage("Score video", || {
        let handle = match service.trigger() {
            TriggerOutcome::Started(handle) => handle,
            TriggerOutcome::Busy => return Err(anyhow!("a run is already in progress")),
            TriggerOutcome::Failed(message) => return Err(anyhow!(message)),
        };
        handle.join()?.map_err(|err| anyhow!("{} ({})", err, err.kind()))
    })?;

    println!("frames:          {}", report.frames);
    println!("elapsed:         {:.2}s", report.elapsed.as_secs_f64());
    match report.mean_engagement {
        Some(mean) => println!("mean engagement: {:.1}%", mean),
        None => println!("mean engagement: n/a (empty video)"),
    }
    println!("video:           {}", report.artifacts.video.display());
    println!("metrics:         {}", report.artifacts.metrics.display());
    Ok(())
}

