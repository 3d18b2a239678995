//! Engagement Kernel
//!
//! This crate scores student engagement in a recorded classroom video.
//!
//! # Architecture
//!
//! One run walks the video frame by frame:
//!
//! 1. **Track**: a tracker backend yields boxes with class ids and run-scoped track ids.
//! 2. **Adapt**: raw boxes become `Detection`s carrying class names.
//! 3. **Classify**: each class name is engaged, disengaged or ignored.
//! 4. **Score**: distinct tracked students are counted per frame; engagement wins ties.
//! 5. **Emit**: the frame is annotated and appended to the output video, and its
//!    metrics record is appended to the metrics document, which is written once at the end.
//!
//! At most one run is active per process. Triggers that arrive during a run are
//! rejected, not queued.
//!
//! # Module Structure
//!
//! - `frame`, `ingest`, `y4m`: decoded frames and local video sources
//! - `detect`: tracker backends and the detection adapter
//! - `engagement`: classification and per-frame scoring
//! - `emit`: overlay rendering, output video, metrics document
//! - `pipeline`: the run orchestrator, run lock and error taxonomy
//! - `service`, `api`: background dispatch and the HTTP trigger
//! - `config`: file + environment configuration

pub mod api;
pub mod config;
pub mod detect;
pub mod emit;
pub mod engagement;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod service;
pub mod ui;
pub mod y4m;

pub use config::EngineConfig;
pub use detect::{
    adapt_detections, BackendRegistry, ClassNames, Detection, ReplayBackend, SharedBackend,
    StubBackend, TrackerBackend, TrackerOutput,
};
pub use engagement::{
    score_frame, Category, EngagementRules, FrameMetrics, MetricsDocument, ScoringPolicy,
};
pub use frame::{Frame, FrameSource, VideoInfo};
pub use ingest::{FileConfig, FileSource};
pub use pipeline::{
    Pipeline, PipelineError, PipelineSettings, RunArtifacts, RunGuard, RunLock, RunReport,
};
pub use service::{EngagementService, RunHandle, ServiceStatus, TriggerOutcome};
