//! Frame-processing pipeline.
//!
//! One run walks a video from start to end:
//!
//! 1. **Initializing**: remove stale artifacts, reset the tracker, open the
//!    source and the video sink.
//! 2. **Running**: per frame, track → adapt → classify → score → annotate →
//!    append frame and metrics record. Strictly sequential.
//! 3. **Finalizing**: close the video, then write the metrics document in one
//!    atomic step. The document's existence means the run succeeded.
//!
//! Any error moves the run to **Failed**: the sink is closed, metrics are
//! discarded, the error is returned. The `RunGuard` required by `run` is
//! released by the caller on every path.

mod artifacts;
mod error;
mod lock;

pub use artifacts::RunArtifacts;
pub use error::{BoxError, PipelineError};
pub use lock::{RunGuard, RunLock};

use std::fmt;
use std::time::{Duration, Instant};

use crate::detect::{adapt_detections, Detection, TrackerBackend};
use crate::emit::{annotate, create_video_sink, write_metrics_document, FrameSink, OverlayStyle};
use crate::engagement::{Category, EngagementRules, FrameState, MetricsDocument, ScoringPolicy};
use crate::frame::{Frame, FrameSource};
use crate::ingest::{FileConfig, FileSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    Running,
    Finalizing,
    Failed,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Initializing => "initializing",
            RunPhase::Running => "running",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Failed => "failed",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PipelineSettings {
    pub rules: EngagementRules,
    pub scoring: ScoringPolicy,
    pub overlay: OverlayStyle,
}

/// Summary of a successful run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub frames: u64,
    pub elapsed: Duration,
    /// Mean of the per-frame engagement percentages, `None` for an empty video.
    pub mean_engagement: Option<f64>,
    pub artifacts: RunArtifacts,
}

pub struct Pipeline {
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Execute one full run from `input` into `artifacts`.
    pub fn run(
        &self,
        _guard: &RunGuard,
        input: &FileConfig,
        backend: &mut dyn TrackerBackend,
        artifacts: &RunArtifacts,
    ) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        log_phase(RunPhase::Initializing);

        if let Err(err) = artifacts.prepare() {
            log_phase(RunPhase::Failed);
            return Err(PipelineError::open("artifact paths", err));
        }
        backend.reset();

        let mut source = match FileSource::open(input.clone()) {
            Ok(source) => source,
            Err(err) => {
                log_phase(RunPhase::Failed);
                return Err(PipelineError::open("frame source", err));
            }
        };
        let mut sink = match create_video_sink(&artifacts.video, source.info()) {
            Ok(sink) => sink,
            Err(err) => {
                artifacts.discard();
                log_phase(RunPhase::Failed);
                return Err(PipelineError::open("video sink", err));
            }
        };
        log::info!(
            "run: {} -> {} + {} (tracker={})",
            input.path,
            artifacts.video.display(),
            artifacts.metrics.display(),
            backend.name()
        );

        log_phase(RunPhase::Running);
        let document = match self.process(&mut source, backend, sink.as_mut()) {
            Ok(document) => document,
            Err(err) => {
                log_phase(RunPhase::Failed);
                if let Err(close_err) = sink.finish() {
                    log::warn!("failed to close video sink: {:#}", close_err);
                }
                return Err(err);
            }
        };

        log_phase(RunPhase::Finalizing);
        let stats = source.stats();
        log::debug!("source {}: {} frames read", stats.path, stats.frames_read);
        sink.finish().map_err(PipelineError::finalize)?;
        write_metrics_document(&artifacts.metrics, &document).map_err(PipelineError::finalize)?;
        log_phase(RunPhase::Done);

        let frames = document.len() as u64;
        let mean_engagement = (!document.is_empty()).then(|| {
            document
                .records()
                .iter()
                .map(|m| m.engagement_percent as f64)
                .sum::<f64>()
                / document.len() as f64
        });
        Ok(RunReport {
            frames,
            elapsed: started.elapsed(),
            mean_engagement,
            artifacts: artifacts.clone(),
        })
    }

    /// Drive the frame loop until the source is exhausted.
    ///
    /// Returns the metrics document; the sink holds exactly one frame per
    /// record, in the same order.
    pub fn process<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        backend: &mut dyn TrackerBackend,
        sink: &mut dyn FrameSink,
    ) -> Result<MetricsDocument, PipelineError> {
        let mut document = MetricsDocument::new();
        let mut last_timestamp = 0.0_f64;
        let mut index = 0u64;
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => return Err(PipelineError::frame(index, err)),
            };
            if !frame.timestamp_s.is_finite()
                || frame.timestamp_s < 0.0
                || frame.timestamp_s < last_timestamp
            {
                return Err(PipelineError::InvalidTimestamp {
                    frame: index,
                    timestamp: frame.timestamp_s,
                });
            }
            last_timestamp = frame.timestamp_s;

            self.process_frame(index, frame, backend, sink, &mut document)?;
            index += 1;
            if index % 100 == 0 {
                log::debug!("processed {} frames", index);
            }
        }

        if sink.frames_written() != document.len() as u64 {
            return Err(PipelineError::finalize(format!(
                "video/metrics misaligned: {} frames vs {} records",
                sink.frames_written(),
                document.len()
            )));
        }
        log::info!("frame loop finished after {} frames", index);
        Ok(document)
    }

    fn process_frame(
        &self,
        index: u64,
        frame: Frame,
        backend: &mut dyn TrackerBackend,
        sink: &mut dyn FrameSink,
        document: &mut MetricsDocument,
    ) -> Result<(), PipelineError> {
        let output = backend
            .track(&frame)
            .map_err(|e| PipelineError::frame(index, e))?;
        let detections = adapt_detections(&output, backend.class_names()).map_err(|e| {
            PipelineError::MalformedDetection {
                frame: index,
                source: e.into(),
            }
        })?;

        let classified: Vec<(Category, &Detection)> = detections
            .iter()
            .map(|d| (self.settings.rules.classify(&d.class_name), d))
            .collect();
        let mut state = FrameState::new();
        for (category, detection) in &classified {
            state.observe(*category, detection);
        }
        let score = state
            .finish(frame.timestamp_s, &self.settings.scoring)
            .map_err(|_| PipelineError::InvalidTimestamp {
                frame: index,
                timestamp: frame.timestamp_s,
            })?;

        let Frame { mut image, .. } = frame;
        annotate(
            &mut image,
            &classified,
            score.engagement_exact,
            &self.settings.overlay,
        );
        sink.write_frame(&image).map_err(|e| PipelineError::frame(index, e))?;
        document.push(score.metrics);
        Ok(())
    }
}

fn log_phase(phase: RunPhase) {
    log::info!("run phase: {}", phase);
}
