//! Replays tracker output recorded from an external detector.
//!
//! The recording is a JSON document:
//!
//! ```json
//! {
//!   "names": ["hand-raising", "reading", "sleep"],
//!   "frames": [
//!     { "boxes": [ { "cls": 1, "id": 4, "conf": 0.91, "xyxy": [10, 20, 80, 140] } ] },
//!     { "boxes": [] }
//!   ]
//! }
//! ```
//!
//! Frame `n` of the run receives `frames[n]`. Frames past the end of the
//! recording receive no boxes.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::detect::backend::TrackerBackend;
use crate::detect::result::{ClassNames, TrackerOutput};
use crate::frame::Frame;

#[derive(Debug, Deserialize)]
struct Recording {
    names: ClassNames,
    #[serde(default)]
    frames: Vec<TrackerOutput>,
}

pub struct ReplayBackend {
    names: ClassNames,
    frames: Vec<TrackerOutput>,
    cursor: usize,
}

impl ReplayBackend {
    pub fn new(names: ClassNames, frames: Vec<TrackerOutput>) -> Self {
        Self {
            names,
            frames,
            cursor: 0,
        }
    }

    /// Load a recording from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read replay file {}: {}", path.display(), e))?;
        Self::from_json(&raw)
            .map_err(|e| anyhow!("invalid replay file {}: {}", path.display(), e))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let recording: Recording = serde_json::from_str(raw)?;
        if recording.names.is_empty() {
            return Err(anyhow!("recording declares no class names"));
        }
        log::info!(
            "ReplayBackend: loaded {} frames, {} classes",
            recording.frames.len(),
            recording.names.len()
        );
        Ok(Self::new(recording.names, recording.frames))
    }

    pub fn recorded_frames(&self) -> usize {
        self.frames.len()
    }
}

impl TrackerBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn track(&mut self, _frame: &Frame) -> Result<TrackerOutput> {
        let output = self.frames.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        Ok(output)
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}
