use anyhow::Result;

use crate::detect::result::{ClassNames, TrackerOutput};
use crate::frame::Frame;

/// Detector + multi-object tracker backend.
///
/// The model behind a backend is a black box: per frame it yields class ids,
/// confidences, geometry and (after warm-up) a stable tracking handle.
/// Backends are loaded once at process start and shared by handle; only the
/// active run calls `track`.
pub trait TrackerBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class-id to class-name table of the loaded model.
    fn class_names(&self) -> &ClassNames;

    /// Run detection and tracking on one frame.
    ///
    /// Frames arrive strictly in stream order; identities persist across
    /// calls until `reset`.
    fn track(&mut self, frame: &Frame) -> Result<TrackerOutput>;

    /// Drop tracker state. Called at the start of every run, since
    /// identities are scoped to a single run.
    fn reset(&mut self) {}
}
