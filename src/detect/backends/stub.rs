use anyhow::Result;

use crate::detect::backend::TrackerBackend;
use crate::detect::result::{ClassNames, TrackerOutput};
use crate::frame::Frame;

/// Stub backend for testing. Never detects anything.
pub struct StubBackend {
    names: ClassNames,
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            names: ClassNames::default(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn track(&mut self, _frame: &Frame) -> Result<TrackerOutput> {
        self.frames_seen += 1;
        Ok(TrackerOutput::empty())
    }

    fn reset(&mut self) {
        self.frames_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn stub_backend_detects_nothing() {
        let mut backend = StubBackend::default();
        let frame = Frame::new(RgbImage::new(4, 4), 0.0);

        assert!(backend.track(&frame).unwrap().boxes.is_empty());
        assert!(backend.track(&frame).unwrap().boxes.is_empty());
        assert_eq!(backend.frames_seen(), 2);

        backend.reset();
        assert_eq!(backend.frames_seen(), 0);
    }
}
