//! Decoded video frames.
//!
//! - `Frame`: one decoded RGB image plus its presentation timestamp.
//! - `VideoInfo`: native stream geometry and frame rate, shared by source and sink.
//! - `FrameSource`: ordered, finite producer of frames.
//!
//! Frames are owned by the active run and dropped once their metrics record
//! and rendered copy have been emitted.

use anyhow::Result;
use image::RgbImage;

/// Native geometry and frame rate of a video stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second. May be fractional (e.g. 29.97).
    pub fps: f64,
}

impl VideoInfo {
    /// Express the frame rate as a rational `num:den` pair.
    ///
    /// Integral rates map to `fps:1`; fractional rates are scaled by 1000
    /// (29.97 -> 29970:1000).
    pub fn fps_ratio(&self) -> (u32, u32) {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return (0, 1);
        }
        if self.fps.fract() == 0.0 {
            return (self.fps as u32, 1);
        }
        ((self.fps * 1000.0).round() as u32, 1000)
    }
}

/// One decoded frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    /// Presentation time in seconds from the start of the stream.
    pub timestamp_s: f64,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp_s: f64) -> Self {
        Self { image, timestamp_s }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Ordered, finite frame producer.
///
/// `next_frame` returns `Ok(None)` once the stream is exhausted. Errors are
/// decode failures and abort the run.
pub trait FrameSource: Send {
    fn info(&self) -> VideoInfo;

    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> VideoInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}
