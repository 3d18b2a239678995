//! Local file frame source.
//!
//! `FileSource` dispatches on the configured path:
//! - `stub://<name>?frames=N&fps=F&width=W&height=H`: synthetic frames for tests
//! - `*.y4m`: YUV4MPEG2 decoder, no native dependencies
//! - anything else: FFmpeg decoder (feature: ingest-file-ffmpeg)
//!
//! Remote URLs are rejected. Every backend reports exhaustion as `Ok(None)`
//! and stamps frames with non-decreasing timestamps in seconds.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::{Frame, FrameSource, VideoInfo};
use crate::y4m::Y4mReader;

const STUB_SCHEME: &str = "stub://";
const DEFAULT_STUB_FRAMES: u64 = 30;
const DEFAULT_STUB_FPS: f64 = 10.0;
const DEFAULT_STUB_WIDTH: u32 = 64;
const DEFAULT_STUB_HEIGHT: u32 = 48;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "media/trial2.y4m") or a `stub://` URI.
    pub path: String,
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
    frames_read: u64,
    path: String,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    Y4m(Y4mFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open the source. Fails if the file cannot be opened or decoded.
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let backend = if let Some(target) = config.path.strip_prefix(STUB_SCHEME) {
            FileBackend::Synthetic(SyntheticFileSource::parse(target)?)
        } else if has_extension(&config.path, "y4m") {
            FileBackend::Y4m(Y4mFileSource::open(Path::new(&config.path))?)
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                FileBackend::Ffmpeg(FfmpegFileSource::new(&config.path)?)
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                return Err(anyhow!(
                    "decoding {} requires the ingest-file-ffmpeg feature (or a .y4m input)",
                    config.path
                ));
            }
        };
        let source = Self {
            backend,
            frames_read: 0,
            path: config.path,
        };
        let info = source.info();
        log::info!(
            "FileSource: opened {} ({}x{} @ {:.2} fps)",
            source.path,
            info.width,
            info.height,
            info.fps
        );
        Ok(source)
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        FileStats {
            frames_read: self.frames_read,
            path: self.path.clone(),
        }
    }
}

impl FrameSource for FileSource {
    fn info(&self) -> VideoInfo {
        match &self.backend {
            FileBackend::Synthetic(source) => source.info(),
            FileBackend::Y4m(source) => source.info(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.info(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            FileBackend::Y4m(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }?;
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_read: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// YUV4MPEG2 file
// ----------------------------------------------------------------------------

struct Y4mFileSource {
    reader: Y4mReader<BufReader<File>>,
    index: u64,
}

impl Y4mFileSource {
    fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let reader = Y4mReader::new(BufReader::new(file))
            .with_context(|| format!("failed to read y4m header of {}", path.display()))?;
        Ok(Self { reader, index: 0 })
    }

    fn info(&self) -> VideoInfo {
        let header = self.reader.header();
        VideoInfo {
            width: header.width,
            height: header.height,
            fps: header.fps(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(image) = self.reader.read_frame()? else {
            return Ok(None);
        };
        let timestamp_s = self.index as f64 / self.reader.header().fps();
        self.index += 1;
        Ok(Some(Frame::new(image, timestamp_s)))
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    name: String,
    total_frames: u64,
    info: VideoInfo,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn parse(target: &str) -> Result<Self> {
        let (name, query) = target.split_once('?').unwrap_or((target, ""));
        let mut total_frames = DEFAULT_STUB_FRAMES;
        let mut info = VideoInfo {
            width: DEFAULT_STUB_WIDTH,
            height: DEFAULT_STUB_HEIGHT,
            fps: DEFAULT_STUB_FPS,
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("invalid stub parameter '{}'", pair))?;
            match key {
                "frames" => total_frames = value.parse().context("invalid stub frames")?,
                "fps" => info.fps = value.parse().context("invalid stub fps")?,
                "width" => info.width = value.parse().context("invalid stub width")?,
                "height" => info.height = value.parse().context("invalid stub height")?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if !info.fps.is_finite() || info.fps <= 0.0 {
            return Err(anyhow!("stub fps must be > 0"));
        }
        if info.width == 0 || info.height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        Ok(Self {
            name: name.to_string(),
            total_frames,
            info,
            frame_count: 0,
        })
    }

    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= self.total_frames {
            log::debug!("FileSource: {} exhausted", self.name);
            return Ok(None);
        }
        let shift = self.frame_count;
        let image = RgbImage::from_fn(self.info.width, self.info.height, |x, y| {
            image::Rgb([
                ((x as u64 + shift) % 256) as u8,
                ((y as u64 + shift) % 256) as u8,
                (shift % 256) as u8,
            ])
        });
        let timestamp_s = self.frame_count as f64 / self.info.fps;
        self.frame_count += 1;
        Ok(Some(Frame::new(image, timestamp_s)))
    }
}

fn has_extension(path: &str, ext: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}
