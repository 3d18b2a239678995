//! Annotated video output.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::frame::VideoInfo;
use crate::y4m::Y4mWriter;

/// Ordered frame consumer. Frames are appended in call order.
pub trait FrameSink: Send {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;

    /// Flush and close the stream. Further writes are an error.
    fn finish(&mut self) -> Result<()>;

    fn frames_written(&self) -> u64;
}

/// YUV4MPEG2 file sink with the source's dimensions and frame rate.
pub struct Y4mFileSink {
    writer: Option<Y4mWriter<BufWriter<File>>>,
    path: PathBuf,
    frames: u64,
}

impl Y4mFileSink {
    pub fn create(path: &Path, info: VideoInfo) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create output video {}", path.display()))?;
        let writer = Y4mWriter::new(BufWriter::new(file), info.width, info.height, info.fps_ratio())
            .with_context(|| format!("failed to write video header to {}", path.display()))?;
        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for Y4mFileSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("video sink {} already finished", self.path.display()))?;
        writer.write_frame(image)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            log::debug!(
                "video sink {} closed after {} frames",
                self.path.display(),
                writer.frames_written()
            );
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

/// Open the output video sink for `path`.
pub fn create_video_sink(path: &Path, info: VideoInfo) -> Result<Box<dyn FrameSink>> {
    let is_y4m = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("y4m"));
    if !is_y4m {
        return Err(anyhow!(
            "unsupported output video format {} (expected .y4m)",
            path.display()
        ));
    }
    Ok(Box::new(Y4mFileSink::create(path, info)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::y4m::Y4mReader;
    use std::io::BufReader;

    #[test]
    fn sink_writes_frames_in_order_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.y4m");
        let info = VideoInfo {
            width: 3,
            height: 2,
            fps: 12.0,
        };
        let mut sink = create_video_sink(&path, info).unwrap();
        sink.write_frame(&RgbImage::new(3, 2)).unwrap();
        sink.write_frame(&RgbImage::new(3, 2)).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.frames_written(), 2);
        assert!(sink.write_frame(&RgbImage::new(3, 2)).is_err());
        sink.finish().unwrap();

        let mut reader = Y4mReader::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(reader.header().fps(), 12.0);
        let mut frames = 0;
        while reader.read_frame().unwrap().is_some() {
            frames += 1;
        }
        assert_eq!(frames, 2);
    }

    #[test]
    fn rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let info = VideoInfo {
            width: 2,
            height: 2,
            fps: 10.0,
        };
        assert!(create_video_sink(&dir.path().join("out.mp4"), info).is_err());
        assert!(!dir.path().join("out.mp4").exists());
    }
}
