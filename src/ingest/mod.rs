//! Frame ingestion sources.
//!
//! v1 ingests recorded local video only:
//! - YUV4MPEG2 files (always available)
//! - Other containers through FFmpeg (feature: ingest-file-ffmpeg)
//! - Stub source (testing)
//!
//! All sources produce `Frame` instances in stream order and signal
//! end-of-stream with `Ok(None)`. Live cameras are not supported.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource, FileStats};
