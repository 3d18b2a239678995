//! Render/emit boundary: frame annotation, the output video stream and the
//! metrics document.

mod font;
mod metrics_file;
mod overlay;
mod video;

pub use metrics_file::{read_metrics_document, write_metrics_document};
pub use overlay::{annotate, draw_text, engagement_label, OverlayStyle};
pub use video::{create_video_sink, FrameSink, Y4mFileSink};
