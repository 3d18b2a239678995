use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal run errors. Every variant aborts the run; nothing is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source unreadable, sink uncreatable, backend unavailable.
    #[error("failed to open {resource}: {source}")]
    ResourceOpen {
        resource: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("malformed tracker output at frame {frame}: {source}")]
    MalformedDetection {
        frame: u64,
        #[source]
        source: BoxError,
    },

    #[error("invalid timestamp {timestamp} at frame {frame}")]
    InvalidTimestamp { frame: u64, timestamp: f64 },

    #[error("frame {frame} failed: {source}")]
    FrameProcessing {
        frame: u64,
        #[source]
        source: BoxError,
    },

    #[error("failed to finalize run: {source}")]
    Finalize {
        #[source]
        source: BoxError,
    },

    /// The run panicked; the worker recovered and recorded it.
    #[error("run panicked: {message}")]
    Panicked { message: String },
}

impl PipelineError {
    pub(crate) fn open(resource: &'static str, err: impl Into<BoxError>) -> Self {
        PipelineError::ResourceOpen {
            resource,
            source: err.into(),
        }
    }

    pub(crate) fn frame(frame: u64, err: impl Into<BoxError>) -> Self {
        PipelineError::FrameProcessing {
            frame,
            source: err.into(),
        }
    }

    pub(crate) fn finalize(err: impl Into<BoxError>) -> Self {
        PipelineError::Finalize { source: err.into() }
    }

    /// Short stable label for logs and status reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ResourceOpen { .. } => "resource_open",
            PipelineError::MalformedDetection { .. } => "malformed_detection",
            PipelineError::InvalidTimestamp { .. } => "invalid_timestamp",
            PipelineError::FrameProcessing { .. } => "frame_processing",
            PipelineError::Finalize { .. } => "finalize",
            PipelineError::Panicked { .. } => "panicked",
        }
    }
}
