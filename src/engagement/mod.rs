//! Engagement classification and per-frame scoring.
//!
//! Detections are classified by class name into engaged/disengaged/ignored,
//! deduplicated by track identity, and folded into one `FrameMetrics` record
//! per frame. Engagement always wins over disengagement for the same track.

mod classifier;
mod metrics;
mod scorer;

pub use classifier::{
    Category, EngagementRules, DEFAULT_DISENGAGED_CLASSES, DEFAULT_ENGAGED_CLASSES,
};
pub use metrics::{FrameMetrics, MetricsDocument};
pub use scorer::{score_frame, FrameScore, FrameState, ScoringPolicy, DEFAULT_SESSION_DAMPING};
