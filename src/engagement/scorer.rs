use anyhow::{anyhow, Result};
use std::collections::HashSet;

use crate::detect::Detection;
use crate::engagement::classifier::{Category, EngagementRules};
use crate::engagement::metrics::FrameMetrics;

/// Damping applied to the engagement percentage to derive the session score.
pub const DEFAULT_SESSION_DAMPING: f64 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringPolicy {
    /// `session_score = floor(engagement_percent * session_damping)`.
    pub session_damping: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            session_damping: DEFAULT_SESSION_DAMPING,
        }
    }
}

/// Per-frame accumulator. Created empty for every frame.
#[derive(Debug, Default)]
pub struct FrameState {
    engaged_ids: HashSet<u64>,
    disengaged_ids: HashSet<u64>,
    seen_activities: Vec<String>,
}

/// Result of scoring one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameScore {
    pub metrics: FrameMetrics,
    /// Unrounded engagement percentage, for the overlay.
    pub engagement_exact: f64,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one classified detection into the frame.
    ///
    /// Every detection contributes its class name to the activity list.
    /// Only tracked detections contribute to the identity sets.
    pub fn observe(&mut self, category: Category, detection: &Detection) {
        if !self.seen_activities.contains(&detection.class_name) {
            self.seen_activities.push(detection.class_name.clone());
        }
        let Some(track_id) = detection.track_id else {
            return;
        };
        match category {
            Category::Engaged => {
                self.engaged_ids.insert(track_id);
            }
            Category::Disengaged => {
                self.disengaged_ids.insert(track_id);
            }
            Category::Ignored => {}
        }
    }

    pub fn engaged_ids(&self) -> &HashSet<u64> {
        &self.engaged_ids
    }

    pub fn disengaged_ids(&self) -> &HashSet<u64> {
        &self.disengaged_ids
    }

    /// Disengaged identities that were not also engaged this frame.
    pub fn resolved_disengaged(&self) -> HashSet<u64> {
        self.disengaged_ids
            .difference(&self.engaged_ids)
            .copied()
            .collect()
    }

    pub fn finish(self, timestamp_s: f64, policy: &ScoringPolicy) -> Result<FrameScore> {
        if !timestamp_s.is_finite() || timestamp_s < 0.0 {
            return Err(anyhow!("invalid frame timestamp {}", timestamp_s));
        }
        let resolved = self.resolved_disengaged();
        let engaged = self.engaged_ids.len();
        // engaged and resolved are disjoint, so the union size is the sum.
        let student_count = engaged + resolved.len();

        let engagement_exact = if student_count > 0 {
            engaged as f64 / student_count as f64 * 100.0
        } else {
            0.0
        };
        let engagement_percent = engagement_exact.round_ties_even() as u32;
        let session_score = (engagement_percent as f64 * policy.session_damping).floor() as u32;

        Ok(FrameScore {
            metrics: FrameMetrics {
                timestamp_seconds: timestamp_s,
                student_count: student_count as u32,
                engagement_percent,
                session_score,
                activities: self.seen_activities,
            },
            engagement_exact,
        })
    }
}

/// Classify and score one frame's detections.
pub fn score_frame(
    detections: &[Detection],
    rules: &EngagementRules,
    timestamp_s: f64,
    policy: &ScoringPolicy,
) -> Result<FrameScore> {
    let mut state = FrameState::new();
    for detection in detections {
        state.observe(rules.classify(&detection.class_name), detection);
    }
    state.finish(timestamp_s, policy)
}
