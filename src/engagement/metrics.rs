use serde::{Deserialize, Serialize};

/// Metrics for one processed frame. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetricsRecord", into = "MetricsRecord")]
pub struct FrameMetrics {
    pub timestamp_seconds: f64,
    pub student_count: u32,
    /// Rounded share of engaged students, 0..=100.
    pub engagement_percent: u32,
    pub session_score: u32,
    /// Distinct class names in first-seen order.
    pub activities: Vec<String>,
}

// On-disk shape:
// {"time": .., "metrics": {"student_count", "engagement", "student_score", "activities"}}
#[derive(Serialize, Deserialize)]
struct MetricsRecord {
    time: f64,
    metrics: MetricsValues,
}

#[derive(Serialize, Deserialize)]
struct MetricsValues {
    student_count: u32,
    engagement: u32,
    student_score: u32,
    activities: Vec<String>,
}

impl From<FrameMetrics> for MetricsRecord {
    fn from(m: FrameMetrics) -> Self {
        MetricsRecord {
            time: m.timestamp_seconds,
            metrics: MetricsValues {
                student_count: m.student_count,
                engagement: m.engagement_percent,
                student_score: m.session_score,
                activities: m.activities,
            },
        }
    }
}

impl From<MetricsRecord> for FrameMetrics {
    fn from(r: MetricsRecord) -> Self {
        FrameMetrics {
            timestamp_seconds: r.time,
            student_count: r.metrics.student_count,
            engagement_percent: r.metrics.engagement,
            session_score: r.metrics.student_score,
            activities: r.metrics.activities,
        }
    }
}

/// Ordered metrics time series for one run, one record per output frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsDocument {
    records: Vec<FrameMetrics>,
}

impl MetricsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(frames: usize) -> Self {
        Self {
            records: Vec::with_capacity(frames),
        }
    }

    pub fn push(&mut self, metrics: FrameMetrics) {
        self.records.push(metrics);
    }

    pub fn records(&self) -> &[FrameMetrics] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
