use serde::{Deserialize, Serialize};

/// Raw per-frame output of a tracker backend, before normalization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackerOutput {
    #[serde(default)]
    pub boxes: Vec<RawBox>,
}

impl TrackerOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the tracker assigned no identity to any box in this frame.
    pub fn is_untracked(&self) -> bool {
        self.boxes.iter().all(|b| b.track_id.is_none())
    }
}

/// One raw tracker record.
///
/// `track_id` is a numeric handle that is absent until the tracker has
/// warmed up. It must be a non-negative integral value when present.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawBox {
    #[serde(rename = "cls")]
    pub class_id: i64,
    #[serde(rename = "id", default)]
    pub track_id: Option<f64>,
    #[serde(rename = "conf", default = "default_confidence")]
    pub confidence: f32,
    /// Pixel coordinates `[x1, y1, x2, y2]`.
    #[serde(default)]
    pub xyxy: [f32; 4],
}

fn default_confidence() -> f32 {
    1.0
}

/// Class-id to class-name table of the loaded model.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn get(&self, class_id: i64) -> Option<&str> {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.0.get(idx))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalized detection handed to the engagement classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_name: String,
    /// Run-scoped tracker identity. `None` until the tracker assigns one.
    pub track_id: Option<u64>,
    pub confidence: f32,
    /// Pixel coordinates `[x1, y1, x2, y2]`, used only for rendering.
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn new(class_name: impl Into<String>, track_id: Option<u64>) -> Self {
        Self {
            class_name: class_name.into(),
            track_id,
            confidence: 1.0,
            bbox: [0.0; 4],
        }
    }
}
