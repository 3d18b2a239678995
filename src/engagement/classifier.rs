use serde::{Deserialize, Serialize};

/// Behavior classes that count a student as engaged.
pub const DEFAULT_ENGAGED_CLASSES: &[&str] =
    &["hand-raising", "raise_head", "reading", "upright", "writing"];

/// Behavior classes that count a student as disengaged.
pub const DEFAULT_DISENGAGED_CLASSES: &[&str] =
    &["Using_phone", "bend", "bow_head", "sleep", "turn_head"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Engaged,
    Disengaged,
    Ignored,
}

/// Class-name membership rules.
///
/// Matching is exact and case-sensitive. A name listed in both sets is
/// treated as engaged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementRules {
    engaged: Vec<String>,
    disengaged: Vec<String>,
}

impl EngagementRules {
    pub fn new<I, J, S, T>(engaged: I, disengaged: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            engaged: engaged.into_iter().map(Into::into).collect(),
            disengaged: disengaged.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classify(&self, class_name: &str) -> Category {
        if self.engaged.iter().any(|c| c == class_name) {
            Category::Engaged
        } else if self.disengaged.iter().any(|c| c == class_name) {
            Category::Disengaged
        } else {
            Category::Ignored
        }
    }

    pub fn engaged(&self) -> &[String] {
        &self.engaged
    }

    pub fn disengaged(&self) -> &[String] {
        &self.disengaged
    }

    /// Class names listed in both sets. These classify as engaged.
    pub fn overlapping(&self) -> Vec<&str> {
        self.engaged
            .iter()
            .filter(|c| self.disengaged.contains(c))
            .map(String::as_str)
            .collect()
    }
}

impl Default for EngagementRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_ENGAGED_CLASSES.iter().copied(),
            DEFAULT_DISENGAGED_CLASSES.iter().copied(),
        )
    }
}
