//! Normalizes raw tracker output into `Detection`s.

use anyhow::{anyhow, Result};

use crate::detect::result::{ClassNames, Detection, RawBox, TrackerOutput};

/// Convert one frame of tracker output into detections.
///
/// Each record is handled on its own, so a frame where the tracker has not
/// assigned identities yet (or only to some boxes) yields `track_id = None`
/// for the affected boxes. Any malformed record fails the whole frame.
pub fn adapt_detections(output: &TrackerOutput, names: &ClassNames) -> Result<Vec<Detection>> {
    output
        .boxes
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            adapt_box(raw, names).map_err(|e| anyhow!("malformed tracker record #{}: {}", idx, e))
        })
        .collect()
}

fn adapt_box(raw: &RawBox, names: &ClassNames) -> Result<Detection> {
    let class_name = names.get(raw.class_id).ok_or_else(|| {
        anyhow!(
            "class id {} outside model class table ({} classes)",
            raw.class_id,
            names.len()
        )
    })?;
    let track_id = raw.track_id.map(parse_track_id).transpose()?;
    if !raw.confidence.is_finite() {
        return Err(anyhow!("confidence is not finite"));
    }
    if raw.xyxy.iter().any(|v| !v.is_finite()) {
        return Err(anyhow!("box geometry is not finite"));
    }
    Ok(Detection {
        class_name: class_name.to_string(),
        track_id,
        confidence: raw.confidence,
        bbox: raw.xyxy,
    })
}

fn parse_track_id(handle: f64) -> Result<u64> {
    if !handle.is_finite() || handle < 0.0 || handle.fract() != 0.0 || handle > u64::MAX as f64 {
        return Err(anyhow!("invalid tracking handle {}", handle));
    }
    Ok(handle as u64)
}
