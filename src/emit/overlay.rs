//! Frame annotation: engagement label and per-detection boxes.

use image::{Rgb, RgbImage};

use super::font::{glyph, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::detect::Detection;
use crate::engagement::Category;

const ENGAGED_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const DISENGAGED_COLOR: Rgb<u8> = Rgb([220, 40, 40]);
const IGNORED_COLOR: Rgb<u8> = Rgb([160, 160, 160]);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    /// Left edge and baseline of the engagement label, in pixels.
    pub origin: (u32, u32),
    /// Pixels per glyph cell.
    pub scale: u32,
    pub color: Rgb<u8>,
    /// Outline each detection, colored by category.
    pub draw_boxes: bool,
    pub box_thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            origin: (20, 40),
            scale: 2,
            color: Rgb([0, 255, 0]),
            draw_boxes: true,
            box_thickness: 2,
        }
    }
}

/// Overlay label for an engagement percentage, one decimal place.
pub fn engagement_label(engagement_percent: f64) -> String {
    format!("Engagement: {:.1}%", engagement_percent)
}

/// Draw detection boxes and the engagement label onto the frame.
pub fn annotate(
    image: &mut RgbImage,
    detections: &[(Category, &Detection)],
    engagement_percent: f64,
    style: &OverlayStyle,
) {
    if style.draw_boxes {
        for (category, detection) in detections {
            let color = match category {
                Category::Engaged => ENGAGED_COLOR,
                Category::Disengaged => DISENGAGED_COLOR,
                Category::Ignored => IGNORED_COLOR,
            };
            draw_box(image, detection.bbox, style.box_thickness, color);
            let Some(track_id) = detection.track_id else {
                continue;
            };
            if let Some(origin) = label_origin(image, detection.bbox) {
                draw_text(image, &format!("#{}", track_id), origin, 1, color);
            }
        }
    }
    draw_text(
        image,
        &engagement_label(engagement_percent),
        style.origin,
        style.scale,
        style.color,
    );
}

/// Draw text with its baseline at `origin.1`. Pixels outside the image are clipped.
pub fn draw_text(
    image: &mut RgbImage,
    text: &str,
    origin: (u32, u32),
    scale: u32,
    color: Rgb<u8>,
) {
    let scale = scale.max(1);
    let top = origin.1.saturating_sub(GLYPH_HEIGHT.saturating_mul(scale));
    for (i, c) in text.chars().enumerate() {
        let left = origin
            .0
            .saturating_add((i as u32).saturating_mul(GLYPH_ADVANCE.saturating_mul(scale)));
        if left >= image.width() {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                fill_rect(
                    image,
                    left.saturating_add(col.saturating_mul(scale)),
                    top.saturating_add((row as u32).saturating_mul(scale)),
                    scale,
                    scale,
                    color,
                );
            }
        }
    }
}

/// Top-left label anchor for a box, or `None` when the box starts off-frame.
fn label_origin(image: &RgbImage, bbox: [f32; 4]) -> Option<(u32, u32)> {
    let x = bbox[0].min(bbox[2]).max(0.0);
    let y = bbox[1].min(bbox[3]).max(0.0);
    if x >= image.width() as f32 || y >= image.height() as f32 {
        return None;
    }
    Some((x as u32, (y as u32).saturating_sub(2)))
}

fn draw_box(image: &mut RgbImage, bbox: [f32; 4], thickness: u32, color: Rgb<u8>) {
    let clamp = |v: f32| v.max(0.0) as u32;
    let (x1, y1) = (clamp(bbox[0].min(bbox[2])), clamp(bbox[1].min(bbox[3])));
    let (x2, y2) = (clamp(bbox[0].max(bbox[2])), clamp(bbox[1].max(bbox[3])));
    if x2 <= x1 || y2 <= y1 {
        return;
    }
    let (w, h) = (x2 - x1, y2 - y1);
    let t = thickness.max(1);
    fill_rect(image, x1, y1, w, t, color);
    fill_rect(image, x1, y2.saturating_sub(t), w, t, color);
    fill_rect(image, x1, y1, t, h, color);
    fill_rect(image, x2.saturating_sub(t), y1, t, h, color);
}

fn fill_rect(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = x.saturating_add(w).min(image.width());
    let y_end = y.saturating_add(h).min(image.height());
    for py in y..y_end {
        for px in x..x_end {
            image.put_pixel(px, py, color);
        }
    }
}
