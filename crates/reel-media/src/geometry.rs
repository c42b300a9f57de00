//! Center-crop geometry for aspect normalization.

use reel_models::FrameSize;

/// A crop window in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropRect {
    /// FFmpeg `crop` filter for this window.
    pub fn to_filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// Largest centered window of `src` with the aspect ratio of `target`.
///
/// Wider sources keep their full height and lose width on both sides;
/// taller-or-equal sources keep their full width and lose height. The
/// result is never larger than the source, so scaling it to `target`
/// fills the frame without padding.
pub fn center_crop(src_width: u32, src_height: u32, target: FrameSize) -> CropRect {
    let src_aspect = src_width as f64 / src_height as f64;
    let target_aspect = target.aspect();

    if src_aspect > target_aspect {
        let width = even_at_most((src_height as f64 * target_aspect).round() as u32, src_width);
        CropRect {
            width,
            height: src_height,
            x: (src_width - width) / 2,
            y: 0,
        }
    } else {
        let height = even_at_most((src_width as f64 / target_aspect).round() as u32, src_height);
        CropRect {
            width: src_width,
            height,
            x: 0,
            y: (src_height - height) / 2,
        }
    }
}

/// Round down to an even value no larger than `max`, at least 2 when possible.
fn even_at_most(value: u32, max: u32) -> u32 {
    let clamped = value.min(max).max(1);
    if clamped > 1 {
        clamped & !1
    } else {
        clamped
    }
}
