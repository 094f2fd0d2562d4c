//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Height that preserves the source aspect ratio at `target_width`.
///
/// Never returns 0, so very wide panoramas still produce a valid image.
pub fn scaled_height(original: (u32, u32), target_width: u32) -> u32 {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return 1;
    }
    let h = (orig_h as f64 * target_width as f64 / orig_w as f64).round() as u32;
    h.max(1)
}

/// Width/height ratio, or `None` for a degenerate image.
pub fn aspect_ratio(original: (u32, u32)) -> Option<f64> {
    let (w, h) = original;
    if w == 0 || h == 0 {
        return None;
    }
    Some(w as f64 / h as f64)
}

/// Represents a single ladder width to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderStep {
    /// Ladder width, also the output width.
    pub width: u32,
    /// Calculated output height.
    pub height: u32,
}

/// Ladder widths that apply to a source of the given dimensions.
///
/// Only widths at or below the intrinsic width are kept; the pipeline never
/// upscales. Unlike a `srcset` builder there is no fallback to the original
/// size: a source narrower than every ladder width yields no steps.
pub fn applicable_widths(original: (u32, u32), ladder: &[u32]) -> Vec<LadderStep> {
    let (orig_w, _) = original;
    ladder
        .iter()
        .filter(|&&w| w > 0 && w <= orig_w)
        .map(|&width| LadderStep {
            width,
            height: scaled_height(original, width),
        })
        .collect()
}

/// Output dimensions of the base default: intrinsic size capped at `max_width`.
pub fn base_dimensions(original: (u32, u32), max_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if max_width == 0 || orig_w <= max_width {
        (orig_w, orig_h)
    } else {
        (max_width, scaled_height(original, max_width))
    }
}
