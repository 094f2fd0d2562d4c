//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the generator (which decides what files to create) and
//! the [`backend`](super::backend) (which does the pixel work), so a mock
//! backend can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`ResizeParams`]: source, destination, target dimensions, output format and quality.
//! - [`PlaceholderParams`]: source and dimensions of the tiny blurred sidecar preview.

use crate::naming::AssetFormat;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Parameters for a resize-and-encode operation.
///
/// `output` may be a temporary name without a meaningful extension, so the
/// encoder is chosen from `format`, never from the path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: AssetFormat,
    pub quality: Quality,
}

/// Parameters for the blurred low-resolution preview.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderParams {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Gaussian blur sigma applied after downscaling.
    pub blur_sigma: f32,
}
