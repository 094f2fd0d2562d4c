//! Sidecar preview metadata.
//!
//! Every processed source gets a `<group>.meta.json` next to its variants:
//!
//! ```json
//! {
//!   "placeholder": "data:image/jpeg;base64,/9j/4AAQ...",
//!   "aspectRatio": 1.5004
//! }
//! ```
//!
//! The placeholder is a ~20px wide blurred JPEG inlined as a data URI, so
//! rendering code can paint something the size of the final image before any
//! variant loads. The manifest builder copies both fields into the group's
//! manifest entry.
//!
//! Reading is lenient: a missing or malformed sidecar is treated as absent
//! rather than failing the manifest build.

use crate::config::VariantsConfig;
use crate::imaging::{self, BackendError, Dimensions, ImageBackend, PlaceholderParams};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    /// `data:image/jpeg;base64,...`
    pub placeholder: String,
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: f64,
}

/// `data:<mime>;base64,<payload>`
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Round to four decimals so the JSON stays stable across runs.
fn round_ratio(ratio: f64) -> f64 {
    (ratio * 10_000.0).round() / 10_000.0
}

/// Render the placeholder and aspect ratio for a source.
pub fn build_sidecar(
    backend: &impl ImageBackend,
    source: &Path,
    dims: Dimensions,
    variants: &VariantsConfig,
) -> Result<Sidecar, BackendError> {
    let ratio = imaging::aspect_ratio(dims.as_tuple()).ok_or_else(|| {
        BackendError::ProcessingFailed(format!(
            "{} has degenerate dimensions {}x{}",
            source.display(),
            dims.width,
            dims.height
        ))
    })?;
    let width = variants.placeholder_width.min(dims.width).max(1);
    let height = imaging::scaled_height(dims.as_tuple(), width);
    let bytes = backend.placeholder(&PlaceholderParams {
        source: source.to_path_buf(),
        width,
        height,
        blur_sigma: variants.placeholder_blur,
    })?;
    Ok(Sidecar {
        placeholder: data_uri("image/jpeg", &bytes),
        aspect_ratio: round_ratio(ratio),
    })
}

/// Read a sidecar file. `None` if it doesn't exist or doesn't parse.
pub fn read_sidecar(path: &Path) -> Option<Sidecar> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
