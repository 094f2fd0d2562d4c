//! Centralized filename parsing for the `<group>-<width>w.<format>` convention.
//!
//! Every file the pipeline touches follows one of four shapes:
//!
//! ```text
//! sunset.jpg              source        (group "sunset")
//! sunset-640w.webp        variant       (group "sunset", width 640)
//! sunset.webp             base default  (group "sunset", no width)
//! sunset.meta.json        sidecar       (group "sunset")
//! ```
//!
//! The group key is what ties them together: the file stem with every trailing
//! `-<digits>w` suffix stripped. All stages derive it through [`parse_asset_name`]
//! so the generator, the manifest builder and the budget gate always agree on
//! which files belong together.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Extensions accepted as generator input.
pub const SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Suffix of sidecar metadata files.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Raster formats the pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Webp,
    Avif,
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    Png,
}

impl AssetFormat {
    /// Parse a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension used when writing files.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Modern formats compress far better than the legacy baseline.
    pub fn is_modern(self) -> bool {
        matches!(self, Self::Webp | Self::Avif)
    }

    /// Fixed preference order used when nothing else breaks a tie.
    pub fn rank(self) -> u8 {
        match self {
            Self::Webp => 0,
            Self::Avif => 1,
            Self::Jpeg => 2,
            Self::Png => 3,
        }
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Result of parsing an image file name like `sunset-640w.webp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAsset {
    /// Stem with all width suffixes stripped (`sunset`).
    pub group: String,
    /// Width from the suffix nearest the extension, if any.
    pub width: Option<u32>,
    pub format: AssetFormat,
}

impl ParsedAsset {
    pub fn is_variant(&self) -> bool {
        self.width.is_some()
    }
}

/// Split one `-<digits>w` suffix off the end of a stem.
fn split_width_suffix(stem: &str) -> Option<(&str, u32)> {
    let body = stem.strip_suffix('w')?;
    let dash = body.rfind('-')?;
    let digits = &body[dash + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let width = digits.parse().ok()?;
    Some((&body[..dash], width))
}

/// Strip every trailing `-<digits>w` suffix from a stem.
///
/// - `"photo"` → (`"photo"`, None)
/// - `"photo-640w"` → (`"photo"`, Some(640))
/// - `"photo-640w-1920w"` → (`"photo"`, Some(1920))
/// - `"event-1-640w"` → (`"event-1"`, Some(640))
/// - `"640w"` → (`"640w"`, None): a suffix needs something in front of it
pub fn strip_width_suffixes(stem: &str) -> (&str, Option<u32>) {
    let mut group = stem;
    let mut width = None;
    while let Some((rest, w)) = split_width_suffix(group) {
        if rest.is_empty() {
            break;
        }
        width.get_or_insert(w);
        group = rest;
    }
    (group, width)
}

/// Parse a raster file name into group, width and format.
///
/// Returns `None` for anything that isn't a recognised raster extension.
pub fn parse_asset_name(file_name: &str) -> Option<ParsedAsset> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let format = AssetFormat::from_extension(ext)?;
    if stem.is_empty() {
        return None;
    }
    let (group, width) = strip_width_suffixes(stem);
    Some(ParsedAsset {
        group: group.to_string(),
        width,
        format,
    })
}

/// Whether a file name is an acceptable generator source by extension and shape.
pub fn is_source_name(file_name: &str) -> bool {
    let has_source_ext = file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    has_source_ext && parse_asset_name(file_name).is_some_and(|p| !p.is_variant())
}

/// `<group>-<width>w.<format>`
pub fn variant_file_name(group: &str, width: u32, format: AssetFormat) -> String {
    format!("{}-{}w.{}", group, width, format.extension())
}

/// `<group>.<format>`
pub fn base_file_name(group: &str, format: AssetFormat) -> String {
    format!("{}.{}", group, format.extension())
}

/// `<group>.meta.json`
pub fn sidecar_file_name(group: &str) -> String {
    format!("{}{}", group, SIDECAR_SUFFIX)
}

/// Group of a sidecar file name, if it is one.
pub fn sidecar_group(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SIDECAR_SUFFIX)
        .filter(|group| !group.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_source_has_no_width() {
        let p = parse_asset_name("photo.jpg").unwrap();
        assert_eq!(p.group, "photo");
        assert_eq!(p.width, None);
        assert_eq!(p.format, AssetFormat::Jpeg);
    }

    #[test]
    fn variants_share_group_with_source() {
        for name in ["photo.jpg", "photo-640w.webp", "photo-1920w.avif"] {
            assert_eq!(parse_asset_name(name).unwrap().group, "photo", "{name}");
        }
    }

    #[test]
    fn width_parsed_from_suffix() {
        let p = parse_asset_name("photo-640w.webp").unwrap();
        assert_eq!(p.width, Some(640));
        assert_eq!(p.format, AssetFormat::Webp);
        assert!(p.is_variant());
    }

    #[test]
    fn stacked_suffixes_all_stripped() {
        let p = parse_asset_name("photo-640w-1920w.avif").unwrap();
        assert_eq!(p.group, "photo");
        assert_eq!(p.width, Some(1920));
    }

    #[test]
    fn digits_inside_group_preserved() {
        let p = parse_asset_name("event-1-640w.webp").unwrap();
        assert_eq!(p.group, "event-1");
        assert_eq!(p.width, Some(640));
    }

    #[test]
    fn bare_width_stem_is_not_a_suffix() {
        let p = parse_asset_name("640w.jpg").unwrap();
        assert_eq!(p.group, "640w");
        assert_eq!(p.width, None);
    }

    #[test]
    fn non_numeric_suffix_ignored() {
        let p = parse_asset_name("photo-wide-w.jpg").unwrap();
        assert_eq!(p.group, "photo-wide-w");
        assert_eq!(p.width, None);
    }

    #[test]
    fn unknown_extension_rejected() {
        assert!(parse_asset_name("notes.txt").is_none());
        assert!(parse_asset_name("noextension").is_none());
        assert!(parse_asset_name(".jpg").is_none());
    }

    #[test]
    fn extension_case_insensitive() {
        let p = parse_asset_name("IMG_001.JPEG").unwrap();
        assert_eq!(p.group, "IMG_001");
        assert_eq!(p.format, AssetFormat::Jpeg);
    }

    #[test]
    fn source_names() {
        assert!(is_source_name("sunset.jpg"));
        assert!(is_source_name("sunset.png"));
        assert!(is_source_name("sunset.webp"));
        assert!(!is_source_name("sunset-640w.jpg"));
        assert!(!is_source_name("sunset.avif"));
        assert!(!is_source_name("sunset.meta.json"));
    }

    #[test]
    fn file_name_builders() {
        assert_eq!(
            variant_file_name("sunset", 640, AssetFormat::Jpeg),
            "sunset-640w.jpg"
        );
        assert_eq!(base_file_name("sunset", AssetFormat::Webp), "sunset.webp");
        assert_eq!(sidecar_file_name("sunset"), "sunset.meta.json");
    }

    #[test]
    fn sidecar_group_parsing() {
        assert_eq!(sidecar_group("sunset.meta.json"), Some("sunset"));
        assert_eq!(sidecar_group(".meta.json"), None);
        assert_eq!(sidecar_group("sunset.json"), None);
    }

    #[test]
    fn format_modernity() {
        assert!(AssetFormat::Webp.is_modern());
        assert!(AssetFormat::Avif.is_modern());
        assert!(!AssetFormat::Jpeg.is_modern());
        assert!(!AssetFormat::Png.is_modern());
    }

    #[test]
    fn format_serde_uses_jpg() {
        let json = serde_json::to_string(&AssetFormat::Jpeg).unwrap();
        assert_eq!(json, "\"jpg\"");
        let parsed: AssetFormat = serde_json::from_str("\"jpeg\"").unwrap();
        assert_eq!(parsed, AssetFormat::Jpeg);
    }
}
