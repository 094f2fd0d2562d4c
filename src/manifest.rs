//! Image manifest: the lookup table rendering code uses to pick a variant.
//!
//! Rebuilt wholesale from the [`AssetIndex`] on every run.
//!
//! ```json
//! {
//!   "version": 1,
//!   "images": {
//!     "/gallery/sunset": "/gallery/sunset-320w.webp",
//!     "/gallery/sunset-320w.webp": "/gallery/sunset-320w.webp",
//!     "/gallery/sunset.jpg": "/gallery/sunset.jpg"
//!   },
//!   "groups": {
//!     "/gallery/sunset": {
//!       "default": "/gallery/sunset-320w.webp",
//!       "variants": ["/gallery/sunset-320w.avif", "..."],
//!       "aspectRatio": 1.5004,
//!       "placeholder": "data:image/jpeg;base64,..."
//!     }
//!   }
//! }
//! ```
//!
//! `images` maps every group key to its default and every concrete file to
//! itself, plus a lowercase copy of each key that doesn't collide with an
//! existing one.
//!
//! ## Default selection
//!
//! If the group has any webp or avif member, only those are candidates: a
//! legacy jpg/png is never the default while a modern sibling exists. Among
//! candidates the smallest width wins, unsuffixed files come last, and at equal
//! width the preferred format wins before the fixed webp/avif/jpg/png order.

use crate::atomic;
use crate::config::PipelineConfig;
use crate::index::{AssetGroup, AssetIndex, IndexError, VariantDescriptor};
use crate::metadata;
use crate::naming::AssetFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
    #[error("Manifest points at {} missing file(s): {}", .0.len(), .0.join(", "))]
    MissingTargets(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub default: String,
    pub variants: Vec<String>,
    #[serde(rename = "aspectRatio", skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub images: BTreeMap<String, String>,
    pub groups: BTreeMap<String, ManifestEntry>,
}

/// Outcome of a manifest build, for display.
#[derive(Debug, Clone)]
pub struct ManifestReport {
    pub output: PathBuf,
    pub backup: Option<PathBuf>,
    pub groups: usize,
    pub files: usize,
    pub keys: usize,
    /// Group keys with no source or base default left.
    pub orphans: Vec<String>,
}

/// Choose the default member of a group.
pub fn select_default<'a>(
    variants: &'a [VariantDescriptor],
    preferred: AssetFormat,
) -> Option<&'a VariantDescriptor> {
    let has_modern = variants.iter().any(|v| v.format.is_modern());
    let rank = |v: &VariantDescriptor| {
        (
            v.width.is_none(),
            v.width.unwrap_or(0),
            v.format != preferred,
            v.format.rank(),
        )
    };
    variants
        .iter()
        .filter(|v| !has_modern || v.format.is_modern())
        .min_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.url.cmp(&b.url)))
}

fn entry_for(group: &AssetGroup, preferred: AssetFormat) -> Option<ManifestEntry> {
    let default = select_default(&group.variants, preferred)?;
    let sidecar = group.sidecar.as_deref().and_then(metadata::read_sidecar);
    Some(ManifestEntry {
        default: default.url.clone(),
        variants: group.variants.iter().map(|v| v.url.clone()).collect(),
        aspect_ratio: sidecar.as_ref().map(|s| s.aspect_ratio),
        placeholder: sidecar.map(|s| s.placeholder),
    })
}

impl Manifest {
    /// Build the manifest from an index.
    pub fn build(index: &AssetIndex, preferred: AssetFormat) -> Self {
        let mut images = BTreeMap::new();
        let mut groups = BTreeMap::new();

        for group in index.groups.values() {
            let Some(entry) = entry_for(group, preferred) else {
                continue;
            };
            images.insert(group.key.clone(), entry.default.clone());
            for url in &entry.variants {
                images.insert(url.clone(), url.clone());
            }
            groups.insert(group.key.clone(), entry);
        }

        let lowercase: Vec<(String, String)> = images
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .filter(|(k, _)| !images.contains_key(k))
            .collect();
        for (key, value) in lowercase {
            images.entry(key).or_insert(value);
        }

        Self {
            version: MANIFEST_VERSION,
            images,
            groups,
        }
    }

    /// Every distinct target URL that does not exist under `public_root`.
    pub fn missing_targets(&self, public_root: &Path) -> Vec<String> {
        let mut missing: Vec<String> = self
            .images
            .values()
            .filter(|url| !public_root.join(url.trim_start_matches('/')).is_file())
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Fail if any target is missing on disk.
    pub fn verify(&self, public_root: &Path) -> Result<(), ManifestError> {
        let missing = self.missing_targets(public_root);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::MissingTargets(missing))
        }
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `<output>.bak`
pub fn backup_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Build, verify and write the manifest described by the config.
///
/// The previous manifest, if any, is copied to `<output>.bak` before the new
/// one replaces it. Nothing is written when verification fails.
pub fn build_manifest(
    config: &PipelineConfig,
    project: &Path,
    output: Option<&Path>,
) -> Result<(Manifest, ManifestReport), ManifestError> {
    let index = AssetIndex::from_config(config, project)?;
    let manifest = Manifest::build(&index, config.variants.preferred_format);
    manifest.verify(&index.public_root)?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.manifest_path(project));
    let backup = if output.is_file() {
        let backup = backup_path(&output);
        std::fs::copy(&output, &backup)?;
        Some(backup)
    } else {
        None
    };
    atomic::write_json_atomic(&output, &manifest)?;

    let report = ManifestReport {
        output,
        backup,
        groups: manifest.groups.len(),
        files: index.variant_count(),
        keys: manifest.images.len(),
        orphans: index.orphans().iter().map(|g| g.key.clone()).collect(),
    };
    Ok((manifest, report))
}
