//! Broken symlink repair.
//!
//! Deploy trees sometimes carry symlinks into directories that have since been
//! pruned. A static host serving such a link returns an error for a URL that
//! markup still points at, so every dangling link under the managed roots is
//! replaced by a minimal valid file for its extension:
//!
//! | Extension                    | Placeholder                         |
//! |------------------------------|-------------------------------------|
//! | `svg`                        | empty 1×1 `<svg>` document          |
//! | `png` `jpg` `jpeg` `webp` `avif` | 1×1 image in that format        |
//! | anything else                | empty file                          |
//!
//! Links whose target exists are left alone. The walk never follows links.

use crate::atomic;
use crate::imaging::{self, BackendError};
use crate::naming::AssetFormat;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const SVG_PLACEHOLDER: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"/>"#;

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to render placeholder: {0}")]
    Placeholder(#[from] BackendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKind {
    Svg,
    Raster(AssetFormat),
    Empty,
}

impl PlaceholderKind {
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("svg") => Self::Svg,
            Some(e) => AssetFormat::from_extension(e).map_or(Self::Empty, Self::Raster),
            None => Self::Empty,
        }
    }

    pub fn render(self) -> Result<Vec<u8>, BackendError> {
        match self {
            Self::Svg => Ok(SVG_PLACEHOLDER.as_bytes().to_vec()),
            Self::Raster(format) => imaging::single_pixel(format),
            Self::Empty => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairedLink {
    pub path: PathBuf,
    pub target: PathBuf,
    pub placeholder: PlaceholderKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub dry_run: bool,
    pub links_checked: usize,
    pub repaired: Vec<RepairedLink>,
    pub failures: Vec<RepairFailure>,
}

fn is_dangling(path: &Path) -> bool {
    path.is_symlink() && std::fs::metadata(path).is_err()
}

fn replace_link(path: &Path, kind: PlaceholderKind) -> Result<(), RepairError> {
    let bytes = kind.render()?;
    std::fs::remove_file(path)?;
    atomic::write_atomic(path, &bytes)?;
    Ok(())
}

/// Repair every dangling symlink under `roots`. Missing roots are skipped.
pub fn repair_links(roots: &[PathBuf], dry_run: bool) -> Result<RepairReport, RepairError> {
    let mut report = RepairReport {
        dry_run,
        ..Default::default()
    };

    for root in roots {
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|source| RepairError::Walk {
                path: root.clone(),
                source,
            })?;
            if !entry.path_is_symlink() {
                continue;
            }
            report.links_checked += 1;
            let path = entry.path();
            if !is_dangling(path) {
                continue;
            }
            let target = std::fs::read_link(path).unwrap_or_default();
            let placeholder = PlaceholderKind::for_path(path);
            if !dry_run {
                if let Err(e) = replace_link(path, placeholder) {
                    report.failures.push(RepairFailure {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    });
                    continue;
                }
            }
            report.repaired.push(RepairedLink {
                path: path.to_path_buf(),
                target,
                placeholder,
            });
        }
    }
    Ok(report)
}
