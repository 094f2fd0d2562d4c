//! Byte-budget gate for changed images.
//!
//! Takes the list of paths a change touched (one per line, blank lines and `#`
//! comments ignored) and checks each against the rules in `[budget]`:
//!
//! | Changed file | Check | Issue |
//! |---|---|---|
//! | Source (`sunset.jpg`) | decodes | `INVALID_IMAGE` |
//! | | every ladder width ≤ its width has every target format | `MISSING_VARIANT` |
//! | | each present variant within budget | `BUDGET_EXCEEDED` |
//! | Variant (`sunset-640w.jpg`) | within budget | `BUDGET_EXCEEDED` |
//! | Legacy variant | a webp or avif exists at the same width | `MISSING_MODERN_SIBLING` |
//!
//! Sources below the generator threshold, deleted paths, non-raster files and
//! base defaults (`sunset.webp` next to `sunset.jpg`) are skipped. A file
//! exactly at its limit passes. Every path is checked before reporting; any
//! issue fails the run.

use crate::config::PipelineConfig;
use crate::imaging::{self, ImageBackend, RustBackend};
use crate::naming::{self, AssetFormat, ParsedAsset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Changed-file list not found: {0}")]
    MissingList(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    MissingVariant,
    BudgetExceeded,
    MissingModernSibling,
    InvalidImage,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BudgetIssue {
    pub kind: IssueKind,
    pub path: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetReport {
    pub checked: usize,
    pub skipped: usize,
    pub issues: Vec<BudgetIssue>,
}

impl BudgetReport {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Paths from a newline-separated list.
pub fn parse_changed_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

pub fn read_changed_list(path: &Path) -> Result<Vec<String>, BudgetError> {
    if !path.is_file() {
        return Err(BudgetError::MissingList(path.to_path_buf()));
    }
    Ok(parse_changed_list(&std::fs::read_to_string(path)?))
}

pub fn check_budget(config: &PipelineConfig, project: &Path, changed: &[String]) -> BudgetReport {
    check_budget_with_backend(&RustBackend::new(), config, project, changed)
}

/// Check changed paths using a specific backend (allows testing with mock).
pub fn check_budget_with_backend(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    project: &Path,
    changed: &[String],
) -> BudgetReport {
    let mut report = BudgetReport::default();
    let mut issues = BTreeSet::new();

    for entry in changed {
        let path = project.join(entry);
        let Some(parsed) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(naming::parse_asset_name)
        else {
            report.skipped += 1;
            continue;
        };
        let Ok(meta) = std::fs::metadata(&path) else {
            // Deleted by the change
            report.skipped += 1;
            continue;
        };
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let checked = match parsed.width {
            Some(width) => {
                check_variant(config, &dir, entry, &parsed, width, meta.len(), &mut issues);
                true
            }
            None => check_source(backend, config, &dir, &path, entry, &parsed, meta.len(), &mut issues),
        };
        if checked {
            report.checked += 1;
        } else {
            report.skipped += 1;
        }
    }

    report.issues = issues.into_iter().collect();
    report
}

fn over_budget(
    config: &PipelineConfig,
    display: &str,
    width: u32,
    format: AssetFormat,
    size: u64,
) -> Option<BudgetIssue> {
    let limit = config.budget.limit_bytes(width, format)?;
    (size > limit).then(|| BudgetIssue {
        kind: IssueKind::BudgetExceeded,
        path: display.to_string(),
        detail: format!("{size} bytes > {limit} bytes ({width}w {format})"),
    })
}

/// Sibling path text in the same form as the changed entry.
fn sibling_display(entry: &str, file_name: &str) -> String {
    match entry.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{file_name}"),
        None => file_name.to_string(),
    }
}

fn check_variant(
    config: &PipelineConfig,
    dir: &Path,
    entry: &str,
    parsed: &ParsedAsset,
    width: u32,
    size: u64,
    issues: &mut BTreeSet<BudgetIssue>,
) {
    issues.extend(over_budget(config, entry, width, parsed.format, size));

    if parsed.format.is_modern() {
        return;
    }
    let mut modern: Vec<AssetFormat> = config
        .variants
        .formats
        .iter()
        .copied()
        .filter(|f| f.is_modern())
        .collect();
    if modern.is_empty() {
        modern = vec![AssetFormat::Webp, AssetFormat::Avif];
    }
    let has_sibling = modern.iter().any(|&f| {
        dir.join(naming::variant_file_name(&parsed.group, width, f))
            .is_file()
    });
    if !has_sibling {
        issues.insert(BudgetIssue {
            kind: IssueKind::MissingModernSibling,
            path: entry.to_string(),
            detail: format!("no webp/avif variant at {width}w"),
        });
    }
}

/// Whether `<group>.<legacy ext>` sits next to an unsuffixed modern file.
fn shadows_legacy_source(dir: &Path, parsed: &ParsedAsset) -> bool {
    parsed.format.is_modern()
        && ["jpg", "jpeg", "png", "JPG", "JPEG", "PNG"]
            .iter()
            .any(|ext| dir.join(format!("{}.{}", parsed.group, ext)).is_file())
}

/// Returns false when the source is skipped.
#[allow(clippy::too_many_arguments)]
fn check_source(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    dir: &Path,
    path: &Path,
    entry: &str,
    parsed: &ParsedAsset,
    size: u64,
    issues: &mut BTreeSet<BudgetIssue>,
) -> bool {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !naming::is_source_name(&file_name) || shadows_legacy_source(dir, parsed) {
        return false;
    }
    if size < config.variants.threshold_kib * 1024 {
        return false;
    }
    let dims = match backend.identify(path) {
        Ok(d) => d,
        Err(e) => {
            issues.insert(BudgetIssue {
                kind: IssueKind::InvalidImage,
                path: entry.to_string(),
                detail: e.to_string(),
            });
            return true;
        }
    };

    for step in imaging::applicable_widths(dims.as_tuple(), &config.variants.widths) {
        for &format in &config.variants.formats {
            let name = naming::variant_file_name(&parsed.group, step.width, format);
            let display = sibling_display(entry, &name);
            match std::fs::metadata(dir.join(&name)) {
                Ok(meta) => {
                    issues.extend(over_budget(config, &display, step.width, format, meta.len()));
                }
                Err(_) => {
                    issues.insert(BudgetIssue {
                        kind: IssueKind::MissingVariant,
                        path: display,
                        detail: format!("required by {entry}"),
                    });
                }
            }
        }
    }
    true
}
