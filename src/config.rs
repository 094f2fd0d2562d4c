//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `asset-pipeline.toml`. The file
//! lives at the project root; stock defaults are overridden by whatever keys
//! the file sets. Every algorithm takes its ladder, formats, qualities and
//! budgets from here; nothing is hardcoded in the stages themselves.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [assets]
//! public_root = "public"        # Web root; URLs are paths relative to it
//! dirs = ["gallery"]            # Managed asset directories under public_root
//!
//! [variants]
//! widths = [320, 400, 640, 800, 1024, 1200, 1600, 1920]
//! formats = ["webp", "avif", "jpg"]
//! preferred_format = "webp"     # Base default format and manifest tie-breaker
//! threshold_kib = 200           # Sources smaller than this are left alone
//! base_max_width = 1920         # Width cap of the <group>.webp base default
//! placeholder_width = 20
//! placeholder_blur = 2.5
//!
//! [variants.quality]
//! webp = 80
//! avif = 60
//! jpg = 82
//!
//! [[budget.rules]]
//! width = 640
//! format = "webp"
//! max_kib = 70
//!
//! [scan]
//! dirs = ["src"]
//! exclude = ["node_modules", "dist", "build", ".git", "target"]
//! extensions = ["astro", "css", "html", "js", "json", "jsx", "md", "mdx", "ts", "tsx", "vue"]
//!
//! [manifest]
//! output = "src/generated/image-manifest.json"
//!
//! [reports]
//! dir = ".asset-pipeline"
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming::AssetFormat;
use crate::imaging::Quality;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// File name looked up in the project root.
pub const CONFIG_FILENAME: &str = "asset-pipeline.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Required input missing: {0}")]
    MissingInput(PathBuf),
}

/// Pipeline configuration loaded from `asset-pipeline.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Where the managed images live.
    pub assets: AssetsConfig,
    /// Variant ladder, formats, qualities and placeholder settings.
    pub variants: VariantsConfig,
    /// Per-(width, format) byte budgets.
    pub budget: BudgetConfig,
    /// Source directories searched for image references.
    pub scan: ScanConfig,
    /// Manifest output location.
    pub manifest: ManifestConfig,
    /// Where machine-readable reports are written.
    pub reports: ReportsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.variants;
        if v.widths.is_empty() {
            return Err(ConfigError::Validation(
                "variants.widths must not be empty".into(),
            ));
        }
        if v.widths.contains(&0) {
            return Err(ConfigError::Validation(
                "variants.widths must be non-zero".into(),
            ));
        }
        if v.widths.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Validation(
                "variants.widths must be strictly ascending".into(),
            ));
        }
        if v.formats.is_empty() {
            return Err(ConfigError::Validation(
                "variants.formats must not be empty".into(),
            ));
        }
        if !v.preferred_format.is_modern() {
            return Err(ConfigError::Validation(format!(
                "variants.preferred_format must be a modern format, got {}",
                v.preferred_format
            )));
        }
        if v.placeholder_width == 0 {
            return Err(ConfigError::Validation(
                "variants.placeholder_width must be non-zero".into(),
            ));
        }
        for (name, q) in v.quality.entries() {
            if q == 0 || q > 100 {
                return Err(ConfigError::Validation(format!(
                    "variants.quality.{name} must be 1-100"
                )));
            }
        }
        if self.assets.dirs.is_empty() {
            return Err(ConfigError::Validation(
                "assets.dirs must not be empty".into(),
            ));
        }
        for dir in &self.assets.dirs {
            if !is_plain_relative(Path::new(dir)) {
                return Err(ConfigError::Validation(format!(
                    "assets.dirs entry '{dir}' must be a relative path without '..'"
                )));
            }
        }
        for rule in &self.budget.rules {
            if rule.max_kib == 0 {
                return Err(ConfigError::Validation(format!(
                    "budget rule {}w {} must have max_kib > 0",
                    rule.width, rule.format
                )));
            }
        }
        Ok(())
    }

    /// Absolute public root for a project directory.
    pub fn public_root(&self, project: &Path) -> PathBuf {
        project.join(&self.assets.public_root)
    }

    /// Managed asset directories (the only places the pipeline may write or delete).
    pub fn managed_roots(&self, project: &Path) -> Vec<PathBuf> {
        let public = self.public_root(project);
        self.assets.dirs.iter().map(|d| public.join(d)).collect()
    }

    /// URL prefixes of the managed directories, e.g. `/gallery/`.
    pub fn asset_prefixes(&self) -> Vec<String> {
        self.assets
            .dirs
            .iter()
            .map(|d| format!("/{}/", d.trim_matches('/')))
            .collect()
    }

    pub fn manifest_path(&self, project: &Path) -> PathBuf {
        project.join(&self.manifest.output)
    }

    pub fn reports_dir(&self, project: &Path) -> PathBuf {
        project.join(&self.reports.dir)
    }
}

/// True for `a/b`, false for `/a`, `../a`, `a/../b`.
fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
        && path.components().next().is_some()
}

/// Location of the managed image tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Web root directory; public URLs are paths relative to it.
    pub public_root: String,
    /// Managed asset directories under the public root.
    pub dirs: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            public_root: "public".to_string(),
            dirs: vec!["gallery".to_string()],
        }
    }
}

/// Variant generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantsConfig {
    /// Ascending width ladder.
    pub widths: Vec<u32>,
    /// Formats generated at every ladder width.
    pub formats: Vec<AssetFormat>,
    /// Format of the `<group>.<ext>` base default.
    pub preferred_format: AssetFormat,
    /// Sources below this size (KiB) are skipped.
    pub threshold_kib: u64,
    /// Width cap for the base default file.
    pub base_max_width: u32,
    /// Width of the blurred preview embedded in the sidecar.
    pub placeholder_width: u32,
    /// Gaussian sigma applied to the preview.
    pub placeholder_blur: f32,
    /// Encoding quality per format.
    pub quality: QualityConfig,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            widths: vec![320, 400, 640, 800, 1024, 1200, 1600, 1920],
            formats: vec![AssetFormat::Webp, AssetFormat::Avif, AssetFormat::Jpeg],
            preferred_format: AssetFormat::Webp,
            threshold_kib: 200,
            base_max_width: 1920,
            placeholder_width: 20,
            placeholder_blur: 2.5,
            quality: QualityConfig::default(),
        }
    }
}

/// Lossy encoding quality per output format (1-100).
///
/// WebP output is lossless (the pure-Rust encoder has no lossy mode), so its
/// value is carried for completeness but has no effect on the bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub webp: u32,
    pub avif: u32,
    pub jpg: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            webp: 80,
            avif: 60,
            jpg: 82,
        }
    }
}

impl QualityConfig {
    pub fn for_format(&self, format: AssetFormat) -> Quality {
        match format {
            AssetFormat::Webp => Quality::new(self.webp),
            AssetFormat::Avif => Quality::new(self.avif),
            AssetFormat::Jpeg => Quality::new(self.jpg),
            AssetFormat::Png => Quality::default(),
        }
    }

    fn entries(&self) -> [(&'static str, u32); 3] {
        [("webp", self.webp), ("avif", self.avif), ("jpg", self.jpg)]
    }
}

/// One `(width, format) → max KiB` budget entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetRule {
    pub width: u32,
    pub format: AssetFormat,
    pub max_kib: u64,
}

/// Byte budget table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    pub rules: Vec<BudgetRule>,
}

impl BudgetConfig {
    /// Budget for a width/format pair, in bytes.
    pub fn limit_bytes(&self, width: u32, format: AssetFormat) -> Option<u64> {
        self.rules
            .iter()
            .find(|r| r.width == width && r.format == format)
            .map(|r| r.max_kib * 1024)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        // webp, avif, jpg limits in KiB per ladder width
        const TABLE: &[(u32, u64, u64, u64)] = &[
            (320, 40, 30, 45),
            (400, 55, 40, 60),
            (640, 110, 80, 120),
            (800, 160, 120, 180),
            (1024, 250, 180, 280),
            (1200, 320, 240, 360),
            (1600, 520, 380, 600),
            (1920, 700, 520, 820),
        ];
        let rules = TABLE
            .iter()
            .flat_map(|&(width, webp, avif, jpg)| {
                [
                    (AssetFormat::Webp, webp),
                    (AssetFormat::Avif, avif),
                    (AssetFormat::Jpeg, jpg),
                ]
                .into_iter()
                .map(move |(format, max_kib)| BudgetRule {
                    width,
                    format,
                    max_kib,
                })
            })
            .collect();
        Self { rules }
    }
}

/// Reference scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Whitelisted source directories (relative to the project root).
    pub dirs: Vec<String>,
    /// Directory names never descended into.
    pub exclude: Vec<String>,
    /// Text file extensions that are read.
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dirs: vec!["src".to_string()],
            exclude: ["node_modules", "dist", "build", ".git", "target"]
                .map(String::from)
                .to_vec(),
            extensions: [
                "astro", "css", "html", "js", "json", "jsx", "md", "mdx", "ts", "tsx", "vue",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// Manifest output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestConfig {
    pub output: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            output: "src/generated/image-manifest.json".to_string(),
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportsConfig {
    pub dir: String,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: ".asset-pipeline".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` if it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `asset-pipeline.toml` from the project root (or an explicit path).
pub fn load_config(project: &Path, explicit: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::MissingInput(p.to_path_buf()));
            }
            p.to_path_buf()
        }
        None => project.join(CONFIG_FILENAME),
    };
    resolve_config(load_raw_config(&path)?)
}

/// Returns a fully-commented stock `asset-pipeline.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Gallery asset pipeline configuration
# ====================================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Managed image tree
# ---------------------------------------------------------------------------
[assets]
# Web root. Manifest keys are URL paths relative to it (e.g. /gallery/sunset).
public_root = "public"
# Directories under the web root that this pipeline owns. Nothing outside
# them is ever written to or deleted.
dirs = ["gallery"]

# ---------------------------------------------------------------------------
# Variant generation
# ---------------------------------------------------------------------------
[variants]
# Width ladder, ascending. Widths above a source's own width are skipped.
widths = [320, 400, 640, 800, 1024, 1200, 1600, 1920]
# Formats written at every ladder width: <group>-<width>w.<format>
formats = ["webp", "avif", "jpg"]
# Format of the <group>.<format> base default; must be webp or avif.
preferred_format = "webp"
# Sources smaller than this (KiB) are left alone.
threshold_kib = 200
# The base default is encoded at the source width, capped here.
base_max_width = 1920
# Blurred preview embedded in <group>.meta.json.
placeholder_width = 20
placeholder_blur = 2.5

[variants.quality]
webp = 80   # informational: webp output is lossless
avif = 60
jpg = 82

# ---------------------------------------------------------------------------
# Byte budgets, checked by `check-budget` against changed files
# ---------------------------------------------------------------------------
# [[budget.rules]]
# width = 640
# format = "webp"
# max_kib = 110

# ---------------------------------------------------------------------------
# Reference scanning
# ---------------------------------------------------------------------------
[scan]
dirs = ["src"]
exclude = ["node_modules", "dist", "build", ".git", "target"]
extensions = ["astro", "css", "html", "js", "json", "jsx", "md", "mdx", "ts", "tsx", "vue"]

# ---------------------------------------------------------------------------
# Outputs
# ---------------------------------------------------------------------------
[manifest]
output = "src/generated/image-manifest.json"

[reports]
dir = ".asset-pipeline"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
