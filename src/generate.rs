//! Responsive variant generation.
//!
//! Walks the asset roots for source images and writes, next to each source:
//!
//! ```text
//! gallery/
//! ├── sunset.jpg               # source (≥ threshold, untouched)
//! ├── sunset-320w.webp         # one file per ladder width × target format
//! ├── sunset-320w.avif
//! ├── sunset-320w.jpg
//! ├── ...
//! ├── sunset-1920w.jpg
//! ├── sunset.webp              # base default, source width capped at base_max_width
//! └── sunset.meta.json         # { placeholder, aspectRatio }
//! ```
//!
//! ## Source discovery
//!
//! A file is a source when it has a source extension (`jpg`, `jpeg`, `png`,
//! `webp`), carries no `-<digits>w` suffix and is at least `threshold_kib`
//! large. Where one directory holds several sources for the same group (the
//! usual case being `sunset.jpg` next to its own generated `sunset.webp`), the
//! legacy original wins over webp, then the larger file.
//!
//! ## Idempotence
//!
//! A variant is skipped when a file with its name already exists. Nothing is
//! compared beyond existence: replacing `sunset.jpg` with a different photo
//! keeps the old variants until they are deleted by hand. Every write goes to
//! a hidden staging file first and is renamed into place, so an interrupted
//! run never leaves a partial file that a later run would mistake for done.
//!
//! ## Failures
//!
//! An unreadable source is reported and skipped. A failed encode is reported
//! for that one variant; its siblings are still attempted. Neither aborts the
//! batch. Sources are processed in parallel on the rayon pool.

use crate::atomic;
use crate::config::{PipelineConfig, VariantsConfig};
use crate::imaging::{
    self, BackendError, Dimensions, ImageBackend, Quality, ResizeParams, RustBackend,
};
use crate::metadata;
use crate::naming::{self, AssetFormat};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Asset root not found: {0}")]
    MissingRoot(PathBuf),
}

/// Per-image failures. These become report entries, never stage errors.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("cannot read {}: {source}", .path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("cannot encode {}: {source}", .path.display())]
    Transcode {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Inputs for one generator run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Directories walked for sources.
    pub roots: Vec<PathBuf>,
    pub threshold_kib: u64,
    pub variants: VariantsConfig,
}

impl GenerateOptions {
    /// Managed roots and variant settings from the config; `root` replaces the roots.
    pub fn from_config(
        config: &PipelineConfig,
        project: &Path,
        root: Option<PathBuf>,
        threshold_kib: Option<u64>,
    ) -> Self {
        Self {
            roots: root
                .map(|r| vec![r])
                .unwrap_or_else(|| config.managed_roots(project)),
            threshold_kib: threshold_kib.unwrap_or(config.variants.threshold_kib),
            variants: config.variants.clone(),
        }
    }

    fn threshold_bytes(&self) -> u64 {
        self.threshold_kib * 1024
    }
}

/// A discovered source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    pub dir: PathBuf,
    pub group: String,
    pub format: AssetFormat,
    pub size_bytes: u64,
}

/// Status of a single output after processing.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantStatus {
    /// Already on disk, left alone.
    Existing,
    /// Written by this run.
    Encoded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantInfo {
    /// `320w webp`, `base webp` or `sidecar`.
    pub label: String,
    pub status: VariantStatus,
}

/// Progress events emitted while sources are processed.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateEvent {
    ImageProcessed {
        source: String,
        group: String,
        dimensions: (u32, u32),
        variants: Vec<VariantInfo>,
    },
    ImageFailed {
        source: String,
        error: String,
    },
}

/// Counts across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub sources: usize,
    pub encoded: usize,
    pub existing: usize,
    pub failed: usize,
    pub failed_sources: usize,
}

impl GenerateSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.failed_sources > 0
    }

    fn record(&mut self, event: &GenerateEvent) {
        self.sources += 1;
        match event {
            GenerateEvent::ImageProcessed { variants, .. } => {
                for v in variants {
                    match v.status {
                        VariantStatus::Existing => self.existing += 1,
                        VariantStatus::Encoded => self.encoded += 1,
                        VariantStatus::Failed(_) => self.failed += 1,
                    }
                }
            }
            GenerateEvent::ImageFailed { .. } => self.failed_sources += 1,
        }
    }
}

impl fmt::Display for GenerateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources: {} encoded, {} existing, {} failed",
            self.sources, self.encoded, self.existing, self.failed
        )?;
        if self.failed_sources > 0 {
            write!(f, ", {} unreadable", self.failed_sources)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct GenerateResult {
    /// One event per source, in source path order.
    pub images: Vec<GenerateEvent>,
    pub summary: GenerateSummary,
}

pub fn generate(
    options: &GenerateOptions,
    events: Option<Sender<GenerateEvent>>,
) -> Result<GenerateResult, GenerateError> {
    generate_with_backend(&RustBackend::new(), options, events)
}

/// Generate variants using a specific backend (allows testing with mock).
pub fn generate_with_backend(
    backend: &impl ImageBackend,
    options: &GenerateOptions,
    events: Option<Sender<GenerateEvent>>,
) -> Result<GenerateResult, GenerateError> {
    let sources = discover_sources(&options.roots, options.threshold_bytes())?;

    let images: Vec<GenerateEvent> = sources
        .par_iter()
        .map(|source| {
            let event = process_source(backend, source, &options.variants);
            if let Some(tx) = events.as_ref() {
                // Receiver gone just means nobody is printing
                let _ = tx.send(event.clone());
            }
            event
        })
        .collect();

    let mut summary = GenerateSummary::default();
    for event in &images {
        summary.record(event);
    }
    Ok(GenerateResult { images, summary })
}

/// Find every source at or above `threshold_bytes` under `roots`.
pub fn discover_sources(
    roots: &[PathBuf],
    threshold_bytes: u64,
) -> Result<Vec<SourceImage>, GenerateError> {
    let mut by_group: HashMap<(PathBuf, String), SourceImage> = HashMap::new();

    for root in roots {
        if !root.is_dir() {
            return Err(GenerateError::MissingRoot(root.clone()));
        }
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
            });
        for entry in walker {
            let entry = entry.map_err(|source| GenerateError::Walk {
                path: root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !naming::is_source_name(&name) {
                continue;
            }
            let Some(parsed) = naming::parse_asset_name(&name) else {
                continue;
            };
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size_bytes < threshold_bytes {
                continue;
            }
            let dir = entry
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let candidate = SourceImage {
                path: entry.path().to_path_buf(),
                dir: dir.clone(),
                group: parsed.group.clone(),
                format: parsed.format,
                size_bytes,
            };
            by_group
                .entry((dir, parsed.group))
                .and_modify(|current| {
                    if prefer_source(&candidate, current) {
                        *current = candidate.clone();
                    }
                })
                .or_insert(candidate);
        }
    }

    let mut sources: Vec<SourceImage> = by_group.into_values().collect();
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

/// Whether `candidate` should replace `current` as the group's source.
fn prefer_source(candidate: &SourceImage, current: &SourceImage) -> bool {
    let legacy = |s: &SourceImage| s.format != AssetFormat::Webp;
    match (legacy(candidate), legacy(current)) {
        (true, false) => true,
        (false, true) => false,
        _ => (candidate.size_bytes, &candidate.path) > (current.size_bytes, &current.path),
    }
}

fn process_source(
    backend: &impl ImageBackend,
    source: &SourceImage,
    variants: &VariantsConfig,
) -> GenerateEvent {
    let display = source.path.display().to_string();
    let dims = match backend.identify(&source.path) {
        Ok(d) => d,
        Err(e) => {
            let error = ImageError::SourceRead {
                path: source.path.clone(),
                source: e,
            };
            return GenerateEvent::ImageFailed {
                source: display,
                error: error.to_string(),
            };
        }
    };

    let mut infos = Vec::new();

    for step in imaging::applicable_widths(dims.as_tuple(), &variants.widths) {
        for &format in &variants.formats {
            let output = source
                .dir
                .join(naming::variant_file_name(&source.group, step.width, format));
            let status = ensure_encoded(
                backend,
                &source.path,
                &output,
                (step.width, step.height),
                format,
                variants.quality.for_format(format),
            );
            infos.push(VariantInfo {
                label: format!("{}w {}", step.width, format),
                status,
            });
        }
    }

    let preferred = variants.preferred_format;
    let base = source
        .dir
        .join(naming::base_file_name(&source.group, preferred));
    let base_status = if base == source.path {
        VariantStatus::Existing
    } else {
        ensure_encoded(
            backend,
            &source.path,
            &base,
            imaging::base_dimensions(dims.as_tuple(), variants.base_max_width),
            preferred,
            variants.quality.for_format(preferred),
        )
    };
    infos.push(VariantInfo {
        label: format!("base {preferred}"),
        status: base_status,
    });

    infos.push(VariantInfo {
        label: "sidecar".to_string(),
        status: ensure_sidecar(backend, source, dims, variants),
    });

    GenerateEvent::ImageProcessed {
        source: display,
        group: source.group.clone(),
        dimensions: dims.as_tuple(),
        variants: infos,
    }
}

/// Encode `output` unless it already exists.
fn ensure_encoded(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    (width, height): (u32, u32),
    format: AssetFormat,
    quality: Quality,
) -> VariantStatus {
    if output.exists() {
        return VariantStatus::Existing;
    }
    match encode_variant(backend, source, output, width, height, format, quality) {
        Ok(()) => VariantStatus::Encoded,
        Err(e) => VariantStatus::Failed(e.to_string()),
    }
}

fn encode_variant(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    width: u32,
    height: u32,
    format: AssetFormat,
    quality: Quality,
) -> Result<(), ImageError> {
    let staging = atomic::temp_path_for(output);
    let params = ResizeParams {
        source: source.to_path_buf(),
        output: staging.clone(),
        width,
        height,
        format,
        quality,
    };
    if let Err(e) = backend.resize(&params) {
        let _ = std::fs::remove_file(&staging);
        return Err(ImageError::Transcode {
            path: output.to_path_buf(),
            source: e,
        });
    }
    atomic::publish(&staging, output).map_err(|e| ImageError::Write {
        path: output.to_path_buf(),
        source: e,
    })
}

fn ensure_sidecar(
    backend: &impl ImageBackend,
    source: &SourceImage,
    dims: Dimensions,
    variants: &VariantsConfig,
) -> VariantStatus {
    let path = source.dir.join(naming::sidecar_file_name(&source.group));
    if path.exists() {
        return VariantStatus::Existing;
    }
    let result = metadata::build_sidecar(backend, &source.path, dims, variants)
        .map_err(|e| ImageError::Transcode {
            path: path.clone(),
            source: e,
        })
        .and_then(|sidecar| {
            atomic::write_json_atomic(&path, &sidecar).map_err(|e| ImageError::Write {
                path: path.clone(),
                source: e,
            })
        });
    match result {
        Ok(()) => VariantStatus::Encoded,
        Err(e) => VariantStatus::Failed(e.to_string()),
    }
}
