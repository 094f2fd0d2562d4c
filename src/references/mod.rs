//! Reference graph scanner.
//!
//! Finds every place the source tree names an image and checks it against the
//! managed index. Runs in two passes per file:
//!
//! 1. [`extract`]: lexical pull of candidate literals (quoted strings, CSS
//!    `url()`, markdown targets) with line numbers.
//! 2. [`filter`]: image-path grammar, query/fragment stripping and
//!    percent-decoding.
//!
//! Accepted references are then resolved by [`resolve::Resolver`]. The result
//! is a found/missing partition plus the set of referenced keys the prune
//! analyzer treats as untouchable.
//!
//! Files are scanned in parallel; the referenced set is merged from per-file
//! results, so scan order never matters.

pub mod corpus;
pub mod extract;
pub mod filter;
pub mod resolve;

use crate::config::PipelineConfig;
use crate::index::AssetIndex;
use corpus::{Corpus, SourceText};
use rayon::prelude::*;
use resolve::Resolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Scan directory not found: {0}")]
    MissingDir(PathBuf),
}

/// What to scan and how to recognise asset URLs.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Whitelisted directories.
    pub dirs: Vec<PathBuf>,
    /// Directory names never entered.
    pub exclude_dirs: Vec<String>,
    /// File extensions read as text.
    pub extensions: Vec<String>,
    /// Individual files skipped (the generated manifest names every variant).
    pub exclude_files: Vec<PathBuf>,
    /// `/gallery/`-style prefixes that make an extension-less literal an asset.
    pub asset_prefixes: Vec<String>,
    /// Report paths are shown relative to this.
    pub display_root: PathBuf,
}

impl ScanOptions {
    /// Options from the config; `dirs` (relative to the project) replaces `scan.dirs`.
    pub fn from_config(config: &PipelineConfig, project: &Path, dirs: &[PathBuf]) -> Self {
        let dirs = if dirs.is_empty() {
            config.scan.dirs.iter().map(|d| project.join(d)).collect()
        } else {
            dirs.iter().map(|d| project.join(d)).collect()
        };
        Self {
            dirs,
            exclude_dirs: config.scan.exclude.clone(),
            extensions: config.scan.extensions.clone(),
            exclude_files: vec![config.manifest_path(project)],
            asset_prefixes: config.asset_prefixes(),
            display_root: project.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceStatus {
    Found,
    Missing,
}

/// One image reference found in source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub source_file: String,
    pub line: usize,
    pub raw: String,
    pub decoded: String,
    pub status: ReferenceStatus,
    /// Index key the reference resolved to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    /// Group owning the resolved key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Scanner output, also written as the JSON report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub records: Vec<ReferenceRecord>,
    /// Every key some reference resolved to: concrete URLs and group keys.
    pub referenced: BTreeSet<String>,
    /// Corpus files that could not be read and were not scanned.
    #[serde(default)]
    pub unreadable: Vec<UnreadableFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadableFile {
    pub source_file: String,
    pub error: String,
}

impl ScanReport {
    pub fn found(&self) -> impl Iterator<Item = &ReferenceRecord> {
        self.records
            .iter()
            .filter(|r| r.status == ReferenceStatus::Found)
    }

    pub fn missing(&self) -> impl Iterator<Item = &ReferenceRecord> {
        self.records
            .iter()
            .filter(|r| r.status == ReferenceStatus::Missing)
    }

    pub fn is_referenced(&self, key: &str) -> bool {
        self.referenced.contains(key)
    }
}

fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Scan one file: extract, filter, resolve.
fn scan_file(
    file: &SourceText,
    resolver: &Resolver,
    options: &ScanOptions,
) -> (Vec<ReferenceRecord>, BTreeSet<String>) {
    let source_file = display_path(&options.display_root, &file.path);
    let mut records = Vec::new();
    let mut referenced = BTreeSet::new();

    for candidate in extract::extract_candidates(&file.text) {
        let Some(image) = filter::filter_candidate(&candidate.literal, &options.asset_prefixes)
        else {
            continue;
        };
        let resolved = resolver.resolve(&image).map(String::from);
        let group = resolved
            .as_deref()
            .and_then(|key| resolver.group_of(key))
            .map(String::from);
        if let Some(key) = &resolved {
            referenced.insert(key.clone());
        }
        records.push(ReferenceRecord {
            source_file: source_file.clone(),
            line: candidate.line,
            raw: image.raw,
            decoded: image.decoded,
            status: if resolved.is_some() {
                ReferenceStatus::Found
            } else {
                ReferenceStatus::Missing
            },
            resolved,
            group,
        });
    }
    (records, referenced)
}

/// Scan an already loaded corpus.
pub fn scan_corpus(corpus: &Corpus, resolver: &Resolver, options: &ScanOptions) -> ScanReport {
    let per_file: Vec<(Vec<ReferenceRecord>, BTreeSet<String>)> = corpus
        .files
        .par_iter()
        .map(|file| scan_file(file, resolver, options))
        .collect();

    let mut report = ScanReport {
        files_scanned: corpus.len(),
        unreadable: corpus
            .unreadable
            .iter()
            .map(|f| UnreadableFile {
                source_file: display_path(&options.display_root, &f.path),
                error: f.error.clone(),
            })
            .collect(),
        ..ScanReport::default()
    };
    for (records, referenced) in per_file {
        report.records.extend(records);
        report.referenced.extend(referenced);
    }
    report
}

/// Load the corpus and scan it against the index.
pub fn scan_references(
    options: &ScanOptions,
    index: &AssetIndex,
) -> Result<(Corpus, ScanReport), ScanError> {
    let corpus = Corpus::load(options)?;
    let report = scan_corpus(&corpus, &Resolver::from_index(index), options);
    Ok((corpus, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{write_file, write_text};
    use tempfile::TempDir;

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let gallery = tmp.path().join("public/gallery");
        write_file(&gallery.join("event-1.jpg"), 1);
        write_file(&gallery.join("event-1-640w.webp"), 1);
        write_file(&gallery.join("unused-320w.webp"), 1);
        tmp
    }

    fn run(tmp: &TempDir) -> ScanReport {
        let config = PipelineConfig::default();
        let index = AssetIndex::from_config(&config, tmp.path()).unwrap();
        let options = ScanOptions::from_config(&config, tmp.path(), &[]);
        scan_references(&options, &index).unwrap().1
    }

    #[test]
    fn found_and_missing_partition() {
        let tmp = project();
        write_text(
            &tmp.path().join("src/pages/index.astro"),
            "<img src=\"/gallery/event-1-640w.webp\">\n<img src=\"/gallery/missing.jpg\">\n",
        );

        let report = run(&tmp);
        let found: Vec<&str> = report.found().map(|r| r.raw.as_str()).collect();
        let missing: Vec<&ReferenceRecord> = report.missing().collect();
        assert_eq!(found, vec!["/gallery/event-1-640w.webp"]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].raw, "/gallery/missing.jpg");
        assert_eq!(missing[0].line, 2);
        assert_eq!(missing[0].source_file, "src/pages/index.astro");
    }

    #[test]
    fn referenced_set_holds_resolved_keys() {
        let tmp = project();
        write_text(
            &tmp.path().join("src/a.ts"),
            "export const hero = '/gallery/event-1-640w.webp';",
        );

        let report = run(&tmp);
        assert!(report.is_referenced("/gallery/event-1-640w.webp"));
        assert!(!report.is_referenced("/gallery/event-1"));
        assert!(!report.is_referenced("/gallery/unused-320w.webp"));
        let record = report.found().next().unwrap();
        assert_eq!(record.group.as_deref(), Some("/gallery/event-1"));
    }

    #[test]
    fn group_key_reference_resolves() {
        let tmp = project();
        write_text(&tmp.path().join("src/a.md"), "![x](/gallery/event-1)");

        let report = run(&tmp);
        assert_eq!(report.found().count(), 1);
        assert!(report.is_referenced("/gallery/event-1"));
    }

    #[test]
    fn manifest_file_is_not_scanned() {
        let tmp = project();
        write_text(
            &tmp.path().join("src/generated/image-manifest.json"),
            r#"{"/gallery/unused-320w.webp": "/gallery/unused-320w.webp"}"#,
        );
        write_text(&tmp.path().join("src/a.ts"), "");

        let report = run(&tmp);
        assert_eq!(report.files_scanned, 1);
        assert!(!report.is_referenced("/gallery/unused-320w.webp"));
    }

    #[test]
    fn unreadable_file_reported_scan_continues() {
        let tmp = project();
        let page = tmp.path().join("src/page.md");
        write_text(&page, "![](/gallery/event-1-640w.webp)");
        let config = PipelineConfig::default();
        let index = AssetIndex::from_config(&config, tmp.path()).unwrap();
        let options = ScanOptions::from_config(&config, tmp.path(), &[]);

        let corpus = Corpus::read_files(&[page, tmp.path().join("src/vanished.md")]);
        let report = scan_corpus(&corpus, &Resolver::from_index(&index), &options);

        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.found().count(), 1);
        assert_eq!(report.unreadable.len(), 1);
        assert_eq!(report.unreadable[0].source_file, "src/vanished.md");
    }

    #[test]
    fn report_serializes_status_lowercase() {
        let record = ReferenceRecord {
            source_file: "src/a.ts".to_string(),
            line: 1,
            raw: "/gallery/x.jpg".to_string(),
            decoded: "/gallery/x.jpg".to_string(),
            status: ReferenceStatus::Missing,
            resolved: None,
            group: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "missing");
        assert!(json.get("resolved").is_none());
    }
}
