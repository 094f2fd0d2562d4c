//! The source-text corpus: every whitelisted text file, read once.
//!
//! A file that can't be read is recorded in [`Corpus::unreadable`] and left
//! out; the rest of the corpus still loads.

use super::{ScanError, ScanOptions};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One text file of the corpus.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub path: PathBuf,
    pub text: String,
}

/// A corpus file whose read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub files: Vec<SourceText>,
    pub unreadable: Vec<ReadFailure>,
    joined: String,
}

impl Corpus {
    /// Collect and read every corpus file.
    pub fn load(options: &ScanOptions) -> Result<Self, ScanError> {
        Ok(Self::read_files(&collect_files(options)?))
    }

    /// Read the given files. Non-UTF-8 bytes are replaced, not rejected.
    pub fn read_files(paths: &[PathBuf]) -> Self {
        let results: Vec<Result<SourceText, ReadFailure>> = paths
            .par_iter()
            .map(|path| match std::fs::read(path) {
                Ok(bytes) => Ok(SourceText {
                    path: path.clone(),
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                }),
                Err(e) => Err(ReadFailure {
                    path: path.clone(),
                    error: e.to_string(),
                }),
            })
            .collect();

        let mut files = Vec::new();
        let mut unreadable = Vec::new();
        for result in results {
            match result {
                Ok(file) => files.push(file),
                Err(failure) => unreadable.push(failure),
            }
        }
        let joined = files
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            files,
            unreadable,
            joined,
        }
    }

    /// Whether every collected file made it into the corpus.
    pub fn is_complete(&self) -> bool {
        self.unreadable.is_empty()
    }

    /// Substring search over all files at once.
    pub fn contains(&self, needle: &str) -> bool {
        !needle.is_empty() && self.joined.contains(needle)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_excluded_file(path: &Path, excluded: &[PathBuf]) -> bool {
    let canonical = path.canonicalize().ok();
    excluded.iter().any(|ex| {
        ex == path || (canonical.is_some() && ex.canonicalize().ok() == canonical)
    })
}

/// All files under the whitelisted dirs with a scanned extension, sorted.
pub fn collect_files(options: &ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::new();
    for dir in &options.dirs {
        if !dir.is_dir() {
            return Err(ScanError::MissingDir(dir.clone()));
        }
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.')
                    && !(e.file_type().is_dir() && options.exclude_dirs.iter().any(|x| *x == name))
            });
        for entry in walker {
            let entry = entry.map_err(|source| ScanError::Walk {
                path: dir.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let scanned = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| {
                    options
                        .extensions
                        .iter()
                        .any(|x| x.eq_ignore_ascii_case(ext))
                });
            if scanned && !is_excluded_file(path, &options.exclude_files) {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
