//! In-memory index of the managed image tree.
//!
//! Built once per run by walking the managed directories under the public
//! root, then handed to the manifest builder, the reference resolver and the
//! prune analyzer so they all see the same grouping.
//!
//! ```text
//! public/gallery/sunset.jpg            → /gallery/sunset  (width None, jpg)
//! public/gallery/sunset-640w.webp      → /gallery/sunset  (640, webp)
//! public/gallery/sunset.meta.json      → sidecar of /gallery/sunset
//! public/gallery/events/a-320w.avif    → /gallery/events/a (320, avif)
//! ```
//!
//! Hidden files and directories (including in-flight `.*.tmp` staging files)
//! are skipped. Links are not followed.

use crate::config::PipelineConfig;
use crate::naming::{self, AssetFormat};
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// One concrete raster file in the managed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    /// Public URL, e.g. `/gallery/sunset-640w.webp`.
    pub url: String,
    /// Absolute filesystem path.
    pub path: PathBuf,
    /// Owning group key, e.g. `/gallery/sunset`.
    pub group: String,
    /// `None` for unsuffixed files (sources and base defaults).
    pub width: Option<u32>,
    pub format: AssetFormat,
    pub size_bytes: u64,
}

/// All files sharing one group key.
#[derive(Debug, Clone)]
pub struct AssetGroup {
    pub key: String,
    /// Members sorted by URL.
    pub variants: Vec<VariantDescriptor>,
    pub sidecar: Option<PathBuf>,
}

impl AssetGroup {
    /// A group is an orphan when no unsuffixed file (source or base default) remains.
    pub fn is_orphan(&self) -> bool {
        self.variants.iter().all(|v| v.width.is_some())
    }

    pub fn has_format_at(&self, width: u32, format: AssetFormat) -> bool {
        self.variants
            .iter()
            .any(|v| v.width == Some(width) && v.format == format)
    }
}

/// `GroupKey → [VariantDescriptor]` for the managed directories.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    pub public_root: PathBuf,
    pub groups: BTreeMap<String, AssetGroup>,
    url_to_group: HashMap<String, String>,
}

impl AssetIndex {
    /// Index the managed directories named in the config.
    pub fn from_config(config: &PipelineConfig, project: &Path) -> Result<Self, IndexError> {
        Self::build(&config.public_root(project), &config.assets.dirs)
    }

    /// Walk `public_root/<dir>` for every dir. Missing directories are empty.
    pub fn build(public_root: &Path, dirs: &[String]) -> Result<Self, IndexError> {
        let mut groups: BTreeMap<String, AssetGroup> = BTreeMap::new();
        let mut sidecars: Vec<(String, PathBuf)> = Vec::new();

        for dir in dirs {
            let root = public_root.join(dir);
            if !root.is_dir() {
                continue;
            }
            let walker = WalkDir::new(&root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

            for entry in walker {
                let entry = entry.map_err(|source| IndexError::Walk {
                    path: root.clone(),
                    source,
                })?;
                let path = entry.path();
                // Follows links so a live symlink still counts; dangling ones drop out.
                let Ok(meta) = std::fs::metadata(path) else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                let Some(url) = url_for_path(public_root, path) else {
                    continue;
                };
                let file_name = entry.file_name().to_string_lossy();
                let url_dir = url_parent(&url);

                if let Some(group) = naming::sidecar_group(&file_name) {
                    sidecars.push((format!("{url_dir}/{group}"), path.to_path_buf()));
                    continue;
                }
                let Some(parsed) = naming::parse_asset_name(&file_name) else {
                    continue;
                };
                let key = format!("{url_dir}/{}", parsed.group);
                groups
                    .entry(key.clone())
                    .or_insert_with(|| AssetGroup {
                        key: key.clone(),
                        variants: Vec::new(),
                        sidecar: None,
                    })
                    .variants
                    .push(VariantDescriptor {
                        url,
                        path: path.to_path_buf(),
                        group: key,
                        width: parsed.width,
                        format: parsed.format,
                        size_bytes: meta.len(),
                    });
            }
        }

        for (key, path) in sidecars {
            if let Some(group) = groups.get_mut(&key) {
                group.sidecar = Some(path);
            }
        }

        let mut url_to_group = HashMap::new();
        for group in groups.values_mut() {
            group.variants.sort_by(|a, b| a.url.cmp(&b.url));
            for v in &group.variants {
                url_to_group.insert(v.url.clone(), group.key.clone());
            }
        }

        Ok(Self {
            public_root: public_root.to_path_buf(),
            groups,
            url_to_group,
        })
    }

    pub fn group(&self, key: &str) -> Option<&AssetGroup> {
        self.groups.get(key)
    }

    /// Look up a concrete file by its public URL.
    pub fn find_url(&self, url: &str) -> Option<&VariantDescriptor> {
        let key = self.url_to_group.get(url)?;
        self.groups.get(key)?.variants.iter().find(|v| v.url == url)
    }

    pub fn variants(&self) -> impl Iterator<Item = &VariantDescriptor> {
        self.groups.values().flat_map(|g| g.variants.iter())
    }

    pub fn variant_count(&self) -> usize {
        self.url_to_group.len()
    }

    /// Groups whose source and base default are both gone.
    pub fn orphans(&self) -> Vec<&AssetGroup> {
        self.groups.values().filter(|g| g.is_orphan()).collect()
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

/// `/gallery/sub` for `/gallery/sub/file.webp`.
fn url_parent(url: &str) -> &str {
    url.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Public URL of a file under the public root: `/` + relative path with `/` separators.
pub fn url_for_path(public_root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(public_root).ok()?;
    let mut url = String::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                url.push('/');
                url.push_str(&part.to_string_lossy());
            }
            _ => return None,
        }
    }
    if url.is_empty() { None } else { Some(url) }
}
