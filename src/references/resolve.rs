//! Resolution of filtered references against the asset index.

use super::filter::{ImageRef, KNOWN_EXTENSIONS, is_extensionless};
use crate::index::AssetIndex;
use std::collections::HashMap;

/// Lookup table of every group key and concrete URL in the index.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    /// Key → owning group key.
    exact: HashMap<String, String>,
    /// Lowercased key → first key (in sorted order) that lowercases to it.
    folded: HashMap<String, String>,
}

impl Resolver {
    pub fn from_index(index: &AssetIndex) -> Self {
        let mut resolver = Self::default();
        for group in index.groups.values() {
            resolver.insert(&group.key, &group.key);
            for v in &group.variants {
                resolver.insert(&v.url, &group.key);
            }
        }
        resolver
    }

    fn insert(&mut self, key: &str, group: &str) {
        self.exact.insert(key.to_string(), group.to_string());
        self.folded
            .entry(key.to_lowercase())
            .or_insert_with(|| key.to_string());
    }

    fn lookup(&self, candidate: &str) -> Option<&str> {
        self.exact.get_key_value(candidate).map(|(k, _)| k.as_str())
    }

    fn lookup_folded(&self, candidate: &str) -> Option<&str> {
        self.folded.get(&candidate.to_lowercase()).map(String::as_str)
    }

    /// Group key owning `key`, if `key` is known.
    pub fn group_of(&self, key: &str) -> Option<&str> {
        self.exact.get(key).map(String::as_str)
    }

    /// Resolve a reference to a known key.
    ///
    /// Order: exact raw, exact decoded, case-insensitive raw then decoded, and
    /// for extension-less references each of [`KNOWN_EXTENSIONS`] appended.
    pub fn resolve(&self, reference: &ImageRef) -> Option<&str> {
        let forms = [reference.raw.as_str(), reference.decoded.as_str()];
        if let Some(key) = forms.iter().find_map(|f| self.lookup(f)) {
            return Some(key);
        }
        if let Some(key) = forms.iter().find_map(|f| self.lookup_folded(f)) {
            return Some(key);
        }
        if is_extensionless(&reference.decoded) {
            for ext in KNOWN_EXTENSIONS {
                let with_ext = format!("{}.{}", reference.decoded, ext);
                if let Some(key) = self.lookup(&with_ext).or_else(|| self.lookup_folded(&with_ext)) {
                    return Some(key);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::filter::filter_candidate;
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    fn resolver_for(files: &[&str]) -> Resolver {
        let tmp = TempDir::new().unwrap();
        for f in files {
            write_file(&tmp.path().join("gallery").join(f), 1);
        }
        let index = AssetIndex::build(tmp.path(), &["gallery".to_string()]).unwrap();
        Resolver::from_index(&index)
    }

    fn resolve(resolver: &Resolver, literal: &str) -> Option<String> {
        let r = filter_candidate(literal, &["/gallery/".to_string()])?;
        resolver.resolve(&r).map(String::from)
    }

    #[test]
    fn exact_variant_and_group_key() {
        let resolver = resolver_for(&["event-1.jpg", "event-1-640w.webp"]);
        assert_eq!(
            resolve(&resolver, "/gallery/event-1-640w.webp").as_deref(),
            Some("/gallery/event-1-640w.webp")
        );
        assert_eq!(
            resolve(&resolver, "/gallery/event-1").as_deref(),
            Some("/gallery/event-1")
        );
        assert_eq!(resolver.group_of("/gallery/event-1-640w.webp"), Some("/gallery/event-1"));
    }

    #[test]
    fn missing_reference() {
        let resolver = resolver_for(&["event-1.jpg"]);
        assert_eq!(resolve(&resolver, "/gallery/missing.jpg"), None);
    }

    #[test]
    fn decoded_and_case_insensitive() {
        let resolver = resolver_for(&["My Photo.jpg"]);
        assert_eq!(
            resolve(&resolver, "/gallery/My%20Photo.jpg").as_deref(),
            Some("/gallery/My Photo.jpg")
        );
        assert_eq!(
            resolve(&resolver, "/gallery/my photo.JPG").as_deref(),
            Some("/gallery/My Photo.jpg")
        );
    }

    #[test]
    fn extensionless_tries_known_extensions() {
        let mut resolver = Resolver::default();
        resolver.insert("/gallery/a/b.avif", "/gallery/a/b.avif");
        assert_eq!(
            resolve(&resolver, "/gallery/a/b").as_deref(),
            Some("/gallery/a/b.avif")
        );
    }
}
