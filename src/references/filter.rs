//! Pass 2: semantic filter over extracted candidates.
//!
//! A candidate survives when, after dropping any `?query` or `#fragment`, it
//! is either
//!
//! - a root-relative path ending in a known raster extension
//!   (`/gallery/sunset-640w.webp`, `/img/logo.png`), or
//! - extension-less and under a managed asset prefix (`/gallery/sunset`), which
//!   is how rendering code names a group key.
//!
//! Survivors are percent-decoded; raw and decoded forms are both kept because
//! either may be what the manifest knows.

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;

/// Extensions tried, in order, when resolving an extension-less reference.
pub const KNOWN_EXTENSIONS: &[&str] = &["webp", "avif", "jpg", "jpeg", "png"];

static IMAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/(?:[^/\n]+/)*[^/\n]+\.(?:webp|avif|jpe?g|png)$").expect("valid regex")
});

/// An accepted image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Literal as written, minus query and fragment.
    pub raw: String,
    pub decoded: String,
}

/// Drop `?query` and `#fragment`.
pub fn strip_query_fragment(literal: &str) -> &str {
    literal
        .split(['?', '#'])
        .next()
        .unwrap_or(literal)
}

pub fn has_known_extension(path: &str) -> bool {
    IMAGE_PATH.is_match(path)
}

/// Whether the last path segment carries no extension at all.
pub fn is_extensionless(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|segment| !segment.is_empty() && !segment.contains('.'))
}

pub fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Apply the image-path grammar to one candidate.
pub fn filter_candidate(literal: &str, asset_prefixes: &[String]) -> Option<ImageRef> {
    let raw = strip_query_fragment(literal.trim());
    if !raw.starts_with('/') || raw.starts_with("//") {
        return None;
    }
    let decoded = decode(raw);
    let accepted = has_known_extension(&decoded)
        || (is_extensionless(&decoded)
            && asset_prefixes.iter().any(|p| decoded.starts_with(p.as_str())));
    accepted.then(|| ImageRef {
        raw: raw.to_string(),
        decoded,
    })
}
