//! Pass 1: lexical extraction of candidate literals.
//!
//! Cheap and deliberately over-inclusive. Anything that might be a root-relative
//! path is pulled out with its line number; [`super::filter`] decides what is
//! actually an image reference.
//!
//! Recognised shapes:
//!
//! ```text
//! "…"  '…'  `…`        quoted contents starting with '/'
//! url(/…)  url("/…")   CSS
//! ](/…)                markdown link or image target
//! ```
//!
//! Quoted literals holding a srcset-style list (`"/a-320w.webp 320w, /a-640w.webp 640w"`)
//! are split into their individual URLs. Template literals containing `${` are
//! skipped because their value is only known at runtime.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static DOUBLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"\n]*)""#).expect("valid regex"));
// Opening quote must not follow a word character (`it's`).
static SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^|[^\w'])'([^'\n]*)'").expect("valid regex"));
static BACKTICK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid regex"));
static SRCSET_DESCRIPTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\d+(?:\.\d+)?[wx]\s*(?:,|$)").expect("valid regex"));
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?(/[^"')\s]+)["']?\s*\)"#).expect("valid regex")
});
static MARKDOWN_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(\s*(/[^)\s]+)").expect("valid regex"));

/// A literal found in source text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    /// 1-based line of the match start.
    pub line: usize,
    pub literal: String,
}

/// Byte offsets where each line starts.
fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

fn line_of(starts: &[usize], offset: usize) -> usize {
    match starts.binary_search(&offset) {
        Ok(i) => i + 1,
        Err(i) => i,
    }
}

/// Split a quoted literal into the root-relative paths it names.
fn split_quoted(content: &str) -> Vec<&str> {
    let trimmed = content.trim();
    if !trimmed.starts_with('/') {
        return Vec::new();
    }
    if SRCSET_DESCRIPTOR.is_match(trimmed) {
        // "url 320w, url 640w"
        return trimmed
            .split(',')
            .filter_map(|part| part.split_whitespace().next())
            .filter(|token| token.starts_with('/'))
            .collect();
    }
    if trimmed.contains(',') {
        return trimmed
            .split(',')
            .map(str::trim)
            .filter(|part| part.starts_with('/'))
            .collect();
    }
    vec![trimmed]
}

/// Extract every candidate literal with its line number, de-duplicated per line.
pub fn extract_candidates(text: &str) -> Vec<Candidate> {
    let starts = line_starts(text);
    let mut found = BTreeSet::new();

    for re in [&*DOUBLE_QUOTED, &*SINGLE_QUOTED, &*BACKTICK] {
        for caps in re.captures_iter(text) {
            let Some(content) = caps.get(1) else {
                continue;
            };
            if content.as_str().contains("${") {
                continue;
            }
            let line = line_of(&starts, content.start());
            for literal in split_quoted(content.as_str()) {
                found.insert(Candidate {
                    line,
                    literal: literal.to_string(),
                });
            }
        }
    }

    for re in [&*CSS_URL, &*MARKDOWN_TARGET] {
        for caps in re.captures_iter(text) {
            if let Some(target) = caps.get(1) {
                found.insert(Candidate {
                    line: line_of(&starts, target.start()),
                    literal: target.as_str().to_string(),
                });
            }
        }
    }

    found.into_iter().collect()
}
