//! Prune analysis: decide which proposed deletions are provably unused.
//!
//! A variant is safe to delete only when none of these appear anywhere in the
//! source corpus:
//!
//! - its path, project-relative (`public/gallery/a-640w.jpg`) or absolute
//! - its public URL, raw and percent-encoded
//! - its bare file name (`a-640w.jpg`)
//!
//! and neither its URL nor its group key was resolved by the reference scan.
//! While any corpus file is unreadable, nothing is safe.
//! Every hit is recorded as evidence on the candidate. A proposed file that is
//! not on disk is kept as not safe. This step only writes a plan; nothing is
//! deleted here.

use super::{ConsolidationPlan, PLAN_VERSION, PruneCandidate, PrunePlan};
use crate::index::{AssetIndex, VariantDescriptor};
use crate::references::ScanReport;
use crate::references::corpus::Corpus;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::path::{Path, PathBuf};

/// Characters a browser would escape in a URL path.
const URL_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub fn encode_url(url: &str) -> String {
    utf8_percent_encode(url, URL_PATH).to_string()
}

/// `/gallery/a-640w.jpg` for `a-640w.jpg` under group `/gallery/a`.
fn qualify(group: &str, variant: &str) -> String {
    if variant.starts_with('/') {
        return variant.to_string();
    }
    let dir = group.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    format!("{dir}/{variant}")
}

fn evidence_for(
    variant: &VariantDescriptor,
    project: &Path,
    corpus: &Corpus,
    scan: &ScanReport,
) -> Vec<String> {
    let mut evidence = Vec::new();

    let absolute = variant.path.to_string_lossy().into_owned();
    let relative = variant
        .path
        .strip_prefix(project)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| absolute.clone());
    for (label, needle) in [("path", &relative), ("absolute path", &absolute)] {
        if corpus.contains(needle) {
            evidence.push(format!("{label} {needle} appears in source"));
        }
    }

    if corpus.contains(&variant.url) {
        evidence.push(format!("url {} appears in source", variant.url));
    }
    let encoded = encode_url(&variant.url);
    if encoded != variant.url && corpus.contains(&encoded) {
        evidence.push(format!("encoded url {encoded} appears in source"));
    }

    let file_name = variant
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if corpus.contains(&file_name) {
        evidence.push(format!("file name {file_name} appears in source"));
    }

    if scan.is_referenced(&variant.url) {
        evidence.push(format!("{} resolved by reference scan", variant.url));
    }
    if scan.is_referenced(&variant.group) {
        evidence.push(format!("group {} resolved by reference scan", variant.group));
    }
    if !corpus.is_complete() {
        evidence.push(format!(
            "{} source files could not be read",
            corpus.unreadable.len()
        ));
    }
    evidence
}

fn unknown_candidate(public_root: &Path, group: &str, url: String) -> PruneCandidate {
    PruneCandidate {
        path: public_root.join(url.trim_start_matches('/')),
        url,
        group: group.to_string(),
        referenced: false,
        safe_to_delete: false,
        evidence: vec!["not found in managed asset index".to_string()],
    }
}

/// Evaluate every proposed candidate.
pub fn analyze(
    proposal: &ConsolidationPlan,
    index: &AssetIndex,
    corpus: &Corpus,
    scan: &ScanReport,
    project: &Path,
    managed_roots: &[PathBuf],
) -> PrunePlan {
    let mut candidates = Vec::new();

    for proposed in &proposal.candidates {
        let targets: Vec<String> = if proposed.variants.is_empty() {
            match index.group(&proposed.group) {
                Some(group) => group.variants.iter().map(|v| v.url.clone()).collect(),
                None => {
                    candidates.push(unknown_candidate(
                        &index.public_root,
                        &proposed.group,
                        proposed.group.clone(),
                    ));
                    continue;
                }
            }
        } else {
            proposed
                .variants
                .iter()
                .map(|v| qualify(&proposed.group, v))
                .collect()
        };

        for url in targets {
            let Some(variant) = index.find_url(&url) else {
                candidates.push(unknown_candidate(&index.public_root, &proposed.group, url));
                continue;
            };
            let evidence = evidence_for(variant, project, corpus, scan);
            candidates.push(PruneCandidate {
                path: variant.path.clone(),
                url: variant.url.clone(),
                group: variant.group.clone(),
                referenced: !evidence.is_empty(),
                safe_to_delete: evidence.is_empty(),
                evidence,
            });
        }
    }

    candidates.sort_by(|a, b| a.url.cmp(&b.url));
    candidates.dedup_by(|a, b| a.url == b.url);

    PrunePlan {
        version: PLAN_VERSION,
        public_root: index.public_root.clone(),
        managed_roots: managed_roots.to_vec(),
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::prune::ConsolidationGroup;
    use crate::references::{self, ScanOptions};
    use crate::test_helpers::{write_file, write_text};
    use tempfile::TempDir;

    fn plan_for(tmp: &TempDir, proposal: ConsolidationPlan) -> PrunePlan {
        let config = PipelineConfig::default();
        let index = AssetIndex::from_config(&config, tmp.path()).unwrap();
        let options = ScanOptions::from_config(&config, tmp.path(), &[]);
        let (corpus, scan) = references::scan_references(&options, &index).unwrap();
        analyze(
            &proposal,
            &index,
            &corpus,
            &scan,
            tmp.path(),
            &config.managed_roots(tmp.path()),
        )
    }

    fn proposal(group: &str, variants: &[&str]) -> ConsolidationPlan {
        ConsolidationPlan {
            candidates: vec![ConsolidationGroup {
                group: group.to_string(),
                variants: variants.iter().map(|v| v.to_string()).collect(),
            }],
        }
    }

    fn setup(source: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        let gallery = tmp.path().join("public/gallery");
        write_file(&gallery.join("a.jpg"), 1);
        write_file(&gallery.join("a-640w.jpg"), 1);
        write_file(&gallery.join("a-640w.webp"), 1);
        write_text(&tmp.path().join("src/page.md"), source);
        tmp
    }

    fn safety(plan: &PrunePlan) -> Vec<(&str, bool)> {
        plan.candidates
            .iter()
            .map(|c| (c.url.as_str(), c.safe_to_delete))
            .collect()
    }

    #[test]
    fn unreferenced_variant_is_safe() {
        let tmp = setup("nothing to see");
        let plan = plan_for(&tmp, proposal("/gallery/a", &["a-640w.jpg"]));
        assert_eq!(safety(&plan), vec![("/gallery/a-640w.jpg", true)]);
        assert!(plan.candidates[0].evidence.is_empty());
    }

    #[test]
    fn bare_file_name_in_corpus_blocks_deletion() {
        let tmp = setup("legacy code loads a-640w.jpg by name");
        let plan = plan_for(&tmp, proposal("/gallery/a", &["/gallery/a-640w.jpg"]));
        assert_eq!(safety(&plan), vec![("/gallery/a-640w.jpg", false)]);
        assert!(plan.candidates[0].referenced);
        assert!(plan.candidates[0].evidence[0].contains("file name"));
    }

    #[test]
    fn group_reference_protects_every_member() {
        let tmp = setup("![x](/gallery/a)");
        let plan = plan_for(&tmp, proposal("/gallery/a", &[]));
        assert_eq!(plan.candidates.len(), 3);
        assert!(plan.candidates.iter().all(|c| !c.safe_to_delete));
    }

    #[test]
    fn project_relative_path_blocks_deletion() {
        let tmp = setup("cp public/gallery/a-640w.webp dist/");
        let plan = plan_for(&tmp, proposal("/gallery/a", &["a-640w.webp"]));
        assert!(!plan.candidates[0].safe_to_delete);
    }

    #[test]
    fn unreadable_corpus_file_blocks_deletion() {
        let tmp = setup("nothing to see");
        let config = PipelineConfig::default();
        let index = AssetIndex::from_config(&config, tmp.path()).unwrap();
        let options = ScanOptions::from_config(&config, tmp.path(), &[]);
        let corpus = Corpus::read_files(&[
            tmp.path().join("src/page.md"),
            tmp.path().join("src/vanished.md"),
        ]);
        let scan = references::scan_corpus(
            &corpus,
            &references::resolve::Resolver::from_index(&index),
            &options,
        );

        let plan = analyze(
            &proposal("/gallery/a", &["a-640w.jpg"]),
            &index,
            &corpus,
            &scan,
            tmp.path(),
            &config.managed_roots(tmp.path()),
        );
        assert_eq!(safety(&plan), vec![("/gallery/a-640w.jpg", false)]);
        assert!(plan.candidates[0].evidence[0].contains("could not be read"));
    }

    #[test]
    fn unknown_variant_is_not_safe() {
        let tmp = setup("");
        let plan = plan_for(&tmp, proposal("/gallery/a", &["a-9999w.webp"]));
        assert_eq!(safety(&plan), vec![("/gallery/a-9999w.webp", false)]);

        let plan = plan_for(&tmp, proposal("/gallery/nope", &[]));
        assert!(!plan.candidates[0].safe_to_delete);
    }

    #[test]
    fn plan_records_managed_roots() {
        let tmp = setup("");
        let plan = plan_for(&tmp, proposal("/gallery/a", &["a-640w.jpg"]));
        assert_eq!(plan.managed_roots, vec![tmp.path().join("public/gallery")]);
        assert_eq!(plan.version, PLAN_VERSION);
    }

    #[test]
    fn encode_url_escapes_spaces_and_unicode() {
        assert_eq!(encode_url("/gallery/café night.jpg"), "/gallery/caf%C3%A9%20night.jpg");
        assert_eq!(encode_url("/gallery/a-640w.jpg"), "/gallery/a-640w.jpg");
    }
}
