//! CLI output formatting for all pipeline stages.
//!
//! Every stage leads with what it acted on and ends with a one-line summary.
//! Per-file detail is indented under its subject, four spaces per level, and
//! paths are shown relative to the project root where possible.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//!     sunset (2000x1333)
//!         Source: public/gallery/sunset.jpg
//!         320w webp: encoded
//!         320w avif: existing
//!         base webp: encoded
//!         sidecar: encoded
//! 1 sources: 3 encoded, 1 existing, 0 failed
//! ```
//!
//! ## Scan
//!
//! ```text
//! References (42 files scanned)
//!     Missing
//!         src/pages/index.astro:12 /gallery/missing.jpg
//! 17 found, 1 missing, 9 keys referenced
//! ```
//!
//! ## Prune
//!
//! ```text
//! Prune plan → reports/prune-plan.json
//!     /gallery/a-640w.jpg: safe
//!     /gallery/a-640w.webp: keep
//!         url /gallery/a-640w.webp appears in source
//! 2 candidates, 1 safe to delete
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::budget::{BudgetReport, IssueKind};
use crate::generate::{GenerateEvent, GenerateSummary, VariantStatus};
use crate::manifest::ManifestReport;
use crate::prune::{ExecuteReport, PruneOutcome, PrunePlan};
use crate::references::ScanReport;
use crate::repair::{PlaceholderKind, RepairReport};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Path relative to `root` when it lies beneath it, otherwise as given.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Format one progress event from the variant generator.
pub fn format_generate_event(event: &GenerateEvent, root: &Path) -> Vec<String> {
    match event {
        GenerateEvent::ImageProcessed {
            source,
            group,
            dimensions,
            variants,
        } => {
            let mut lines = vec![
                format!("{}{} ({}x{})", indent(1), group, dimensions.0, dimensions.1),
                format!("{}Source: {}", indent(2), display_path(Path::new(source), root)),
            ];
            for variant in variants {
                let status = match &variant.status {
                    VariantStatus::Existing => "existing".to_string(),
                    VariantStatus::Encoded => "encoded".to_string(),
                    VariantStatus::Failed(e) => format!("failed ({e})"),
                };
                lines.push(format!("{}{}: {}", indent(2), variant.label, status));
            }
            lines
        }
        GenerateEvent::ImageFailed { source, error } => vec![
            format!("{}{}: unreadable", indent(1), display_path(Path::new(source), root)),
            format!("{}{}", indent(2), error),
        ],
    }
}

pub fn format_generate_summary(summary: &GenerateSummary) -> Vec<String> {
    vec![summary.to_string()]
}

pub fn print_generate_summary(summary: &GenerateSummary) {
    print_lines(format_generate_summary(summary));
}

// ============================================================================
// Manifest
// ============================================================================

pub fn format_manifest_report(report: &ManifestReport, root: &Path) -> Vec<String> {
    let mut lines = vec![format!("Manifest \u{2192} {}", display_path(&report.output, root))];
    if let Some(backup) = &report.backup {
        lines.push(format!("{}Backup: {}", indent(1), display_path(backup, root)));
    }
    if !report.orphans.is_empty() {
        lines.push(format!("{}Orphans (no source or base default)", indent(1)));
        for key in &report.orphans {
            lines.push(format!("{}{}", indent(2), key));
        }
    }
    lines.push(format!(
        "{} groups, {} files, {} keys",
        report.groups, report.files, report.keys
    ));
    lines
}

pub fn print_manifest_report(report: &ManifestReport, root: &Path) {
    print_lines(format_manifest_report(report, root));
}

// ============================================================================
// References
// ============================================================================

pub fn format_scan_report(report: &ScanReport) -> Vec<String> {
    let mut lines = vec![format!("References ({} files scanned)", report.files_scanned)];
    let missing: Vec<_> = report.missing().collect();
    if !missing.is_empty() {
        lines.push(format!("{}Missing", indent(1)));
        for record in &missing {
            lines.push(format!(
                "{}{}:{} {}",
                indent(2),
                record.source_file,
                record.line,
                record.decoded
            ));
        }
    }
    if !report.unreadable.is_empty() {
        lines.push(format!("{}Unreadable", indent(1)));
        for file in &report.unreadable {
            lines.push(format!("{}{}: {}", indent(2), file.source_file, file.error));
        }
    }
    let mut summary = format!(
        "{} found, {} missing, {} keys referenced",
        report.found().count(),
        missing.len(),
        report.referenced.len()
    );
    if !report.unreadable.is_empty() {
        summary.push_str(&format!(", {} unreadable", report.unreadable.len()));
    }
    lines.push(summary);
    lines
}

pub fn print_scan_report(report: &ScanReport) {
    print_lines(format_scan_report(report));
}

// ============================================================================
// Budget
// ============================================================================

fn issue_code(kind: IssueKind) -> &'static str {
    match kind {
        IssueKind::MissingVariant => "MISSING_VARIANT",
        IssueKind::BudgetExceeded => "BUDGET_EXCEEDED",
        IssueKind::MissingModernSibling => "MISSING_MODERN_SIBLING",
        IssueKind::InvalidImage => "INVALID_IMAGE",
    }
}

pub fn format_budget_report(report: &BudgetReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Budget ({} checked, {} skipped)",
        report.checked, report.skipped
    )];
    for issue in &report.issues {
        lines.push(format!("{}{} {}", indent(1), issue_code(issue.kind), issue.path));
        lines.push(format!("{}{}", indent(2), issue.detail));
    }
    if report.passed() {
        lines.push("passed".to_string());
    } else {
        lines.push(format!("{} issues", report.issues.len()));
    }
    lines
}

pub fn print_budget_report(report: &BudgetReport) {
    print_lines(format_budget_report(report));
}

// ============================================================================
// Prune
// ============================================================================

pub fn format_prune_plan(plan: &PrunePlan, out: &Path, root: &Path) -> Vec<String> {
    let mut lines = vec![format!("Prune plan \u{2192} {}", display_path(out, root))];
    for candidate in &plan.candidates {
        let verdict = if candidate.safe_to_delete { "safe" } else { "keep" };
        lines.push(format!("{}{}: {}", indent(1), candidate.url, verdict));
        for evidence in &candidate.evidence {
            lines.push(format!("{}{}", indent(2), evidence));
        }
    }
    lines.push(format!(
        "{} candidates, {} safe to delete",
        plan.candidates.len(),
        plan.safe_count()
    ));
    lines
}

pub fn print_prune_plan(plan: &PrunePlan, out: &Path, root: &Path) {
    print_lines(format_prune_plan(plan, out, root));
}

fn outcome_label(outcome: &PruneOutcome) -> String {
    match outcome {
        PruneOutcome::Deleted => "deleted".to_string(),
        PruneOutcome::WouldDelete => "would delete".to_string(),
        PruneOutcome::SkippedOutsideRoot => "skipped (outside managed roots)".to_string(),
        PruneOutcome::SkippedUnsafe => "skipped (not safe)".to_string(),
        PruneOutcome::SkippedMissing => "skipped (already gone)".to_string(),
        PruneOutcome::Failed(e) => format!("failed ({e})"),
    }
}

pub fn format_execute_report(report: &ExecuteReport, root: &Path) -> Vec<String> {
    let header = if report.dry_run {
        "Prune (dry run)"
    } else {
        "Prune"
    };
    let mut lines = vec![header.to_string()];
    for item in &report.items {
        lines.push(format!(
            "{}{}: {}",
            indent(1),
            display_path(&item.path, root),
            outcome_label(&item.outcome)
        ));
    }
    for dir in &report.removed_dirs {
        lines.push(format!("{}{}/: removed empty directory", indent(1), display_path(dir, root)));
    }
    let verb = if report.dry_run { "to delete" } else { "deleted" };
    lines.push(format!(
        "{} {}, {} skipped, {} failed",
        report.deleted(),
        verb,
        report.skipped(),
        report.failures()
    ));
    lines
}

pub fn print_execute_report(report: &ExecuteReport, root: &Path) {
    print_lines(format_execute_report(report, root));
}

// ============================================================================
// Repair
// ============================================================================

fn placeholder_label(kind: PlaceholderKind) -> String {
    match kind {
        PlaceholderKind::Svg => "svg placeholder".to_string(),
        PlaceholderKind::Raster(format) => format!("1x1 {format}"),
        PlaceholderKind::Empty => "empty file".to_string(),
    }
}

pub fn format_repair_report(report: &RepairReport, root: &Path) -> Vec<String> {
    let header = if report.dry_run {
        "Broken links (dry run)"
    } else {
        "Broken links"
    };
    let mut lines = vec![header.to_string()];
    for link in &report.repaired {
        lines.push(format!(
            "{}{} \u{2192} {}",
            indent(1),
            display_path(&link.path, root),
            placeholder_label(link.placeholder)
        ));
        lines.push(format!("{}Target: {}", indent(2), link.target.display()));
    }
    for failure in &report.failures {
        lines.push(format!(
            "{}{}: failed ({})",
            indent(1),
            display_path(&failure.path, root),
            failure.error
        ));
    }
    lines.push(format!(
        "{} links checked, {} repaired, {} failed",
        report.links_checked,
        report.repaired.len(),
        report.failures.len()
    ));
    lines
}

pub fn print_repair_report(report: &RepairReport, root: &Path) {
    print_lines(format_repair_report(report, root));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetIssue;
    use crate::generate::VariantInfo;
    use crate::prune::PruneCandidate;
    use crate::prune::execute::ExecuteItem;
    use crate::references::{ReferenceRecord, ReferenceStatus, UnreadableFile};
    use crate::repair::{RepairFailure, RepairedLink};
    use std::path::PathBuf;

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn display_path_strips_root() {
        assert_eq!(
            display_path(Path::new("/site/public/a.jpg"), Path::new("/site")),
            "public/a.jpg"
        );
        assert_eq!(
            display_path(Path::new("/elsewhere/a.jpg"), Path::new("/site")),
            "/elsewhere/a.jpg"
        );
    }

    #[test]
    fn format_generate_processed() {
        let event = GenerateEvent::ImageProcessed {
            source: "/site/public/gallery/sunset.jpg".to_string(),
            group: "sunset".to_string(),
            dimensions: (2000, 1333),
            variants: vec![
                VariantInfo {
                    label: "320w webp".to_string(),
                    status: VariantStatus::Encoded,
                },
                VariantInfo {
                    label: "320w avif".to_string(),
                    status: VariantStatus::Existing,
                },
                VariantInfo {
                    label: "640w jpg".to_string(),
                    status: VariantStatus::Failed("disk full".to_string()),
                },
            ],
        };
        assert_eq!(
            format_generate_event(&event, Path::new("/site")),
            vec![
                "    sunset (2000x1333)",
                "        Source: public/gallery/sunset.jpg",
                "        320w webp: encoded",
                "        320w avif: existing",
                "        640w jpg: failed (disk full)",
            ]
        );
    }

    #[test]
    fn format_generate_failed() {
        let event = GenerateEvent::ImageFailed {
            source: "/site/public/gallery/bad.jpg".to_string(),
            error: "not an image".to_string(),
        };
        assert_eq!(
            format_generate_event(&event, Path::new("/site")),
            vec!["    public/gallery/bad.jpg: unreadable", "        not an image"]
        );
    }

    #[test]
    fn format_manifest_with_backup_and_orphans() {
        let report = ManifestReport {
            output: PathBuf::from("/site/public/assets-manifest.json"),
            backup: Some(PathBuf::from("/site/public/assets-manifest.json.bak")),
            groups: 3,
            files: 20,
            keys: 23,
            orphans: vec!["/gallery/gone".to_string()],
        };
        assert_eq!(
            format_manifest_report(&report, Path::new("/site")),
            vec![
                "Manifest \u{2192} public/assets-manifest.json",
                "    Backup: public/assets-manifest.json.bak",
                "    Orphans (no source or base default)",
                "        /gallery/gone",
                "3 groups, 20 files, 23 keys",
            ]
        );
    }

    #[test]
    fn format_scan_lists_missing_only() {
        let record = |decoded: &str, status| ReferenceRecord {
            source_file: "src/a.astro".to_string(),
            line: 4,
            raw: decoded.to_string(),
            decoded: decoded.to_string(),
            status,
            resolved: None,
            group: None,
        };
        let report = ScanReport {
            files_scanned: 2,
            records: vec![
                record("/gallery/ok-640w.webp", ReferenceStatus::Found),
                record("/gallery/missing.jpg", ReferenceStatus::Missing),
            ],
            referenced: ["/gallery/ok-640w.webp".to_string()].into_iter().collect(),
            unreadable: Vec::new(),
        };
        assert_eq!(
            format_scan_report(&report),
            vec![
                "References (2 files scanned)",
                "    Missing",
                "        src/a.astro:4 /gallery/missing.jpg",
                "1 found, 1 missing, 1 keys referenced",
            ]
        );
    }

    #[test]
    fn format_scan_lists_unreadable() {
        let report = ScanReport {
            files_scanned: 1,
            unreadable: vec![UnreadableFile {
                source_file: "src/locked.md".to_string(),
                error: "permission denied".to_string(),
            }],
            ..Default::default()
        };
        assert_eq!(
            format_scan_report(&report),
            vec![
                "References (1 files scanned)",
                "    Unreadable",
                "        src/locked.md: permission denied",
                "0 found, 0 missing, 0 keys referenced, 1 unreadable",
            ]
        );
    }

    #[test]
    fn format_budget_issues_and_pass() {
        let failing = BudgetReport {
            checked: 2,
            skipped: 1,
            issues: vec![BudgetIssue {
                kind: IssueKind::BudgetExceeded,
                path: "/gallery/a-1920w.webp".to_string(),
                detail: "410 KiB > 400 KiB".to_string(),
            }],
        };
        assert_eq!(
            format_budget_report(&failing),
            vec![
                "Budget (2 checked, 1 skipped)",
                "    BUDGET_EXCEEDED /gallery/a-1920w.webp",
                "        410 KiB > 400 KiB",
                "1 issues",
            ]
        );

        let passing = BudgetReport::default();
        assert_eq!(format_budget_report(&passing).last().unwrap(), "passed");
    }

    #[test]
    fn format_plan_shows_evidence_for_kept() {
        let candidate = |url: &str, safe: bool, evidence: Vec<String>| PruneCandidate {
            path: PathBuf::from(format!("/site/public{url}")),
            url: url.to_string(),
            group: "/gallery/a".to_string(),
            referenced: !safe,
            safe_to_delete: safe,
            evidence,
        };
        let plan = PrunePlan {
            version: 1,
            public_root: PathBuf::from("/site/public"),
            managed_roots: vec![PathBuf::from("/site/public/gallery")],
            candidates: vec![
                candidate("/gallery/a-640w.jpg", true, vec![]),
                candidate(
                    "/gallery/a-640w.webp",
                    false,
                    vec!["url /gallery/a-640w.webp appears in source".to_string()],
                ),
            ],
        };
        assert_eq!(
            format_prune_plan(&plan, Path::new("/site/reports/prune-plan.json"), Path::new("/site")),
            vec![
                "Prune plan \u{2192} reports/prune-plan.json",
                "    /gallery/a-640w.jpg: safe",
                "    /gallery/a-640w.webp: keep",
                "        url /gallery/a-640w.webp appears in source",
                "2 candidates, 1 safe to delete",
            ]
        );
    }

    #[test]
    fn format_execute_outcomes() {
        let report = ExecuteReport {
            dry_run: false,
            items: vec![
                ExecuteItem {
                    path: PathBuf::from("/site/public/gallery/a.jpg"),
                    outcome: PruneOutcome::Deleted,
                },
                ExecuteItem {
                    path: PathBuf::from("/etc/passwd"),
                    outcome: PruneOutcome::SkippedOutsideRoot,
                },
            ],
            removed_dirs: vec![PathBuf::from("/site/public/gallery/old")],
        };
        assert_eq!(
            format_execute_report(&report, Path::new("/site")),
            vec![
                "Prune",
                "    public/gallery/a.jpg: deleted",
                "    /etc/passwd: skipped (outside managed roots)",
                "    public/gallery/old/: removed empty directory",
                "1 deleted, 1 skipped, 0 failed",
            ]
        );
    }

    #[test]
    fn format_execute_dry_run_header() {
        let report = ExecuteReport {
            dry_run: true,
            ..Default::default()
        };
        let lines = format_execute_report(&report, Path::new("/"));
        assert_eq!(lines[0], "Prune (dry run)");
        assert_eq!(lines[1], "0 to delete, 0 skipped, 0 failed");
    }

    #[test]
    fn format_repair_lists_links_and_failures() {
        let report = RepairReport {
            dry_run: false,
            links_checked: 3,
            repaired: vec![RepairedLink {
                path: PathBuf::from("/site/public/gallery/a.webp"),
                target: PathBuf::from("../old/a.webp"),
                placeholder: PlaceholderKind::Raster(crate::naming::AssetFormat::Webp),
            }],
            failures: vec![RepairFailure {
                path: PathBuf::from("/site/public/gallery/b.svg"),
                error: "permission denied".to_string(),
            }],
        };
        assert_eq!(
            format_repair_report(&report, Path::new("/site")),
            vec![
                "Broken links",
                "    public/gallery/a.webp \u{2192} 1x1 webp",
                "        Target: ../old/a.webp",
                "    public/gallery/b.svg: failed (permission denied)",
                "3 links checked, 1 repaired, 1 failed",
            ]
        );
    }
}
