//! Plan execution with root guardrails.
//!
//! For each candidate, in order:
//!
//! 1. Refuse paths that contain `..` or resolve outside every managed root
//!    (`SkippedOutsideRoot`). Relative paths are taken from the working
//!    directory.
//! 2. Keep anything the plan did not mark safe (`SkippedUnsafe`).
//! 3. Re-check existence; a file gone since planning is `SkippedMissing`.
//! 4. Delete. A failure is recorded and the run continues.
//!
//! Afterwards, directories left empty under the managed roots are removed
//! bottom-up. The roots themselves are never removed.

use super::{PruneCandidate, PrunePlan};
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum PruneOutcome {
    Deleted,
    WouldDelete,
    SkippedOutsideRoot,
    SkippedUnsafe,
    SkippedMissing,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteItem {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: PruneOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecuteReport {
    pub dry_run: bool,
    pub items: Vec<ExecuteItem>,
    pub removed_dirs: Vec<PathBuf>,
}

impl ExecuteReport {
    fn count(&self, pred: impl Fn(&PruneOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }

    pub fn deleted(&self) -> usize {
        self.count(|o| matches!(o, PruneOutcome::Deleted | PruneOutcome::WouldDelete))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                PruneOutcome::SkippedOutsideRoot
                    | PruneOutcome::SkippedUnsafe
                    | PruneOutcome::SkippedMissing
            )
        })
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, PruneOutcome::Failed(_)))
    }
}

/// Canonical form of a managed root, or the root as given if it doesn't exist.
fn canonical_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

/// Canonical location of `path` itself: its parent resolved, the final name kept.
///
/// A symlink is judged by where the link lives, not by its target.
fn canonical_location(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?.canonicalize().ok()?;
    Some(parent.join(path.file_name()?))
}

/// Whether `path` may be touched at all.
///
/// Relative paths and roots are resolved against the working directory first.
pub fn is_within_roots(path: &Path, roots: &[PathBuf]) -> bool {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return false;
    }
    let Ok(path) = std::path::absolute(path) else {
        return false;
    };
    let roots: Vec<PathBuf> = roots
        .iter()
        .filter_map(|r| std::path::absolute(r).ok())
        .collect();
    let canonical_roots: Vec<PathBuf> = roots.iter().map(|r| canonical_root(r)).collect();
    let lexical = roots.iter().any(|r| path.starts_with(r) && path != *r);
    let resolved = match canonical_location(&path) {
        Some(loc) => canonical_roots
            .iter()
            .any(|r| loc.starts_with(r) && loc != *r),
        // Parent gone: nothing to delete, judge lexically
        None => lexical,
    };
    lexical && resolved
}

fn execute_candidate(candidate: &PruneCandidate, roots: &[PathBuf], dry_run: bool) -> PruneOutcome {
    let path = &candidate.path;
    if !is_within_roots(path, roots) {
        return PruneOutcome::SkippedOutsideRoot;
    }
    if !candidate.safe_to_delete {
        return PruneOutcome::SkippedUnsafe;
    }
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return PruneOutcome::SkippedMissing,
    };
    if meta.is_dir() {
        return PruneOutcome::Failed("refusing to delete a directory".to_string());
    }
    if dry_run {
        return PruneOutcome::WouldDelete;
    }
    match fs::remove_file(path) {
        Ok(()) => PruneOutcome::Deleted,
        Err(e) => PruneOutcome::Failed(e.to_string()),
    }
}

/// Remove empty directories below each root, deepest first.
fn remove_empty_dirs(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for root in roots {
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(root)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name()
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_dir() {
                continue;
            }
            let is_empty = fs::read_dir(entry.path())
                .map(|mut it| it.next().is_none())
                .unwrap_or(false);
            if is_empty && fs::remove_dir(entry.path()).is_ok() {
                removed.push(entry.path().to_path_buf());
            }
        }
    }
    removed
}

/// Act on a plan. Never fails as a whole; every outcome is itemized.
pub fn execute_plan(plan: &PrunePlan, managed_roots: &[PathBuf], dry_run: bool) -> ExecuteReport {
    let items = plan
        .candidates
        .iter()
        .map(|c| ExecuteItem {
            path: c.path.clone(),
            outcome: execute_candidate(c, managed_roots, dry_run),
        })
        .collect();
    let removed_dirs = if dry_run {
        Vec::new()
    } else {
        remove_empty_dirs(managed_roots)
    };
    ExecuteReport {
        dry_run,
        items,
        removed_dirs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::PLAN_VERSION;
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    fn candidate(path: PathBuf, safe: bool) -> PruneCandidate {
        PruneCandidate {
            url: format!("/{}", path.file_name().unwrap().to_string_lossy()),
            path,
            group: "/gallery/a".to_string(),
            referenced: !safe,
            safe_to_delete: safe,
            evidence: Vec::new(),
        }
    }

    fn plan(candidates: Vec<PruneCandidate>) -> PrunePlan {
        PrunePlan {
            version: PLAN_VERSION,
            public_root: PathBuf::from("/unused"),
            managed_roots: Vec::new(),
            candidates,
        }
    }

    fn outcomes(report: &ExecuteReport) -> Vec<PruneOutcome> {
        report.items.iter().map(|i| i.outcome.clone()).collect()
    }

    #[test]
    fn deletes_only_safe_files_inside_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public/gallery");
        write_file(&root.join("a-640w.jpg"), 1);
        write_file(&root.join("a-640w.webp"), 1);
        let outside = tmp.path().join("secrets.jpg");
        write_file(&outside, 1);

        let plan = plan(vec![
            candidate(root.join("a-640w.jpg"), true),
            candidate(root.join("a-640w.webp"), false),
            candidate(outside.clone(), true),
            candidate(root.join("gone.jpg"), true),
        ]);
        let report = execute_plan(&plan, &[root.clone()], false);

        assert_eq!(
            outcomes(&report),
            vec![
                PruneOutcome::Deleted,
                PruneOutcome::SkippedUnsafe,
                PruneOutcome::SkippedOutsideRoot,
                PruneOutcome::SkippedMissing,
            ]
        );
        assert!(!root.join("a-640w.jpg").exists());
        assert!(root.join("a-640w.webp").exists());
        assert!(outside.exists());
        assert_eq!(report.failures(), 0);
    }

    #[test]
    fn dot_dot_escape_refused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("public/gallery");
        write_file(&root.join("keep.jpg"), 1);
        let victim = tmp.path().join("victim.jpg");
        write_file(&victim, 1);

        let sneaky = root.join("../../victim.jpg");
        let report = execute_plan(&plan(vec![candidate(sneaky, true)]), &[root], false);
        assert_eq!(outcomes(&report), vec![PruneOutcome::SkippedOutsideRoot]);
        assert!(victim.exists());
    }

    #[test]
    fn relative_path_outside_root_and_root_itself_refused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("gallery");
        std::fs::create_dir_all(&root).unwrap();
        assert!(!is_within_roots(Path::new("gallery/a.jpg"), &[root.clone()]));
        assert!(!is_within_roots(&root, &[root.clone()]));
        assert!(is_within_roots(&root.join("a.jpg"), &[root]));
    }

    #[test]
    fn relative_root_and_path_accepted() {
        let tmp = TempDir::new_in(".").unwrap();
        let root = tmp.path().join("gallery");
        write_file(&root.join("a-640w.jpg"), 1);
        assert!(tmp.path().is_relative());
        assert!(is_within_roots(&root.join("a-640w.jpg"), &[root.clone()]));

        let report = execute_plan(
            &plan(vec![candidate(root.join("a-640w.jpg"), true)]),
            &[root.clone()],
            false,
        );
        assert_eq!(outcomes(&report), vec![PruneOutcome::Deleted]);
        assert!(!root.join("a-640w.jpg").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dir_escaping_root_refused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("gallery");
        let elsewhere = tmp.path().join("elsewhere");
        write_file(&elsewhere.join("x.jpg"), 1);
        std::fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(&elsewhere, root.join("link")).unwrap();

        let report = execute_plan(
            &plan(vec![candidate(root.join("link/x.jpg"), true)]),
            &[root],
            false,
        );
        assert_eq!(outcomes(&report), vec![PruneOutcome::SkippedOutsideRoot]);
        assert!(elsewhere.join("x.jpg").exists());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("gallery");
        write_file(&root.join("sub/a-640w.jpg"), 1);

        let report = execute_plan(
            &plan(vec![candidate(root.join("sub/a-640w.jpg"), true)]),
            &[root.clone()],
            true,
        );
        assert_eq!(outcomes(&report), vec![PruneOutcome::WouldDelete]);
        assert!(root.join("sub/a-640w.jpg").exists());
        assert!(report.removed_dirs.is_empty());
    }

    #[test]
    fn empty_dirs_removed_bottom_up_root_kept() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("gallery");
        write_file(&root.join("events/2024/a-640w.jpg"), 1);
        write_file(&root.join("kept/b.jpg"), 1);

        let report = execute_plan(
            &plan(vec![candidate(root.join("events/2024/a-640w.jpg"), true)]),
            &[root.clone()],
            false,
        );
        assert_eq!(
            report.removed_dirs,
            vec![root.join("events/2024"), root.join("events")]
        );
        assert!(root.is_dir());
        assert!(root.join("kept").is_dir());
    }

    #[test]
    fn directory_candidate_is_a_failure() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("gallery");
        write_file(&root.join("dir.jpg/inner.jpg"), 1);

        let report = execute_plan(
            &plan(vec![candidate(root.join("dir.jpg"), true)]),
            &[root.clone()],
            false,
        );
        assert_eq!(report.failures(), 1);
        assert!(root.join("dir.jpg/inner.jpg").exists());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let item = ExecuteItem {
            path: PathBuf::from("/g/a.jpg"),
            outcome: PruneOutcome::Failed("denied".to_string()),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"], "denied");
    }
}
