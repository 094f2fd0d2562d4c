//! Two-step, separately auditable deletion of unused variants.
//!
//! ```text
//! consolidation.json ──plan-prune──▶ prune-plan.json ──execute-prune──▶ deletions
//!  (proposed groups)     (analyze)     (per-file verdict)    (execute)
//! ```
//!
//! The analyzer never deletes and the executor never re-analyzes: it acts only
//! on what the persisted plan marks safe, inside the managed roots from the
//! current config.

pub mod analyze;
pub mod execute;

use crate::atomic;
use crate::config::PipelineConfig;
use crate::index::{AssetIndex, IndexError};
use crate::references::{self, ScanError, ScanOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use analyze::analyze;
pub use execute::{ExecuteReport, PruneOutcome, execute_plan};

pub const PLAN_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum PruneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
    #[error("Reference scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Required input missing: {0}")]
    MissingInput(PathBuf),
    #[error("Unsupported plan version {0}")]
    UnsupportedVersion(u32),
}

/// Proposed deletions, usually produced by a consolidation review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationPlan {
    pub candidates: Vec<ConsolidationGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationGroup {
    /// Group key, e.g. `/gallery/sunset`.
    pub group: String,
    /// URLs or bare file names; empty means every member of the group.
    #[serde(default)]
    pub variants: Vec<String>,
}

/// One analyzed deletion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneCandidate {
    pub path: PathBuf,
    pub url: String,
    pub group: String,
    pub referenced: bool,
    pub safe_to_delete: bool,
    /// Why the candidate was kept; empty when safe.
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Persisted analyzer output, the only input of the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunePlan {
    pub version: u32,
    pub public_root: PathBuf,
    pub managed_roots: Vec<PathBuf>,
    pub candidates: Vec<PruneCandidate>,
}

impl PrunePlan {
    pub fn safe_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.safe_to_delete).count()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, PruneError> {
    if !path.is_file() {
        return Err(PruneError::MissingInput(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| PruneError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_consolidation(path: &Path) -> Result<ConsolidationPlan, PruneError> {
    read_json(path)
}

pub fn load_plan(path: &Path) -> Result<PrunePlan, PruneError> {
    let plan: PrunePlan = read_json(path)?;
    if plan.version != PLAN_VERSION {
        return Err(PruneError::UnsupportedVersion(plan.version));
    }
    Ok(plan)
}

/// Default location of the plan: `<reports dir>/prune-plan.json`.
pub fn default_plan_path(config: &PipelineConfig, project: &Path) -> PathBuf {
    config.reports_dir(project).join("prune-plan.json")
}

/// Index, scan and analyze, then write the plan. Returns the plan and where it went.
pub fn plan_prune(
    config: &PipelineConfig,
    project: &Path,
    consolidation: &Path,
    out: Option<&Path>,
) -> Result<(PrunePlan, PathBuf), PruneError> {
    let proposal = load_consolidation(consolidation)?;
    // Plan paths must survive a change of working directory
    let project = &std::path::absolute(project)?;
    let index = AssetIndex::from_config(config, project)?;
    let options = ScanOptions::from_config(config, project, &[]);
    let (corpus, scan) = references::scan_references(&options, &index)?;

    let plan = analyze(
        &proposal,
        &index,
        &corpus,
        &scan,
        project,
        &config.managed_roots(project),
    );
    let out = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_plan_path(config, project));
    atomic::write_json_atomic(&out, &plan)?;
    Ok((plan, out))
}

/// Load a persisted plan and act on it within the configured managed roots.
pub fn execute_prune(
    config: &PipelineConfig,
    project: &Path,
    plan_path: &Path,
    dry_run: bool,
) -> Result<ExecuteReport, PruneError> {
    let plan = load_plan(plan_path)?;
    Ok(execute_plan(&plan, &config.managed_roots(project), dry_run))
}
