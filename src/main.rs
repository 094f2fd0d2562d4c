use clap::{Parser, Subcommand};
use gallery_assets::{atomic, budget, config, generate, manifest, output, prune, references, repair};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "gallery-assets")]
#[command(about = "Image variant pipeline for static sites")]
#[command(long_about = "\
Image variant pipeline for static sites

Turns source photos into responsive variants, publishes a lookup manifest,
finds unreferenced variants and enforces byte budgets.

File naming is the data model:

  public/gallery/
  ├── sunset.jpg                   # Source (or legacy default)
  ├── sunset.webp                  # Base default, preferred format
  ├── sunset-320w.webp             # Variant: <group>-<width>w.<format>
  ├── sunset-320w.avif
  ├── sunset-320w.jpg
  └── sunset.meta.json             # Placeholder + aspect ratio

All of these belong to group /gallery/sunset.

Typical run:
  gallery-assets generate-variants
  gallery-assets build-manifest
  gallery-assets check-budget --changed=changed.txt

Pruning is two steps. plan-prune writes a plan; execute-prune acts on it.

Run 'gallery-assets gen-config' to generate a documented asset-pipeline.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: <root>/asset-pipeline.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode missing width/format variants, base defaults and sidecars
    GenerateVariants {
        /// Directory to process instead of the managed asset dirs
        root: Option<PathBuf>,
        /// Minimum source size in KiB
        #[arg(long)]
        threshold: Option<u64>,
    },
    /// Write the lookup manifest for the managed tree
    BuildManifest {
        /// Manifest path (default from config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Find image references in source text and resolve them
    ScanReferences {
        /// Directories to scan instead of the configured ones
        dirs: Vec<PathBuf>,
        /// JSON report path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Check changed files against byte budgets and required variants
    CheckBudget {
        /// Newline-separated list of changed files
        #[arg(long)]
        changed: PathBuf,
        /// JSON report path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Analyze a consolidation proposal and write a prune plan
    PlanPrune {
        /// Consolidation proposal (JSON)
        #[arg(long)]
        plan: PathBuf,
        /// Where to write the prune plan
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete the safe candidates of a prune plan
    ExecutePrune {
        /// Prune plan written by plan-prune
        #[arg(long)]
        candidates: PathBuf,
        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Replace dangling symlinks with minimal placeholder files
    RepairShims {
        /// Directory to repair instead of the managed asset dirs
        root: Option<PathBuf>,
        /// Report what would be replaced without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Print a stock asset-pipeline.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let project = std::path::absolute(&cli.root)?;
    let project = project.as_path();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let config = config::load_config(project, cli.config.as_deref())?;
    init_thread_pool(&config.processing);

    let ok = match cli.command {
        Command::GenerateVariants { root, threshold } => {
            let root = root.map(|r| project.join(r));
            let options = generate::GenerateOptions::from_config(&config, project, root, threshold);
            let (tx, rx) = std::sync::mpsc::channel();
            let display_root = project.to_path_buf();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_generate_event(&event, &display_root) {
                        println!("{}", line);
                    }
                }
            });
            let result = generate::generate(&options, Some(tx));
            let _ = printer.join();
            let result = result?;
            output::print_generate_summary(&result.summary);
            !result.summary.has_failures()
        }
        Command::BuildManifest { output: out } => {
            let out = out.map(|o| project.join(o));
            let (_, report) = manifest::build_manifest(&config, project, out.as_deref())?;
            output::print_manifest_report(&report, project);
            true
        }
        Command::ScanReferences { dirs, report } => {
            let index = gallery_assets::index::AssetIndex::from_config(&config, project)?;
            let options = references::ScanOptions::from_config(&config, project, &dirs);
            let (_, scan) = references::scan_references(&options, &index)?;
            let path = report_path(project, report, &config, "references.json");
            atomic::write_json_atomic(&path, &scan)?;
            output::print_scan_report(&scan);
            true
        }
        Command::CheckBudget { changed, report } => {
            let changed = budget::read_changed_list(&project.join(changed))?;
            let result = budget::check_budget(&config, project, &changed);
            let path = report_path(project, report, &config, "budget.json");
            atomic::write_json_atomic(&path, &result)?;
            output::print_budget_report(&result);
            result.passed()
        }
        Command::PlanPrune { plan, out } => {
            let out = out.map(|o| project.join(o));
            let (plan, written) =
                prune::plan_prune(&config, project, &project.join(plan), out.as_deref())?;
            output::print_prune_plan(&plan, &written, project);
            true
        }
        Command::ExecutePrune {
            candidates,
            dry_run,
        } => {
            let report = prune::execute_prune(&config, project, &project.join(candidates), dry_run)?;
            output::print_execute_report(&report, project);
            report.failures() == 0
        }
        Command::RepairShims { root, dry_run } => {
            let roots = match root {
                Some(r) => vec![project.join(r)],
                None => config.managed_roots(project),
            };
            let report = repair::repair_links(&roots, dry_run)?;
            output::print_repair_report(&report, project);
            report.failures.is_empty()
        }
        Command::GenConfig => true,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Explicit `--report` path, or `<reports dir>/<name>`.
fn report_path(
    project: &Path,
    explicit: Option<PathBuf>,
    config: &config::PipelineConfig,
    name: &str,
) -> PathBuf {
    explicit
        .map(|p| project.join(p))
        .unwrap_or_else(|| config.reports_dir(project).join(name))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
