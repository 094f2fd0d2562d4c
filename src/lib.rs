//! # Gallery Assets
//!
//! An offline build pipeline for a website's photographic image library. It
//! turns source photos into a ladder of resolution and format variants,
//! publishes a manifest that rendering code uses to pick a variant, finds
//! which variants are no longer referenced by the site's source text, and
//! enforces byte-size budgets on the results.
//!
//! # Stages
//!
//! Each stage is a library function and a CLI subcommand. Stages share no
//! state beyond the filesystem and the JSON files they write:
//!
//! ```text
//! generate-variants   sources   →  <group>-<w>w.<fmt>, <group>.webp, <group>.meta.json
//! build-manifest      tree      →  assets-manifest.json
//! scan-references     src/      →  reports/references.json
//! check-budget        changed   →  reports/budget.json
//! plan-prune          proposal  →  reports/prune-plan.json
//! execute-prune       plan      →  deletions
//! repair-shims        tree      →  placeholders for dangling links
//! ```
//!
//! Planning and executing a prune are separate commands. The plan is a file
//! a human can read before anything is removed.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Group keys and the `<group>-<width>w.<ext>` file naming contract |
//! | [`config`] | `asset-pipeline.toml` loading, merging over stock defaults, validation |
//! | [`imaging`] | `ImageBackend` trait, ladder math, pure-Rust encoders |
//! | [`generate`] | Variant generation with existence-based idempotence |
//! | [`metadata`] | Sidecar placeholder and aspect ratio |
//! | [`index`] | `GroupKey → [VariantDescriptor]` index of the managed tree |
//! | [`manifest`] | Lookup manifest from the index |
//! | [`references`] | Image reference extraction and resolution over source text |
//! | [`budget`] | Byte budgets and required-variant checks on changed files |
//! | [`prune`] | Deletion analysis (plan) and guarded execution |
//! | [`repair`] | Dangling symlink replacement |
//! | [`atomic`] | Temp-then-rename writes |
//! | [`output`] | CLI output formatting |
//!
//! # Naming Is the Data Model
//!
//! There is no catalog. Every stage derives identity from file names alone:
//! `sunset.jpg`, `sunset-640w.webp` and `sunset.meta.json` in
//! `public/gallery/` all belong to group `/gallery/sunset`. The rules live in
//! [`naming`] and nowhere else.

pub mod atomic;
pub mod budget;
pub mod config;
pub mod generate;
pub mod imaging;
pub mod index;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod prune;
pub mod references;
pub mod repair;

#[cfg(test)]
pub(crate) mod test_helpers;
