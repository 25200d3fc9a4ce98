//! File discovery module with gitignore-aware filtering
//!
//! This module enumerates migratable source files in a package directory
//! while respecting .gitignore patterns. Callers narrow the walk with glob
//! patterns relative to the directory being walked.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::error::{GraphError, Result};

/// Extensions of files that can enter the graph
pub const SUPPORTED_EXTENSIONS: &[&str] = &["ts", "gts", "tsx", "mts", "js", "gjs", "jsx", "mjs", "hbs"];

/// Directories never worth descending into
const SKIPPED_DIRECTORIES: &[&str] = &["node_modules", ".git", "dist", ".yarn"];

/// Discover source files matching glob patterns in a directory
///
/// # Arguments
/// * `root` - Root directory to search
/// * `patterns` - Glob patterns relative to `root` (e.g., &["app/**/*", "tests/**/*"])
///
/// # Returns
/// Sorted absolute paths of files with a supported extension, excluding
/// `.d.ts` declarations and anything matched by .gitignore
///
/// # Example
/// ```no_run
/// use migration_graph_core::discovery;
///
/// let files = discovery::discover_files(std::path::Path::new("my-app"), &["app/**/*"]).unwrap();
/// println!("Found {} files", files.len());
/// ```
pub fn discover_files(root: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>> {
    // Canonicalize root upfront to ensure all returned paths are absolute
    let canonical_root = root
        .canonicalize()
        .map_err(|err| GraphError::io(root, err))?;

    let glob_matcher = build_glob_set(patterns.iter().copied())?;
    let mut files = Vec::new();

    for result in build_walker(&canonical_root) {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                // Keep going; one unreadable directory should not hide the rest
                tracing::warn!("error walking directory: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        if !is_supported_source(path) || is_declaration_file(path) {
            continue;
        }
        if let Ok(rel_path) = path.strip_prefix(&canonical_root) {
            if glob_matcher.is_match(rel_path) {
                files.push(entry.into_path());
            }
        }
    }

    // Sort for deterministic registration order
    files.sort();
    Ok(files)
}

/// Discover every supported source file under `root`
pub fn discover_source_files(root: &Path) -> Result<Vec<PathBuf>> {
    discover_files(root, &["**/*"])
}

/// Build a glob set from the provided patterns
pub fn build_glob_set<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

pub fn is_supported_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

pub fn is_declaration_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".d.ts"))
}

pub fn is_template_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("hbs")
}

/// Build a WalkBuilder with proper ignore configuration
fn build_walker(root: &Path) -> ignore::Walk {
    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false) // honor .gitignore in projects that are not checkouts
        .hidden(false)
        .parents(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let skipped = entry.depth() > 0
                && entry.file_type().is_some_and(|ft| ft.is_dir())
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRECTORIES.contains(&name));
            !skipped
        });

    builder.build()
}
