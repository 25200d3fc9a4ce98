//! Build configuration
//!
//! Usually assembled from CLI flags, optionally seeded from a JSON file:
//!
//! ```json
//! {
//!   "exclude": ["app/legacy/**"],
//!   "services": { "session": "ember-simple-auth/services/session" },
//!   "kind": "ember-app"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::package_graph::PackageKind;

/// Root-relative globs that never enter the graph
///
/// Build output and Ember config directories are anchored at the root so a
/// nested `src/config/` module is still a source file.
pub const BUILTIN_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/.yarn/**",
    "**/.git/**",
    "tmp/**",
    "declarations/**",
    "config/**",
    "tests/dummy/config/**",
    "**/blueprints/**",
    "**/.lint-todo/**",
    "**/.eslintrc.{js,cjs}",
    "**/eslint.config.{js,mjs,cjs}",
    "**/.prettierrc.{js,cjs}",
    "**/prettier.config.{js,cjs}",
    "**/.stylelintrc.{js,cjs}",
    "**/.template-lintrc.{js,cjs}",
    "**/ember-cli-build.js",
    "**/testem.js",
    "**/babel.config.{js,cjs}",
    "**/webpack.config.{js,cjs,ts}",
    "**/vite.config.{js,ts,mjs}",
    "**/rollup.config.{js,mjs}",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    /// When non-empty, only matching files may become nodes
    pub include: Vec<String>,
    /// Added to [`BUILTIN_EXCLUDES`]
    pub exclude: Vec<String>,
    /// Service name to a root-relative path (`./app/services/x.ts`) or a
    /// module specifier (`addon/services/x`)
    pub services: BTreeMap<String, String>,
    /// Overrides project type detection
    pub kind: Option<PackageKind>,
}

impl GraphConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| GraphError::configuration(path, format!("unreadable config: {err}")))?;
        serde_json::from_str(&content)
            .map_err(|err| GraphError::configuration(path, format!("malformed config: {err}")))
    }

    /// All ignore globs, built-ins first
    pub fn ignore_patterns(&self) -> impl Iterator<Item = &str> {
        BUILTIN_EXCLUDES
            .iter()
            .copied()
            .chain(self.exclude.iter().map(String::as_str))
    }
}

/// Split a comma-delimited glob list, dropping empty entries
pub fn parse_ignore_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(str::to_string)
        .collect()
}
