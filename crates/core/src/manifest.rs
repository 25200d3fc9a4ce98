//! Package manifest (`package.json`) parsing and lookup cache
//!
//! Only the fields that establish package boundaries and entry points are
//! modelled; everything else in the manifest is ignored.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{GraphError, Result};

pub const MANIFEST_FILE: &str = "package.json";

/// Parsed package.json structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    pub module: Option<String>,
    pub types: Option<String>,
    pub typings: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    pub workspaces: Option<Workspaces>,
    #[serde(rename = "ember-addon")]
    pub ember_addon: Option<EmberAddonConfig>,
}

/// `workspaces` is either a list of globs or `{ "packages": [...] }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    Patterns(Vec<String>),
    Config {
        #[serde(default)]
        packages: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmberAddonConfig {
    /// In-repo addon directories, relative to the manifest
    #[serde(default)]
    pub paths: Vec<String>,
}

impl PackageJson {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|err| GraphError::configuration(path, format!("malformed manifest: {err}")))
    }

    pub fn is_ember_addon(&self) -> bool {
        self.keywords.iter().any(|k| k == "ember-addon")
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
            || self.dev_dependencies.contains_key(name)
            || self.peer_dependencies.contains_key(name)
    }

    pub fn workspace_patterns(&self) -> &[String] {
        match &self.workspaces {
            Some(Workspaces::Patterns(patterns)) => patterns,
            Some(Workspaces::Config { packages }) => packages,
            None => &[],
        }
    }

    pub fn in_repo_addon_paths(&self) -> &[String] {
        self.ember_addon
            .as_ref()
            .map(|config| config.paths.as_slice())
            .unwrap_or(&[])
    }

    /// Declared entry points, types first
    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        [&self.types, &self.typings, &self.module, &self.main]
            .into_iter()
            .filter_map(|entry| entry.as_deref())
    }
}

/// Directory-keyed memo of manifest reads
///
/// Owned by a single resolver so independent builds never share state.
#[derive(Debug, Default)]
pub struct ManifestCache {
    manifests: HashMap<PathBuf, Option<Arc<PackageJson>>>,
    package_roots: HashMap<PathBuf, Option<PathBuf>>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest of the package rooted at `dir`
    ///
    /// Returns `Ok(None)` when `dir` has no package.json. Unreadable or
    /// malformed manifests are `Configuration` errors and are not cached.
    pub fn load(&mut self, dir: &Path) -> Result<Option<Arc<PackageJson>>> {
        if let Some(cached) = self.manifests.get(dir) {
            return Ok(cached.clone());
        }

        let path = dir.join(MANIFEST_FILE);
        let manifest = match std::fs::read_to_string(&path) {
            Ok(content) => Some(Arc::new(PackageJson::parse(&content, &path)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(GraphError::configuration(
                    &path,
                    format!("unreadable manifest: {err}"),
                ))
            }
        };
        tracing::trace!(dir = %dir.display(), found = manifest.is_some(), "manifest lookup");
        self.manifests.insert(dir.to_path_buf(), manifest.clone());
        Ok(manifest)
    }

    /// Closest directory at or above `path` that contains a package.json
    pub fn nearest_package_root(&mut self, path: &Path) -> Option<PathBuf> {
        let start = if path.is_dir() { path } else { path.parent()? };
        if let Some(cached) = self.package_roots.get(start) {
            return cached.clone();
        }

        let found = start
            .ancestors()
            .find(|dir| dir.join(MANIFEST_FILE).is_file())
            .map(Path::to_path_buf);
        self.package_roots.insert(start.to_path_buf(), found.clone());
        found
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}
