//! Package-level view of the dependency graph
//!
//! Every registered file belongs to exactly one [`PackageNode`]. Packages
//! themselves are nodes of a [`Graph`], with an edge whenever a file edge
//! crosses a package boundary.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::file_node::{FileNode, UnresolvedImport};
use crate::graph::{Graph, NodeContent};
use crate::manifest::PackageJson;

/// Project type of a package, which decides its layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    #[default]
    Library,
    EmberApp,
    EmberAddon,
}

impl PackageKind {
    pub fn detect(manifest: &PackageJson) -> Self {
        if manifest.is_ember_addon() {
            PackageKind::EmberAddon
        } else if manifest.depends_on("ember-source") || manifest.depends_on("ember-cli") {
            PackageKind::EmberApp
        } else {
            PackageKind::Library
        }
    }

    /// Globs, relative to the package root, of files that may become nodes
    pub fn include_patterns(&self) -> &'static [&'static str] {
        match self {
            PackageKind::Library => &["**/*"],
            PackageKind::EmberApp => &["app/**/*", "tests/**/*"],
            PackageKind::EmberAddon => &["addon/**/*", "addon-test-support/**/*", "app/**/*", "tests/**/*"],
        }
    }

    /// Where `<package>/<subpath>` imports land on disk, most specific first
    pub fn module_roots(&self, root: &Path) -> Vec<ModuleRoot> {
        match self {
            PackageKind::Library => vec![ModuleRoot::new("", root)],
            PackageKind::EmberApp => vec![
                ModuleRoot::new("tests", root.join("tests")),
                ModuleRoot::new("config", root.join("config")),
                ModuleRoot::new("", root.join("app")),
            ],
            PackageKind::EmberAddon => vec![
                ModuleRoot::new("test-support", root.join("addon-test-support")),
                ModuleRoot::new("", root.join("addon")),
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Library => "library",
            PackageKind::EmberApp => "ember-app",
            PackageKind::EmberAddon => "ember-addon",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "library" => Ok(PackageKind::Library),
            "ember-app" => Ok(PackageKind::EmberApp),
            "ember-addon" => Ok(PackageKind::EmberAddon),
            other => Err(format!(
                "unknown package kind '{other}' (expected library, ember-app or ember-addon)"
            )),
        }
    }
}

/// Maps an import prefix onto a directory
///
/// For an Ember app, `shop/services/cart` resolves under `app/` while
/// `shop/tests/helpers` resolves under `tests/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRoot {
    pub prefix: String,
    pub dir: PathBuf,
}

impl ModuleRoot {
    pub fn new(prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            dir: dir.into(),
        }
    }

    /// Extension-less candidate for `subpath`, if this root covers it
    pub fn locate(&self, subpath: &str) -> Option<PathBuf> {
        if self.prefix.is_empty() {
            return Some(if subpath.is_empty() {
                self.dir.clone()
            } else {
                self.dir.join(subpath)
            });
        }
        if subpath == self.prefix {
            return Some(self.dir.clone());
        }
        subpath
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| self.dir.join(rest))
    }
}

/// A package and the files it owns
#[derive(Debug, Clone)]
pub struct PackageNode {
    name: String,
    package_root: Option<PathBuf>,
    kind: PackageKind,
    external: bool,
    missing: bool,
    module_roots: Vec<ModuleRoot>,
    files: IndexMap<PathBuf, FileNode>,
    missing_dependencies: IndexSet<String>,
    unresolved_services: IndexSet<String>,
}

impl PackageNode {
    /// A package whose sources are part of the project
    pub fn internal(name: impl Into<String>, root: impl Into<PathBuf>, kind: PackageKind) -> Self {
        let root = root.into();
        let module_roots = kind.module_roots(&root);
        Self::with_root(name.into(), root, kind, false, module_roots)
    }

    /// A published dependency resolved outside the project's own sources
    ///
    /// Installed Ember addons keep their `addon/` layout; the package root
    /// stays as the last module root for addons that publish compiled files.
    pub fn external(name: impl Into<String>, root: impl Into<PathBuf>, kind: PackageKind) -> Self {
        let root = root.into();
        let mut module_roots = kind.module_roots(&root);
        if kind != PackageKind::Library {
            module_roots.push(ModuleRoot::new("", root.clone()));
        }
        Self::with_root(name.into(), root, kind, true, module_roots)
    }

    /// Placeholder for a package that was imported but never found
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package_root: None,
            kind: PackageKind::Library,
            external: false,
            missing: true,
            module_roots: Vec::new(),
            files: IndexMap::new(),
            missing_dependencies: IndexSet::new(),
            unresolved_services: IndexSet::new(),
        }
    }

    fn with_root(name: String, root: PathBuf, kind: PackageKind, external: bool, module_roots: Vec<ModuleRoot>) -> Self {
        Self {
            name,
            package_root: Some(root),
            kind,
            external,
            missing: false,
            module_roots,
            files: IndexMap::new(),
            missing_dependencies: IndexSet::new(),
            unresolved_services: IndexSet::new(),
        }
    }

    /// Replace the import-prefix mapping
    pub fn with_module_roots(mut self, module_roots: Vec<ModuleRoot>) -> Self {
        self.module_roots = module_roots;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package_root(&self) -> Option<&Path> {
        self.package_root.as_deref()
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    pub fn is_internal(&self) -> bool {
        !self.external && !self.missing
    }

    pub fn module_roots(&self) -> &[ModuleRoot] {
        &self.module_roots
    }

    /// Files in registration order
    pub fn files(&self) -> impl Iterator<Item = &FileNode> {
        self.files.values()
    }

    pub fn file(&self, id: &Path) -> Option<&FileNode> {
        self.files.get(id)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn missing_dependencies(&self) -> &IndexSet<String> {
        &self.missing_dependencies
    }

    pub fn unresolved_services(&self) -> &IndexSet<String> {
        &self.unresolved_services
    }
}

impl NodeContent for PackageNode {
    fn key(&self) -> String {
        self.name.clone()
    }
}

/// Files grouped by owning package, plus the package dependency graph
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    packages: Graph<PackageNode>,
    file_owners: HashMap<PathBuf, NodeIndex>,
}

impl PackageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package; a name that is already known keeps its first entry
    pub fn add_package(&mut self, package: PackageNode) -> NodeIndex {
        self.packages.add_node(package)
    }

    pub fn contains_package(&self, name: &str) -> bool {
        self.packages.contains(name)
    }

    pub fn get_package_node(&self, name: &str) -> Result<&PackageNode> {
        self.packages
            .get_node(name)
            .map(|node| node.content())
            .map_err(|_| GraphError::not_found("package", name))
    }

    pub fn get_package_node_mut(&mut self, name: &str) -> Result<&mut PackageNode> {
        self.packages
            .get_node_mut(name)
            .map(|node| node.content_mut())
            .map_err(|_| GraphError::not_found("package", name))
    }

    /// Name of the package that owns `file`
    ///
    /// Registered files answer from the owner index. Other paths are matched
    /// against package roots, and the deepest root wins so a nested package
    /// claims its files from the enclosing one.
    pub fn get_package_name_from_file_id(&self, file: &Path) -> Result<&str> {
        let index = self.owner_index(file)?;
        self.packages
            .node(index)
            .map(|node| node.content().name())
            .ok_or_else(|| GraphError::Assertion(format!("owner of {} vanished", file.display())))
    }

    /// The package that owns `file`, if any claims it
    pub fn owner_of(&self, file: &Path) -> Option<&PackageNode> {
        let index = self.owner_index(file).ok()?;
        self.packages.node(index).map(|node| node.content())
    }

    fn owner_index(&self, file: &Path) -> Result<NodeIndex> {
        if let Some(&index) = self.file_owners.get(file) {
            return Ok(index);
        }
        self.packages
            .nodes()
            .filter_map(|node| {
                let root = node.content().package_root()?;
                file.starts_with(root).then_some((root.components().count(), node.key()))
            })
            .max_by_key(|(depth, _)| *depth)
            .and_then(|(_, key)| self.packages.index_of(key))
            .ok_or_else(|| {
                GraphError::Assertion(format!("no package claims file {}", file.display()))
            })
    }

    /// Register `file` with the package that claims it
    ///
    /// Idempotent. Fails with `Assertion` when no package root contains the
    /// file.
    pub fn add_file(&mut self, file: &Path) -> Result<()> {
        if self.file_owners.contains_key(file) {
            return Ok(());
        }
        let owner = self.owner_index(file)?;
        let node = FileNode::new(file, Self::file_has_types(file));
        let package = self.package_at_mut(owner)?;
        package.files.insert(file.to_path_buf(), node);
        self.file_owners.insert(file.to_path_buf(), owner);
        Ok(())
    }

    pub fn contains_file(&self, file: &Path) -> bool {
        self.file_owners.contains_key(file)
    }

    pub fn file(&self, id: &Path) -> Option<&FileNode> {
        let &owner = self.file_owners.get(id)?;
        self.packages.node(owner)?.content().files.get(id)
    }

    pub fn file_mut(&mut self, id: &Path) -> Option<&mut FileNode> {
        let &owner = self.file_owners.get(id)?;
        self.packages.node_mut(owner)?.content_mut().files.get_mut(id)
    }

    /// Add the file edge `from -> to`, and the package edge if they differ
    ///
    /// Both files must be registered. Returns whether the file edge is new.
    pub fn add_file_edge(&mut self, from: &Path, to: &Path) -> Result<bool> {
        let to_owner = *self
            .file_owners
            .get(to)
            .ok_or_else(|| GraphError::Assertion(format!("edge to unregistered file {}", to.display())))?;
        let from_owner = *self
            .file_owners
            .get(from)
            .ok_or_else(|| GraphError::Assertion(format!("edge from unregistered file {}", from.display())))?;

        let added = self
            .file_mut(from)
            .map(|node| node.add_edge(to))
            .unwrap_or(false);
        if from_owner != to_owner {
            self.packages.add_edge(from_owner, to_owner);
        }
        Ok(added)
    }

    pub fn add_package_edge(&mut self, from: &str, to: &str) -> Result<()> {
        let source = self
            .packages
            .index_of(from)
            .ok_or_else(|| GraphError::not_found("package", from))?;
        let destination = self
            .packages
            .index_of(to)
            .ok_or_else(|| GraphError::not_found("package", to))?;
        if source != destination {
            self.packages.add_edge(source, destination);
        }
        Ok(())
    }

    /// Record that `owner` imports `package`, which could not be found
    pub fn mark_missing(&mut self, owner: &str, package: &str) -> Result<()> {
        if !self.contains_package(package) {
            self.add_package(PackageNode::missing(package));
        }
        self.get_package_node_mut(owner)?
            .missing_dependencies
            .insert(package.to_string());
        self.add_package_edge(owner, package)
    }

    /// Record an import of `file` that resolved to nothing
    ///
    /// Bare specifiers mark their package missing; relative ones are noted
    /// on the owning package by specifier.
    pub fn record_missing_import(&mut self, file: &Path, import: UnresolvedImport) -> Result<()> {
        let owner = self.get_package_name_from_file_id(file)?.to_string();
        match &import.package {
            Some(package) => self.mark_missing(&owner, package)?,
            None => {
                self.get_package_node_mut(&owner)?
                    .missing_dependencies
                    .insert(import.specifier.clone());
            }
        }
        self.record_unresolved(file, import)
    }

    /// Attach `import` to the file without touching package state
    pub fn record_unresolved(&mut self, file: &Path, import: UnresolvedImport) -> Result<()> {
        let node = self
            .file_mut(file)
            .ok_or_else(|| GraphError::Assertion(format!("unregistered file {}", file.display())))?;
        node.record_unresolved(import);
        Ok(())
    }

    pub fn record_unresolved_service(&mut self, owner: &str, service: &str) -> Result<()> {
        self.get_package_node_mut(owner)?
            .unresolved_services
            .insert(service.to_string());
        Ok(())
    }

    /// Whether `file` is typed, from the registered node when there is one
    pub fn has_types(&self, file: &Path) -> bool {
        match self.file(file) {
            Some(node) => node.has_types(),
            None => Self::file_has_types(file),
        }
    }

    /// TypeScript sources, and JavaScript with a sibling `.d.ts`
    pub fn file_has_types(file: &Path) -> bool {
        let typed_source = file
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "ts" | "tsx" | "gts" | "mts" | "cts"));
        typed_source || file.with_extension("d.ts").is_file()
    }

    /// True when `package` was referenced but never found on disk
    pub fn is_dependency_missing(&self, package: &str) -> bool {
        self.get_package_node(package)
            .map(PackageNode::is_missing)
            .unwrap_or(false)
    }

    /// Every file, grouped by package, in registration order
    pub fn files(&self) -> impl Iterator<Item = &FileNode> {
        self.packages.nodes().flat_map(|node| node.content().files())
    }

    pub fn file_count(&self) -> usize {
        self.file_owners.len()
    }

    /// Packages in registration order
    pub fn packages(&self) -> impl Iterator<Item = &PackageNode> {
        self.packages.nodes().map(|node| node.content())
    }

    pub fn package_count(&self) -> usize {
        self.packages.node_count()
    }

    /// Packages leaf-first
    pub fn sorted_packages(&self) -> Result<Vec<&PackageNode>> {
        Ok(self
            .packages
            .get_sorted_nodes(None)?
            .into_iter()
            .map(|node| node.content())
            .collect())
    }

    pub fn graph(&self) -> &Graph<PackageNode> {
        &self.packages
    }

    fn package_at_mut(&mut self, index: NodeIndex) -> Result<&mut PackageNode> {
        self.packages
            .node_mut(index)
            .map(|node| node.content_mut())
            .ok_or_else(|| GraphError::Assertion(format!("package index {} vanished", index.index())))
    }
}
