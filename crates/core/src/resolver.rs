//! Import resolution and file walking
//!
//! The resolver owns the [`PackageGraph`] while it is being built. Walking
//! a file parses its imports, maps every specifier onto a file on disk and
//! adds one edge per resolved import, in source order. Internal targets are
//! queued and walked in turn; external package files become leaf nodes.
//!
//! Specifiers that cannot be resolved never abort the walk. They are logged
//! and recorded on the graph so the gap stays visible in the output.

use std::collections::{HashSet, VecDeque};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::GlobSet;

use crate::config::GraphConfig;
use crate::discovery::{self, is_declaration_file, is_supported_source, is_template_file};
use crate::error::{GraphError, Result};
use crate::file_node::UnresolvedImport;
use crate::manifest::{ManifestCache, PackageJson, MANIFEST_FILE};
use crate::package_graph::{PackageGraph, PackageKind, PackageNode};
use crate::parser::{ImportKind, ImportParser, ImportStatement};

/// Suffixes tried, in order, for an extension-less specifier
const MODULE_EXTENSIONS: &[&str] = &["ts", "tsx", "gts", "js", "gjs", "jsx", "hbs"];

/// Script extensions a template can be backed by
const BACKING_CLASS_EXTENSIONS: &[&str] = &["ts", "gts", "js", "gjs"];

const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "cluster", "crypto", "dgram", "dns", "events", "fs",
    "http", "http2", "https", "module", "net", "os", "path", "perf_hooks", "process",
    "querystring", "readline", "stream", "string_decoder", "timers", "tls", "tty", "url",
    "util", "v8", "vm", "worker_threads", "zlib",
];

/// Outcome of resolving one import
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    /// A file that becomes a node; `walk` is false for external and
    /// declaration files
    File { path: PathBuf, walk: bool },
    /// Deliberately left out of the graph
    Skipped(&'static str),
    /// Nothing on disk; `package` is set for bare specifiers
    Missing { package: Option<String> },
    /// A service or component name with no matching module
    Unresolved,
}

#[derive(Debug, Clone)]
struct RootPackage {
    name: String,
    kind: PackageKind,
    manifest: Arc<PackageJson>,
}

/// Walks source files and records their dependencies
pub struct Resolver {
    root: PathBuf,
    config: GraphConfig,
    ignore: GlobSet,
    include: Option<GlobSet>,
    parser: ImportParser,
    manifests: ManifestCache,
    graph: PackageGraph,
    root_package: Option<RootPackage>,
    walked: HashSet<PathBuf>,
}

impl Resolver {
    /// Prepare a resolver for the project at `root`
    ///
    /// # Errors
    ///
    /// `Configuration` when the root does not exist or is not a directory,
    /// `Glob` when an include or exclude pattern is invalid.
    pub fn new(root: &Path, config: &GraphConfig) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|err| GraphError::configuration(root, format!("project root is unusable: {err}")))?;
        if !root.is_dir() {
            return Err(GraphError::configuration(&root, "project root is not a directory"));
        }

        let ignore = discovery::build_glob_set(config.ignore_patterns())?;
        let include = if config.include.is_empty() {
            None
        } else {
            Some(discovery::build_glob_set(config.include.iter().map(String::as_str))?)
        };

        Ok(Self {
            root,
            config: config.clone(),
            ignore,
            include,
            parser: ImportParser::new(),
            manifests: ManifestCache::new(),
            graph: PackageGraph::new(),
            root_package: None,
            walked: HashSet::new(),
        })
    }

    /// Read the root manifest and register the root package
    ///
    /// Calling it again is a no-op.
    pub fn load(&mut self) -> Result<()> {
        if self.root_package.is_some() {
            return Ok(());
        }

        let manifest = self.manifests.load(&self.root)?.ok_or_else(|| {
            GraphError::configuration(&self.root.join(MANIFEST_FILE), "no package manifest at project root")
        })?;
        let kind = self
            .config
            .kind
            .unwrap_or_else(|| PackageKind::detect(&manifest));
        let name = manifest
            .name
            .clone()
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "root".to_string());

        tracing::info!(package = %name, %kind, root = %self.root.display(), "loaded project");
        self.graph
            .add_package(PackageNode::internal(name.clone(), self.root.clone(), kind));
        self.root_package = Some(RootPackage { name, kind, manifest });
        Ok(())
    }

    /// Add a package found by a project builder
    pub fn register_package(&mut self, package: PackageNode) {
        tracing::debug!(
            package = package.name(),
            root = ?package.package_root(),
            kind = %package.kind(),
            "registered package"
        );
        self.graph.add_package(package);
    }

    /// Walk `path` and every internal file it reaches
    ///
    /// Files are handled first-in first-out: a file's own imports are
    /// resolved in source order before any newly found file is walked.
    ///
    /// # Errors
    ///
    /// `Assertion` before [`load`](Self::load), `Io` when a file cannot be
    /// read. Files tree-sitter cannot parse are logged and keep no edges.
    pub fn walk(&mut self, path: &Path) -> Result<()> {
        if self.root_package.is_none() {
            return Err(GraphError::Assertion("walk called before load".to_string()));
        }

        let start = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let start = start.canonicalize().map_err(|err| GraphError::io(&start, err))?;

        let mut pending = VecDeque::from([start]);
        while let Some(file) = pending.pop_front() {
            if !self.walked.insert(file.clone()) {
                continue;
            }
            match self.classify(file.clone()) {
                Resolution::File { walk: true, .. } => {}
                Resolution::File { .. } => {
                    tracing::debug!(file = %file.display(), "not walkable, skipping");
                    continue;
                }
                Resolution::Skipped(reason) => {
                    tracing::debug!(file = %file.display(), reason, "skipping file");
                    continue;
                }
                Resolution::Missing { .. } | Resolution::Unresolved => continue,
            }

            self.graph.add_file(&file)?;
            let imports = match self.parser.parse_file(&file) {
                Ok(imports) => imports,
                Err(err @ GraphError::Parse { .. }) => {
                    tracing::warn!("{err}");
                    continue;
                }
                Err(err) => return Err(err),
            };
            tracing::debug!(file = %file.display(), imports = imports.len(), "walking file");

            if is_template_file(&file) {
                if let Some(class) = self.backing_class(&file) {
                    self.link(&file, class, &mut pending)?;
                }
            }
            for import in &imports {
                self.handle_import(&file, import, &mut pending)?;
            }
        }
        Ok(())
    }

    fn handle_import(&mut self, file: &Path, import: &ImportStatement, pending: &mut VecDeque<PathBuf>) -> Result<()> {
        match self.resolve(file, import)? {
            Resolution::File { path, walk } => {
                if walk {
                    self.link(file, path, pending)
                } else {
                    self.graph.add_file(&path)?;
                    self.graph.add_file_edge(file, &path)?;
                    Ok(())
                }
            }
            Resolution::Skipped(reason) => {
                tracing::debug!(file = %file.display(), specifier = %import.specifier, reason, "skipping import");
                Ok(())
            }
            Resolution::Missing { package } => {
                tracing::warn!(
                    file = %file.display(),
                    line = import.range.start_line,
                    specifier = %import.specifier,
                    "unresolvable import"
                );
                self.graph.record_missing_import(
                    file,
                    UnresolvedImport {
                        specifier: import.specifier.clone(),
                        kind: import.kind,
                        package,
                    },
                )
            }
            Resolution::Unresolved if import.kind == ImportKind::Service => {
                let owner = self.graph.get_package_name_from_file_id(file)?.to_string();
                tracing::warn!(
                    file = %file.display(),
                    service = %import.specifier,
                    "unresolved service injection"
                );
                self.graph.record_unresolved_service(&owner, &import.specifier)
            }
            Resolution::Unresolved => {
                tracing::debug!(file = %file.display(), component = %import.specifier, "unresolved component");
                Ok(())
            }
        }
    }

    /// Add `from -> to` and queue `to` for walking
    fn link(&mut self, from: &Path, to: PathBuf, pending: &mut VecDeque<PathBuf>) -> Result<()> {
        self.graph.add_file(&to)?;
        self.graph.add_file_edge(from, &to)?;
        if !self.walked.contains(&to) {
            pending.push_back(to);
        }
        Ok(())
    }

    /// Script colocated with a `.hbs` template
    fn backing_class(&mut self, template: &Path) -> Option<PathBuf> {
        BACKING_CLASS_EXTENSIONS
            .iter()
            .map(|ext| template.with_extension(ext))
            .filter(|candidate| candidate.is_file())
            .find_map(|candidate| match self.classify(candidate) {
                Resolution::File { path, .. } => Some(path),
                _ => None,
            })
    }

    fn resolve(&mut self, file: &Path, import: &ImportStatement) -> Result<Resolution> {
        match import.kind {
            ImportKind::Service => self.resolve_service(file, &import.specifier),
            ImportKind::Template => {
                self.resolve_in_owner_first(file, &format!("components/{}", import.specifier))
            }
            _ => self.resolve_specifier(file, &import.specifier),
        }
    }

    fn resolve_specifier(&mut self, file: &Path, specifier: &str) -> Result<Resolution> {
        if is_relative(specifier) || specifier.starts_with('/') {
            let dir = file.parent().unwrap_or(&self.root);
            let base = path_clean::clean(dir.join(specifier));
            return Ok(match find_module_file(&base) {
                Some(path) => self.classify(path),
                None => Resolution::Missing { package: None },
            });
        }
        if is_node_builtin(specifier) {
            return Ok(Resolution::Skipped("node builtin"));
        }
        let (package, subpath) = split_bare_specifier(specifier);
        self.resolve_bare(file, package, subpath)
    }

    fn resolve_bare(&mut self, file: &Path, package: &str, subpath: &str) -> Result<Resolution> {
        if let Some(path) = self.resolve_in_package(package, subpath)? {
            return Ok(self.classify(path));
        }
        if self
            .graph
            .get_package_node(package)
            .is_ok_and(PackageNode::is_internal)
        {
            return Ok(Resolution::Missing { package: None });
        }

        if let Some(root) = find_in_node_modules(file, package) {
            if !self.graph.contains_package(package) {
                let manifest = match self.manifests.load(&root) {
                    Ok(manifest) => manifest,
                    Err(err) => {
                        tracing::warn!("{err}");
                        None
                    }
                };
                let kind = external_kind(manifest.as_deref());
                tracing::debug!(package, %kind, root = %root.display(), "registered external package");
                self.graph.add_package(PackageNode::external(package, root, kind));
            }
            // installed, but nothing matches the subpath
            return Ok(match self.resolve_in_package(package, subpath)? {
                Some(path) => self.classify(path),
                None => Resolution::Missing { package: None },
            });
        }

        if is_framework_module(package) {
            return Ok(Resolution::Skipped("framework module"));
        }
        Ok(Resolution::Missing {
            package: Some(package.to_string()),
        })
    }

    /// Map `subpath` onto a file of an already registered package
    ///
    /// An empty subpath resolves the package entry: manifest entry points
    /// for libraries, the module root `index` for Ember packages.
    fn resolve_in_package(&mut self, package: &str, subpath: &str) -> Result<Option<PathBuf>> {
        let Ok(node) = self.graph.get_package_node(package) else {
            return Ok(None);
        };
        let Some(root) = node.package_root().map(Path::to_path_buf) else {
            return Ok(None);
        };
        let module_roots = node.module_roots().to_vec();
        let kind = node.kind();

        if !subpath.is_empty() {
            return Ok(module_roots
                .iter()
                .filter_map(|module_root| module_root.locate(subpath))
                .find_map(|base| find_module_file(&base)));
        }

        let manifest = match self.manifests.load(&root) {
            Ok(manifest) => manifest,
            Err(err) => {
                tracing::warn!("{err}");
                None
            }
        };
        let entries: Vec<PathBuf> = manifest
            .iter()
            .flat_map(|manifest| manifest.entry_points())
            .map(|entry| path_clean::clean(root.join(entry)))
            .collect();
        let index_dirs: Vec<PathBuf> = module_roots
            .iter()
            .filter(|module_root| module_root.prefix.is_empty())
            .map(|module_root| module_root.dir.clone())
            .chain(std::iter::once(root))
            .collect();

        let from_entries = || entries.iter().find_map(|entry| find_module_file(entry));
        let from_index = || index_dirs.iter().find_map(|dir| find_index_file(dir));
        Ok(match kind {
            PackageKind::Library => from_entries().or_else(from_index),
            PackageKind::EmberApp | PackageKind::EmberAddon => from_index().or_else(from_entries),
        })
    }

    fn resolve_service(&mut self, file: &Path, name: &str) -> Result<Resolution> {
        if let Some(target) = self.config.services.get(name).cloned() {
            if target.starts_with('.') || target.starts_with('/') {
                let base = path_clean::clean(self.root.join(target.trim_start_matches('/')));
                if let Some(path) = find_module_file(&base) {
                    return Ok(self.classify(path));
                }
                tracing::warn!(service = name, target = %target, "configured service path does not exist");
            } else {
                return Ok(match self.resolve_specifier(file, &target)? {
                    Resolution::Missing { .. } => Resolution::Unresolved,
                    resolution => resolution,
                });
            }
        }

        if let Some((package, service)) = name.split_once('@') {
            return Ok(match self.resolve_bare(file, package, &format!("services/{service}"))? {
                Resolution::Missing { .. } => Resolution::Unresolved,
                resolution => resolution,
            });
        }
        self.resolve_in_owner_first(file, &format!("services/{name}"))
    }

    /// Look `subpath` up in the importing file's package, then in every
    /// other internal package in registration order
    fn resolve_in_owner_first(&mut self, file: &Path, subpath: &str) -> Result<Resolution> {
        let owner = self.graph.get_package_name_from_file_id(file)?.to_string();
        let others: Vec<String> = self
            .graph
            .packages()
            .filter(|package| package.is_internal() && package.name() != owner)
            .map(|package| package.name().to_string())
            .collect();

        for package in std::iter::once(owner).chain(others) {
            if let Some(path) = self.resolve_in_package(&package, subpath)? {
                return Ok(self.classify(path));
            }
        }
        Ok(Resolution::Unresolved)
    }

    /// Decide whether a file on disk becomes a node, and whether to walk it
    fn classify(&mut self, path: PathBuf) -> Resolution {
        if !is_supported_source(&path) {
            return Resolution::Skipped("not a source file");
        }
        if self.is_outside_project(&path) {
            self.ensure_external_owner(&path);
        }

        match self.graph.owner_of(&path) {
            None => Resolution::Skipped("no owning package"),
            Some(owner) if owner.is_external() => Resolution::File { path, walk: false },
            Some(_) => match self.exclusion(&path) {
                Some(reason) => Resolution::Skipped(reason),
                None => {
                    let walk = !is_declaration_file(&path);
                    Resolution::File { path, walk }
                }
            },
        }
    }

    fn exclusion(&self, path: &Path) -> Option<&'static str> {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return Some("outside project root");
        };
        if self.ignore.is_match(relative) {
            return Some("ignored");
        }
        if self
            .include
            .as_ref()
            .is_some_and(|include| !include.is_match(relative))
        {
            return Some("not included");
        }
        None
    }

    fn is_outside_project(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(relative) => relative
                .components()
                .any(|component| component.as_os_str() == "node_modules"),
            Err(_) => true,
        }
    }

    /// Register the nearest named package above `path` as external
    fn ensure_external_owner(&mut self, path: &Path) {
        if self.graph.owner_of(path).is_some_and(PackageNode::is_external) {
            return;
        }
        let mut search = path.parent().map(Path::to_path_buf);
        while let Some(dir) = search {
            let Some(package_root) = self.manifests.nearest_package_root(&dir) else {
                return;
            };
            let manifest = match self.manifests.load(&package_root) {
                Ok(manifest) => manifest,
                Err(err) => {
                    tracing::warn!("{err}");
                    None
                }
            };
            // nested manifests without a name only set module options
            if let Some((manifest, name)) =
                manifest.and_then(|manifest| manifest.name.clone().map(|name| (manifest, name)))
            {
                if !self.graph.contains_package(&name) {
                    let kind = external_kind(Some(&*manifest));
                    tracing::debug!(package = %name, %kind, root = %package_root.display(), "registered external package");
                    self.graph.add_package(PackageNode::external(name, package_root, kind));
                }
                return;
            }
            search = package_root.parent().map(Path::to_path_buf);
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn root_name(&self) -> Option<&str> {
        self.root_package.as_ref().map(|root| root.name.as_str())
    }

    pub fn root_kind(&self) -> Option<PackageKind> {
        self.root_package.as_ref().map(|root| root.kind)
    }

    pub fn root_manifest(&self) -> Option<Arc<PackageJson>> {
        self.root_package.as_ref().map(|root| Arc::clone(&root.manifest))
    }

    pub fn manifests_mut(&mut self) -> &mut ManifestCache {
        &mut self.manifests
    }

    pub fn graph(&self) -> &PackageGraph {
        &self.graph
    }

    pub fn into_package_graph(self) -> PackageGraph {
        self.graph
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

fn is_node_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let (package, _) = split_bare_specifier(specifier);
    NODE_BUILTINS.contains(&package)
}

/// Installed dependencies are addons or plain libraries, never apps
fn external_kind(manifest: Option<&PackageJson>) -> PackageKind {
    if manifest.is_some_and(PackageJson::is_ember_addon) {
        PackageKind::EmberAddon
    } else {
        PackageKind::Library
    }
}

/// Modules provided by the Ember build rather than by an installed package
fn is_framework_module(package: &str) -> bool {
    package == "ember" || package.starts_with("@ember/") || package.starts_with("@glimmer/")
}

/// `@scope/pkg/a/b` -> (`@scope/pkg`, `a/b`); `pkg/a` -> (`pkg`, `a`)
fn split_bare_specifier(specifier: &str) -> (&str, &str) {
    let segments = if specifier.starts_with('@') { 2 } else { 1 };
    let split = specifier
        .match_indices('/')
        .nth(segments - 1)
        .map(|(index, _)| index);
    match split {
        Some(index) => (&specifier[..index], &specifier[index + 1..]),
        None => (specifier, ""),
    }
}

fn find_in_node_modules(file: &Path, package: &str) -> Option<PathBuf> {
    file.parent()?
        .ancestors()
        .map(|dir| dir.join("node_modules").join(package))
        .find(|candidate| candidate.is_dir())
        .map(|candidate| candidate.canonicalize().unwrap_or(candidate))
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(".");
    path.push(suffix);
    PathBuf::from(path)
}

/// Find the file a specifier path refers to
///
/// Tries the path itself, then each extension appended, then a `.js`-family
/// extension swapped for each extension, then `.d.ts`, then a directory
/// index.
fn find_module_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    let appended = MODULE_EXTENSIONS.iter().map(|ext| with_suffix(base, ext));
    let swapped = base
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| matches!(*ext, "js" | "jsx" | "mjs" | "cjs" | "gjs"))
        .map(|_| base.with_extension(""))
        .into_iter()
        .flat_map(|stem| MODULE_EXTENSIONS.iter().map(move |ext| with_suffix(&stem, ext)));

    appended
        .chain(swapped)
        .chain(std::iter::once(with_suffix(base, "d.ts")))
        .find(|candidate| candidate.is_file())
        .or_else(|| find_index_file(base))
}

fn find_index_file(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    MODULE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{ext}")))
        .chain(std::iter::once(dir.join("index.d.ts")))
        .find(|candidate| candidate.is_file())
}
