//! Whole-project graph construction
//!
//! A project builder knows where a project type keeps its packages:
//! npm/yarn workspaces for libraries, `ember-addon.paths` for in-repo
//! addons, and `tests/dummy` for an addon's dummy app. Once packages are
//! registered, every package's included files are discovered and walked.

use std::path::{Path, PathBuf};

use crate::config::GraphConfig;
use crate::discovery;
use crate::error::{GraphError, Result};
use crate::export::{self, ExportOptions};
use crate::file_node::FileNode;
use crate::manifest::{PackageJson, MANIFEST_FILE};
use crate::package_graph::{ModuleRoot, PackageGraph, PackageKind, PackageNode};
use crate::resolver::Resolver;
use crate::sort::top_sort_files;

/// Registers the packages of one project type with a loaded resolver
pub trait ProjectGraphBuilder {
    fn kind(&self) -> PackageKind;

    fn register_packages(&self, resolver: &mut Resolver) -> Result<()>;
}

pub struct LibraryGraphBuilder;

pub struct EmberAppGraphBuilder;

pub struct EmberAddonGraphBuilder;

impl ProjectGraphBuilder for LibraryGraphBuilder {
    fn kind(&self) -> PackageKind {
        PackageKind::Library
    }

    fn register_packages(&self, resolver: &mut Resolver) -> Result<()> {
        register_workspaces(resolver)
    }
}

impl ProjectGraphBuilder for EmberAppGraphBuilder {
    fn kind(&self) -> PackageKind {
        PackageKind::EmberApp
    }

    fn register_packages(&self, resolver: &mut Resolver) -> Result<()> {
        let root = resolver.root().to_path_buf();
        register_in_repo_addons(resolver, &root)?;
        register_workspaces(resolver)
    }
}

impl ProjectGraphBuilder for EmberAddonGraphBuilder {
    fn kind(&self) -> PackageKind {
        PackageKind::EmberAddon
    }

    fn register_packages(&self, resolver: &mut Resolver) -> Result<()> {
        let root = resolver.root().to_path_buf();
        let dummy = root.join("tests").join("dummy");
        if dummy.is_dir() {
            let app = dummy.join("app");
            resolver.register_package(
                PackageNode::internal("dummy", dummy, PackageKind::EmberApp)
                    .with_module_roots(vec![ModuleRoot::new("", app)]),
            );
        }
        register_in_repo_addons(resolver, &root)
    }
}

pub fn builder_for(kind: PackageKind) -> Box<dyn ProjectGraphBuilder> {
    match kind {
        PackageKind::Library => Box::new(LibraryGraphBuilder),
        PackageKind::EmberApp => Box::new(EmberAppGraphBuilder),
        PackageKind::EmberAddon => Box::new(EmberAddonGraphBuilder),
    }
}

/// Expand the root manifest's `workspaces` globs into packages
fn register_workspaces(resolver: &mut Resolver) -> Result<()> {
    let Some(manifest) = resolver.root_manifest() else {
        return Ok(());
    };
    let root = resolver.root().to_path_buf();

    let mut dirs = Vec::new();
    for pattern in manifest.workspace_patterns() {
        let full = root.join(pattern).join(MANIFEST_FILE);
        let full = full.to_string_lossy();
        let matches = glob::glob(&full).map_err(|err| {
            GraphError::configuration(&root.join(MANIFEST_FILE), format!("bad workspace pattern '{pattern}': {err}"))
        })?;
        for entry in matches {
            match entry {
                Ok(path) => dirs.extend(path.parent().map(Path::to_path_buf)),
                Err(err) => tracing::warn!("error expanding workspace pattern '{pattern}': {err}"),
            }
        }
    }
    dirs.sort();
    dirs.dedup();

    for dir in dirs {
        let dir = dir.canonicalize().map_err(|err| GraphError::io(&dir, err))?;
        if dir == root || dir.components().any(|c| c.as_os_str() == "node_modules") {
            continue;
        }
        let Some(manifest) = resolver.manifests_mut().load(&dir)? else {
            continue;
        };
        let name = package_name(&manifest, &dir);
        let kind = PackageKind::detect(&manifest);
        resolver.register_package(PackageNode::internal(name, dir, kind));
    }
    Ok(())
}

/// Register `ember-addon.paths` of the manifest at `base`, and theirs in turn
fn register_in_repo_addons(resolver: &mut Resolver, base: &Path) -> Result<()> {
    let mut pending: Vec<PathBuf> = vec![base.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Some(manifest) = resolver.manifests_mut().load(&dir)? else {
            continue;
        };
        // Reverse so the stack pops addons in manifest order
        let mut found = Vec::new();
        for path in manifest.in_repo_addon_paths() {
            let addon = path_clean::clean(dir.join(path));
            if !addon.is_dir() {
                tracing::warn!(addon = %addon.display(), "in-repo addon path does not exist");
                continue;
            }
            let Some(addon_manifest) = resolver.manifests_mut().load(&addon)? else {
                tracing::warn!(addon = %addon.display(), "in-repo addon has no package.json");
                continue;
            };
            let name = package_name(&addon_manifest, &addon);
            if resolver.graph().contains_package(&name) {
                continue;
            }
            resolver.register_package(PackageNode::internal(name, addon.clone(), PackageKind::EmberAddon));
            found.push(addon);
        }
        pending.extend(found.into_iter().rev());
    }
    Ok(())
}

fn package_name(manifest: &PackageJson, dir: &Path) -> String {
    manifest.name.clone().unwrap_or_else(|| {
        dir.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

/// A fully walked project
pub struct ProjectGraph {
    root: PathBuf,
    kind: PackageKind,
    packages: PackageGraph,
}

impl ProjectGraph {
    /// Build the graph of the project at `root`
    ///
    /// # Errors
    ///
    /// `Configuration` for an unusable root or manifest, `Io` for an
    /// unreadable source file, `Assertion` if an internal invariant breaks.
    pub fn build(root: &Path, config: &GraphConfig) -> Result<Self> {
        let mut resolver = Resolver::new(root, config)?;
        resolver.load()?;
        let kind = resolver
            .root_kind()
            .ok_or_else(|| GraphError::Assertion("root package not loaded".to_string()))?;

        let builder = builder_for(kind);
        builder.register_packages(&mut resolver)?;

        let internal: Vec<(String, PathBuf, PackageKind)> = resolver
            .graph()
            .packages()
            .filter(|package| package.is_internal())
            .filter_map(|package| {
                let root = package.package_root()?.to_path_buf();
                Some((package.name().to_string(), root, package.kind()))
            })
            .collect();

        for (name, package_root, package_kind) in internal {
            let files = discovery::discover_files(&package_root, package_kind.include_patterns())?;
            let owned: Vec<PathBuf> = files
                .into_iter()
                .filter(|file| {
                    resolver
                        .graph()
                        .get_package_name_from_file_id(file)
                        .is_ok_and(|owner| owner == name)
                })
                .collect();
            tracing::debug!(package = %name, files = owned.len(), "discovered package files");
            for file in owned {
                resolver.walk(&file)?;
            }
        }

        let root = resolver.root().to_path_buf();
        let packages = resolver.into_package_graph();
        tracing::info!(
            packages = packages.package_count(),
            files = packages.file_count(),
            "built project graph"
        );
        Ok(Self { root, kind, packages })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    pub fn packages(&self) -> &PackageGraph {
        &self.packages
    }

    /// Packages leaf-first
    pub fn package_order(&self) -> Result<Vec<&PackageNode>> {
        self.packages.sorted_packages()
    }

    /// Project files to migrate, dependencies first
    ///
    /// External package files and declarations are graph leaves only; they
    /// are not part of the order.
    pub fn migration_order(&self) -> Result<Vec<&FileNode>> {
        Ok(top_sort_files(&self.packages)?
            .into_iter()
            .filter(|file| !file.is_declaration())
            .filter(|file| {
                self.packages
                    .owner_of(file.id())
                    .is_some_and(|owner| !owner.is_external())
            })
            .collect())
    }

    pub fn to_json(&self, options: ExportOptions) -> Result<String> {
        let order = top_sort_files(&self.packages)?;
        let entries = export::to_json_entries(&self.packages, &order, &self.root, options)?;
        export::render_json(&entries)
    }

    pub fn to_dot(&self, options: ExportOptions) -> Result<String> {
        let order = top_sort_files(&self.packages)?;
        Ok(export::render_dot(&self.packages, &order, options))
    }
}
