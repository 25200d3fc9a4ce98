//! Per-file graph vertex
//!
//! A `FileNode` is keyed by its absolute path and records the files it
//! depends on. Edge targets are stored by id; the owning
//! [`PackageGraph`](crate::package_graph::PackageGraph) resolves them.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::discovery;
use crate::parser::ImportKind;

/// An import that could not be mapped to a file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedImport {
    /// Specifier exactly as written in the source
    pub specifier: String,
    pub kind: ImportKind,
    /// Package name for bare specifiers; `None` for relative paths
    pub package: Option<String>,
}

/// A source file and the files it imports
#[derive(Debug, Clone)]
pub struct FileNode {
    id: PathBuf,
    /// Most recently discovered dependency first
    edges: VecDeque<PathBuf>,
    seen_edges: HashSet<PathBuf>,
    has_types: bool,
    unresolved: Vec<UnresolvedImport>,
}

impl FileNode {
    pub fn new(id: impl Into<PathBuf>, has_types: bool) -> Self {
        Self {
            id: id.into(),
            edges: VecDeque::new(),
            seen_edges: HashSet::new(),
            has_types,
            unresolved: Vec::new(),
        }
    }

    pub fn id(&self) -> &Path {
        &self.id
    }

    /// Record a dependency on `target`
    ///
    /// New targets go to the front, so the last import discovered is the
    /// first one a depth-first walk follows. Returns `false` when the edge
    /// already existed.
    pub fn add_edge(&mut self, target: &Path) -> bool {
        if !self.seen_edges.insert(target.to_path_buf()) {
            return false;
        }
        self.edges.push_front(target.to_path_buf());
        true
    }

    pub fn edges(&self) -> impl Iterator<Item = &Path> {
        self.edges.iter().map(PathBuf::as_path)
    }

    pub fn edge_at(&self, position: usize) -> Option<&Path> {
        self.edges.get(position).map(PathBuf::as_path)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn depends_on(&self, target: &Path) -> bool {
        self.seen_edges.contains(target)
    }

    pub fn has_types(&self) -> bool {
        self.has_types
    }

    pub fn record_unresolved(&mut self, import: UnresolvedImport) {
        if !self.unresolved.contains(&import) {
            self.unresolved.push(import);
        }
    }

    pub fn unresolved(&self) -> &[UnresolvedImport] {
        &self.unresolved
    }

    pub fn is_template(&self) -> bool {
        discovery::is_template_file(&self.id)
    }

    pub fn is_declaration(&self) -> bool {
        discovery::is_declaration_file(&self.id)
    }
}
