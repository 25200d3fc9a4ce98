//! Migration Graph Core Library
//!
//! This library builds file- and package-level dependency graphs of
//! JavaScript/TypeScript projects (plain libraries, Ember apps and Ember
//! addons) and turns them into a leaf-first migration order.

pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod file_node;
pub mod graph;
pub mod manifest;
pub mod package_graph;
pub mod parser;
pub mod project;
pub mod resolver;
pub mod sort;

// Re-export commonly used types
pub use config::GraphConfig;
pub use error::{GraphError, Result};
pub use export::ExportOptions;
pub use file_node::{FileNode, UnresolvedImport};
pub use graph::{Graph, GraphNode, NodeContent};
pub use package_graph::{PackageGraph, PackageKind, PackageNode};
pub use project::ProjectGraph;
pub use resolver::Resolver;
pub use sort::top_sort_files;
