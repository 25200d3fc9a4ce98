//! Flat file ordering across package boundaries

use std::collections::HashSet;
use std::path::Path;

use crate::error::{GraphError, Result};
use crate::file_node::FileNode;
use crate::package_graph::PackageGraph;

/// Every file of `graph`, dependencies before dependents
///
/// Files are visited depth-first in package-then-file registration order,
/// following each file's edges in stored order. A file is emitted once all
/// the files it reaches first have been emitted; in a cycle the file entered
/// first comes out last.
///
/// # Errors
///
/// `Assertion` when an edge points at a file that was never registered.
pub fn top_sort_files(graph: &PackageGraph) -> Result<Vec<&FileNode>> {
    let mut visited: HashSet<&Path> = HashSet::with_capacity(graph.file_count());
    let mut order = Vec::with_capacity(graph.file_count());
    let mut stack: Vec<(&FileNode, usize)> = Vec::new();

    for file in graph.files() {
        if !visited.insert(file.id()) {
            continue;
        }
        stack.push((file, 0));

        while let Some((node, cursor)) = stack.last_mut() {
            let node = *node;
            match node.edge_at(*cursor) {
                Some(target) => {
                    *cursor += 1;
                    if visited.contains(target) {
                        continue;
                    }
                    let next = graph.file(target).ok_or_else(|| {
                        GraphError::Assertion(format!(
                            "{} imports unregistered file {}",
                            node.id().display(),
                            target.display()
                        ))
                    })?;
                    visited.insert(next.id());
                    stack.push((next, 0));
                }
                None => {
                    order.push(node);
                    stack.pop();
                }
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_graph::{PackageKind, PackageNode};

    fn graph_with(files: &[&str], edges: &[(&str, &str)]) -> PackageGraph {
        let mut graph = PackageGraph::new();
        graph.add_package(PackageNode::internal("demo", "/p", PackageKind::Library));
        for file in files {
            graph.add_file(&Path::new("/p").join(file)).unwrap();
        }
        for (from, to) in edges {
            graph
                .add_file_edge(&Path::new("/p").join(from), &Path::new("/p").join(to))
                .unwrap();
        }
        graph
    }

    fn names(order: &[&FileNode]) -> Vec<String> {
        order
            .iter()
            .map(|file| file.id().strip_prefix("/p").unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_dependency_comes_first() {
        let graph = graph_with(&["a.ts", "b.ts"], &[("a.ts", "b.ts")]);
        assert_eq!(names(&top_sort_files(&graph).unwrap()), vec!["b.ts", "a.ts"]);
    }

    #[test]
    fn test_last_discovered_import_first() {
        let graph = graph_with(&["a.ts", "b.ts", "c.ts"], &[("a.ts", "b.ts"), ("a.ts", "c.ts")]);
        assert_eq!(names(&top_sort_files(&graph).unwrap()), vec!["c.ts", "b.ts", "a.ts"]);
    }

    #[test]
    fn test_cycle_emits_each_file_once() {
        let graph = graph_with(&["a.ts", "b.ts"], &[("a.ts", "b.ts"), ("b.ts", "a.ts")]);
        assert_eq!(names(&top_sort_files(&graph).unwrap()), vec!["b.ts", "a.ts"]);
    }

    #[test]
    fn test_disconnected_files_keep_registration_order() {
        let graph = graph_with(&["z.ts", "m.ts", "a.ts"], &[]);
        assert_eq!(names(&top_sort_files(&graph).unwrap()), vec!["z.ts", "m.ts", "a.ts"]);
    }

    #[test]
    fn test_spans_packages() {
        let mut graph = PackageGraph::new();
        graph.add_package(PackageNode::internal("app", "/p", PackageKind::Library));
        graph.add_package(PackageNode::internal("lib", "/p/lib", PackageKind::Library));
        let main = Path::new("/p/main.ts");
        let util = Path::new("/p/lib/util.ts");
        graph.add_file(main).unwrap();
        graph.add_file(util).unwrap();
        graph.add_file_edge(main, util).unwrap();

        let order: Vec<&Path> = top_sort_files(&graph).unwrap().iter().map(|f| f.id()).collect();
        assert_eq!(order, vec![util, main]);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let files: Vec<String> = (0..20_000).map(|i| format!("f{i}.ts")).collect();
        let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
        let edges: Vec<(&str, &str)> = file_refs.windows(2).map(|pair| (pair[0], pair[1])).collect();
        let graph = graph_with(&file_refs, &edges);

        let order = top_sort_files(&graph).unwrap();
        assert_eq!(order.len(), 20_000);
        assert!(order[0].id().ends_with("f19999.ts"));
        assert!(order[19_999].id().ends_with("f0.ts"));
    }
}
