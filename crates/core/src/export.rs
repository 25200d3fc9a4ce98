//! JSON and Graphviz renderings of a built graph
//!
//! Exporters only read the graph. Skipping templates hides `.hbs` files
//! and the edges that touch them from the output; the order is unaffected.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::file_node::FileNode;
use crate::package_graph::{PackageGraph, PackageNode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Leave `.hbs` files out of the rendered graph
    pub skip_templates: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub name: String,
    pub external: bool,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub has_types: bool,
    pub edges: Vec<EdgeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeEntry {
    pub package_name: String,
    pub has_types: bool,
    pub missing: bool,
    pub file_name: String,
}

/// One entry per package that owns files, in registration order
///
/// Files within a package follow their position in `order`. Imports that
/// never resolved are listed as edges with `missing` set and the specifier
/// as file name.
pub fn to_json_entries(
    graph: &PackageGraph,
    order: &[&FileNode],
    root: &Path,
    options: ExportOptions,
) -> Result<Vec<PackageEntry>> {
    let positions = positions(order);
    let mut entries = Vec::new();

    for package in graph.packages().filter(|package| !package.is_missing()) {
        let mut files = Vec::new();
        for file in ordered_files(package, &positions, options) {
            let mut edges = Vec::with_capacity(file.edge_count());
            for target in file.edges() {
                if options.skip_templates && is_template(target) {
                    continue;
                }
                edges.push(EdgeEntry {
                    package_name: graph.get_package_name_from_file_id(target)?.to_string(),
                    has_types: graph.has_types(target),
                    missing: false,
                    file_name: display_path(target, root),
                });
            }
            edges.extend(file.unresolved().iter().map(|import| EdgeEntry {
                package_name: import
                    .package
                    .clone()
                    .unwrap_or_else(|| package.name().to_string()),
                has_types: false,
                missing: true,
                file_name: import.specifier.clone(),
            }));

            files.push(FileEntry {
                name: display_path(file.id(), root),
                has_types: file.has_types(),
                edges,
            });
        }

        if !files.is_empty() {
            entries.push(PackageEntry {
                name: package.name().to_string(),
                external: package.is_external(),
                files,
            });
        }
    }

    Ok(entries)
}

pub fn render_json(entries: &[PackageEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

/// Graphviz document with one cluster per package
pub fn render_dot(graph: &PackageGraph, order: &[&FileNode], options: ExportOptions) -> String {
    let positions = positions(order);
    let mut ids: HashMap<&Path, usize> = HashMap::new();
    let mut out = String::from("digraph migration {\n  node [shape=box];\n");

    let mut cluster = 0;
    for package in graph.packages().filter(|package| !package.is_missing()) {
        let files = ordered_files(package, &positions, options);
        if files.is_empty() {
            continue;
        }
        out.push_str(&format!("  subgraph cluster_{cluster} {{\n"));
        out.push_str(&format!("    label=\"{}\";\n", escape_dot_label(package.name())));
        if package.is_external() {
            out.push_str("    style=dashed;\n");
        }
        for file in files {
            let id = ids.len();
            ids.insert(file.id(), id);
            let label = package
                .package_root()
                .and_then(|root| file.id().strip_prefix(root).ok())
                .unwrap_or(file.id());
            out.push_str(&format!(
                "    \"n{id}\" [label=\"{}\", URL=\"file://{}\"];\n",
                escape_dot_label(&label.to_string_lossy()),
                escape_dot_label(&file.id().to_string_lossy())
            ));
        }
        out.push_str("  }\n");
        cluster += 1;
    }

    for file in graph.files() {
        let Some(from) = ids.get(file.id()) else {
            continue;
        };
        // Edges are stored newest first; render them in import order
        let targets: Vec<&Path> = file.edges().collect();
        for target in targets.into_iter().rev() {
            if let Some(to) = ids.get(target) {
                out.push_str(&format!("  \"n{from}\" -> \"n{to}\";\n"));
            }
        }
    }

    out.push_str("}\n");
    out
}

fn positions<'g>(order: &[&'g FileNode]) -> HashMap<&'g Path, usize> {
    order
        .iter()
        .enumerate()
        .map(|(position, file)| (file.id(), position))
        .collect()
}

/// Files of `package` in sort order; unsorted files keep registration order
/// at the end
fn ordered_files<'g>(
    package: &'g PackageNode,
    positions: &HashMap<&Path, usize>,
    options: ExportOptions,
) -> Vec<&'g FileNode> {
    let mut files: Vec<&FileNode> = package
        .files()
        .filter(|file| !(options.skip_templates && file.is_template()))
        .collect();
    files.sort_by_key(|file| positions.get(file.id()).copied().unwrap_or(usize::MAX));
    files
}

fn is_template(path: &Path) -> bool {
    crate::discovery::is_template_file(path)
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn escape_dot_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_node::UnresolvedImport;
    use crate::package_graph::PackageKind;
    use crate::parser::ImportKind;
    use crate::sort::top_sort_files;

    fn sample() -> PackageGraph {
        let mut graph = PackageGraph::new();
        graph.add_package(PackageNode::internal("shop", "/p", PackageKind::EmberApp));
        graph.add_package(PackageNode::internal("pricing", "/p/lib/pricing", PackageKind::EmberAddon));

        let template = Path::new("/p/app/components/cart.hbs");
        let class = Path::new("/p/app/components/cart.ts");
        let format = Path::new("/p/lib/pricing/addon/format.js");
        for file in [template, class, format] {
            graph.add_file(file).unwrap();
        }
        graph.add_file_edge(template, class).unwrap();
        graph.add_file_edge(class, format).unwrap();
        graph
            .record_missing_import(
                class,
                UnresolvedImport {
                    specifier: "left-pad".to_string(),
                    kind: ImportKind::Static,
                    package: Some("left-pad".to_string()),
                },
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_json_entries() {
        let graph = sample();
        let order = top_sort_files(&graph).unwrap();
        let entries = to_json_entries(&graph, &order, Path::new("/p"), ExportOptions::default()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "shop");
        assert!(!entries[0].external);
        let file_names: Vec<&str> = entries[0].files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(file_names, vec!["app/components/cart.ts", "app/components/cart.hbs"]);

        let class = &entries[0].files[0];
        assert!(class.has_types);
        assert_eq!(
            class.edges,
            vec![
                EdgeEntry {
                    package_name: "pricing".to_string(),
                    has_types: false,
                    missing: false,
                    file_name: "lib/pricing/addon/format.js".to_string(),
                },
                EdgeEntry {
                    package_name: "left-pad".to_string(),
                    has_types: false,
                    missing: true,
                    file_name: "left-pad".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_json_shape() {
        let graph = sample();
        let order = top_sort_files(&graph).unwrap();
        let entries = to_json_entries(&graph, &order, Path::new("/p"), ExportOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&render_json(&entries).unwrap()).unwrap();

        let edge = &value[0]["files"][0]["edges"][0];
        assert_eq!(edge["packageName"], "pricing");
        assert_eq!(edge["fileName"], "lib/pricing/addon/format.js");
        assert_eq!(value[0]["files"][0]["hasTypes"], true);
        assert_eq!(value[1]["external"], false);
    }

    #[test]
    fn test_skip_templates() {
        let graph = sample();
        let order = top_sort_files(&graph).unwrap();
        let options = ExportOptions { skip_templates: true };
        let entries = to_json_entries(&graph, &order, Path::new("/p"), options).unwrap();

        assert_eq!(entries[0].files.len(), 1);
        assert!(!render_dot(&graph, &order, options).contains("cart.hbs"));
        // the graph itself is untouched
        assert_eq!(graph.file_count(), 3);
    }

    #[test]
    fn test_render_dot() {
        let graph = sample();
        let order = top_sort_files(&graph).unwrap();
        let dot = render_dot(&graph, &order, ExportOptions::default());

        assert!(dot.starts_with("digraph migration {"));
        assert!(dot.contains("subgraph cluster_0 {"));
        assert!(dot.contains("label=\"pricing\";"));
        assert!(dot.contains("[label=\"addon/format.js\", URL=\"file:///p/lib/pricing/addon/format.js\"]"));
        // cart.ts is n0, cart.hbs n1, format.js n2
        assert!(dot.contains("\"n1\" -> \"n0\";"));
        assert!(dot.contains("\"n0\" -> \"n2\";"));
        assert!(!dot.contains("left-pad"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_escape_dot_label() {
        assert_eq!(escape_dot_label(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
