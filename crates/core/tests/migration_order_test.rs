//! End-to-end ordering of a small Ember app with an in-repo addon
//!
//! The expected order lives next to the fixture in `expected-order.txt`.

use std::fs;
use std::path::Path;

use migration_graph_core::{ExportOptions, GraphConfig, PackageKind, ProjectGraph};

const FIXTURE: &str = "tests/test-fixtures/ember-app";

fn build() -> ProjectGraph {
    ProjectGraph::build(Path::new(FIXTURE), &GraphConfig::default()).unwrap()
}

fn relative_order(graph: &ProjectGraph) -> Vec<String> {
    graph
        .migration_order()
        .unwrap()
        .iter()
        .map(|file| {
            file.id()
                .strip_prefix(graph.root())
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

#[test]
fn test_migration_order_matches_golden_file() {
    let expected = fs::read_to_string(Path::new(FIXTURE).join("expected-order.txt")).unwrap();
    let expected: Vec<&str> = expected.lines().filter(|line| !line.is_empty()).collect();

    let graph = build();

    assert_eq!(graph.kind(), PackageKind::EmberApp);
    assert_eq!(relative_order(&graph), expected);
}

#[test]
fn test_order_is_deterministic() {
    assert_eq!(relative_order(&build()), relative_order(&build()));
}

#[test]
fn test_package_graph() {
    let graph = build();
    let packages = graph.packages();

    let order: Vec<&str> = graph
        .package_order()
        .unwrap()
        .iter()
        .map(|package| package.name())
        .collect();
    assert_eq!(order, vec!["ember-resolver", "pricing", "shop"]);

    assert!(packages.is_dependency_missing("ember-resolver"));
    let shop = packages.get_package_node("shop").unwrap();
    assert_eq!(shop.missing_dependencies().iter().collect::<Vec<_>>(), vec!["ember-resolver"]);
    assert_eq!(shop.unresolved_services().iter().collect::<Vec<_>>(), vec!["current-user"]);

    let price_tag = graph.root().join("lib/pricing/addon/components/price-tag.ts");
    assert_eq!(packages.get_package_name_from_file_id(&price_tag).unwrap(), "pricing");
    assert!(packages.has_types(&price_tag));
    assert!(!packages.has_types(&graph.root().join("app/app.js")));
}

#[test]
fn test_json_export() {
    let graph = build();
    let json = graph.to_json(ExportOptions::default()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let packages = value.as_array().unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0]["name"], "shop");
    assert_eq!(packages[1]["name"], "pricing");

    let app = &packages[0]["files"][0];
    assert_eq!(app["name"], "app/app.js");
    assert_eq!(app["edges"][0]["packageName"], "ember-resolver");
    assert_eq!(app["edges"][0]["missing"], true);
}

#[test]
fn test_dot_export_skips_templates() {
    let graph = build();
    let options = ExportOptions { skip_templates: true };

    let dot = graph.to_dot(options).unwrap();
    assert!(dot.contains("label=\"shop\";"));
    assert!(dot.contains("label=\"addon/components/price-tag.ts\""));
    assert!(!dot.contains(".hbs"));

    // the order still contains the template
    assert!(relative_order(&graph).iter().any(|file| file.ends_with(".hbs")));
}
