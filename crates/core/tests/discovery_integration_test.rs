//! Integration test for file discovery module
//!
//! This test uses the pre-created fixture at `tests/test-fixtures/ember-app/`
//! to verify ignore-aware file discovery works correctly.

use migration_graph_core::discovery;
use migration_graph_core::PackageKind;
use std::path::Path;

#[test]
fn test_integration_discovery_fixture() {
    let fixture_path = Path::new("tests/test-fixtures/ember-app");
    assert!(fixture_path.exists(), "Fixture directory should exist");

    let files = discovery::discover_files(fixture_path, PackageKind::EmberApp.include_patterns()).unwrap();

    // Expected: the app/ sources only
    // Excludes: app/generated/ (matched by .ignore), lib/, config/, types/
    let root = fixture_path.canonicalize().unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.strip_prefix(&root).unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "app/app.js",
            "app/components/cart-summary.hbs",
            "app/components/cart-summary.ts",
            "app/services/cart.ts",
        ]
    );

    assert!(files.iter().all(|p| p.is_absolute()), "All paths should be absolute");
}

#[test]
fn test_integration_discover_all_sources() {
    let fixture_path = Path::new("tests/test-fixtures/ember-app");
    let files = discovery::discover_source_files(fixture_path).unwrap();

    let file_names: Vec<&str> = files
        .iter()
        .filter_map(|p| p.file_name())
        .filter_map(|n| n.to_str())
        .collect();

    assert!(file_names.contains(&"environment.js"), "Should find config sources");
    assert!(file_names.contains(&"price-tag.ts"), "Should find in-repo addon sources");
    assert!(!file_names.contains(&"global.d.ts"), "Should skip declarations");
    assert!(!file_names.contains(&"schema.js"), "Should honor .ignore");
    assert!(!file_names.contains(&"package.json"), "Should skip manifests");
}
