use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use migration_graph_core::config::parse_ignore_list;
use migration_graph_core::{ExportOptions, GraphConfig, PackageKind, ProjectGraph};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// migration-graph - Leaf-first migration order for JS/TS and Ember projects
#[derive(Parser)]
#[command(name = "migration-graph")]
#[command(version)] // Auto-pull version from Cargo.toml
#[command(about = "Compute the order in which to migrate a project's files", long_about = None)]
struct Cli {
    /// Project root containing package.json
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Extra root-relative globs to ignore (comma-separated)
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<String>,

    /// Only files matching these root-relative globs become nodes (comma-separated)
    #[arg(long, value_delimiter = ',')]
    include: Vec<String>,

    /// JSON config file with include, exclude, services and kind
    #[arg(long)]
    config: Option<PathBuf>,

    /// Project type; detected from package.json when omitted
    #[arg(long)]
    kind: Option<PackageKind>,

    #[arg(long, value_enum, default_value_t = Format::Order)]
    format: Format,

    /// Leave .hbs templates out of the output
    #[arg(long)]
    skip_templates: bool,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// -v for debug logs, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Files, dependencies first
    Order,
    /// Packages, dependencies first
    Packages,
    Json,
    Dot,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let graph = build_graph(&cli)?;
    let rendered = render(&graph, cli.format, ExportOptions { skip_templates: cli.skip_templates })?;

    match &cli.output {
        Some(path) => fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Config file first, then flags layered on top
fn build_config(cli: &Cli) -> Result<GraphConfig> {
    let mut config = match &cli.config {
        Some(path) => GraphConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GraphConfig::default(),
    };
    config
        .exclude
        .extend(cli.ignore.iter().flat_map(|list| parse_ignore_list(list)));
    config
        .include
        .extend(cli.include.iter().flat_map(|list| parse_ignore_list(list)));
    if cli.kind.is_some() {
        config.kind = cli.kind;
    }
    Ok(config)
}

fn build_graph(cli: &Cli) -> Result<ProjectGraph> {
    let config = build_config(cli)?;
    let graph = ProjectGraph::build(&cli.root, &config)
        .with_context(|| format!("failed to build graph for {}", cli.root.display()))?;
    tracing::info!(
        root = %graph.root().display(),
        kind = %graph.kind(),
        packages = graph.packages().package_count(),
        files = graph.packages().file_count(),
        "built migration graph"
    );
    Ok(graph)
}

fn render(graph: &ProjectGraph, format: Format, options: ExportOptions) -> Result<String> {
    let output = match format {
        Format::Order => {
            let mut out = String::new();
            for file in graph.migration_order()? {
                if options.skip_templates && file.is_template() {
                    continue;
                }
                out.push_str(&display(file.id(), graph.root()));
                out.push('\n');
            }
            out
        }
        Format::Packages => {
            let mut out = String::new();
            for package in graph.package_order()? {
                out.push_str(package.name());
                if package.is_missing() {
                    out.push_str(" (missing)");
                } else if package.is_external() {
                    out.push_str(" (external)");
                }
                out.push('\n');
            }
            out
        }
        Format::Json => {
            let mut json = graph.to_json(options)?;
            json.push('\n');
            json
        }
        Format::Dot => graph.to_dot(options)?,
    };
    Ok(output)
}

fn display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_layer_over_defaults() {
        let cli = Cli::parse_from([
            "migration-graph",
            "my-app",
            "--ignore",
            "app/legacy/**, vendor/**",
            "--kind",
            "ember-addon",
            "--format",
            "json",
            "-vv",
        ]);
        let config = build_config(&cli).unwrap();

        assert_eq!(cli.root, PathBuf::from("my-app"));
        assert_eq!(config.exclude, vec!["app/legacy/**", "vendor/**"]);
        assert_eq!(config.kind, Some(PackageKind::EmberAddon));
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_build_and_render_fixture() {
        let fixture = concat!(env!("CARGO_MANIFEST_DIR"), "/../core/tests/test-fixtures/ember-app");
        let cli = Cli::parse_from(["migration-graph", fixture, "--format", "packages"]);
        let graph = build_graph(&cli).unwrap();

        assert_eq!(graph.kind(), PackageKind::EmberApp);
        let packages = render(&graph, cli.format, ExportOptions::default()).unwrap();
        assert!(packages.lines().any(|line| line == "pricing"));

        let expected = fs::read_to_string(Path::new(fixture).join("expected-order.txt")).unwrap();
        let order = render(&graph, Format::Order, ExportOptions::default()).unwrap();
        assert_eq!(order.lines().collect::<Vec<_>>(), expected.lines().filter(|l| !l.is_empty()).collect::<Vec<_>>());
        assert!(!order.contains("config/environment.js"));
    }

    #[test]
    fn test_build_graph_reports_bad_root() {
        let cli = Cli::parse_from(["migration-graph", "/definitely/not/here"]);
        let err = build_graph(&cli).err().unwrap();
        assert!(err.to_string().contains("failed to build graph"));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["migration-graph"]);
        assert_eq!(cli.root, PathBuf::from("."));
        assert_eq!(cli.format, Format::Order);
        assert!(build_config(&cli).unwrap().include.is_empty());
    }
}
