use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dagrefly_core::{AdapterRegistry, Config, Diagnostic, Report, Severity, DEFAULT_ADAPTER_TYPE};
use dagrefly_graph::{DependencyGraph, NodeId};
use dagrefly_manifest::{
    materialization_macro_name, LinkStrategy, Linker, LookupKind, MacroResolver, Manifest,
    NameResolver, Resolution, Validator,
};

mod selector;

use selector::SelectionExpr;

/// DagRefly - dependency graph and name resolution for dbt manifests
#[derive(Parser)]
#[command(name = "dagrefly")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dagrefly.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to dbt manifest.json
    #[arg(short = 'f', long, global = true, default_value = "target/manifest.json")]
    manifest: PathBuf,

    /// Build the graph one artifact at a time instead of in bulk
    #[arg(long, global = true)]
    incremental: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the run order as batches of independent nodes
    Plan {
        /// Selection expressions (name, +name, name+, N+name, name+N, @name)
        #[arg(short, long)]
        select: Vec<String>,

        /// Order tests before the nodes downstream of what they test
        #[arg(long)]
        with_tests: bool,
    },

    /// Show downstream impact for a node
    Impact {
        /// Node name or unique_id
        node: String,
    },

    /// Resolve a reference the way dbt would
    Resolve {
        #[command(subcommand)]
        target: ResolveTarget,
    },

    /// Write parent, child and group maps as JSON
    Maps {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the manifest for graph and naming defects
    Validate {
        /// Output file for report.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report a dependency cycle, if any
    Cycle,
}

#[derive(Subcommand)]
enum ResolveTarget {
    /// ref('name') / ref('package', 'name')
    Ref {
        name: String,

        #[arg(short, long)]
        package: Option<String>,

        #[arg(long)]
        version: Option<String>,

        /// Package of the referencing node (default: root project)
        #[arg(long)]
        from_package: Option<String>,
    },

    /// source('source_name', 'table_name')
    Source {
        source_name: String,
        table_name: String,

        #[arg(long)]
        from_package: Option<String>,
    },

    /// doc('name') / doc('package', 'name')
    Doc {
        name: String,

        #[arg(short, long)]
        package: Option<String>,

        #[arg(long)]
        from_package: Option<String>,
    },

    /// A macro by name
    Macro {
        name: String,

        #[arg(short, long)]
        package: Option<String>,
    },

    /// The materialization macro for the current adapter
    Materialization { name: String },
}

/// Everything a command needs: config, manifest and the names resolved from them
struct Workspace {
    config: Config,
    manifest: Manifest,
    project: String,
    adapter_type: String,
    strategy: LinkStrategy,
}

impl Workspace {
    fn load(cli: &Cli) -> Result<Self> {
        let config = if let Some(config_path) = &cli.config {
            Config::from_file(config_path)?
        } else if Path::new("dagrefly.toml").exists() {
            Config::from_file(Path::new("dagrefly.toml"))?
        } else {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        };

        if !cli.manifest.exists() {
            return Err(anyhow!(
                "Manifest not found at {}. Run 'dbt compile' or 'dbt build' first.",
                cli.manifest.display()
            ));
        }

        if cli.verbose {
            eprintln!("{} {}", "Loading manifest from:".cyan(), cli.manifest.display());
        }

        let manifest = Manifest::from_file(&cli.manifest).context("Failed to load manifest")?;

        let project = config
            .project_name_or(manifest.project_name())
            .ok_or_else(|| {
                anyhow!(
                    "No project name in the manifest metadata; \
                     set project_name in dagrefly.toml"
                )
            })?
            .to_string();
        let adapter_type = config
            .adapter_type_or(manifest.adapter_type())
            .unwrap_or(DEFAULT_ADAPTER_TYPE)
            .to_string();

        let strategy = if cli.incremental {
            LinkStrategy::Incremental
        } else {
            LinkStrategy::Bulk
        };

        Ok(Self {
            config,
            manifest,
            project,
            adapter_type,
            strategy,
        })
    }

    fn graph(&self) -> Result<DependencyGraph> {
        Linker::new(self.strategy)
            .link(&self.manifest)
            .context("Failed to build dependency graph")
    }

    /// Unique id of a node given by unique id or ref name
    fn find_node_id(&self, graph: &DependencyGraph, name: &str) -> Result<NodeId> {
        if graph.contains(name) {
            return Ok(name.to_string());
        }

        let resolver = NameResolver::new(&self.manifest);
        match resolver.resolve_ref(None, name, None, None, &self.project, &self.project) {
            Resolution::Found(id) => Ok(id),
            Resolution::Ambiguous(candidates) => Err(anyhow!(
                "'{}' matches several nodes: {}. Use the full unique_id.",
                name,
                candidates.join(", ")
            )),
            Resolution::NotFound => Err(anyhow!(
                "Node '{}' not found in manifest. \
                 Try using the full unique_id (e.g., 'model.{}.{}')",
                name,
                self.project,
                name
            )),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let workspace = Workspace::load(&cli)?;

    if cli.verbose {
        eprintln!(
            "{} project {} on {}",
            "Using".cyan(),
            workspace.project,
            workspace.adapter_type
        );
    }

    match &cli.command {
        Commands::Plan { select, with_tests } => plan_command(&workspace, select, *with_tests),
        Commands::Impact { node } => impact_command(&workspace, node),
        Commands::Resolve { target } => resolve_command(&workspace, target),
        Commands::Maps { output } => maps_command(&workspace, output.as_deref()),
        Commands::Validate { output } => validate_command(&workspace, output.as_deref()),
        Commands::Cycle => cycle_command(&workspace),
    }
}

/// Plan command - grouped run order, optionally over a selection
fn plan_command(workspace: &Workspace, select: &[String], with_tests: bool) -> Result<()> {
    let mut graph = workspace.graph()?;

    if with_tests {
        Linker::add_test_edges(&workspace.manifest, &mut graph)?;
    }

    if !select.is_empty() {
        let mut selected: BTreeSet<NodeId> = BTreeSet::new();
        for raw in select {
            let expr = SelectionExpr::parse(raw)?;
            let id = workspace.find_node_id(&graph, &expr.node)?;
            selected.extend(expr.expand(&graph, &id));
        }
        graph = graph.get_subset_graph(&selected);
    }

    let batches = graph.topological_sort_grouped()?;

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Execution Plan".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    println!("{} {} nodes in {} batches", "Plan:".bold(), graph.node_count(), batches.len());

    for (i, batch) in batches.iter().enumerate() {
        println!();
        println!("{}", format!("Batch {}", i + 1).bold());
        for id in batch {
            println!("  - {}", id);
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

/// Impact command - show downstream dependencies
fn impact_command(workspace: &Workspace, node: &str) -> Result<()> {
    let graph = workspace.graph()?;
    let node_id = workspace.find_node_id(&graph, node)?;
    let downstream = graph.descendants(&node_id, None)?;
    let direct = graph.select_successors([node_id.as_str()]);

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Downstream Impact Analysis".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Node:".bold(), node_id.green());
    println!("{} {}", "Direct dependents:".bold(), direct.len());
    println!("{} {}", "Downstream nodes:".bold(), downstream.len());
    println!();

    if downstream.is_empty() {
        println!("{}", "✓ No downstream dependencies".green());
        println!("This node can be modified without affecting other nodes.");
    } else {
        println!("{}", "Affected nodes (in dependency order):".bold());
        println!();

        let ordered = graph.get_subset_graph(&downstream).topological_sort_grouped()?;
        for (i, dep) in ordered.iter().flatten().enumerate() {
            let info = workspace
                .manifest
                .resource_type_of(dep)
                .map(|resource_type| format!("{} ({})", dep, resource_type))
                .unwrap_or_else(|| dep.clone());

            println!("  {}. {}", i + 1, info.yellow());
        }

        println!();
        println!("{}", "⚠ Changes to this node may break downstream nodes!".yellow().bold());
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

/// Resolve command - run one of the resolvers and print the winner
///
/// Ambiguous lookups, and refs or macros that match nothing, are printed as
/// diagnostics and exit with status 1.
fn resolve_command(workspace: &Workspace, target: &ResolveTarget) -> Result<()> {
    let project = workspace.project.as_str();
    let names = NameResolver::new(&workspace.manifest);
    let registry = AdapterRegistry::from_config(&workspace.config)?;
    let macros = MacroResolver::new(
        &workspace.manifest,
        project,
        &workspace.adapter_type,
        &registry,
        workspace.config.resolution.clone(),
    );

    let (kind, label, resolved) = match target {
        ResolveTarget::Ref { name, package, version, from_package } => {
            let resolution = names.resolve_ref(
                None,
                name,
                package.as_deref(),
                version.as_deref(),
                project,
                from_package.as_deref().unwrap_or(project),
            );
            (LookupKind::Ref, name.clone(), resolution.into_result(LookupKind::Ref, name))
        }
        ResolveTarget::Source { source_name, table_name, from_package } => {
            let label = format!("{}.{}", source_name, table_name);
            let node_package = from_package.as_deref().unwrap_or(project);
            let resolution = names.resolve_source(source_name, table_name, project, node_package);
            let resolved = resolution.into_result(LookupKind::Source, &label);
            (LookupKind::Source, label, resolved)
        }
        ResolveTarget::Doc { name, package, from_package } => {
            let node_package = from_package.as_deref().unwrap_or(project);
            let resolution = names.resolve_doc(name, package.as_deref(), project, node_package);
            (LookupKind::Doc, name.clone(), resolution.into_result(LookupKind::Doc, name))
        }
        ResolveTarget::Macro { name, package } => (
            LookupKind::Macro,
            name.clone(),
            macros.find_macro_by_name(name, package.as_deref()),
        ),
        ResolveTarget::Materialization { name } => {
            tracing::debug!("Adapter types searched: {}", macros.type_chain().join(" -> "));
            (
                LookupKind::Macro,
                materialization_macro_name(name, &workspace.adapter_type),
                macros.find_materialization_macro_by_name(name),
            )
        }
    };

    let diagnostic = match resolved {
        Ok(Some(id)) => {
            println!("{}", id.green());
            return Ok(());
        }
        Ok(None) => match kind.not_found_code() {
            Some(code) => {
                let message = format!("{} '{}' matches nothing", kind, label);
                Diagnostic::new(code, Severity::Error, message)
            }
            None => return Err(anyhow!("No {} found for '{}'", kind, label)),
        },
        Err(err) => err.to_diagnostic(),
    };

    print_diagnostic(&diagnostic);
    std::process::exit(1);
}

/// Maps command - parent, child and group maps
fn maps_command(workspace: &Workspace, output: Option<&Path>) -> Result<()> {
    let manifest = &workspace.manifest;
    let maps = serde_json::json!({
        "parent_map": manifest.build_parent_map(),
        "child_map": manifest.build_child_map(),
        "group_map": manifest.build_group_map(),
    });
    let json = serde_json::to_string_pretty(&maps)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} {}", "Maps saved to:".green(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Validate command - graph and naming checks
fn validate_command(workspace: &Workspace, output: Option<&Path>) -> Result<()> {
    let report = Validator::validate(&workspace.manifest, &workspace.config)
        .context("Failed to validate manifest")?;

    if let Some(path) = output {
        report.save_to_file(path)?;
        eprintln!("{} {}", "Report saved to:".green(), path.display());
    }

    print_report_summary(&report);

    // Exit with error code if there are errors
    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Cycle command - report the first cycle found
fn cycle_command(workspace: &Workspace) -> Result<()> {
    let graph = workspace.graph()?;

    match graph.find_cycle() {
        Some(cycle) => {
            let mut path = cycle.clone();
            path.extend(cycle.first().cloned());
            println!("{} {}", "✗ Dependency cycle:".red().bold(), path.join(" --> "));
            std::process::exit(1);
        }
        None => {
            println!(
                "{} ({} nodes, {} edges)",
                "✓ No dependency cycles".green().bold(),
                graph.node_count(),
                graph.edge_count()
            );
            Ok(())
        }
    }
}

fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Manifest Validation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!(
        "Graph: {} nodes, {} edges",
        report.summary.nodes_checked, report.summary.edges_checked
    );
    println!();

    println!("{}", "Summary:".bold());
    println!("  Total diagnostics: {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);

    for (code, count) in report.counts_by_code() {
        println!("    {:<28} {}", code, count);
    }
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            print_diagnostic(diag);
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

fn print_diagnostic(diag: &Diagnostic) {
    let severity_str = match diag.severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warn => "WARN".yellow().bold(),
        Severity::Info => "INFO".cyan(),
    };

    println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

    if let Some(loc) = &diag.location {
        match &loc.file {
            Some(file) => println!("    at {} ({})", loc.unique_id, file),
            None => println!("    at {}", loc.unique_id),
        }
    }

    if !diag.related.is_empty() {
        println!("    Related: {}", diag.related.join(", "));
    }
}
