use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use gradspec_core::export::to_petgraph;
use gradspec_core::ir::GraphSpec;
use gradspec_core::{Graph, SpecializeConfig, SpecializeStats, UndefinedSpecializer};
use petgraph::dot::{Config, Dot};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gradspec",
    about = "Specialize gradient graphs for undefined gradients",
    long_about = "Reads a gradient graph in JSON form, propagates which gradients are\nknown to be undefined, removes every prim::GradOf guard and simplifies\nprim::AutogradAdd accumulations, then writes the rewritten graph.",
    version
)]
struct Cli {
    /// Graph to specialize (JSON)
    graph: PathBuf,

    /// Pass configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Route all eliminated prim::GradOf outputs to one shared prim::Undefined
    #[arg(long)]
    share_undefined: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Emit::Text)]
    emit: Emit,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print rewrite counts to stderr
    #[arg(long)]
    stats: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// IR dump
    Text,
    /// JSON graph description
    Json,
    /// Graphviz DOT
    Dot,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let mut graph = load_graph(&cli.graph)?;
    debug!(nodes = graph.node_count(), "loaded graph");

    let specializer = UndefinedSpecializer::new(config);
    debug!(
        share_undefined_producer = specializer.config().share_undefined_producer,
        verify = specializer.config().verify,
        "running undefined specialization"
    );
    let stats = specializer.run(&mut graph);
    graph
        .lint()
        .context("specialization produced a malformed graph")?;

    let rendered = render(&graph, cli.emit)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote specialized graph");
        }
        None => println!("{rendered}"),
    }

    if cli.stats {
        print_stats(&stats);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<SpecializeConfig> {
    let config = match &cli.config {
        Some(path) => SpecializeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SpecializeConfig::default(),
    };
    Ok(if cli.share_undefined {
        config.with_shared_undefined(true)
    } else {
        config
    })
}

fn load_graph(path: &Path) -> Result<Graph> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let spec = GraphSpec::from_json(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    let graph = spec
        .build()
        .with_context(|| format!("Invalid graph in {}", path.display()))?;
    Ok(graph)
}

fn render(graph: &Graph, emit: Emit) -> Result<String> {
    Ok(match emit {
        Emit::Text => graph.to_string(),
        Emit::Json => GraphSpec::from_graph(graph).to_json()?,
        Emit::Dot => format!("{}", Dot::with_config(&to_petgraph(graph), &[Config::EdgeNoLabel])),
    })
}

fn print_stats(stats: &SpecializeStats) {
    eprintln!("{}", "Undefined specialization".bold());
    let rows = [
        ("GradOf eliminated", stats.grad_of_eliminated),
        ("GradOf hoisted", stats.grad_of_hoisted),
        ("Nodes hoisted", stats.hoisted_nodes),
        ("Adds forwarded", stats.adds_forwarded),
        ("Adds upgraded", stats.adds_upgraded),
        ("Adds kept", stats.adds_kept),
    ];
    for (label, count) in rows {
        let count = if count > 0 {
            count.to_string().green()
        } else {
            count.to_string().dimmed()
        };
        eprintln!("  {label:<18} {count}");
    }
    eprintln!("  {:<18} {}", "Total rewrites", stats.rewrites().to_string().cyan());
}
