//! CLI command implementations.

use crate::config::{AnalysisConfig, ARBOR_DIR, CONFIG_FILE};
use arbor_core::{CompactSkeleton, TreenodeId};
use arbor_tree::{ArborBuilder, ArborExport, ParsedSkeleton};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// A node and its score, for ranked output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct Ranked {
    node: TreenodeId,
    value: f64,
}

/// Initialize Arbor in a directory.
pub fn init(path: &Path) -> Result<()> {
    let arbor_dir = path.join(ARBOR_DIR);
    let config_path = arbor_dir.join(CONFIG_FILE);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    fs::create_dir_all(&arbor_dir)?;
    let config = AnalysisConfig::default();
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    println!("{} Initialized Arbor in {}", "✓".green(), path.display());
    println!("  Edit {} to change analysis settings", config_path.display().to_string().cyan());

    Ok(())
}

/// Reads a compact-skeleton file and builds its arbor.
fn load_skeleton(path: &Path) -> Result<ParsedSkeleton> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let skeleton = CompactSkeleton::from_reader(BufReader::new(file))?;

    let mut builder = ArborBuilder::new().with_synapses_in_arbor_only();
    builder.add_skeleton(&skeleton);
    let parsed = builder.build()?;

    info!(
        "Loaded {} with {} nodes",
        path.display(),
        parsed.arbor.count_nodes()
    );
    Ok(parsed)
}

/// Show node counts, cable and shape measures of a skeleton.
pub fn stats(path: &Path) -> Result<()> {
    let parsed = load_skeleton(path)?;
    let arbor = &parsed.arbor;
    let stats = arbor.stats();
    let distance = |a: &TreenodeId, b: &TreenodeId| parsed.distance(a, b);

    let cable = parsed.cable_length();
    let terminal = arbor.terminal_cable_length(distance)?;
    let strahler = arbor.strahler_analysis()?;
    let max_order = strahler.values().copied().max().unwrap_or(0);
    let asymmetry = arbor.asymmetry_index()?;

    println!("{}", "Skeleton Statistics".cyan().bold());
    println!("{}", "═".repeat(40));
    println!("  Nodes:          {}", stats.node_count.to_string().cyan());
    println!("  Branch nodes:   {}", stats.branch_count.to_string().cyan());
    println!("  End nodes:      {}", stats.end_count.to_string().cyan());
    println!("  Cable length:   {:.2}", cable);
    println!("  Terminal cable: {:.2}", terminal.cable);
    println!("  Strahler order: {}", max_order);
    match asymmetry {
        Some(a) => println!(
            "  Asymmetry:      {:.3} ± {:.3} over {} splits",
            a.mean, a.std_dev, a.n_branches
        ),
        None => println!("  Asymmetry:      {}", "n/a (no branches)".dimmed()),
    }
    println!(
        "  Synapses:       {} in, {} out",
        parsed.synapses.n_inputs, parsed.synapses.n_outputs
    );

    Ok(())
}

/// Rank nodes by betweenness centrality.
pub fn centrality(
    path: &Path,
    config: &AnalysisConfig,
    normalized: bool,
    top: Option<usize>,
    json_output: bool,
) -> Result<()> {
    let parsed = load_skeleton(path)?;
    let arbor = &parsed.arbor;
    let normalized = normalized || config.normalized;
    let approximate = arbor.count_nodes() > config.slab_centrality_threshold;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("Computing centrality...");

    let start = Instant::now();
    let scores = if approximate {
        arbor.slab_centrality(normalized)?
    } else {
        arbor.betweenness_centrality(normalized)?
    };
    spinner.finish_and_clear();
    debug!("Centrality took {}ms", start.elapsed().as_millis());

    let ranked = top_n(&scores, top.unwrap_or(config.top));
    if json_output {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(());
    }

    let kind = if approximate { "slab" } else { "betweenness" };
    println!(
        "{} {} centrality over {} nodes{}",
        "✓".green(),
        kind,
        arbor.count_nodes().to_string().cyan(),
        if normalized { " (normalized)" } else { "" }
    );
    print_ranked(&ranked);
    Ok(())
}

/// Rank nodes by synaptic flow centrality.
pub fn flow(path: &Path, config: &AnalysisConfig, top: Option<usize>) -> Result<()> {
    let parsed = load_skeleton(path)?;
    let synapses = &parsed.synapses;

    let scores = match parsed
        .arbor
        .flow_centrality(&synapses.outputs, &synapses.inputs)?
    {
        Some(scores) => scores,
        None => {
            println!(
                "{} Flow centrality needs both inputs and outputs ({} in, {} out)",
                "⚠".yellow(),
                synapses.n_inputs,
                synapses.n_outputs
            );
            return Ok(());
        }
    };

    println!(
        "{} Flow centrality from {} inputs to {} outputs",
        "✓".green(),
        synapses.n_inputs,
        synapses.n_outputs
    );
    print_ranked(&top_n(&scores, top.unwrap_or(config.top)));
    Ok(())
}

/// List the chains of the arbor, shortest first.
pub fn partition(path: &Path, json_output: bool) -> Result<()> {
    let parsed = load_skeleton(path)?;
    let chains = parsed.arbor.partition_sorted()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&chains)?);
        return Ok(());
    }

    println!("Found {} chains:\n", chains.len());
    for chain in &chains {
        let nodes: Vec<String> = chain.iter().map(|n| n.to_string()).collect();
        println!(
            "  {} {}",
            format!("[{}]", chain.len()).dimmed(),
            nodes.join(" → ")
        );
    }
    Ok(())
}

/// Export the topological copy of the arbor.
pub fn topology(path: &Path, output: Option<&Path>) -> Result<()> {
    let parsed = load_skeleton(path)?;
    let topo = parsed.arbor.topological_copy();
    debug!(
        "Topological copy keeps {} of {} nodes",
        topo.count_nodes(),
        parsed.arbor.count_nodes()
    );
    write_export(&topo.export(), output)
}

/// Export the arbor rerooted at `node`.
pub fn reroot(path: &Path, node: TreenodeId, output: Option<&Path>) -> Result<()> {
    let mut parsed = load_skeleton(path)?;
    parsed.arbor.reroot(&node)?;
    write_export(&parsed.arbor.export(), output)
}

/// Export the spanning tree of the given nodes.
pub fn spanning(path: &Path, nodes: &[TreenodeId], output: Option<&Path>) -> Result<()> {
    let parsed = load_skeleton(path)?;
    let spanning = parsed.arbor.spanning_tree(nodes)?;
    write_export(&spanning.export(), output)
}

fn write_export(export: &ArborExport<TreenodeId>, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(export)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!(
                "{} Exported {} edges to {}",
                "✓".green(),
                export.edges.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// The `n` highest scores, ties broken by node ID.
fn top_n(scores: &HashMap<TreenodeId, f64>, n: usize) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = scores
        .iter()
        .map(|(&node, &value)| Ranked { node, value })
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.node.cmp(&b.node)));
    ranked.truncate(n);
    ranked
}

fn print_ranked(ranked: &[Ranked]) {
    if ranked.is_empty() {
        println!("  {}", "No nodes".dimmed());
        return;
    }
    for (i, entry) in ranked.iter().enumerate() {
        println!(
            "  {:>3}. {} {}",
            i + 1,
            entry.node.to_string().cyan(),
            format!("{:.4}", entry.value).dimmed()
        );
    }
}
