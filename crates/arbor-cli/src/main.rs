//! Arbor CLI - Command-line interface for Arbor
//!
//! This is the main entry point for analysing traced neuron skeletons.
//! Every command reads a compact-skeleton JSON file, builds its arbor and
//! prints or exports the result.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::AnalysisConfig;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(author = "Arbor Contributors")]
#[command(version)]
#[command(about = "Rooted-tree analysis for neuron skeletons", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the usual lookup
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Arbor in the current directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show node counts, cable length and shape measures
    Stats {
        /// Compact-skeleton JSON file
        skeleton: PathBuf,
    },

    /// Rank nodes by betweenness centrality
    Centrality {
        /// Compact-skeleton JSON file
        skeleton: PathBuf,

        /// Scale values to [0, 1]
        #[arg(long)]
        normalized: bool,

        /// Number of nodes to list (defaults to the config value)
        #[arg(short, long)]
        top: Option<usize>,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Rank nodes by synaptic flow centrality
    Flow {
        /// Compact-skeleton JSON file
        skeleton: PathBuf,

        /// Number of nodes to list (defaults to the config value)
        #[arg(short, long)]
        top: Option<usize>,
    },

    /// List the chains of the arbor, shortest first
    Partition {
        /// Compact-skeleton JSON file
        skeleton: PathBuf,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Export the arbor reduced to root, branch and end nodes
    Topology {
        /// Compact-skeleton JSON file
        skeleton: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the arbor rerooted at a node
    Reroot {
        /// Compact-skeleton JSON file
        skeleton: PathBuf,

        /// The new root
        node: i64,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the smallest subtree connecting the given nodes
    Spanning {
        /// Compact-skeleton JSON file
        skeleton: PathBuf,

        /// Nodes to keep
        #[arg(required = true)]
        nodes: Vec<i64>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Init { path } = &cli.command {
        return commands::init(path);
    }

    let config = AnalysisConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Stats { skeleton } => commands::stats(&skeleton),
        Commands::Centrality {
            skeleton,
            normalized,
            top,
            json,
        } => commands::centrality(&skeleton, &config, normalized, top, json),
        Commands::Flow { skeleton, top } => commands::flow(&skeleton, &config, top),
        Commands::Partition { skeleton, json } => commands::partition(&skeleton, json),
        Commands::Topology { skeleton, output } => {
            commands::topology(&skeleton, output.as_deref())
        }
        Commands::Reroot {
            skeleton,
            node,
            output,
        } => commands::reroot(&skeleton, node, output.as_deref()),
        Commands::Spanning {
            skeleton,
            nodes,
            output,
        } => commands::spanning(&skeleton, &nodes, output.as_deref()),
    }
}
