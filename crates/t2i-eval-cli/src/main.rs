//! t2i-eval CLI - text-to-image evaluation tool

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Text-to-image model evaluation tool.
#[derive(Parser)]
#[command(name = "t2i-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an image file as a base64 data URI
    Encode {
        /// Image file (.jpg, .png, .svg)
        path: PathBuf,

        /// Mimetype to use instead of the one inferred from the extension
        #[arg(long)]
        mimetype: Option<String>,
    },

    /// Load a dataset, prepare its columns and publish it to a store
    Publish {
        /// Dataset directory or file
        dataset: String,

        /// Dataset store directory
        #[arg(long)]
        store: PathBuf,

        /// Published dataset name (defaults to the dataset file stem)
        #[arg(long)]
        name: Option<String>,

        /// Split to load
        #[arg(long, default_value = "train")]
        split: String,

        /// Keep only the first N rows
        #[arg(long)]
        limit: Option<usize>,

        /// Column to rename to "prompt"
        #[arg(long)]
        prompt_column: Option<String>,

        /// Column to rename to "ground_truth_image"
        #[arg(long)]
        ground_truth_column: Option<String>,

        /// Do not print the published reference
        #[arg(long)]
        no_reference: bool,
    },

    /// List tracked evaluation runs
    Runs {
        /// Tracker root directory
        root: PathBuf,

        /// Project name
        #[arg(long, default_value = t2i_eval::tracking::DEFAULT_PROJECT)]
        project: String,
    },

    /// Show statistics for a logged results table
    Stats {
        /// Results table JSON file
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("T2I_EVAL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("t2i_eval={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Encode { path, mimetype } => commands::encode::run(&path, mimetype.as_deref()),
        Commands::Publish {
            dataset,
            store,
            name,
            split,
            limit,
            prompt_column,
            ground_truth_column,
            no_reference,
        } => commands::publish::run(commands::publish::PublishArgs {
            dataset,
            store,
            name,
            split,
            limit,
            prompt_column,
            ground_truth_column,
            return_reference: !no_reference,
        }),
        Commands::Runs { root, project } => commands::runs::run(&root, &project, cli.verbose),
        Commands::Stats { input } => commands::stats::run(&input),
    }
}
