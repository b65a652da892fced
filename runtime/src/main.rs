// Copyright 2026 OMMS Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use omms_harvest::cli;
use omms_harvest::config::{HarvestConfig, NavigationFailurePolicy};
use omms_harvest::extraction::ExtractorKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "omms-harvest",
    about = "Concurrent harvester for the OMMS road-wise progress report",
    version,
    after_help = "Run 'omms-harvest <command> --help' for details on each command."
)]
struct Cli {
    /// JSON configuration file (defaults to $OMMS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output the run summary as JSON and log in JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Run the browser with a visible window
    #[arg(long, global = true)]
    headful: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one record per work item of the input list
    Harvest {
        /// Work list CSV (State,District,Block)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output CSV
        #[arg(long)]
        output: Option<PathBuf>,
        /// Number of concurrent browser sessions
        #[arg(long, short)]
        workers: Option<usize>,
        /// How table rows map to output fields
        #[arg(long, value_enum, default_value_t = ExtractorKind::Positional)]
        extractor: ExtractorKind,
        /// What to emit for partitions that never reach the report page
        #[arg(long, value_enum)]
        on_navigation_failure: Option<NavigationFailurePolicy>,
        /// Show a progress bar instead of per-item log lines
        #[arg(long)]
        progress: bool,
    },
    /// Enumerate districts and blocks into a work list
    Taxonomy {
        /// States to walk (defaults to the configured list)
        #[arg(long, num_args = 1..)]
        states: Vec<String>,
        /// Taxonomy cache CSV
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check environment and configuration
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, quiet: bool, json: bool) {
    let level = if verbose {
        "omms_harvest=debug"
    } else if quiet {
        "omms_harvest=warn"
    } else {
        "omms_harvest=info"
    };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = level.parse() {
        filter = filter.add_directive(directive);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let quiet = matches!(cli.command, Commands::Harvest { progress: true, .. });
    init_tracing(cli.verbose, quiet, cli.json);

    let mut config = match HarvestConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("  Error: {e:#}");
            std::process::exit(1);
        }
    };
    if cli.headful {
        config.headless = false;
    }

    let result = match cli.command {
        Commands::Harvest {
            input,
            output,
            workers,
            extractor,
            on_navigation_failure,
            progress,
        } => {
            if let Some(input) = input {
                config.input_path = input;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if let Some(workers) = workers {
                config.worker_count = workers;
            }
            if let Some(policy) = on_navigation_failure {
                config.navigation_failure = policy;
            }
            cli::harvest_cmd::run(config, extractor, progress, cli.json).await
        }
        Commands::Taxonomy { states, output } => {
            if !states.is_empty() {
                config.states = states;
            }
            if let Some(output) = output {
                config.taxonomy_path = output;
            }
            cli::taxonomy_cmd::run(config).await
        }
        Commands::Doctor => cli::doctor::run(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "omms-harvest", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "error": true, "message": format!("{e:#}") })
            );
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
