// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Repograph CLI - configuration graph for your repository fleet

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use repograph::commands::{self, config::ConfigOutput, export::ExportFormat, repos::RepoFilter, Invocation};
use repograph::config::{resolve_config_path, Settings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "repograph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Root configuration file
    #[arg(short, long, env = "REPOGRAPH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the configuration graph overview
    Graph,

    /// List repository groups with their resolved members
    Groups,

    /// List repositories, optionally filtered
    Repos {
        /// Only repositories in scope of this path (e.g. root/backend)
        #[arg(long)]
        scope: Option<String>,

        /// Only repositories tagged name=value
        #[arg(long)]
        tag: Option<String>,

        /// Only repositories carrying this label
        #[arg(long)]
        label: Option<String>,
    },

    /// Validate the configuration hierarchy
    Validate,

    /// Print the merged configuration
    Config {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ConfigOutput::Yaml)]
        format: ConfigOutput,
    },

    /// Export graph to various formats
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Dot)]
        format: ExportFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: clap_complete::Shell,
    },
}

fn init_logging(cli: &Cli, settings: &Settings) {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        let level = match cli.verbose {
            0 if cli.quiet => "error",
            0 => settings.log_level.as_str(),
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    init_logging(&cli, &settings);

    if let Commands::Completions { shell } = cli.command {
        return commands::completions::run(shell, &mut Cli::command());
    }

    let inv = Invocation {
        config_path: resolve_config_path(cli.config.clone(), &settings)?,
        hierarchy_anchor: settings.hierarchy_anchor.clone(),
        stem_names: settings.stem_names,
        json: cli.json,
        color: settings.color && !cli.no_color,
    };

    // Execute command
    match cli.command {
        Commands::Graph => commands::graph::run(&inv),
        Commands::Groups => commands::groups::run(&inv),
        Commands::Repos { scope, tag, label } => {
            commands::repos::run(&inv, &RepoFilter { scope, tag, label })
        }
        Commands::Validate => commands::validate::run(&inv),
        Commands::Config { format } => commands::config::run(&inv, format),
        Commands::Export { format, output } => commands::export::run(&inv, format, output),
        Commands::Completions { .. } => Ok(()),
    }
}
