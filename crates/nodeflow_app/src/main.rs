// SPDX-License-Identifier: MIT OR Apache-2.0
//! nodeflow - build, inspect and evaluate dataflow graph documents.

mod commands;

use clap::{Parser, Subcommand};
use nodeflow_graph::GraphSettings;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "nodeflow")]
#[command(author, version, about = "Dataflow node graph tool", long_about = None)]
struct Cli {
    /// RON settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a sample arithmetic graph and save it
    Demo(commands::DemoArgs),

    /// List nodes in dependency order, connections, groups and anchors
    Inspect(commands::FileArgs),

    /// Print every node's outputs in dependency order
    Eval(commands::FileArgs),

    /// Change a number source and save the result
    Set(commands::SetArgs),

    /// Remove a node together with its connections
    Remove(commands::RemoveArgs),
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("nodeflow_app={level}").parse()?)
        .add_directive(format!("nodeflow_graph={level}").parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let settings = match &cli.settings {
        Some(path) => {
            tracing::debug!("Reading settings from {}", path.display());
            GraphSettings::load(path)?
        }
        None => GraphSettings::default(),
    };

    match cli.command {
        Commands::Demo(args) => commands::demo(args, settings),
        Commands::Inspect(args) => commands::inspect(args, settings),
        Commands::Eval(args) => commands::eval(args, settings),
        Commands::Set(args) => commands::set(args, settings),
        Commands::Remove(args) => commands::remove(args, settings),
    }
}
