mod demo;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use conduit_core::kernel::constants::{APP_NAME, APP_VERSION};
use conduit_core::{EngineConfig, Filter};

/// Conduit: lifecycle and dependency engine for hosted components
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Engine settings file (.json, .toml, .yaml or .yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Clock/TimeService scenario on a local registry
    Demo {
        /// Keep the time service bound by switching to a second clock
        #[arg(long)]
        replace: bool,
    },
    /// Parse a filter expression and print its normalized form
    Filter {
        /// The expression, e.g. "(&(zone=utc)(service.ranking>=1))"
        expression: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = logging::init("info") {
        eprintln!("{}", e);
    }
    info!("{} v{}", APP_NAME, APP_VERSION);

    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    match args.command {
        Commands::Demo { replace } => match demo::run(config, replace).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Demo failed: {}", e);
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Filter { expression } => match Filter::parse(&expression) {
            Ok(filter) => {
                println!("{}", filter);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: invalid filter: {}", e);
                ExitCode::from(2)
            }
        },
    }
}
