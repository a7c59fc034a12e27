mod config;
mod doctor_cmd;
mod run_cmd;
mod sessions_cmd;
mod terminal_output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::RunOverrides;
use terminal_output::note_error;

#[derive(Parser)]
#[command(name = "clawpilot")]
#[command(about = "ClawPilot: drive a browser or desktop from a plain-language instruction")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.clawpilot/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an instruction to completion
    Run {
        /// What to do, e.g. "go to https://example.com and open the docs"
        instruction: String,

        /// Override settings.maxIterations
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override settings.iterationDelay (milliseconds)
        #[arg(long)]
        delay: Option<u64>,

        /// Override operator.type (desktop, browser, hybrid)
        #[arg(long)]
        operator: Option<String>,

        /// Use the in-memory simulated surfaces
        #[arg(long)]
        simulated: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recorded sessions, newest first
    Sessions {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Check the configuration and available backends
    Doctor,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective config with secrets masked
    Show,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            note_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let path = config::resolve_path(cli.config.as_deref());

    match cli.command {
        Commands::Run {
            instruction,
            max_iterations,
            delay,
            operator,
            simulated,
            json,
        } => {
            let overrides = RunOverrides {
                max_iterations,
                delay_ms: delay,
                operator,
                simulated,
            };
            let config = config::load(&path, &overrides).await?;
            run_cmd::run(config, &instruction, json).await
        }
        Commands::Sessions { limit } => {
            let config = config::load(&path, &RunOverrides::default()).await?;
            sessions_cmd::list(&config, limit)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { command } => {
            match command {
                ConfigCommands::Show => {
                    let config = config::load(&path, &RunOverrides::default()).await?;
                    println!("{}", serde_json::to_string_pretty(&clawpilot_config::redacted(&config)?)?);
                }
                ConfigCommands::Path => println!("{}", path.display()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Doctor => doctor_cmd::run(&path).await,
    }
}
