mod commands;

use anyhow::Result;
use aura_common::config::DEFAULT_LANGUAGES_PATH;
use aura_common::types::DEFAULT_TIME_LIMIT_MS;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aura-cli")]
#[command(about = "Aura CLI - Run submissions locally and manage sandbox languages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file against a JSON list of test cases
    Run {
        /// Language tag (python, javascript, typescript)
        #[arg(short, long)]
        language: String,

        /// Path to the source file
        #[arg(short, long)]
        code: PathBuf,

        /// Path to a JSON array of {input, expected_output} test cases
        #[arg(short, long)]
        tests: PathBuf,

        /// Per-test wall-clock limit
        #[arg(long, default_value_t = DEFAULT_TIME_LIMIT_MS)]
        time_limit_ms: u64,

        /// Language configuration file
        #[arg(long, default_value = DEFAULT_LANGUAGES_PATH)]
        languages: PathBuf,
    },

    /// List the languages the sandbox can run
    Languages {
        /// Language configuration file
        #[arg(long, default_value = DEFAULT_LANGUAGES_PATH)]
        languages: PathBuf,
    },

    /// Write a default config/languages.json
    Init {
        /// Project path
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `run` output stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            language,
            code,
            tests,
            time_limit_ms,
            languages,
        } => {
            let success = commands::run_submission(&language, &code, &tests, time_limit_ms, &languages).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::Languages { languages } => {
            commands::list_languages(&languages)?;
        }
        Commands::Init { path } => {
            commands::init_project(&path)?;
        }
    }

    Ok(())
}
