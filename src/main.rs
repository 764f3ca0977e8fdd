use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

mod billing;
mod cli;
mod core;
mod daemon;
mod sink;
#[cfg(test)]
mod test_support;

use crate::core::settings::Settings;

#[derive(Parser)]
#[command(name = "ess-billing-ingest")]
#[command(author, version, about = "Index Elastic Cloud billing costs into Elasticsearch")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the billing API and index documents until stopped
    Run,

    /// Run a single ingestion tick
    Tick {
        /// Print documents as JSON lines instead of indexing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn load_settings(path: Option<&std::path::Path>) -> Result<Settings> {
    let loaded = Settings::source_path(path).and_then(|source| {
        let settings = Settings::read(source.as_deref())?;
        settings.validate()?;
        Ok((settings, source))
    });

    let (settings, source) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            crate::core::logging::init_default();
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e);
        }
    };

    crate::core::logging::init(&settings)?;
    match source {
        Some(path) => tracing::info!(?path, "Loaded config"),
        None => tracing::info!("Config file not found, using defaults"),
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let settings = load_settings(cli.config.as_deref())?;
            daemon::run(settings).await
        }
        Commands::Tick { dry_run } => {
            let settings = load_settings(cli.config.as_deref())?;
            cli::tick::run(settings, dry_run).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
