// ABOUTME: CLI entry point for bucket-reconciler
// ABOUTME: Parses commands and routes to appropriate handlers

use bucket_reconciler::{commands, config, utils};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bucket-reconciler")]
#[command(about = "Compare, copy, export and restore bucketed redb stores", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML file with engine intervals and extra table declarations
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare one table of a store against a reference store
    CompareBucket {
        #[arg(long)]
        chaindata: PathBuf,
        /// Reference store (defaults to <chaindata>-copy)
        #[arg(long = "chaindata.reference")]
        reference: Option<PathBuf>,
        /// Table to compare
        #[arg(long)]
        bucket: String,
    },
    /// Compare every state table of a store against a reference store
    CompareStates {
        #[arg(long)]
        chaindata: PathBuf,
        /// Reference store (defaults to <chaindata>-copy)
        #[arg(long = "chaindata.reference")]
        reference: Option<PathBuf>,
    },
    /// Copy every table into a freshly created store
    Copy {
        #[arg(long)]
        chaindata: PathBuf,
        /// Destination store; an existing file is removed first
        #[arg(long = "chaindata.to")]
        to: PathBuf,
    },
    /// Restore a flat export file into a store
    Load {
        /// Destination store
        #[arg(long = "chaindata.to")]
        to: PathBuf,
        /// Flat export file to read
        #[arg(long)]
        file: PathBuf,
    },
    /// Write every table of a store to a flat export file
    Export {
        #[arg(long)]
        chaindata: PathBuf,
        /// Flat export file to write
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::CompareBucket {
            chaindata,
            reference,
            bucket,
        } => {
            let reference = reference.unwrap_or_else(|| utils::default_reference_path(&chaindata));
            commands::compare_bucket(&chaindata, &reference, &bucket, &config).await?;
        }
        Commands::CompareStates {
            chaindata,
            reference,
        } => {
            let reference = reference.unwrap_or_else(|| utils::default_reference_path(&chaindata));
            commands::compare_states(&chaindata, &reference, &config).await?;
        }
        Commands::Copy { chaindata, to } => {
            commands::copy(&chaindata, &to, &config).await?;
        }
        Commands::Load { to, file } => {
            commands::load(&to, &file, &config).await?;
        }
        Commands::Export { chaindata, file } => {
            commands::export(&chaindata, &file, &config).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dotted_flags_parse() {
        let cli = Cli::try_parse_from([
            "bucket-reconciler",
            "compare-bucket",
            "--chaindata",
            "db",
            "--chaindata.reference",
            "ref",
            "--bucket",
            "PlainState",
        ])
        .unwrap();
        match cli.command {
            Commands::CompareBucket {
                chaindata,
                reference,
                bucket,
            } => {
                assert_eq!(chaindata, PathBuf::from("db"));
                assert_eq!(reference, Some(PathBuf::from("ref")));
                assert_eq!(bucket, "PlainState");
            }
            _ => panic!("expected compare-bucket"),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bucket-reconciler",
            "load",
            "--chaindata.to",
            "dst",
            "--file",
            "dump.txt",
            "--config",
            "engine.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("engine.toml")));
        assert!(matches!(cli.command, Commands::Load { .. }));
    }
}
