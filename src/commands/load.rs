// ABOUTME: load command implementation
// ABOUTME: Restores a flat export file into a store in one write transaction

use super::{open_destination, run_blocking};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::flatfile;
use crate::transfer::{LoadOptions, TransferSummary};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Restore the flat export at `file` into the store at `dest`.
///
/// The whole file is loaded in a single transaction: malformed input leaves
/// the destination untouched.
pub async fn load(dest: &Path, file: &Path, config: &EngineConfig) -> Result<TransferSummary> {
    tracing::info!("Loading {} into {}", file.display(), dest.display());

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();
    let options = LoadOptions::single(config, cancel);
    let catalog = config.catalog();
    let (dest, file) = (dest.to_path_buf(), file.to_path_buf());

    let summary = run_blocking("Load", move || {
        let input = File::open(&file)
            .with_context(|| format!("Failed to open export file {}", file.display()))?;
        let target = open_destination(&dest)?;
        flatfile::load(BufReader::new(input), &target, &catalog, options)
            .with_context(|| format!("Failed to load {}", file.display()))
    })
    .await?;

    tracing::info!(
        "✓ Loaded {} records across {} tables",
        summary.records,
        summary.tables
    );
    Ok(summary)
}
