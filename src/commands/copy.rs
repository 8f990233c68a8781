// ABOUTME: copy command implementation
// ABOUTME: Recreates the destination store and streams every live table into it

use super::{open_destination, open_source, run_blocking};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::transfer::{transfer, LoadOptions, TransferSummary};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Instant;

/// Copy every non-deprecated table of `chaindata` into a fresh store at `dest`.
///
/// An existing file at `dest` is removed first. The copy commits every
/// `commit_every_secs`, so an interrupted run leaves the rotations it already
/// committed in place.
///
/// # Errors
///
/// Fails when the stores cannot be opened, a write fails, or on Ctrl-C.
pub async fn copy(chaindata: &Path, dest: &Path, config: &EngineConfig) -> Result<TransferSummary> {
    if chaindata == dest {
        bail!(
            "Source and destination are the same file: {}",
            chaindata.display()
        );
    }
    let removed = crate::utils::remove_existing_store(dest)?;
    if removed {
        tracing::info!("Removed existing destination {}", dest.display());
    }

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();
    let options = LoadOptions::rotating(config, cancel);
    let catalog = config.catalog();
    let (chaindata, dest) = (chaindata.to_path_buf(), dest.to_path_buf());

    let started = Instant::now();
    let summary = run_blocking("Copy", move || {
        let source = open_source(&chaindata, "source")?;
        let target = open_destination(&dest)?;
        transfer(&source, &target, &catalog, options).context("Copy failed")
    })
    .await?;

    tracing::info!(
        "✓ Copied {} records across {} tables in {}",
        summary.records,
        summary.tables,
        crate::utils::format_duration(started.elapsed())
    );
    Ok(summary)
}
