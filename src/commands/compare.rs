// ABOUTME: compare-bucket and compare-states command implementations
// ABOUTME: Diffs tables of a store against a reference store and prints every divergence

use super::{open_source, run_blocking};
use crate::cancel::CancelToken;
use crate::catalog::STATE_TABLES;
use crate::config::EngineConfig;
use crate::diff::{compare_table, DiffObserver, DiffOptions, DiffSummary, ReportWriter};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Compare one table of `chaindata` with the same table of `reference`.
///
/// Divergences are printed to stdout as they are found; finding some is not
/// an error.
///
/// # Errors
///
/// Fails when either store cannot be opened or read, or on Ctrl-C.
pub async fn compare_bucket(
    chaindata: &Path,
    reference: &Path,
    bucket: &str,
    config: &EngineConfig,
) -> Result<DiffSummary> {
    let bucket = crate::utils::sanitize_identifier(bucket);
    tracing::info!(
        "Comparing table '{}' of {} against {}",
        bucket,
        chaindata.display(),
        reference.display()
    );

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();
    let options = DiffOptions::new(config, cancel);
    let (chaindata, reference) = (chaindata.to_path_buf(), reference.to_path_buf());

    let summary = run_blocking("Comparison", move || {
        let left_store = open_source(&chaindata, "source")?;
        let right_store = open_source(&reference, "reference")?;
        let (left, right) = (left_store.begin_read()?, right_store.begin_read()?);
        let mut report = ReportWriter::new(std::io::stdout().lock());
        compare_table(&left, &bucket, &right, &bucket, &options, &mut report)
            .with_context(|| format!("Failed to compare table '{}'", bucket))
    })
    .await?;

    log_summary(&summary);
    Ok(summary)
}

/// Compare every state table of `chaindata` with `reference`.
///
/// Each table is preceded by a `Bucket: <name>` line on stdout. Both sides are
/// read from a single snapshot for the whole pass.
pub async fn compare_states(
    chaindata: &Path,
    reference: &Path,
    config: &EngineConfig,
) -> Result<DiffSummary> {
    tracing::info!(
        "Comparing {} state tables of {} against {}",
        STATE_TABLES.len(),
        chaindata.display(),
        reference.display()
    );

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();
    let options = DiffOptions::new(config, cancel);
    let (chaindata, reference) = (chaindata.to_path_buf(), reference.to_path_buf());

    let progress = ProgressBar::new(STATE_TABLES.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    let bar = progress.clone();

    let summary = run_blocking("Comparison", move || {
        let left_store = open_source(&chaindata, "source")?;
        let right_store = open_source(&reference, "reference")?;
        let (left, right) = (left_store.begin_read()?, right_store.begin_read()?);
        let mut report = ReportWriter::new(std::io::stdout().lock());

        let mut total = DiffSummary::default();
        for table in STATE_TABLES {
            options.cancel.check()?;
            bar.set_message(format!("Comparing {}", table));
            report.table_started(table)?;
            total += compare_table(&left, table, &right, table, &options, &mut report)
                .with_context(|| format!("Failed to compare table '{}'", table))?;
            bar.inc(1);
        }
        Ok(total)
    })
    .await;

    match &summary {
        Ok(_) => progress.finish_with_message("Comparison complete"),
        Err(_) => progress.abandon(),
    }
    let summary = summary?;
    log_summary(&summary);
    Ok(summary)
}

fn log_summary(summary: &DiffSummary) {
    tracing::info!("");
    tracing::info!("========================================");
    tracing::info!("Comparison Summary");
    tracing::info!("========================================");
    tracing::info!("Records compared: {}", summary.compared);
    tracing::info!("Missing in reference: {}", summary.left_only);
    tracing::info!("Missing in source: {}", summary.right_only);
    tracing::info!("Different values: {}", summary.unequal);
    tracing::info!("========================================");

    if summary.is_identical() {
        tracing::info!("✓ Stores are identical");
    } else {
        tracing::warn!("⚠ {} divergent records found", summary.divergences());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableKind;
    use crate::store::testing::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_compare_bucket_counts_divergences() {
        let dir = tempdir().unwrap();
        let left = temp_store(&dir, "db.redb");
        let right = temp_store(&dir, "ref.redb");
        fill(&left, "T", TableKind::Plain, &[([0x01u8], [0xaau8]), ([0x02], [0xbb])]);
        fill(&right, "T", TableKind::Plain, &[([0x02u8], [0xbbu8]), ([0x03], [0xcc])]);
        let (left_path, right_path) = (left.path().to_path_buf(), right.path().to_path_buf());
        drop((left, right));

        let summary = compare_bucket(&left_path, &right_path, "T", &EngineConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.compared, 3);
        assert_eq!(summary.left_only, 1);
        assert_eq!(summary.right_only, 1);
        assert_eq!(summary.unequal, 0);
    }

    #[tokio::test]
    async fn test_compare_states_over_identical_stores() {
        let dir = tempdir().unwrap();
        let left = temp_store(&dir, "db.redb");
        let right = temp_store(&dir, "ref.redb");
        for store in [&left, &right] {
            fill(store, "Code", TableKind::Plain, &[([0x01u8], [0x60u8])]);
            fill(store, "PlainState", TableKind::MultiValue, &[([0x01u8], [0x02u8])]);
        }
        let (left_path, right_path) = (left.path().to_path_buf(), right.path().to_path_buf());
        drop((left, right));

        let summary = compare_states(&left_path, &right_path, &EngineConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.compared, 2);
        assert!(summary.is_identical());
    }

    #[tokio::test]
    async fn test_missing_reference_fails() {
        let dir = tempdir().unwrap();
        let left = temp_store(&dir, "db.redb");
        let left_path = left.path().to_path_buf();
        drop(left);

        let result = compare_states(
            &left_path,
            &dir.path().join("absent.redb"),
            &EngineConfig::default(),
        )
        .await;
        assert!(result.is_err());
    }
}
