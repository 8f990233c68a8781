// ABOUTME: export command implementation
// ABOUTME: Writes every live table of a store to a flat export file

use super::{open_source, run_blocking};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::flatfile::{self, ExportSummary};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Export `chaindata` to `file`, overwriting it.
pub async fn export(chaindata: &Path, file: &Path, config: &EngineConfig) -> Result<ExportSummary> {
    tracing::info!("Exporting {} to {}", chaindata.display(), file.display());

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();
    let catalog = config.catalog();
    let (chaindata, file) = (chaindata.to_path_buf(), file.to_path_buf());

    let summary = run_blocking("Export", move || {
        let source = open_source(&chaindata, "source")?;
        let output = File::create(&file)
            .with_context(|| format!("Failed to create export file {}", file.display()))?;
        flatfile::export(&source, &catalog, BufWriter::new(output), &cancel)
            .with_context(|| format!("Failed to export to {}", file.display()))
    })
    .await?;

    tracing::info!(
        "✓ Exported {} records across {} tables",
        summary.records,
        summary.tables
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableKind;
    use crate::store::testing::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_export_writes_file() {
        let dir = tempdir().unwrap();
        let source = temp_store(&dir, "src.redb");
        fill(&source, "Code", TableKind::Plain, &[([0x01u8], [0xaau8])]);
        let source_path = source.path().to_path_buf();
        drop(source);
        let out = dir.path().join("dump.txt");

        let summary = export(&source_path, &out, &EngineConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.records, 1);
        let contents = std::fs::read_to_string(&out).unwrap();
        assert!(contents.contains("database=Code\n"));
        assert!(contents.ends_with(" 01\n aa\nDATA=END\n"));
    }
}
