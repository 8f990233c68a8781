// ABOUTME: Writes a store out in the flat export format
// ABOUTME: One header block and hex data section per non-deprecated table

use super::{DATABASE_FIELD, DATA_END, DATA_LINE_TAG, DUPLICATES_FIELD, HEADER_END};
use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::error::EngineResult;
use crate::store::{Record, Store};
use crate::transfer::{RecordSource, StoreSource, TableSink, TableSpec};
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub tables: u64,
    pub records: u64,
}

/// Table sink that serializes each section instead of storing it.
pub struct FlatFileWriter<W: Write> {
    out: W,
    cancel: CancelToken,
    summary: ExportSummary,
}

impl<W: Write> FlatFileWriter<W> {
    pub fn new(out: W, cancel: CancelToken) -> Self {
        Self {
            out,
            cancel,
            summary: ExportSummary::default(),
        }
    }

    pub fn summary(&self) -> ExportSummary {
        self.summary
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> EngineResult<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_header(&mut self, table: &TableSpec) -> EngineResult<()> {
        writeln!(self.out, "VERSION=3")?;
        writeln!(self.out, "format=bytevalue")?;
        writeln!(self.out, "{}={}", DATABASE_FIELD, table.name)?;
        writeln!(self.out, "type=btree")?;
        if table.kind.is_multi_value() {
            writeln!(self.out, "{}=1", DUPLICATES_FIELD)?;
        }
        self.out.write_all(HEADER_END)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn write_data_line(&mut self, bytes: &[u8]) -> EngineResult<()> {
        self.out.write_all(&[DATA_LINE_TAG])?;
        self.out.write_all(hex::encode(bytes).as_bytes())?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> TableSink for FlatFileWriter<W> {
    fn load_table(
        &mut self,
        table: &TableSpec,
        records: &mut dyn Iterator<Item = EngineResult<Record>>,
    ) -> EngineResult<()> {
        self.cancel.check()?;
        self.write_header(table)?;

        let mut written = 0u64;
        for record in records {
            let (key, value) = record?;
            self.write_data_line(&key)?;
            self.write_data_line(&value)?;
            written += 1;
            self.cancel.check()?;
        }

        self.out.write_all(DATA_END)?;
        self.out.write_all(b"\n")?;
        self.summary.tables += 1;
        self.summary.records += written;
        tracing::debug!("Exported table '{}': {} records", table.name, written);
        Ok(())
    }
}

/// Write every non-deprecated table of `source` to `out`, in table-name order.
pub fn export<W: Write>(
    source: &Store,
    catalog: &Catalog,
    out: W,
    cancel: &CancelToken,
) -> EngineResult<ExportSummary> {
    let mut tables = StoreSource::new(source, catalog)?;
    tracing::info!(
        "Exporting {} tables from {}",
        tables.tables().len(),
        source.path().display()
    );

    let mut writer = FlatFileWriter::new(out, cancel.clone());
    tables.drain_into(&mut writer)?;
    let summary = writer.summary();
    writer.into_inner()?;
    Ok(summary)
}
