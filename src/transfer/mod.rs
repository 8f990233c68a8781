// ABOUTME: Store-to-store transfer built on the shared bulk loader
// ABOUTME: Defines the record-source and table-sink seams used by every bulk copy

mod loader;

pub use loader::{BulkLoader, LoadOptions, TransferSummary, TxnPolicy};

use crate::catalog::{Catalog, TableKind};
use crate::error::EngineResult;
use crate::store::{ReadView, Record, Store, TableInfo};

/// Destination table of one section of a bulk copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub kind: TableKind,
}

/// Consumer of ordered table sections.
pub trait TableSink {
    fn load_table(
        &mut self,
        table: &TableSpec,
        records: &mut dyn Iterator<Item = EngineResult<Record>>,
    ) -> EngineResult<()>;
}

/// Producer of table sections, each a lazy stream of ascending records.
pub trait RecordSource {
    /// Feed every section, in order, into `sink`.
    fn drain_into(&mut self, sink: &mut dyn TableSink) -> EngineResult<()>;
}

/// Streams every non-deprecated table of a store from one read snapshot.
pub struct StoreSource {
    view: ReadView,
    tables: Vec<TableInfo>,
}

impl StoreSource {
    pub fn new(store: &Store, catalog: &Catalog) -> EngineResult<Self> {
        let view = store.begin_read()?;
        let tables = view
            .tables(catalog)
            .into_iter()
            .filter(|table| {
                if table.deprecated {
                    tracing::debug!("Skipping deprecated table '{}'", table.name);
                }
                !table.deprecated
            })
            .collect();
        Ok(Self { view, tables })
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }
}

impl RecordSource for StoreSource {
    fn drain_into(&mut self, sink: &mut dyn TableSink) -> EngineResult<()> {
        for table in &self.tables {
            let reader = self.view.open(&table.name)?;
            let mut records = reader.records()?;
            let spec = TableSpec {
                name: table.name.clone(),
                kind: table.kind,
            };
            sink.load_table(&spec, &mut records)?;
        }
        Ok(())
    }
}

/// Drive `source` into `dest` through a [`BulkLoader`] and commit.
pub fn run_load(
    source: &mut dyn RecordSource,
    dest: &Store,
    options: LoadOptions,
) -> EngineResult<TransferSummary> {
    let mut loader = BulkLoader::new(dest, options)?;
    source.drain_into(&mut loader)?;
    loader.finish()
}

/// Copy every non-deprecated table of `source` into `dest`.
///
/// `dest` is expected to be empty: records are appended, so anything sorting
/// at or below existing destination entries fails with `AppendOutOfOrder`.
/// Per-table sequence counters are not carried over.
pub fn transfer(
    source: &Store,
    dest: &Store,
    catalog: &Catalog,
    options: LoadOptions,
) -> EngineResult<TransferSummary> {
    tracing::info!(
        "Copying {} into {}",
        source.path().display(),
        dest.path().display()
    );
    let mut records = StoreSource::new(source, catalog)?;
    tracing::info!("Found {} tables to copy", records.tables().len());
    run_load(&mut records, dest, options)
}
