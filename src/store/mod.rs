// ABOUTME: Thin store layer over redb used by every engine
// ABOUTME: Opens stores, begins read views and write transactions, enumerates tables

mod cursor;

pub use cursor::{AppendCursor, Record, Records, TableReader};

use crate::catalog::{Catalog, TableKind};
use crate::error::{EngineError, EngineResult};
use redb::{Database, MultimapTableHandle, ReadTransaction, TableHandle, WriteTransaction};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How a store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// The file must already exist; the engines only begin read views on it
    ReadOnly,
    /// Create the file when missing
    ReadWrite,
}

/// A table found in a store, with its catalog deprecation flag applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub kind: TableKind,
    pub deprecated: bool,
}

pub struct Store {
    db: Database,
    path: PathBuf,
}

impl Store {
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> EngineResult<Self> {
        let path = path.as_ref();
        let db = match mode {
            AccessMode::ReadOnly => {
                if !path.exists() {
                    return Err(EngineError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("store not found: {}", path.display()),
                    )));
                }
                Database::open(path)?
            }
            AccessMode::ReadWrite => Database::create(path)?,
        };
        tracing::debug!("Opened store {} ({:?})", path.display(), mode);
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot view; stays consistent for as long as it is held.
    pub fn begin_read(&self) -> EngineResult<ReadView> {
        ReadView::new(self.db.begin_read()?)
    }

    /// Exclusive write transaction. Dropping it without `commit` rolls it back.
    pub fn begin_write(&self) -> EngineResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Every table present in the store, sorted by name.
    pub fn tables(&self, catalog: &Catalog) -> EngineResult<Vec<TableInfo>> {
        Ok(self.begin_read()?.tables(catalog))
    }
}

/// Read-only transaction plus the table layout it observed.
pub struct ReadView {
    txn: ReadTransaction,
    layout: BTreeMap<String, TableKind>,
}

impl ReadView {
    fn new(txn: ReadTransaction) -> EngineResult<Self> {
        let mut layout = BTreeMap::new();
        for handle in txn.list_tables()? {
            layout.insert(handle.name().to_string(), TableKind::Plain);
        }
        for handle in txn.list_multimap_tables()? {
            layout.insert(handle.name().to_string(), TableKind::MultiValue);
        }
        Ok(Self { txn, layout })
    }

    /// Kind of `name` as stored, `None` when the table does not exist.
    pub fn kind_of(&self, name: &str) -> Option<TableKind> {
        self.layout.get(name).copied()
    }

    pub fn tables(&self, catalog: &Catalog) -> Vec<TableInfo> {
        self.layout
            .iter()
            .map(|(name, kind)| TableInfo {
                name: name.clone(),
                kind: *kind,
                deprecated: catalog.is_deprecated(name),
            })
            .collect()
    }

    /// Open `name` for iteration. A table that does not exist reads as empty.
    pub fn open(&self, name: &str) -> EngineResult<TableReader> {
        TableReader::open(&self.txn, name, self.kind_of(name))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for building small stores in tests.

    use super::*;
    use tempfile::TempDir;

    pub fn temp_store(dir: &TempDir, name: &str) -> Store {
        Store::open(dir.path().join(name), AccessMode::ReadWrite).unwrap()
    }

    pub fn fill<K: AsRef<[u8]>, V: AsRef<[u8]>>(
        store: &Store,
        table: &str,
        kind: TableKind,
        records: &[(K, V)],
    ) {
        let txn = store.begin_write().unwrap();
        {
            let mut cursor = AppendCursor::open(&txn, table, kind).unwrap();
            for (key, value) in records {
                cursor.append(key.as_ref(), value.as_ref()).unwrap();
            }
        }
        txn.commit().unwrap();
    }

    pub fn read_all(store: &Store, table: &str) -> Vec<Record> {
        let view = store.begin_read().unwrap();
        let reader = view.open(table).unwrap();
        let records = reader.records().unwrap();
        records.collect::<EngineResult<Vec<_>>>().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_read_only_requires_existing_file() {
        let dir = tempdir().unwrap();
        let result = Store::open(dir.path().join("missing.redb"), AccessMode::ReadOnly);
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[test]
    fn test_tables_reports_kind_and_deprecation() {
        let dir = tempdir().unwrap();
        let store = temp_store(&dir, "db.redb");
        fill(&store, "Code", TableKind::Plain, &[(b"\x01", b"\xaa")]);
        fill(&store, "PlainState", TableKind::MultiValue, &[(b"\x01", b"\xaa")]);
        fill(&store, "CST2", TableKind::Plain, &[(b"\x01", b"\xaa")]);

        let tables = store.tables(&Catalog::default()).unwrap();
        let summary: Vec<_> = tables
            .iter()
            .map(|t| (t.name.as_str(), t.kind, t.deprecated))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("CST2", TableKind::Plain, true),
                ("Code", TableKind::Plain, false),
                ("PlainState", TableKind::MultiValue, false),
            ]
        );
    }

    #[test]
    fn test_missing_table_reads_empty() {
        let dir = tempdir().unwrap();
        let store = temp_store(&dir, "db.redb");
        assert!(read_all(&store, "Nope").is_empty());
    }

    #[test]
    fn test_reopen_read_only_sees_committed_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.redb");
        {
            let store = Store::open(&path, AccessMode::ReadWrite).unwrap();
            fill(&store, "T", TableKind::Plain, &[(b"\x01", b"\xaa")]);
        }
        let store = Store::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(read_all(&store, "T"), vec![(vec![1], vec![0xaa])]);
    }
}
