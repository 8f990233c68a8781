// ABOUTME: Ordered read cursors and append-only write cursors over redb tables
// ABOUTME: The append variant (plain or multi-value) is chosen once per table

use crate::catalog::TableKind;
use crate::error::{EngineError, EngineResult};
use redb::{
    MultimapTable, MultimapTableDefinition, ReadOnlyMultimapTable, ReadOnlyTable,
    ReadTransaction, ReadableMultimapTable, ReadableTable, Table, TableDefinition,
    WriteTransaction,
};

/// A raw `(key, value)` pair.
pub type Record = (Vec<u8>, Vec<u8>);

/// Lazy stream of records in ascending `(key, value)` order.
pub type Records<'a> = Box<dyn Iterator<Item = EngineResult<Record>> + 'a>;

type RawTable<'txn> = Table<'txn, &'static [u8], &'static [u8]>;
type RawMultimapTable<'txn> = MultimapTable<'txn, &'static [u8], &'static [u8]>;

fn plain_definition(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

fn multimap_definition(name: &str) -> MultimapTableDefinition<'_, &'static [u8], &'static [u8]> {
    MultimapTableDefinition::new(name)
}

/// One table opened inside a [`super::ReadView`].
pub enum TableReader {
    Plain(ReadOnlyTable<&'static [u8], &'static [u8]>),
    MultiValue(ReadOnlyMultimapTable<&'static [u8], &'static [u8]>),
    /// The table does not exist in this store
    Missing,
}

impl TableReader {
    pub(super) fn open(
        txn: &ReadTransaction,
        name: &str,
        kind: Option<TableKind>,
    ) -> EngineResult<Self> {
        match kind {
            Some(TableKind::Plain) => {
                Ok(TableReader::Plain(txn.open_table(plain_definition(name))?))
            }
            Some(TableKind::MultiValue) => Ok(TableReader::MultiValue(
                txn.open_multimap_table(multimap_definition(name))?,
            )),
            None => {
                tracing::debug!("Table '{}' does not exist, reading it as empty", name);
                Ok(TableReader::Missing)
            }
        }
    }

    /// Position at the first record and stream every record after it.
    ///
    /// Multi-value tables yield one record per `(key, value)` pair. The values
    /// of a single key are buffered together; keys are streamed.
    pub fn records(&self) -> EngineResult<Records<'_>> {
        match self {
            TableReader::Plain(table) => {
                let iter = table.iter()?.map(|entry| -> EngineResult<Record> {
                    let (key, value) = entry?;
                    Ok((key.value().to_vec(), value.value().to_vec()))
                });
                Ok(Box::new(iter))
            }
            TableReader::MultiValue(table) => {
                let iter = table.iter()?.flat_map(|entry| {
                    let records: Vec<EngineResult<Record>> = match entry {
                        Ok((key, values)) => {
                            let key = key.value().to_vec();
                            values
                                .map(|value| -> EngineResult<Record> {
                                    let value = value?;
                                    Ok((key.clone(), value.value().to_vec()))
                                })
                                .collect()
                        }
                        Err(err) => vec![Err(EngineError::from(err))],
                    };
                    records
                });
                Ok(Box::new(iter))
            }
            TableReader::Missing => Ok(Box::new(std::iter::empty())),
        }
    }
}

enum AppendTarget<'txn> {
    Plain(RawTable<'txn>),
    MultiValue(RawMultimapTable<'txn>),
}

/// Append-only writer bound to one table of one write transaction.
///
/// Plain tables accept strictly increasing keys. Multi-value tables accept a
/// greater key, or the same key with a greater value. The bound starts at the
/// table's current last entry, so appending below existing data fails.
pub struct AppendCursor<'txn> {
    table: String,
    target: AppendTarget<'txn>,
    last: Option<Record>,
    appended: u64,
}

impl<'txn> AppendCursor<'txn> {
    pub fn open(txn: &'txn WriteTransaction, name: &str, kind: TableKind) -> EngineResult<Self> {
        let (target, last) = match kind {
            TableKind::Plain => {
                let table = txn.open_table(plain_definition(name))?;
                let last = table
                    .last()?
                    .map(|(key, value)| (key.value().to_vec(), value.value().to_vec()));
                (AppendTarget::Plain(table), last)
            }
            TableKind::MultiValue => {
                let table = txn.open_multimap_table(multimap_definition(name))?;
                let last = last_multimap_entry(&table)?;
                (AppendTarget::MultiValue(table), last)
            }
        };
        Ok(Self {
            table: name.to_string(),
            target,
            last,
            appended: 0,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> TableKind {
        match self.target {
            AppendTarget::Plain(_) => TableKind::Plain,
            AppendTarget::MultiValue(_) => TableKind::MultiValue,
        }
    }

    /// Records appended through this cursor.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Key of the last entry in the table, including ones appended earlier.
    pub fn last_key(&self) -> Option<&[u8]> {
        self.last.as_ref().map(|(key, _)| key.as_slice())
    }

    pub fn append(&mut self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.check_order(key, value)?;
        match &mut self.target {
            AppendTarget::Plain(table) => {
                table.insert(key, value)?;
            }
            AppendTarget::MultiValue(table) => {
                table.insert(key, value)?;
            }
        }

        match &mut self.last {
            Some((last_key, last_value)) => {
                last_key.clear();
                last_key.extend_from_slice(key);
                last_value.clear();
                last_value.extend_from_slice(value);
            }
            None => self.last = Some((key.to_vec(), value.to_vec())),
        }
        self.appended += 1;
        Ok(())
    }

    fn check_order(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        let Some((last_key, last_value)) = &self.last else {
            return Ok(());
        };
        let in_order = match self.target {
            AppendTarget::Plain(_) => key > last_key.as_slice(),
            AppendTarget::MultiValue(_) => {
                (key, value) > (last_key.as_slice(), last_value.as_slice())
            }
        };
        if in_order {
            Ok(())
        } else {
            Err(EngineError::AppendOutOfOrder {
                table: self.table.clone(),
                key: hex::encode(key),
            })
        }
    }
}

fn last_multimap_entry(table: &RawMultimapTable<'_>) -> EngineResult<Option<Record>> {
    let mut entries = table.iter()?;
    let Some(entry) = entries.next_back() else {
        return Ok(None);
    };
    let (key, values) = entry?;
    let mut last_value = None;
    for value in values {
        last_value = Some(value?.value().to_vec());
    }
    Ok(last_value.map(|value| (key.value().to_vec(), value)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_plain_append_rejects_non_increasing_keys() {
        let dir = tempdir().unwrap();
        let store = temp_store(&dir, "db.redb");
        let txn = store.begin_write().unwrap();
        let mut cursor = AppendCursor::open(&txn, "T", TableKind::Plain).unwrap();

        cursor.append(&[0x01], &[0xaa]).unwrap();
        cursor.append(&[0x02], &[0xbb]).unwrap();

        let err = cursor.append(&[0x02], &[0xcc]).unwrap_err();
        assert!(matches!(err, EngineError::AppendOutOfOrder { .. }));
        assert!(cursor.append(&[0x01, 0x00], &[0xcc]).is_err());
        assert_eq!(cursor.appended(), 2);
        assert_eq!(cursor.last_key(), Some(&[0x02][..]));
    }

    #[test]
    fn test_multi_value_append_keeps_per_key_order() {
        let dir = tempdir().unwrap();
        let store = temp_store(&dir, "db.redb");
        let txn = store.begin_write().unwrap();
        {
            let mut cursor = AppendCursor::open(&txn, "D", TableKind::MultiValue).unwrap();
            assert_eq!(cursor.kind(), TableKind::MultiValue);

            cursor.append(&[0x01], &[0x01]).unwrap();
            cursor.append(&[0x01], &[0x02]).unwrap();
            cursor.append(&[0x02], &[0x00]).unwrap();

            assert!(cursor.append(&[0x02], &[0x00]).is_err());
            assert!(cursor.append(&[0x01], &[0x03]).is_err());
        }
        txn.commit().unwrap();

        assert_eq!(
            read_all(&store, "D"),
            vec![
                (vec![0x01], vec![0x01]),
                (vec![0x01], vec![0x02]),
                (vec![0x02], vec![0x00]),
            ]
        );
    }

    #[test]
    fn test_reopened_cursor_continues_after_existing_entries() {
        let dir = tempdir().unwrap();
        let store = temp_store(&dir, "db.redb");
        fill(&store, "D", TableKind::MultiValue, &[([0x05u8], [0x07u8])]);
        fill(&store, "T", TableKind::Plain, &[([0x05u8], [0x07u8])]);

        let txn = store.begin_write().unwrap();
        let mut dup = AppendCursor::open(&txn, "D", TableKind::MultiValue).unwrap();
        assert_eq!(dup.last_key(), Some(&[0x05][..]));
        assert!(dup.append(&[0x05], &[0x06]).is_err());
        dup.append(&[0x05], &[0x08]).unwrap();
        drop(dup);

        let mut plain = AppendCursor::open(&txn, "T", TableKind::Plain).unwrap();
        assert!(plain.append(&[0x04], &[0x00]).is_err());
        plain.append(&[0x06], &[0x00]).unwrap();
    }

    #[test]
    fn test_opening_with_wrong_kind_fails() {
        let dir = tempdir().unwrap();
        let store = temp_store(&dir, "db.redb");
        fill(&store, "T", TableKind::Plain, &[([0x01u8], [0x01u8])]);

        let txn = store.begin_write().unwrap();
        let result = AppendCursor::open(&txn, "T", TableKind::MultiValue);
        assert!(matches!(result, Err(EngineError::Storage(_))));
    }
}
