// ABOUTME: Bounded-transaction append loop shared by store copy and flat-file restore
// ABOUTME: Appends ordered records, rotates or reports on a timer, polls cancellation

use super::{TableSink, TableSpec};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::store::{AppendCursor, Record, Store};
use redb::WriteTransaction;
use std::time::{Duration, Instant};

/// What happens when the loader's timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnPolicy {
    /// Commit and begin a new write transaction every `every`
    Rotate { every: Duration },
    /// Keep one transaction for the whole load, only logging progress
    Single { progress_every: Duration },
}

impl TxnPolicy {
    fn interval(self) -> Duration {
        match self {
            TxnPolicy::Rotate { every } => every,
            TxnPolicy::Single { progress_every } => progress_every,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub policy: TxnPolicy,
    pub cancel: CancelToken,
}

impl LoadOptions {
    /// Store-to-store copy: rotate every `commit_every_secs`.
    pub fn rotating(config: &EngineConfig, cancel: CancelToken) -> Self {
        Self {
            policy: TxnPolicy::Rotate {
                every: config.commit_every(),
            },
            cancel,
        }
    }

    /// Flat-file restore: one transaction, progress every `progress_every_secs`.
    pub fn single(config: &EngineConfig, cancel: CancelToken) -> Self {
        Self {
            policy: TxnPolicy::Single {
                progress_every: config.progress_every(),
            },
            cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub tables: u64,
    pub records: u64,
    pub rotations: u64,
}

enum Pumped {
    TableDone,
    Rotate,
}

/// Writes table sections into a destination store through append cursors.
pub struct BulkLoader<'s> {
    dest: &'s Store,
    txn: Option<WriteTransaction>,
    options: LoadOptions,
    last_tick: Instant,
    summary: TransferSummary,
}

impl<'s> BulkLoader<'s> {
    pub fn new(dest: &'s Store, options: LoadOptions) -> EngineResult<Self> {
        let txn = dest.begin_write()?;
        Ok(Self {
            dest,
            txn: Some(txn),
            options,
            last_tick: Instant::now(),
            summary: TransferSummary::default(),
        })
    }

    pub fn summary(&self) -> TransferSummary {
        self.summary
    }

    /// Commit the open transaction, then run one empty begin/commit cycle.
    pub fn finish(mut self) -> EngineResult<TransferSummary> {
        let txn = self.txn.take().ok_or(EngineError::TransactionClosed)?;
        txn.commit()?;
        self.dest.begin_write()?.commit()?;
        tracing::info!(
            "Loaded {} records across {} tables ({} rotations)",
            self.summary.records,
            self.summary.tables,
            self.summary.rotations
        );
        Ok(self.summary)
    }

    fn rotate(&mut self) -> EngineResult<()> {
        let txn = self.txn.take().ok_or(EngineError::TransactionClosed)?;
        txn.commit()?;
        self.txn = Some(self.dest.begin_write()?);
        self.summary.rotations += 1;
        Ok(())
    }

    fn pump(
        &mut self,
        table: &TableSpec,
        records: &mut dyn Iterator<Item = EngineResult<Record>>,
    ) -> EngineResult<Pumped> {
        let txn = self.txn.as_ref().ok_or(EngineError::TransactionClosed)?;
        let mut cursor = AppendCursor::open(txn, &table.name, table.kind)?;
        let interval = self.options.policy.interval();

        for record in records {
            let (key, value) = record?;
            cursor.append(&key, &value)?;
            self.summary.records += 1;

            self.options.cancel.check()?;
            if self.last_tick.elapsed() >= interval {
                self.last_tick = Instant::now();
                tracing::info!(bucket = %table.name, key = %hex::encode(&key), "Progress");
                if matches!(self.options.policy, TxnPolicy::Rotate { .. }) {
                    return Ok(Pumped::Rotate);
                }
            }
        }
        Ok(Pumped::TableDone)
    }
}

impl TableSink for BulkLoader<'_> {
    fn load_table(
        &mut self,
        table: &TableSpec,
        records: &mut dyn Iterator<Item = EngineResult<Record>>,
    ) -> EngineResult<()> {
        self.options.cancel.check()?;
        tracing::info!("Loading table '{}' ({:?})", table.name, table.kind);

        let before = self.summary.records;
        while let Pumped::Rotate = self.pump(table, records)? {
            self.rotate()?;
        }
        self.summary.tables += 1;

        tracing::debug!(
            "Table '{}' done: {} records",
            table.name,
            self.summary.records - before
        );
        Ok(())
    }
}
