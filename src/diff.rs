// ABOUTME: Sorted-merge comparison of the same table across two stores
// ABOUTME: Classifies every key as left-only, right-only, equal or unequal

use crate::cancel::CancelToken;
use crate::config::{EngineConfig, DEFAULT_COMPARE_CHECKPOINT_EVERY};
use crate::error::EngineResult;
use crate::store::{ReadView, Record};
use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::ops::AddAssign;

/// Outcome of comparing one position of the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    LeftOnly(Record),
    RightOnly(Record),
    Equal(Record),
    Unequal {
        key: Vec<u8>,
        left: Vec<u8>,
        right: Vec<u8>,
    },
}

impl Comparison {
    /// The reportable form, `None` for equal records.
    pub fn into_divergence(self) -> Option<Divergence> {
        match self {
            Comparison::LeftOnly((key, value)) => Some(Divergence::LeftOnly { key, value }),
            Comparison::RightOnly((key, value)) => Some(Divergence::RightOnly { key, value }),
            Comparison::Equal(_) => None,
            Comparison::Unequal { key, left, right } => {
                Some(Divergence::Unequal { key, left, right })
            }
        }
    }
}

/// A key on which the two tables disagree.
///
/// "Left" is the primary store (`db`), "right" the reference store (`refDB`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// Present only in the primary store
    LeftOnly { key: Vec<u8>, value: Vec<u8> },
    /// Present only in the reference store
    RightOnly { key: Vec<u8>, value: Vec<u8> },
    Unequal {
        key: Vec<u8>,
        left: Vec<u8>,
        right: Vec<u8>,
    },
}

impl Divergence {
    pub fn key(&self) -> &[u8] {
        match self {
            Divergence::LeftOnly { key, .. }
            | Divergence::RightOnly { key, .. }
            | Divergence::Unequal { key, .. } => key,
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::LeftOnly { key, value } => write!(
                f,
                "Missing refDB: {} [{}]",
                hex::encode(key),
                hex::encode(value)
            ),
            Divergence::RightOnly { key, value } => write!(
                f,
                "Missing in db: {} [{}]",
                hex::encode(key),
                hex::encode(value)
            ),
            Divergence::Unequal { key, left, right } => write!(
                f,
                "Different values for {}. db: [{}], refDB: [{}]",
                hex::encode(key),
                hex::encode(left),
                hex::encode(right)
            ),
        }
    }
}

/// Lock-step merge of two ascending record streams.
///
/// Yields one [`Comparison`] per step. After an error from either side the
/// iterator is exhausted.
pub struct MergeRecords<L, R> {
    left: L,
    right: R,
    left_head: Option<Record>,
    right_head: Option<Record>,
    primed: bool,
    failed: bool,
}

pub fn merge_records<L, R>(left: L, right: R) -> MergeRecords<L, R>
where
    L: Iterator<Item = EngineResult<Record>>,
    R: Iterator<Item = EngineResult<Record>>,
{
    MergeRecords {
        left,
        right,
        left_head: None,
        right_head: None,
        primed: false,
        failed: false,
    }
}

impl<L, R> MergeRecords<L, R>
where
    L: Iterator<Item = EngineResult<Record>>,
    R: Iterator<Item = EngineResult<Record>>,
{
    fn advance_left(&mut self) -> EngineResult<()> {
        self.left_head = self.left.next().transpose()?;
        Ok(())
    }

    fn advance_right(&mut self) -> EngineResult<()> {
        self.right_head = self.right.next().transpose()?;
        Ok(())
    }

    fn step(&mut self) -> EngineResult<Option<Comparison>> {
        if !self.primed {
            self.primed = true;
            self.advance_left()?;
            self.advance_right()?;
        }

        let comparison = match (self.left_head.take(), self.right_head.take()) {
            (None, None) => return Ok(None),
            (Some(left), None) => {
                self.advance_left()?;
                Comparison::LeftOnly(left)
            }
            (None, Some(right)) => {
                self.advance_right()?;
                Comparison::RightOnly(right)
            }
            (Some(left), Some(right)) => match left.0.cmp(&right.0) {
                Ordering::Less => {
                    self.right_head = Some(right);
                    self.advance_left()?;
                    Comparison::LeftOnly(left)
                }
                Ordering::Greater => {
                    self.left_head = Some(left);
                    self.advance_right()?;
                    Comparison::RightOnly(right)
                }
                Ordering::Equal => {
                    self.advance_left()?;
                    self.advance_right()?;
                    let (key, left_value) = left;
                    if left_value == right.1 {
                        Comparison::Equal((key, left_value))
                    } else {
                        Comparison::Unequal {
                            key,
                            left: left_value,
                            right: right.1,
                        }
                    }
                }
            },
        };
        Ok(Some(comparison))
    }
}

impl<L, R> Iterator for MergeRecords<L, R>
where
    L: Iterator<Item = EngineResult<Record>>,
    R: Iterator<Item = EngineResult<Record>>,
{
    type Item = EngineResult<Comparison>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(comparison) => comparison.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Receives the results of a comparison pass.
pub trait DiffObserver {
    fn table_started(&mut self, _table: &str) -> EngineResult<()> {
        Ok(())
    }

    fn divergence(&mut self, divergence: &Divergence) -> EngineResult<()>;

    /// Called every `checkpoint_every` compared records.
    fn checkpoint(&mut self, _compared: u64) -> EngineResult<()> {
        Ok(())
    }
}

impl DiffObserver for Vec<Divergence> {
    fn divergence(&mut self, divergence: &Divergence) -> EngineResult<()> {
        self.push(divergence.clone());
        Ok(())
    }
}

/// Writes the line-oriented report format.
pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DiffObserver for ReportWriter<W> {
    fn table_started(&mut self, table: &str) -> EngineResult<()> {
        writeln!(self.out, "\nBucket: {}", table)?;
        Ok(())
    }

    fn divergence(&mut self, divergence: &Divergence) -> EngineResult<()> {
        writeln!(self.out, "{}", divergence)?;
        Ok(())
    }

    fn checkpoint(&mut self, compared: u64) -> EngineResult<()> {
        writeln!(self.out, "Compared {} records", compared)?;
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub checkpoint_every: u64,
    pub cancel: CancelToken,
}

impl DiffOptions {
    pub fn new(config: &EngineConfig, cancel: CancelToken) -> Self {
        Self {
            checkpoint_every: config.compare_checkpoint_every.max(1),
            cancel,
        }
    }
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            checkpoint_every: DEFAULT_COMPARE_CHECKPOINT_EVERY,
            cancel: CancelToken::new(),
        }
    }
}

/// Counts from one or more comparison passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub compared: u64,
    pub left_only: u64,
    pub right_only: u64,
    pub unequal: u64,
}

impl DiffSummary {
    pub fn divergences(&self) -> u64 {
        self.left_only + self.right_only + self.unequal
    }

    pub fn is_identical(&self) -> bool {
        self.divergences() == 0
    }
}

impl AddAssign for DiffSummary {
    fn add_assign(&mut self, other: Self) {
        self.compared += other.compared;
        self.left_only += other.left_only;
        self.right_only += other.right_only;
        self.unequal += other.unequal;
    }
}

/// Compare two ascending record streams, reporting every divergence.
pub fn compare_records<L, R>(
    left: L,
    right: R,
    options: &DiffOptions,
    observer: &mut dyn DiffObserver,
) -> EngineResult<DiffSummary>
where
    L: Iterator<Item = EngineResult<Record>>,
    R: Iterator<Item = EngineResult<Record>>,
{
    let checkpoint_every = options.checkpoint_every.max(1);
    let mut summary = DiffSummary::default();

    for comparison in merge_records(left, right) {
        let comparison = comparison?;
        summary.compared += 1;
        if summary.compared % checkpoint_every == 0 {
            options.cancel.check()?;
            observer.checkpoint(summary.compared)?;
        }

        let Some(divergence) = comparison.into_divergence() else {
            continue;
        };
        match divergence {
            Divergence::LeftOnly { .. } => summary.left_only += 1,
            Divergence::RightOnly { .. } => summary.right_only += 1,
            Divergence::Unequal { .. } => summary.unequal += 1,
        }
        observer.divergence(&divergence)?;
    }

    Ok(summary)
}

/// Compare `left_table` in `left` against `right_table` in `right`.
pub fn compare_table(
    left: &ReadView,
    left_table: &str,
    right: &ReadView,
    right_table: &str,
    options: &DiffOptions,
    observer: &mut dyn DiffObserver,
) -> EngineResult<DiffSummary> {
    tracing::debug!("Comparing table '{}' with '{}'", left_table, right_table);

    let left_reader = left.open(left_table)?;
    let right_reader = right.open(right_table)?;
    let summary = compare_records(
        left_reader.records()?,
        right_reader.records()?,
        options,
        observer,
    )?;

    tracing::debug!(
        "Table '{}': {} compared, {} divergent",
        left_table,
        summary.compared,
        summary.divergences()
    );
    Ok(summary)
}

/// Compare every table in `tables` (same name on both sides), in order.
pub fn compare_tables<S: AsRef<str>>(
    left: &ReadView,
    right: &ReadView,
    tables: &[S],
    options: &DiffOptions,
    observer: &mut dyn DiffObserver,
) -> EngineResult<DiffSummary> {
    let mut total = DiffSummary::default();
    for table in tables {
        let table = table.as_ref();
        options.cancel.check()?;
        observer.table_started(table)?;
        total += compare_table(left, table, right, table, options, observer)?;
    }
    Ok(total)
}
