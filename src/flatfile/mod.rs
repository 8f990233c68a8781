// ABOUTME: Line-oriented flat export format: header blocks plus hex key/value lines
// ABOUTME: Restores exports into a store through the bulk loader, and writes exports

mod decode;
mod encode;

pub use decode::FlatFileSource;
pub use encode::{export, ExportSummary, FlatFileWriter};

use crate::catalog::Catalog;
use crate::error::EngineResult;
use crate::store::Store;
use crate::transfer::{run_load, LoadOptions, TransferSummary};
use std::io::BufRead;

pub const HEADER_END: &[u8] = b"HEADER=END";
pub const DATA_END: &[u8] = b"DATA=END";
pub const DATABASE_FIELD: &str = "database";
pub const DUPLICATES_FIELD: &str = "duplicates";

/// Tag written in front of every hex data line.
pub const DATA_LINE_TAG: u8 = b' ';

/// Restore a flat export into `dest` in a single write transaction.
///
/// Malformed input aborts the whole load and nothing is committed.
pub fn load<R: BufRead>(
    reader: R,
    dest: &Store,
    catalog: &Catalog,
    options: LoadOptions,
) -> EngineResult<TransferSummary> {
    let mut source = FlatFileSource::new(reader, catalog);
    run_load(&mut source, dest, options)
}
