// ABOUTME: Streaming parser for flat exports
// ABOUTME: Turns header blocks and hex data lines into table sections for the loader

use super::{DATABASE_FIELD, DATA_END, DUPLICATES_FIELD, HEADER_END};
use crate::catalog::{Catalog, TableKind};
use crate::error::{EngineError, EngineResult};
use crate::store::Record;
use crate::transfer::{RecordSource, TableSink, TableSpec};
use std::io::BufRead;

struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: u64,
}

impl<R: BufRead> LineReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
        }
    }

    /// Read the next line into the buffer, dropping its terminator.
    /// Returns false at end of input.
    fn advance(&mut self) -> EngineResult<bool> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(true)
    }

    fn line(&self) -> &[u8] {
        &self.buf
    }

    fn malformed(&self, reason: impl Into<String>) -> EngineError {
        EngineError::malformed(self.line_no, reason)
    }

    /// Strip the tag byte and hex-decode the rest of the current line.
    fn decode_data_line(&self) -> EngineResult<Vec<u8>> {
        let Some((_tag, hex_part)) = self.line().split_first() else {
            return Err(self.malformed("empty data line"));
        };
        hex::decode(hex_part).map_err(|err| self.malformed(format!("invalid hex: {}", err)))
    }
}

/// Data lines of one section, ending at `DATA=END` or end of input.
struct SectionRecords<'a, R> {
    lines: &'a mut LineReader<R>,
    finished: bool,
}

impl<R: BufRead> SectionRecords<'_, R> {
    fn read_pair(&mut self) -> EngineResult<Option<Record>> {
        if !self.lines.advance()? || self.lines.line() == DATA_END {
            return Ok(None);
        }
        let key = self.lines.decode_data_line()?;

        if !self.lines.advance()? {
            return Err(self.lines.malformed("key line without a value line"));
        }
        let value = self.lines.decode_data_line()?;
        Ok(Some((key, value)))
    }
}

impl<R: BufRead> Iterator for SectionRecords<'_, R> {
    type Item = EngineResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_pair() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Reads a flat export as a sequence of table sections.
pub struct FlatFileSource<'c, R> {
    lines: LineReader<R>,
    catalog: &'c Catalog,
}

impl<'c, R: BufRead> FlatFileSource<'c, R> {
    pub fn new(reader: R, catalog: &'c Catalog) -> Self {
        Self {
            lines: LineReader::new(reader),
            catalog,
        }
    }

    /// Parse the next header block. `None` when input ends before any header line.
    fn read_header(&mut self) -> EngineResult<Option<TableSpec>> {
        let mut database: Option<String> = None;
        let mut duplicates = false;
        let mut saw_line = false;

        loop {
            if !self.lines.advance()? {
                if saw_line {
                    return Err(self.lines.malformed("input ended inside a header block"));
                }
                return Ok(None);
            }
            saw_line = true;
            if self.lines.line() == HEADER_END {
                break;
            }

            let line = std::str::from_utf8(self.lines.line())
                .map_err(|_| self.lines.malformed("header line is not valid UTF-8"))?;
            let Some((field, value)) = line.split_once('=') else {
                return Err(self.lines.malformed(format!("header line without '=': {}", line)));
            };
            match field {
                DATABASE_FIELD => database = Some(value.to_string()),
                DUPLICATES_FIELD => duplicates = value == "1",
                _ => {}
            }
        }

        let Some(name) = database.filter(|name| !name.is_empty()) else {
            return Err(self.lines.malformed("header block has no database field"));
        };
        let kind = match self.catalog.kind_of(&name) {
            Some(declared) => {
                if declared.is_multi_value() != duplicates {
                    tracing::debug!(
                        "Table '{}' header says duplicates={}, using declared {:?}",
                        name,
                        duplicates,
                        declared
                    );
                }
                declared
            }
            None => TableKind::from_dupsort(duplicates),
        };
        Ok(Some(TableSpec { name, kind }))
    }
}

impl<R: BufRead> RecordSource for FlatFileSource<'_, R> {
    fn drain_into(&mut self, sink: &mut dyn TableSink) -> EngineResult<()> {
        while let Some(table) = self.read_header()? {
            let mut records = SectionRecords {
                lines: &mut self.lines,
                finished: false,
            };
            sink.load_table(&table, &mut records)?;
        }
        Ok(())
    }
}
