// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parser for the client's spooled delimited text.
//!
//! All row parsing (batch spools and the catalog query alike) goes through
//! this one `csv` reader, configured with the session's delimiter and quote.
//! Client chatter is removed line by line before the reader sees it, so a
//! quoted value that happens to look like a banner stays data. Rows are
//! produced lazily; a row with the wrong number of fields is counted and
//! skipped instead of failing the batch.

use crate::domain::entities::{ColumnDescriptor, Row};
use crate::domain::errors::{ExportError, Result};
use crate::domain::spool::SpoolFormat;
use csv::{ByteRecord, ByteRecordsIntoIter, ReaderBuilder, Trim};
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Line prefixes the client prints for errors, prompts and separators.
pub const DIAGNOSTIC_PREFIXES: [&str; 6] = ["ORA-", "SP2-", "SQL>", "TNS-", "ERROR at line", "----"];

const READ_BUFFER: usize = 128 * 1024;

/// Counters collected while parsing one spool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Rows handed to the caller.
    pub accepted: u64,
    /// Rows dropped for a wrong field count.
    pub malformed: u64,
    /// Banner / error lines skipped.
    pub diagnostics: u64,
}

impl ParseStats {
    /// Data records seen, whether accepted or not.
    pub fn records_seen(&self) -> u64 {
        self.accepted + self.malformed
    }
}

/// Parser bound to one column layout.
#[derive(Debug, Clone)]
pub struct RowParser {
    format: SpoolFormat,
    header: Vec<String>,
}

impl RowParser {
    pub fn new(format: SpoolFormat, columns: &[ColumnDescriptor]) -> Self {
        Self::with_header(format, columns.iter().map(|c| c.name.clone()).collect())
    }

    /// For queries whose output is not a table projection (catalog lookups).
    pub fn with_header(format: SpoolFormat, header: Vec<String>) -> Self {
        Self { format, header }
    }

    pub fn expected_fields(&self) -> usize {
        self.header.len()
    }

    /// Lazily parses a spool file.
    pub fn open(&self, path: &Path) -> Result<ParsedRows<File>> {
        Ok(self.parse(File::open(path)?))
    }

    /// Lazily parses any reader.
    pub fn parse<R: Read>(&self, reader: R) -> ParsedRows<R> {
        let filter = DiagnosticFilter::new(
            BufReader::with_capacity(READ_BUFFER, reader),
            self.format.quote,
        );
        // Padding inside quotes is data; the client pads nothing else.
        let records = ReaderBuilder::new()
            .delimiter(self.format.delimiter)
            .quote(self.format.quote)
            .double_quote(true)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::None)
            .from_reader(filter)
            .into_byte_records();

        ParsedRows {
            records,
            expected_fields: self.header.len(),
            null_sentinel: self.format.null_sentinel.clone(),
            stats: ParseStats::default(),
        }
    }
}

/// Drops client chatter before it reaches the csv reader.
///
/// Only physical lines that begin outside a quoted field are candidates: a
/// line starting with one of [`DIAGNOSTIC_PREFIXES`], or holding nothing but
/// whitespace, is skipped. Continuation lines of a multi-line quoted value
/// always pass through.
struct DiagnosticFilter<R> {
    inner: R,
    quote: u8,
    in_quotes: bool,
    line: Vec<u8>,
    pos: usize,
    skipped: u64,
}

impl<R: BufRead> DiagnosticFilter<R> {
    fn new(inner: R, quote: u8) -> Self {
        Self {
            inner,
            quote,
            in_quotes: false,
            line: Vec::new(),
            pos: 0,
            skipped: 0,
        }
    }

    /// Loads the next line to pass on; `false` at end of input.
    fn next_line(&mut self) -> io::Result<bool> {
        loop {
            self.line.clear();
            self.pos = 0;
            if self.inner.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(false);
            }
            let starts_record = !self.in_quotes;
            // An escaped quote is doubled, so only the parity matters.
            let quotes = self.line.iter().filter(|&&b| b == self.quote).count();
            if quotes % 2 == 1 {
                self.in_quotes = !self.in_quotes;
            }
            if !starts_record {
                return Ok(true);
            }
            if is_diagnostic_line(&self.line) {
                self.skipped += 1;
                debug!(
                    "Skipping client diagnostic: {}",
                    String::from_utf8_lossy(&self.line).trim_end()
                );
                self.in_quotes = false;
                continue;
            }
            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(true);
        }
    }
}

impl<R: BufRead> Read for DiagnosticFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.line.len() && !self.next_line()? {
            return Ok(0);
        }
        let n = buf.len().min(self.line.len() - self.pos);
        buf[..n].copy_from_slice(&self.line[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn is_diagnostic_line(line: &[u8]) -> bool {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let text = &line[start..];
    DIAGNOSTIC_PREFIXES
        .iter()
        .any(|p| text.starts_with(p.as_bytes()))
}

/// Forward-only iterator over the accepted rows of one spool.
pub struct ParsedRows<R> {
    records: ByteRecordsIntoIter<DiagnosticFilter<BufReader<R>>>,
    expected_fields: usize,
    null_sentinel: String,
    stats: ParseStats,
}

impl<R: Read> ParsedRows<R> {
    pub fn stats(&self) -> ParseStats {
        ParseStats {
            diagnostics: self.records.reader().get_ref().skipped,
            ..self.stats
        }
    }

    fn is_blank(record: &ByteRecord) -> bool {
        record.iter().all(|f| f.is_empty())
    }

    fn to_row(&self, record: &ByteRecord) -> Row {
        Row::new(
            record
                .iter()
                .map(|f| {
                    let value = String::from_utf8_lossy(f);
                    if value == self.null_sentinel {
                        None
                    } else {
                        Some(value.into_owned())
                    }
                })
                .collect(),
        )
    }
}

impl<R: Read> Iterator for ParsedRows<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(r) => r,
                Err(e) => return Some(Err(ExportError::ArtifactError(e.to_string()))),
            };

            if Self::is_blank(&record) {
                continue;
            }
            if record.len() != self.expected_fields {
                self.stats.malformed += 1;
                warn!(
                    "Skipping malformed record {}: expected {} fields, found {}",
                    record.position().map(|p| p.record() + 1).unwrap_or(0),
                    self.expected_fields,
                    record.len()
                );
                continue;
            }

            self.stats.accepted += 1;
            return Some(Ok(self.to_row(&record)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(columns: &[&str]) -> RowParser {
        RowParser::with_header(
            SpoolFormat::default(),
            columns.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn collect(p: &RowParser, text: &str) -> (Vec<Row>, ParseStats) {
        let mut rows = p.parse(text.as_bytes());
        let out: Vec<Row> = rows.by_ref().collect::<Result<_>>().unwrap();
        (out, rows.stats())
    }

    #[test]
    fn test_quoted_delimiter_does_not_split() {
        let p = parser(&["ID", "NAME"]);
        let (rows, stats) = collect(&p, "\"1\",\"Smith, John\"\n\"2\",\"say \"\"hi\"\"\"\n");
        assert_eq!(rows[0], Row::from_values(["1", "Smith, John"]));
        assert_eq!(rows[1], Row::from_values(["2", "say \"hi\""]));
        assert_eq!(stats.accepted, 2);
    }

    #[test]
    fn test_skips_blank_and_diagnostic_lines() {
        let p = parser(&["ID", "NAME"]);
        let text = "\n\"1\",\"a\"\n   \nSP2-0734: unknown command beginning\nORA-01013: user requested cancel\n\"2\",\"b\"\n";
        let (rows, stats) = collect(&p, text);
        assert_eq!(rows.len(), 2);
        assert_eq!(stats.diagnostics, 2);
        assert_eq!(stats.malformed, 0);
    }

    #[test]
    fn test_malformed_row_is_counted_not_fatal() {
        let p = parser(&["ID", "NAME"]);
        let text = "\"1\",\"a\"\n\"2\",\"b\",\"extra\"\n\"3\",\"c\"\n\"4\",\"d\"\n";
        let (rows, stats) = collect(&p, text);
        // Batch of 4 with one bad row: 3 accepted, 1 skipped.
        assert_eq!(rows.len(), 3);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.records_seen(), 4);
        assert_eq!(rows[2], Row::from_values(["4", "d"]));
    }

    #[test]
    fn test_null_sentinel_is_normalised() {
        let p = parser(&["ID", "NOTE"]);
        let (rows, _) = collect(&p, "\"1\",\"NULL\"\n\"2\",\"NULLABLE\"\n");
        assert_eq!(rows[0].fields, vec![Some("1".to_string()), None]);
        assert_eq!(rows[1].fields[1].as_deref(), Some("NULLABLE"));
    }

    #[test]
    fn test_row_matching_column_names_is_data() {
        let p = parser(&["ID", "NAME"]);
        let (rows, stats) = collect(&p, "\"id\",\"name\"\n\"2\",\"b\"\n\"3\",\"c\"\n");
        assert_eq!(rows[0], Row::from_values(["id", "name"]));
        assert_eq!(stats.records_seen(), 3);
    }

    #[test]
    fn test_quoted_banner_text_is_data() {
        let p = parser(&["CODE", "NOTE"]);
        let text = "\"ORA-12345 order\",\"b\"\n\"----\",\"c\"\n\"3\",\"d\"\n";
        let (rows, stats) = collect(&p, text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fields[0].as_deref(), Some("ORA-12345 order"));
        assert_eq!(rows[1].fields[0].as_deref(), Some("----"));
        assert_eq!(stats.diagnostics, 0);
        assert_eq!(stats.records_seen(), 3);
    }

    #[test]
    fn test_multiline_value_is_never_filtered() {
        let p = parser(&["ID", "NOTE"]);
        let text = "\"1\",\"first\nORA-00001 quoted in text\n   \"\nSP2-0042: real banner\n\"2\",\"b\"\n";
        let (rows, stats) = collect(&p, text);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].fields[1].as_deref(),
            Some("first\nORA-00001 quoted in text\n   ")
        );
        assert_eq!(stats.diagnostics, 1);
    }

    #[test]
    fn test_quoted_whitespace_is_preserved() {
        let p = parser(&["ID", "NAME"]);
        let (rows, _) = collect(&p, "\"1\",\"  padded  \"\n");
        assert_eq!(rows[0].fields[1].as_deref(), Some("  padded  "));
    }

    #[test]
    fn test_custom_delimiter() {
        let format = SpoolFormat::new("|", "NULL").unwrap();
        let p = RowParser::with_header(format, vec!["A".into(), "B".into(), "C".into()]);
        let (rows, _) = collect(&p, "\"x|y\"|2|\"  padded  \"\n");
        assert_eq!(rows[0], Row::from_values(["x|y", "2", "  padded  "]));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let p = parser(&["ID"]);
        let bytes: &[u8] = b"\"ab\xffc\"\n";
        let rows: Vec<Row> = p.parse(bytes).collect::<Result<_>>().unwrap();
        assert_eq!(rows[0].fields[0].as_deref(), Some("ab\u{FFFD}c"));
    }

    #[test]
    fn test_open_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.txt");
        std::fs::write(&path, "\"1\",\"a\"\n").unwrap();
        let rows: Vec<Row> = parser(&["ID", "NAME"])
            .open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
