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

//! CSV artifact: header once, every field quoted, `\n` line endings.

use super::{artifact_size, ArtifactStream, WRITE_CHUNK};
use crate::domain::entities::Row;
use crate::domain::errors::{ExportError, Result};
use crate::ports::sink_port::{ArtifactStats, RowSink};
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::path::PathBuf;

pub struct CsvSink {
    writer: Writer<ArtifactStream>,
    path: PathBuf,
    width: usize,
    rows: u64,
    record: Vec<String>,
}

impl CsvSink {
    /// Wraps `stream` and writes the header line immediately.
    pub fn new(stream: ArtifactStream, path: PathBuf, columns: Vec<String>) -> Result<Self> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .buffer_capacity(WRITE_CHUNK)
            .from_writer(stream);
        writer.write_record(&columns)?;

        Ok(Self {
            writer,
            path,
            width: columns.len(),
            rows: 0,
            record: Vec::with_capacity(columns.len()),
        })
    }
}

impl RowSink for CsvSink {
    fn write_rows(&mut self, rows: &[Row]) -> Result<u64> {
        for row in rows {
            self.record.clear();
            for i in 0..self.width {
                let value = row.fields.get(i).cloned().flatten().unwrap_or_default();
                self.record.push(value);
            }
            self.writer.write_record(&self.record)?;
        }
        self.rows += rows.len() as u64;
        Ok(rows.len() as u64)
    }

    fn finish(self: Box<Self>) -> Result<ArtifactStats> {
        let this = *self;
        let stream = this
            .writer
            .into_inner()
            .map_err(|e| ExportError::ArtifactError(e.error().to_string()))?;
        stream.close()?;

        Ok(ArtifactStats {
            bytes: artifact_size(&this.path)?,
            path: this.path,
            rows: this.rows,
        })
    }
}
