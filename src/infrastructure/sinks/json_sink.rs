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

//! Streaming JSON array artifact.
//!
//! `[` is written when the sink opens, records are streamed with a leading
//! comma from the second one on, and `]` is written once in `finish`. The
//! sink never reads or rewrites bytes it already emitted, which keeps the
//! array valid under gzip too.

use super::{artifact_size, ArtifactStream};
use crate::domain::entities::Row;
use crate::domain::errors::Result;
use crate::ports::sink_port::{ArtifactStats, RowSink};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io::Write;
use std::path::PathBuf;

pub struct JsonSink {
    stream: ArtifactStream,
    path: PathBuf,
    columns: Vec<String>,
    rows: u64,
}

/// One row as an object keyed by every column, in column order.
struct Record<'a> {
    columns: &'a [String],
    row: &'a Row,
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (i, name) in self.columns.iter().enumerate() {
            // Missing trailing fields are written as null, never omitted.
            let value = self.row.fields.get(i).and_then(|f| f.as_deref());
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl JsonSink {
    pub fn new(mut stream: ArtifactStream, path: PathBuf, columns: Vec<String>) -> Result<Self> {
        stream.write_all(b"[")?;
        Ok(Self {
            stream,
            path,
            columns,
            rows: 0,
        })
    }
}

impl RowSink for JsonSink {
    fn write_rows(&mut self, rows: &[Row]) -> Result<u64> {
        for row in rows {
            if self.rows > 0 {
                self.stream.write_all(b",")?;
            }
            self.stream.write_all(b"\n")?;
            let record = Record {
                columns: &self.columns,
                row,
            };
            serde_json::to_writer(&mut self.stream, &record)?;
            self.rows += 1;
        }
        Ok(rows.len() as u64)
    }

    fn finish(self: Box<Self>) -> Result<ArtifactStats> {
        let mut this = *self;
        this.stream.write_all(b"\n]\n")?;
        this.stream.close()?;

        Ok(ArtifactStats {
            bytes: artifact_size(&this.path)?,
            path: this.path,
            rows: this.rows,
        })
    }
}
