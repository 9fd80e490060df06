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

//! # Domain Entities
//!
//! The "Nouns" of the exporter: the columns we resolve, the job we run, the
//! batches we fetch and the summary we hand back.
//!
//! None of these types know anything about `sqlplus`, files or threads. They
//! are plain data that the application layer moves between ports.

use crate::domain::errors::ExportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Declared-type fragments that mark a column as temporal.
pub const TEMPORAL_TYPE_VOCABULARY: [&str; 3] = ["DATE", "TIMESTAMP", "INTERVAL"];

/// `OutputFormat` defines how the artifact is laid out on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Header line plus one fully quoted line per row.
    Csv,
    /// One JSON array of objects keyed by column name.
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "CSV"),
            OutputFormat::Json => write!(f, "JSON"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(ExportError::ConfigError(format!(
                "unsupported output format '{}' (expected csv or json)",
                other
            ))),
        }
    }
}

/// How a temporal column has to be converted to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    /// `DATE`: no fractional seconds on the server side.
    Date,
    /// `TIMESTAMP(n)`.
    Timestamp,
    /// `TIMESTAMP WITH [LOCAL] TIME ZONE`, normalised to UTC.
    TimestampTz,
    /// `INTERVAL YEAR TO MONTH` / `INTERVAL DAY TO SECOND`.
    Interval,
}

/// `ColumnDescriptor` is everything the pipeline needs to know about one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as reported by the catalog (e.g. "CREATED_AT").
    pub name: String,
    /// Declared type as reported by the catalog (e.g. "TIMESTAMP(6)").
    pub declared_type: String,
    /// Whether the declared type is date/time/interval.
    pub is_temporal: bool,
}

impl ColumnDescriptor {
    /// Builds a descriptor and classifies it against the temporal vocabulary.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        let upper = declared_type.to_uppercase();
        let is_temporal = TEMPORAL_TYPE_VOCABULARY.iter().any(|t| upper.contains(t));
        Self {
            name: name.into(),
            declared_type,
            is_temporal,
        }
    }

    /// Derived conversion kind; `None` for non-temporal columns.
    pub fn temporal_kind(&self) -> Option<TemporalKind> {
        if !self.is_temporal {
            return None;
        }
        let upper = self.declared_type.to_uppercase();
        Some(if upper.contains("INTERVAL") {
            TemporalKind::Interval
        } else if upper.contains("TIME ZONE") {
            TemporalKind::TimestampTz
        } else if upper.contains("TIMESTAMP") {
            TemporalKind::Timestamp
        } else {
            TemporalKind::Date
        })
    }
}

/// One parsed record, aligned to the column descriptors.
///
/// `None` is the normalised NULL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    pub fields: Vec<Option<String>>,
}

impl Row {
    pub fn new(fields: Vec<Option<String>>) -> Self {
        Self { fields }
    }

    /// Convenience for tests and literals: every field present.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: values.into_iter().map(|v| Some(v.into())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A bounded slice of the table produced by one client invocation.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Zero-based position of the batch within the job.
    pub index: u64,
    /// Row offset the batch query started at.
    pub offset: u64,
    pub rows: Vec<Row>,
    /// Rows dropped for a wrong field count.
    pub malformed: u64,
    /// Data records the client returned (accepted + malformed).
    pub records_seen: u64,
}

impl Batch {
    /// A batch is the last one when the client returned fewer records than asked for.
    pub fn is_last(&self, batch_size: u64) -> bool {
        self.records_seen < batch_size
    }
}

/// `ExtractionJob` is the immutable instruction set for one artifact.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub schema: String,
    pub table: String,
    /// Appended verbatim after `WHERE`. Trusted input.
    pub predicate: Option<String>,
    /// Appended verbatim after `ORDER BY`. Required for stable paging.
    pub order_by: Option<String>,
    /// First row to extract.
    pub start_offset: u64,
    pub batch_size: u64,
    pub output_format: OutputFormat,
    pub compress: bool,
    /// Total client attempts per batch, first try included.
    pub max_retries: u32,
    /// Wall-clock budget of a single client invocation.
    pub timeout: Duration,
    pub output_dir: PathBuf,
    /// Directory for spool, script and capture files.
    pub temp_dir: PathBuf,
    /// Number of batches fetched concurrently.
    pub workers: usize,
    /// Release batches to the writer strictly in offset order.
    pub preserve_order: bool,
}

impl ExtractionJob {
    /// `<output_dir>/<SCHEMA>/<TABLE>`
    pub fn table_dir(&self) -> PathBuf {
        self.output_dir.join(&self.schema).join(&self.table)
    }

    /// `<table_dir>/<SCHEMA>_<TABLE>_full.<ext>[.gz]`
    pub fn artifact_path(&self) -> PathBuf {
        let mut name = format!(
            "{}_{}_full.{}",
            self.schema,
            self.table,
            self.output_format.extension()
        );
        if self.compress {
            name.push_str(".gz");
        }
        self.table_dir().join(name)
    }

    /// `SCHEMA.TABLE`, for logs and error messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Row offset of the batch at `index`.
    pub fn offset_of(&self, index: u64) -> u64 {
        self.start_offset + index * self.batch_size
    }
}

/// `JobSummary` is the "Report Card" for an `ExtractionJob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub schema: String,
    pub table: String,
    pub artifact: String,
    /// Rows written to the artifact.
    pub rows: u64,
    /// Batches fetched, the terminating short batch included.
    pub batches: u64,
    /// Rows dropped by the parser for a wrong field count.
    pub skipped_rows: u64,
    /// Size of the artifact on disk.
    pub bytes: u64,
    /// Wall-clock seconds.
    pub duration: f64,
    /// Rows the source held for the job, when counted up front.
    pub source_rows: Option<u64>,
    /// Either "SUCCESS" or "FAILED".
    pub status: String,
    pub error: Option<String>,
}

impl JobSummary {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }

    pub(crate) fn success(job: &ExtractionJob, progress: &JobProgress, bytes: u64, duration: f64) -> Self {
        Self {
            schema: job.schema.clone(),
            table: job.table.clone(),
            artifact: job.artifact_path().display().to_string(),
            rows: progress.rows,
            batches: progress.batches,
            skipped_rows: progress.skipped_rows,
            bytes,
            duration,
            source_rows: progress.source_rows,
            status: "SUCCESS".to_string(),
            error: None,
        }
    }

    pub(crate) fn failure(
        job: &ExtractionJob,
        progress: &JobProgress,
        bytes: u64,
        duration: f64,
        error: String,
    ) -> Self {
        Self {
            status: "FAILED".to_string(),
            error: Some(error),
            ..Self::success(job, progress, bytes, duration)
        }
    }
}

/// Running counters of a job. Only the writer side touches them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobProgress {
    pub rows: u64,
    pub batches: u64,
    pub skipped_rows: u64,
    /// Expected total, start offset already applied.
    pub source_rows: Option<u64>,
}

impl JobProgress {
    pub fn record(&mut self, batch: &Batch) {
        self.rows += batch.rows.len() as u64;
        self.batches += 1;
        self.skipped_rows += batch.malformed;
    }

    /// Share of the expected rows written so far, when a count is known.
    pub fn percent(&self) -> Option<f64> {
        match self.source_rows {
            Some(0) | None => None,
            Some(total) => Some(self.rows as f64 * 100.0 / total as f64),
        }
    }
}
