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

//! Post-extraction validation of a finished artifact.
//!
//! Re-reads the artifact from disk (decompressing when the name ends in
//! `.gz`) and collects per-column quality counters. Validation never modifies
//! the artifact.

use crate::domain::entities::{ColumnDescriptor, OutputFormat, TemporalKind};
use crate::domain::errors::{ExportError, Result};
use crate::domain::temporal::TemporalFormat;
use flate2::read::GzDecoder;
use log::{info, warn};
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub const VALIDATION_FILE: &str = "validation.json";

/// Container for all validation metrics found for an artifact
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub artifact: String,
    pub total_rows: u64,
    /// CSV: the first line equals the column names. JSON: every object has
    /// exactly the column keys.
    pub header_matches: bool,
    /// Records whose shape does not match the column set.
    pub malformed_rows: u64,
    /// Empty or null values per column.
    pub empty_values: BTreeMap<String, u64>,
    /// Temporal values that do not parse with the column's format.
    pub invalid_temporal: BTreeMap<String, u64>,
    /// Rows the source held for the job when counted up front.
    pub source_rows: Option<u64>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.header_matches
            && self.malformed_rows == 0
            && self.invalid_temporal.is_empty()
            && self.source_rows.map_or(true, |n| n == self.total_rows)
    }
}

pub struct ArtifactValidator {
    columns: Vec<String>,
    /// Column index -> format its text must parse with.
    temporal: Vec<(usize, TemporalFormat)>,
    source_rows: Option<u64>,
}

impl ArtifactValidator {
    /// Interval columns and columns whose override has no parseable timestamp
    /// layout are not checked.
    pub fn new(
        columns: &[ColumnDescriptor],
        timestamp_format: &TemporalFormat,
        column_formats: &HashMap<String, String>,
    ) -> Self {
        let mut temporal = Vec::new();
        for (i, col) in columns.iter().enumerate() {
            match col.temporal_kind() {
                None | Some(TemporalKind::Interval) => continue,
                Some(_) => {}
            }
            match column_formats.get(&col.name.to_uppercase()) {
                None => temporal.push((i, timestamp_format.clone())),
                Some(pattern) => {
                    if let Ok(fmt) = TemporalFormat::new(pattern) {
                        temporal.push((i, fmt));
                    }
                }
            }
        }
        Self {
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            temporal,
            source_rows: None,
        }
    }

    /// Expect the artifact to hold exactly `rows` rows.
    pub fn with_source_rows(mut self, rows: Option<u64>) -> Self {
        self.source_rows = rows;
        self
    }

    pub fn validate(&self, path: &Path, format: OutputFormat) -> Result<ValidationReport> {
        info!("Validating artifact {}", path.display());
        let reader = open_artifact(path)?;
        let mut report = ValidationReport {
            artifact: path.display().to_string(),
            source_rows: self.source_rows,
            ..ValidationReport::default()
        };
        match format {
            OutputFormat::Csv => self.validate_csv(reader, &mut report)?,
            OutputFormat::Json => self.validate_json(reader, &mut report)?,
        }
        if report.passed() {
            info!("Validation passed: {} rows", report.total_rows);
        } else {
            warn!(
                "Validation found problems: header_matches={}, malformed={}, invalid temporal={:?}, rows {} of {:?} counted",
                report.header_matches,
                report.malformed_rows,
                report.invalid_temporal,
                report.total_rows,
                report.source_rows
            );
        }
        Ok(report)
    }

    fn check_value(&self, index: usize, value: Option<&str>, report: &mut ValidationReport) {
        let name = &self.columns[index];
        let text = match value {
            None | Some("") => {
                *report.empty_values.entry(name.clone()).or_default() += 1;
                return;
            }
            Some(t) => t,
        };
        if let Some((_, fmt)) = self.temporal.iter().find(|(i, _)| *i == index) {
            if fmt.parse(text).is_err() {
                *report.invalid_temporal.entry(name.clone()).or_default() += 1;
            }
        }
    }

    fn validate_csv(&self, reader: Box<dyn Read>, report: &mut ValidationReport) -> Result<()> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = rdr.records();

        report.header_matches = match records.next() {
            Some(header) => {
                let header = header?;
                header.iter().eq(self.columns.iter().map(String::as_str))
            }
            None => false,
        };

        for record in records {
            let record = record?;
            report.total_rows += 1;
            if record.len() != self.columns.len() {
                report.malformed_rows += 1;
                continue;
            }
            for (i, field) in record.iter().enumerate() {
                self.check_value(i, Some(field), report);
            }
        }
        Ok(())
    }

    fn validate_json(&self, reader: Box<dyn Read>, report: &mut ValidationReport) -> Result<()> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        report.header_matches = true;
        de.deserialize_seq(RecordVisitor {
            validator: self,
            report: &mut *report,
        })?;
        de.end()?;
        Ok(())
    }

    fn check_record(&self, record: &Map<String, Value>, report: &mut ValidationReport) {
        report.total_rows += 1;
        let same_keys =
            record.len() == self.columns.len() && self.columns.iter().all(|c| record.contains_key(c));
        if !same_keys {
            report.header_matches = false;
            report.malformed_rows += 1;
            return;
        }
        for (i, name) in self.columns.iter().enumerate() {
            match &record[name] {
                Value::Null => self.check_value(i, None, report),
                Value::String(s) => self.check_value(i, Some(s), report),
                other => self.check_value(i, Some(&other.to_string()), report),
            }
        }
    }
}

/// Streams the top-level array one object at a time.
struct RecordVisitor<'a> {
    validator: &'a ArtifactValidator,
    report: &'a mut ValidationReport,
}

impl<'de> Visitor<'de> for RecordVisitor<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array of objects")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        while let Some(value) = seq.next_element::<Value>()? {
            match value {
                Value::Object(record) => self.validator.check_record(&record, self.report),
                _ => {
                    self.report.total_rows += 1;
                    self.report.malformed_rows += 1;
                }
            }
        }
        Ok(())
    }
}

fn open_artifact(path: &Path) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    let gz = path.extension().map_or(false, |e| e == "gz");
    Ok(if gz {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    })
}

/// Writes `validation.json` into `dir`.
pub fn save_report(report: &ValidationReport, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(VALIDATION_FILE);
    let file = File::create(&path)?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| ExportError::ArtifactError(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Row;
    use crate::infrastructure::sinks::open_sink;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("ID", "NUMBER"),
            ColumnDescriptor::new("CREATED", "TIMESTAMP(6)"),
            ColumnDescriptor::new("SPAN", "INTERVAL DAY(2) TO SECOND(6)"),
        ]
    }

    fn names() -> Vec<String> {
        columns().into_iter().map(|c| c.name).collect()
    }

    fn rows() -> Vec<Row> {
        vec![
            Row::from_values(["1", "2024-03-01 10:00:00.123456", "+01 00:00:00.000000"]),
            Row::new(vec![Some("2".into()), None, None]),
            Row::from_values(["3", "01-MAR-24", "+00 01:00:00.000000"]),
        ]
    }

    fn validator() -> ArtifactValidator {
        ArtifactValidator::new(&columns(), &TemporalFormat::default(), &HashMap::new())
    }

    #[test]
    fn test_validates_compressed_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv.gz");
        let mut sink = open_sink(&path, OutputFormat::Csv, true, names()).unwrap();
        sink.write_rows(&rows()).unwrap();
        sink.finish().unwrap();

        let report = validator().validate(&path, OutputFormat::Csv).unwrap();
        assert_eq!(report.total_rows, 3);
        assert!(report.header_matches);
        assert_eq!(report.malformed_rows, 0);
        assert_eq!(report.empty_values.get("CREATED"), Some(&1));
        assert_eq!(report.invalid_temporal.get("CREATED"), Some(&1));
        // Intervals are not checked against the timestamp layout.
        assert!(!report.invalid_temporal.contains_key("SPAN"));
        assert!(!report.passed());
    }

    #[test]
    fn test_validates_json_and_saves_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let mut sink = open_sink(&path, OutputFormat::Json, false, names()).unwrap();
        sink.write_rows(&rows()[..2]).unwrap();
        sink.finish().unwrap();

        let report = validator().validate(&path, OutputFormat::Json).unwrap();
        assert_eq!(report.total_rows, 2);
        assert!(report.passed());

        let saved = save_report(&report, dir.path()).unwrap();
        let back: Value = serde_json::from_reader(File::open(saved).unwrap()).unwrap();
        assert_eq!(back["total_rows"], 2);
    }

    #[test]
    fn test_row_count_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let mut sink = open_sink(&path, OutputFormat::Json, false, names()).unwrap();
        sink.write_rows(&rows()[..2]).unwrap();
        sink.finish().unwrap();

        let short = validator()
            .with_source_rows(Some(3))
            .validate(&path, OutputFormat::Json)
            .unwrap();
        assert_eq!(short.source_rows, Some(3));
        assert!(!short.passed());

        let exact = validator()
            .with_source_rows(Some(2))
            .validate(&path, OutputFormat::Json)
            .unwrap();
        assert!(exact.passed());
    }

    #[test]
    fn test_json_missing_key_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, r#"[{"ID":"1","CREATED":null}]"#).unwrap();

        let report = validator().validate(&path, OutputFormat::Json).unwrap();
        assert_eq!(report.malformed_rows, 1);
        assert!(!report.header_matches);
    }
}
