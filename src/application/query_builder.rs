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

//! # Query Builder
//!
//! Turns the resolved column list into the paginated `SELECT` that one batch
//! runs. Temporal columns are converted to text on the server with a format
//! that keeps sub-second precision, so every batch renders them identically.
//!
//! Predicate and ORDER BY text come from the operator and are appended
//! verbatim. Paging is only stable when the ORDER BY is deterministic; without
//! one the builder reports [`PageOrdering::Unstable`] and makes no promise
//! about which rows land in which batch.

use crate::domain::entities::{ColumnDescriptor, ExtractionJob, TemporalKind};
use crate::domain::temporal::TemporalFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a batch window is expressed in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pagination {
    /// `OFFSET n ROWS FETCH NEXT b ROWS ONLY` (12c and later).
    #[default]
    OffsetFetch,
    /// Nested `ROWNUM` filter for older servers.
    RowNum,
}

/// Whether consecutive batches see one consistent row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrdering {
    /// An ORDER BY was supplied.
    Stable,
    /// No ORDER BY: rows may be duplicated or skipped across batch boundaries.
    Unstable,
}

const ROWNUM_ALIAS: &str = "RN__";

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    source: String,
    projections: Vec<String>,
    column_list: String,
    predicate: Option<String>,
    order_by: Option<String>,
    pagination: Pagination,
}

impl QueryBuilder {
    pub fn new(
        job: &ExtractionJob,
        columns: &[ColumnDescriptor],
        timestamp_format: &TemporalFormat,
        column_formats: &HashMap<String, String>,
        pagination: Pagination,
    ) -> Self {
        let projections = columns
            .iter()
            .map(|c| project(c, timestamp_format, column_formats))
            .collect();
        let column_list = columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            source: format!(
                "{}.{}",
                quote_identifier(&job.schema),
                quote_identifier(&job.table)
            ),
            projections,
            column_list,
            predicate: non_blank(job.predicate.as_deref()),
            order_by: non_blank(job.order_by.as_deref()),
            pagination,
        }
    }

    pub fn ordering(&self) -> PageOrdering {
        if self.order_by.is_some() {
            PageOrdering::Stable
        } else {
            PageOrdering::Unstable
        }
    }

    /// Statement for the rows `[offset, offset + limit)`.
    pub fn build(&self, offset: u64, limit: u64) -> String {
        let base = self.base_select();
        match self.pagination {
            Pagination::OffsetFetch => format!(
                "{} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                base, offset, limit
            ),
            Pagination::RowNum => format!(
                "SELECT {cols} FROM (SELECT q.*, ROWNUM {rn} FROM ({base}) q WHERE ROWNUM <= {upper}) WHERE {rn} > {offset}",
                cols = self.column_list,
                rn = ROWNUM_ALIAS,
                base = base,
                upper = offset + limit,
                offset = offset,
            ),
        }
    }

    /// Row count over the same source and predicate the batches read.
    pub fn count_query(&self) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.source);
        if let Some(p) = &self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(p);
        }
        sql
    }

    fn base_select(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.projections.join(", "), self.source);
        if let Some(p) = &self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(p);
        }
        if let Some(o) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(o);
        }
        sql
    }
}

fn project(
    column: &ColumnDescriptor,
    timestamp_format: &TemporalFormat,
    column_formats: &HashMap<String, String>,
) -> String {
    let ident = quote_identifier(&column.name);

    if let Some(fmt) = column_formats.get(&column.name.to_uppercase()) {
        return format!("TO_CHAR({}, {}) AS {}", ident, quote_literal(fmt), ident);
    }

    let fmt = quote_literal(timestamp_format.oracle_pattern());
    match column.temporal_kind() {
        None => ident,
        // DATE has no fractional seconds, so widen it first.
        Some(TemporalKind::Date) => {
            format!("TO_CHAR(CAST({} AS TIMESTAMP), {}) AS {}", ident, fmt, ident)
        }
        Some(TemporalKind::Timestamp) => format!("TO_CHAR({}, {}) AS {}", ident, fmt, ident),
        Some(TemporalKind::TimestampTz) => {
            format!("TO_CHAR(SYS_EXTRACT_UTC({}), {}) AS {}", ident, fmt, ident)
        }
        // No format model exists for intervals.
        Some(TemporalKind::Interval) => format!("TO_CHAR({}) AS {}", ident, ident),
    }
}

/// `"NAME"`, with embedded double quotes doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `'text'`, with embedded single quotes doubled.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::OutputFormat;
    use std::path::PathBuf;
    use std::time::Duration;

    fn job(predicate: Option<&str>, order_by: Option<&str>) -> ExtractionJob {
        ExtractionJob {
            schema: "HR".into(),
            table: "EMPLOYEES".into(),
            predicate: predicate.map(String::from),
            order_by: order_by.map(String::from),
            start_offset: 0,
            batch_size: 100,
            output_format: OutputFormat::Csv,
            compress: false,
            max_retries: 3,
            timeout: Duration::from_secs(60),
            output_dir: PathBuf::from("out"),
            temp_dir: PathBuf::from("tmp"),
            workers: 1,
            preserve_order: true,
        }
    }

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("ID", "NUMBER"),
            ColumnDescriptor::new("HIRED", "DATE"),
            ColumnDescriptor::new("UPDATED", "TIMESTAMP(6)"),
            ColumnDescriptor::new("SEEN", "TIMESTAMP(6) WITH TIME ZONE"),
            ColumnDescriptor::new("TENURE", "INTERVAL YEAR(2) TO MONTH"),
        ]
    }

    fn builder(job: &ExtractionJob, pagination: Pagination) -> QueryBuilder {
        QueryBuilder::new(
            job,
            &columns(),
            &TemporalFormat::default(),
            &HashMap::new(),
            pagination,
        )
    }

    #[test]
    fn test_projection_and_offset_fetch() {
        let j = job(Some("DEPT_ID = 10"), Some("ID"));
        let sql = builder(&j, Pagination::OffsetFetch).build(200, 100);
        assert_eq!(
            sql,
            "SELECT \"ID\", \
             TO_CHAR(CAST(\"HIRED\" AS TIMESTAMP), 'YYYY-MM-DD HH24:MI:SS.FF6') AS \"HIRED\", \
             TO_CHAR(\"UPDATED\", 'YYYY-MM-DD HH24:MI:SS.FF6') AS \"UPDATED\", \
             TO_CHAR(SYS_EXTRACT_UTC(\"SEEN\"), 'YYYY-MM-DD HH24:MI:SS.FF6') AS \"SEEN\", \
             TO_CHAR(\"TENURE\") AS \"TENURE\" \
             FROM \"HR\".\"EMPLOYEES\" WHERE DEPT_ID = 10 ORDER BY ID \
             OFFSET 200 ROWS FETCH NEXT 100 ROWS ONLY"
        );
    }

    #[test]
    fn test_rownum_window() {
        let j = job(None, Some("ID"));
        let sql = builder(&j, Pagination::RowNum).build(200, 100);
        assert!(sql.starts_with(
            "SELECT \"ID\", \"HIRED\", \"UPDATED\", \"SEEN\", \"TENURE\" FROM (SELECT q.*, ROWNUM RN__ FROM (SELECT \"ID\","
        ));
        assert!(sql.contains("ORDER BY ID) q WHERE ROWNUM <= 300) WHERE RN__ > 200"));
    }

    #[test]
    fn test_count_query_shares_predicate() {
        let j = job(Some("DEPT_ID = 10"), Some("ID"));
        assert_eq!(
            builder(&j, Pagination::RowNum).count_query(),
            "SELECT COUNT(*) FROM \"HR\".\"EMPLOYEES\" WHERE DEPT_ID = 10"
        );
        let all = job(None, None);
        assert_eq!(
            builder(&all, Pagination::OffsetFetch).count_query(),
            "SELECT COUNT(*) FROM \"HR\".\"EMPLOYEES\""
        );
    }

    #[test]
    fn test_unordered_paging_makes_no_ordering_guarantee() {
        let j = job(None, Some("   "));
        let b = builder(&j, Pagination::OffsetFetch);
        assert_eq!(b.ordering(), PageOrdering::Unstable);
        // Consecutive windows are built without any implicit ORDER BY, so the
        // server is free to return rows in a different order per batch.
        for offset in [0, 100, 200] {
            assert!(!b.build(offset, 100).contains("ORDER BY"));
        }

        let ordered = job(None, Some("ID, HIRED"));
        assert_eq!(builder(&ordered, Pagination::OffsetFetch).ordering(), PageOrdering::Stable);
    }

    #[test]
    fn test_column_format_override_and_quoting() {
        let mut overrides = HashMap::new();
        overrides.insert("HIRED".to_string(), "YYYY-MM-DD\"T\"HH24:MI:SS".to_string());
        overrides.insert("AMOUNT".to_string(), "FM999G990D00".to_string());
        let cols = vec![
            ColumnDescriptor::new("HIRED", "DATE"),
            ColumnDescriptor::new("AMOUNT", "NUMBER(10,2)"),
            ColumnDescriptor::new("we\"ird", "VARCHAR2(10)"),
        ];
        let b = QueryBuilder::new(
            &job(None, Some("1")),
            &cols,
            &TemporalFormat::default(),
            &overrides,
            Pagination::OffsetFetch,
        );
        let sql = b.build(0, 10);
        assert!(sql.contains("TO_CHAR(\"HIRED\", 'YYYY-MM-DD\"T\"HH24:MI:SS') AS \"HIRED\""));
        assert!(sql.contains("TO_CHAR(\"AMOUNT\", 'FM999G990D00') AS \"AMOUNT\""));
        assert!(sql.contains("\"we\"\"ird\""));
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
