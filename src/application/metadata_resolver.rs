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

//! # Metadata Resolver
//!
//! Reads column names and declared types from `ALL_TAB_COLUMNS` through the
//! same client, runner and parser the batches use. [`CachedMetadata`] keeps
//! the first answer for each table so the column layout cannot drift while a
//! job is running.

use super::batch_runner::BatchRunner;
use super::query_builder::quote_literal;
use crate::domain::entities::ColumnDescriptor;
use crate::domain::errors::{ExportError, Result};
use crate::domain::retry::RetryPolicy;
use crate::domain::spool::SpoolFormat;
use crate::infrastructure::spool::RowParser;
use crate::ports::metadata_port::MetadataPort;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const CATALOG_COLUMNS: [&str; 2] = ["COLUMN_NAME", "DATA_TYPE"];

/// Client signatures that mean "this table is not there for you".
const NOT_ACCESSIBLE: [(&str, &str); 3] = [
    ("ORA-00942", "table or view does not exist"),
    ("ORA-01031", "insufficient privileges"),
    ("ORA-01017", "invalid username/password"),
];

pub struct MetadataResolver {
    runner: BatchRunner,
    format: SpoolFormat,
}

impl MetadataResolver {
    pub fn new(runner: BatchRunner, format: SpoolFormat) -> Self {
        Self { runner, format }
    }

    pub fn catalog_query(schema: &str, table: &str) -> String {
        format!(
            "SELECT COLUMN_NAME, DATA_TYPE FROM ALL_TAB_COLUMNS WHERE OWNER = {} AND TABLE_NAME = {} ORDER BY COLUMN_ID",
            quote_literal(&schema.to_uppercase()),
            quote_literal(&table.to_uppercase())
        )
    }
}

impl MetadataPort for MetadataResolver {
    fn resolve_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let target = format!("{}.{}", schema, table);
        info!("Resolving columns of {}", target);

        let spool = self
            .runner
            .run(&format!("{} metadata", target), &Self::catalog_query(schema, table))
            .map_err(|e| metadata_error(&target, self.runner.policy(), e))?;

        let parser = RowParser::with_header(
            self.format.clone(),
            CATALOG_COLUMNS.iter().map(|c| c.to_string()).collect(),
        );
        let mut columns = Vec::new();
        for row in parser.open(spool.path())? {
            let mut fields = row?.fields.into_iter();
            match (fields.next().flatten(), fields.next().flatten()) {
                (Some(name), Some(declared_type)) => {
                    columns.push(ColumnDescriptor::new(name, declared_type))
                }
                _ => debug!("{}: skipping catalog row without name or type", target),
            }
        }

        if columns.is_empty() {
            return Err(ExportError::MetadataError(format!(
                "{}: no columns visible (table missing or no privilege)",
                target
            )));
        }
        info!(
            "{}: {} columns ({} temporal)",
            target,
            columns.len(),
            columns.iter().filter(|c| c.is_temporal).count()
        );
        Ok(columns)
    }
}

/// "Unreachable" is reserved for failures the policy retried or would retry.
fn metadata_error(target: &str, policy: &RetryPolicy, err: ExportError) -> ExportError {
    match err {
        ExportError::ExtractionFailure {
            attempts,
            diagnostic,
            ..
        } => {
            let retried = attempts > 1
                || policy.is_retryable(&ExportError::ClientError(diagnostic.clone()));
            let reason = match NOT_ACCESSIBLE.iter().find(|(code, _)| diagnostic.contains(code)) {
                Some((code, text)) => format!("{} {}", code, text),
                None if retried => format!("client unreachable after {} attempt(s)", attempts),
                None => "catalog query failed".to_string(),
            };
            ExportError::MetadataError(format!("{}: {} ({})", target, reason, diagnostic))
        }
        other => other,
    }
}

/// Memoising wrapper owned by one job's context.
pub struct CachedMetadata {
    inner: Arc<dyn MetadataPort>,
    cache: Mutex<HashMap<(String, String), Vec<ColumnDescriptor>>>,
}

impl CachedMetadata {
    pub fn new(inner: Arc<dyn MetadataPort>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Forgets a table so the next resolution asks the database again.
    pub fn invalidate(&self, schema: &str, table: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&key(schema, table));
        }
    }
}

fn key(schema: &str, table: &str) -> (String, String) {
    (schema.to_uppercase(), table.to_uppercase())
}

impl MetadataPort for CachedMetadata {
    fn resolve_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let key = key(schema, table);
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| ExportError::MetadataError("metadata cache poisoned".to_string()))?;
        if let Some(columns) = cache.get(&key) {
            debug!("Metadata cache hit for {}.{}", key.0, key.1);
            return Ok(columns.clone());
        }
        let columns = self.inner.resolve_columns(schema, table)?;
        cache.insert(key, columns.clone());
        Ok(columns)
    }
}
