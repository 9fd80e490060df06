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

//! End-to-end runs against a shell script standing in for `sqlplus`.

#![cfg(unix)]

use oracle_spool_exporter::application::runtime::RuntimeContext;
use oracle_spool_exporter::config::{AppConfig, BackoffKind};
use oracle_spool_exporter::domain::entities::OutputFormat;
use oracle_spool_exporter::domain::errors::ExportError;
use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Serves a `total`-row table (ID, CREATED) and the catalog query. Every
/// invocation appends a line to `counter`.
fn table_client(dir: &Path, total: u64, counter: &Path) -> PathBuf {
    let body = format!(
        r#"echo call >> '{counter}'
script="${{4#@}}"
spool=$(sed -n 's/^SPOOL "\(.*\)"$/\1/p' "$script")
query=$(grep '^SELECT' "$script")
case "$query" in
  *ALL_TAB_COLUMNS*)
    printf '"ID","NUMBER"\n"CREATED","TIMESTAMP(6)"\n' > "$spool"
    exit 0;;
esac
offset=$(echo "$query" | sed -n 's/.* OFFSET \([0-9]*\) ROWS.*/\1/p')
limit=$(echo "$query" | sed -n 's/.* FETCH NEXT \([0-9]*\) ROWS.*/\1/p')
end=$((offset + limit))
[ "$end" -gt {total} ] && end={total}
i=$offset
: > "$spool"
while [ "$i" -lt "$end" ]; do
  printf '"%s","2024-01-01 00:00:00.%06d"\n' "$i" "$i" >> "$spool"
  i=$((i + 1))
done
exit 0"#,
        counter = counter.display(),
        total = total
    );
    write_client(dir, &body)
}

/// Always fails with `diagnostic` on stdout and exit code 1.
fn failing_client(dir: &Path, diagnostic: &str, counter: &Path) -> PathBuf {
    let body = format!(
        "echo call >> '{}'\necho 'ERROR:'\necho '{}'\nexit 1",
        counter.display(),
        diagnostic
    );
    write_client(dir, &body)
}

/// Never answers: replaces itself with a long sleep.
fn hanging_client(dir: &Path, counter: &Path) -> PathBuf {
    let body = format!("echo call >> '{}'\nexec sleep 30", counter.display());
    write_client(dir, &body)
}

fn write_client(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("sqlplus");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(root: &Path, client: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.username = "scott".into();
    config.database.password = Some("tiger".into());
    config.database.connection_string = Some("//db:1521/ORCL".into());
    config.database.client_path = client.display().to_string();
    config.export.schema = Some("hr".into());
    config.export.table = Some("events".into());
    config.export.order_by = Some("ID".into());
    config.export.output_dir = root.join("out").display().to_string();
    config.export.temp_dir = Some(root.join("tmp").display().to_string());
    config.export.timeout_secs = 30;
    config.retry.backoff = BackoffKind::Fixed;
    config.retry.initial_delay_secs = 0;
    config
}

fn calls(counter: &Path) -> usize {
    fs::read_to_string(counter).map(|s| s.lines().count()).unwrap_or(0)
}

fn temp_entries(root: &Path) -> usize {
    fs::read_dir(root.join("tmp")).unwrap().count()
}

#[test]
fn test_extracts_table_through_subprocess() {
    let root = tempfile::tempdir().unwrap();
    let counter = root.path().join("calls.log");
    let client = table_client(root.path(), 23, &counter);

    let mut config = config(root.path(), &client);
    config.export.batch_size = 5;
    config.export.file_format = OutputFormat::Json;
    config.export.validate = true;
    config.validate().unwrap();

    let job = config.to_job().unwrap();
    let ctx = RuntimeContext::init(&config).unwrap();
    let summary = ctx.orchestrator.run(&job).unwrap();

    assert_eq!(summary.rows, 23);
    assert_eq!(summary.batches, 5);
    // One catalog lookup plus five batches.
    assert_eq!(calls(&counter), 6);

    let records: Vec<Value> =
        serde_json::from_reader(fs::File::open(job.artifact_path()).unwrap()).unwrap();
    assert_eq!(records.len(), 23);
    assert_eq!(records[7]["ID"], "7");
    assert_eq!(records[7]["CREATED"], "2024-01-01 00:00:00.000007");

    let validation: Value = serde_json::from_reader(
        fs::File::open(job.table_dir().join("validation.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(validation["total_rows"], 23);
    assert!(validation["invalid_temporal"].as_object().unwrap().is_empty());

    assert_eq!(temp_entries(root.path()), 0);
}

#[test]
fn test_transient_failure_uses_whole_retry_budget() {
    let root = tempfile::tempdir().unwrap();
    let counter = root.path().join("calls.log");
    let client = failing_client(root.path(), "ORA-12541: TNS:no listener", &counter);

    let mut config = config(root.path(), &client);
    config.retry.max_attempts = 3;
    let job = config.to_job().unwrap();
    let ctx = RuntimeContext::init(&config).unwrap();

    match ctx.orchestrator.run(&job) {
        Err(ExportError::MetadataError(msg)) => {
            assert!(msg.contains("ORA-12541"));
            assert!(!msg.contains("tiger"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(calls(&counter), 3);
    assert_eq!(temp_entries(root.path()), 0);
}

#[test]
fn test_bad_credentials_fail_fast() {
    let root = tempfile::tempdir().unwrap();
    let counter = root.path().join("calls.log");
    let client = failing_client(
        root.path(),
        "ORA-01017: invalid username/password; logon denied",
        &counter,
    );

    let mut config = config(root.path(), &client);
    config.retry.max_attempts = 5;
    let job = config.to_job().unwrap();
    let ctx = RuntimeContext::init(&config).unwrap();

    assert!(matches!(
        ctx.orchestrator.run(&job),
        Err(ExportError::MetadataError(_))
    ));
    assert_eq!(calls(&counter), 1);
    assert_eq!(temp_entries(root.path()), 0);
}

#[test]
fn test_hanging_client_is_killed_and_cleaned_up() {
    let root = tempfile::tempdir().unwrap();
    let counter = root.path().join("calls.log");
    let client = hanging_client(root.path(), &counter);

    let mut config = config(root.path(), &client);
    config.export.timeout_secs = 1;
    config.retry.max_attempts = 2;
    let job = config.to_job().unwrap();
    let ctx = RuntimeContext::init(&config).unwrap();

    let started = std::time::Instant::now();
    match ctx.orchestrator.run(&job) {
        Err(ExportError::MetadataError(msg)) => {
            assert!(msg.contains("unreachable after 2 attempt(s)"));
            assert!(msg.contains("timed out"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(started.elapsed() < std::time::Duration::from_secs(20));
    assert_eq!(calls(&counter), 2);
    assert_eq!(temp_entries(root.path()), 0);
}
