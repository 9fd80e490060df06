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

//! Configuration: a YAML/JSON file, overridden by command-line flags, checked
//! by [`AppConfig::validate`] before any work starts.

use crate::application::orchestrator::PipelineSettings;
use crate::application::query_builder::Pagination;
use crate::domain::entities::{ExtractionJob, OutputFormat};
use crate::domain::errors::{ExportError, Result};
use crate::domain::retry::{Backoff, RetryPolicy, DEFAULT_TRANSIENT_SIGNATURES};
use crate::domain::spool::SpoolFormat;
use crate::domain::temporal::{TemporalFormat, DEFAULT_TIMESTAMP_FORMAT};
use crate::infrastructure::sqlplus::script::{ScriptSettings, DEFAULT_ARRAY_SIZE};
use crate::infrastructure::sqlplus::ConnectionSettings;
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

pub const PASSWORD_ENV: &str = "ORACLE_PASSWORD";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub format: FormatConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub service: String,
    /// EZConnect string or TNS alias; wins over host/port/service.
    pub connection_string: Option<String>,
    /// Path of the `sqlplus` executable.
    pub client_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            host: String::new(),
            port: 1521,
            service: String::new(),
            connection_string: None,
            client_path: "sqlplus".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn get_connection_string(&self) -> String {
        match &self.connection_string {
            Some(cs) if !cs.trim().is_empty() => cs.trim().to_string(),
            _ => ConnectionSettings::ezconnect(&self.host, self.port, &self.service),
        }
    }

    /// Password from the config or CLI, else from `ORACLE_PASSWORD`.
    pub fn resolve_password(&self) -> Option<String> {
        self.password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: String,
    /// Spool, script and capture files. Defaults to the system temp dir.
    pub temp_dir: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub batch_size: u64,
    /// First row to extract.
    pub offset: u64,
    pub file_format: OutputFormat,
    pub compress: bool,
    pub query_where: Option<String>,
    pub order_by: Option<String>,
    /// Batches fetched concurrently.
    pub parallel: Option<usize>,
    pub cpu_percent: Option<u8>,
    pub preserve_order: bool,
    /// Per client invocation.
    pub timeout_secs: u64,
    pub validate: bool,
    /// `COUNT(*)` the source first, for progress and validation.
    pub count_rows: bool,
    pub pagination: Pagination,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            temp_dir: None,
            schema: None,
            table: None,
            batch_size: 10_000,
            offset: 0,
            file_format: OutputFormat::Csv,
            compress: false,
            query_where: None,
            order_by: None,
            parallel: None,
            cpu_percent: None,
            preserve_order: true,
            timeout_secs: 300,
            validate: false,
            count_rows: false,
            pagination: Pagination::OffsetFetch,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per client invocation, the first one included.
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    pub max_total_wait_secs: u64,
    pub transient_signatures: Option<Vec<String>>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential,
            initial_delay_secs: 5,
            max_delay_secs: 30,
            max_total_wait_secs: 120,
            transient_signatures: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FormatConfig {
    /// Oracle format model for temporal columns; must carry FF3/FF6/FF9.
    pub timestamp_format: String,
    pub null_placeholder: String,
    pub field_delimiter: String,
    pub array_size: u32,
    /// Column name -> Oracle format model used instead of the default.
    pub column_formats: HashMap<String, String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            null_placeholder: SpoolFormat::default().null_sentinel,
            field_delimiter: ",".to_string(),
            array_size: DEFAULT_ARRAY_SIZE,
            column_formats: HashMap::new(),
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    // Overrides for ad-hoc runs
    #[arg(long)]
    pub username: Option<String>,
    /// Prefer ORACLE_PASSWORD; command-line values show up in `ps`.
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub service: Option<String>,
    #[arg(long)]
    pub connect_string: Option<String>,
    #[arg(long)]
    pub client_path: Option<String>,
    #[arg(long)]
    pub schema: Option<String>,
    #[arg(long)]
    pub table: Option<String>,
    #[arg(long)]
    pub batch_size: Option<u64>,
    #[arg(long)]
    pub offset: Option<u64>,
    #[arg(short, long)]
    pub output_dir: Option<String>,
    #[arg(long)]
    pub temp_dir: Option<String>,
    /// csv or json
    #[arg(long)]
    pub format: Option<String>,
    #[arg(long)]
    pub compress: bool,
    #[arg(long = "where")]
    pub query_where: Option<String>,
    #[arg(long)]
    pub order_by: Option<String>,
    #[arg(long)]
    pub workers: Option<usize>,
    /// Seconds per client invocation
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Total attempts per batch
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Re-read the artifact afterwards and write validation.json
    #[arg(long)]
    pub validate: bool,
    /// Count the source rows first and report progress against them
    #[arg(long)]
    pub count_rows: bool,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ExportError::ConfigError(format!("cannot open {}: {}", path, e)))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: AppConfig = if path.ends_with(".json") {
            serde_json::from_str(&contents)
                .map_err(|e| ExportError::ConfigError(format!("{}: {}", path, e)))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| ExportError::ConfigError(format!("{}: {}", path, e)))?
        };

        Ok(config)
    }

    pub fn merge_cli(&mut self, args: &CliArgs) -> Result<()> {
        if let Some(u) = &args.username { self.database.username = u.clone(); }
        if let Some(p) = &args.password { self.database.password = Some(p.clone()); }
        if let Some(h) = &args.host { self.database.host = h.clone(); }
        if let Some(p) = args.port { self.database.port = p; }
        if let Some(s) = &args.service { self.database.service = s.clone(); }
        if let Some(c) = &args.connect_string { self.database.connection_string = Some(c.clone()); }
        if let Some(c) = &args.client_path { self.database.client_path = c.clone(); }
        if let Some(s) = &args.schema { self.export.schema = Some(s.clone()); }
        if let Some(t) = &args.table { self.export.table = Some(t.clone()); }
        if let Some(b) = args.batch_size { self.export.batch_size = b; }
        if let Some(o) = args.offset { self.export.offset = o; }
        if let Some(o) = &args.output_dir { self.export.output_dir = o.clone(); }
        if let Some(t) = &args.temp_dir { self.export.temp_dir = Some(t.clone()); }
        if let Some(f) = &args.format { self.export.file_format = f.parse()?; }
        if args.compress { self.export.compress = true; }
        if let Some(w) = &args.query_where { self.export.query_where = Some(w.clone()); }
        if let Some(o) = &args.order_by { self.export.order_by = Some(o.clone()); }
        if let Some(w) = args.workers { self.export.parallel = Some(w); }
        if let Some(t) = args.timeout { self.export.timeout_secs = t; }
        if let Some(m) = args.max_retries { self.retry.max_attempts = m; }
        if args.validate { self.export.validate = true; }
        if args.count_rows { self.export.count_rows = true; }
        Ok(())
    }

    /// Rejects every setting that would make the run fail later.
    pub fn validate(&self) -> Result<()> {
        let missing = |what: &str| Err(ExportError::ConfigError(format!("{} is required", what)));

        if self.database.username.trim().is_empty() {
            return missing("database username");
        }
        if self.database.resolve_password().is_none() {
            return missing(&format!("database password (config, --password or {})", PASSWORD_ENV));
        }
        let has_cs = self
            .database
            .connection_string
            .as_deref()
            .map_or(false, |c| !c.trim().is_empty());
        if !has_cs && (self.database.host.trim().is_empty() || self.database.service.trim().is_empty()) {
            return missing("connection string or host and service");
        }
        if self.export.schema.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return missing("schema");
        }
        if self.export.table.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return missing("table");
        }
        if self.export.batch_size == 0 {
            return Err(ExportError::ConfigError("batch size must be positive".to_string()));
        }
        if self.export.timeout_secs == 0 {
            return Err(ExportError::ConfigError("timeout must be positive".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ExportError::ConfigError("max retries must be at least 1".to_string()));
        }
        if let Some(p) = self.export.cpu_percent {
            if p == 0 || p > 100 {
                return Err(ExportError::ConfigError(format!("cpu_percent {} is not in 1..=100", p)));
            }
        }
        if !(1..=5000).contains(&self.format.array_size) {
            return Err(ExportError::ConfigError(format!(
                "array size {} is not in 1..=5000",
                self.format.array_size
            )));
        }
        for (column, pattern) in &self.format.column_formats {
            if pattern.contains('\'') || pattern.trim().is_empty() {
                return Err(ExportError::ConfigError(format!(
                    "invalid format for column {}: '{}'",
                    column, pattern
                )));
            }
        }
        self.spool_format()?;
        self.timestamp_format()?;
        Ok(())
    }

    pub fn spool_format(&self) -> Result<SpoolFormat> {
        SpoolFormat::new(&self.format.field_delimiter, &self.format.null_placeholder)
    }

    pub fn timestamp_format(&self) -> Result<TemporalFormat> {
        TemporalFormat::new(&self.format.timestamp_format)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let r = &self.retry;
        let backoff = match r.backoff {
            BackoffKind::Fixed => Backoff::Fixed(Duration::from_secs(r.initial_delay_secs)),
            BackoffKind::Exponential => Backoff::Exponential {
                initial: Duration::from_secs(r.initial_delay_secs),
                max: Duration::from_secs(r.max_delay_secs),
                multiplier: 2.0,
            },
        };
        let signatures = r.transient_signatures.clone().unwrap_or_else(|| {
            DEFAULT_TRANSIENT_SIGNATURES.iter().map(|s| s.to_string()).collect()
        });
        RetryPolicy::new(
            r.max_attempts,
            backoff,
            Duration::from_secs(r.max_total_wait_secs),
            signatures,
        )
    }

    pub fn script_settings(&self) -> Result<ScriptSettings> {
        Ok(ScriptSettings {
            format: self.spool_format()?,
            array_size: self.format.array_size,
        })
    }

    pub fn connection(&self) -> Result<ConnectionSettings> {
        let password = self.database.resolve_password().ok_or_else(|| {
            ExportError::ConfigError(format!("database password is required ({})", PASSWORD_ENV))
        })?;
        Ok(ConnectionSettings {
            username: self.database.username.clone(),
            password,
            connect_identifier: self.database.get_connection_string(),
        })
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.export
            .temp_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            spool_format: self.spool_format()?,
            timestamp_format: self.timestamp_format()?,
            column_formats: self
                .format
                .column_formats
                .iter()
                .map(|(k, v)| (k.to_uppercase(), v.clone()))
                .collect(),
            pagination: self.export.pagination,
            validate: self.export.validate,
            count_rows: self.export.count_rows,
        })
    }

    /// The job described by this configuration. Call `validate` first.
    pub fn to_job(&self) -> Result<ExtractionJob> {
        let required = |v: &Option<String>, what: &str| {
            v.as_deref()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ExportError::ConfigError(format!("{} is required", what)))
        };
        Ok(ExtractionJob {
            schema: required(&self.export.schema, "schema")?,
            table: required(&self.export.table, "table")?,
            predicate: self.export.query_where.clone(),
            order_by: self.export.order_by.clone(),
            start_offset: self.export.offset,
            batch_size: self.export.batch_size,
            output_format: self.export.file_format,
            compress: self.export.compress,
            max_retries: self.retry.max_attempts,
            timeout: Duration::from_secs(self.export.timeout_secs),
            output_dir: PathBuf::from(&self.export.output_dir),
            temp_dir: self.temp_dir(),
            workers: self.export.parallel.unwrap_or(1).max(1),
            preserve_order: self.export.preserve_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{}", text).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml = r#"
database:
  username: "test_user"
  password: "test_password"
  host: "localhost"
  port: 1521
  service: "ORCL"
export:
  output_dir: "./output"
  schema: "hr"
  table: "employees"
  batch_size: 500
  file_format: json
  compress: true
  order_by: "EMPLOYEE_ID"
  parallel: 4
retry:
  max_attempts: 5
  backoff: fixed
  initial_delay_secs: 2
format:
  timestamp_format: "YYYY-MM-DD\"T\"HH24:MI:SS.FF3"
  field_delimiter: "|"
  column_formats:
    hire_date: "YYYY-MM-DD"
"#;
        let file = write_config(".yaml", yaml);
        let config = AppConfig::from_file(file.path().to_str().unwrap()).expect("Failed to parse config");
        config.validate().unwrap();

        assert_eq!(config.database.username, "test_user");
        assert_eq!(config.database.get_connection_string(), "//localhost:1521/ORCL");
        assert_eq!(config.format.array_size, DEFAULT_ARRAY_SIZE);

        let job = config.to_job().unwrap();
        assert_eq!(job.schema, "HR");
        assert_eq!(job.table, "EMPLOYEES");
        assert_eq!(job.batch_size, 500);
        assert_eq!(job.output_format, OutputFormat::Json);
        assert!(job.compress);
        assert_eq!(job.workers, 4);
        assert_eq!(job.max_retries, 5);
        assert!(job.artifact_path().ends_with("HR/EMPLOYEES/HR_EMPLOYEES_full.json.gz"));

        assert_eq!(config.retry_policy().max_attempts(), 5);
        assert_eq!(config.spool_format().unwrap().delimiter, b'|');
        let settings = config.pipeline_settings().unwrap();
        assert_eq!(settings.column_formats.get("HIRE_DATE").map(String::as_str), Some("YYYY-MM-DD"));
        assert_eq!(settings.timestamp_format.chrono_pattern(), "%Y-%m-%dT%H:%M:%S.%3f");
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = write_config(
            ".json",
            r#"{"database": {"username": "u", "password": "p", "connection_string": "PRODDB"},
                "export": {"schema": "S", "table": "T", "batch_size": 10}}"#,
        );
        let mut config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();
        let args = CliArgs {
            batch_size: Some(250),
            format: Some("json".into()),
            query_where: Some("STATUS = 'A'".into()),
            max_retries: Some(7),
            validate: true,
            count_rows: true,
            ..CliArgs::default()
        };
        config.merge_cli(&args).unwrap();
        config.validate().unwrap();

        assert_eq!(config.database.get_connection_string(), "PRODDB");
        let job = config.to_job().unwrap();
        assert_eq!(job.batch_size, 250);
        assert_eq!(job.output_format, OutputFormat::Json);
        assert_eq!(job.predicate.as_deref(), Some("STATUS = 'A'"));
        assert_eq!(job.max_retries, 7);
        assert_eq!(job.workers, 1);
        assert!(config.export.validate);
        assert!(config.pipeline_settings().unwrap().count_rows);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.database.username = "u".into();
        config.database.password = Some("p".into());
        config.database.host = "h".into();
        config.database.service = "s".into();
        config.export.schema = Some("S".into());
        config.export.table = Some("T".into());
        config.validate().unwrap();

        let mut bad = config.clone();
        bad.export.table = Some(" ".into());
        assert!(matches!(bad.validate(), Err(ExportError::ConfigError(_))));

        let mut bad = config.clone();
        bad.format.timestamp_format = "YYYY-MM-DD".into();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.format.field_delimiter = "||".into();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.export.batch_size = 0;
        assert!(bad.validate().is_err());

        let mut bad = config;
        let args = CliArgs {
            format: Some("parquet".into()),
            ..CliArgs::default()
        };
        assert!(bad.merge_cli(&args).is_err());
    }
}
