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

use super::process::{run_with_timeout, ProcessOutput};
use super::script::{render_script, ScriptSettings};
use crate::domain::errors::{ExportError, Result};
use crate::ports::client_port::ClientPort;
use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tempfile::Builder;

/// Lines that mark a failed invocation even when the exit code is zero.
const ERROR_PREFIXES: [&str; 3] = ["ORA-", "SP2-", "TNS-"];

/// Diagnostic lines kept in an error message.
const MAX_DIAGNOSTIC_LINES: usize = 8;

/// Where and as whom the client logs on.
#[derive(Clone)]
pub struct ConnectionSettings {
    pub username: String,
    pub password: String,
    /// EZConnect (`//host:port/service`) or a TNS alias.
    pub connect_identifier: String,
}

impl ConnectionSettings {
    pub fn ezconnect(host: &str, port: u16, service: &str) -> String {
        format!("//{}:{}/{}", host, port, service)
    }

    fn logon(&self) -> String {
        format!("{}/{}@{}", self.username, self.password, self.connect_identifier)
    }

    fn redacted_logon(&self) -> String {
        format!("{}/********@{}", self.username, self.connect_identifier)
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted_logon())
    }
}

/// `ClientPort` backed by the `sqlplus` executable.
pub struct SqlPlusClient {
    client_path: PathBuf,
    connection: ConnectionSettings,
    settings: ScriptSettings,
    temp_dir: PathBuf,
}

impl SqlPlusClient {
    pub fn new(
        client_path: impl Into<PathBuf>,
        connection: ConnectionSettings,
        settings: ScriptSettings,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client_path: client_path.into(),
            connection,
            settings,
            temp_dir: temp_dir.into(),
        }
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = Command::new(&self.client_path);
        cmd.arg("-S")
            .arg("-L")
            .arg(self.connection.logon())
            .arg(format!("@{}", script.display()));
        cmd
    }
}

impl ClientPort for SqlPlusClient {
    fn execute(&self, query: &str, spool_path: &Path, timeout: Duration) -> Result<()> {
        // Removed when this guard drops, on every exit path.
        let mut script = Builder::new()
            .prefix("extract_")
            .suffix(".sql")
            .tempfile_in(&self.temp_dir)?;
        script.write_all(render_script(&self.settings, query, spool_path).as_bytes())?;
        script.flush()?;

        debug!(
            "Running {} -S -L {} @{}",
            self.client_path.display(),
            self.connection.redacted_logon(),
            script.path().display()
        );
        let started = Instant::now();
        let output = run_with_timeout(self.command(script.path()), timeout, &self.temp_dir)?;
        check_output(&output, spool_path)?;
        info!(
            "Client finished in {:.2}s -> {}",
            started.elapsed().as_secs_f64(),
            spool_path.display()
        );
        Ok(())
    }
}

/// Turns a finished invocation into `Ok` or a `ClientError` carrying the
/// client's own error lines.
fn check_output(output: &ProcessOutput, spool_path: &Path) -> Result<()> {
    // With TERMOUT OFF the error text may only have reached the spool.
    let spooled = if output.status.success() {
        String::new()
    } else {
        std::fs::read(spool_path)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    };
    let mut diagnostics: Vec<&str> = output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .chain(spooled.lines())
        .map(str::trim)
        .filter(|l| ERROR_PREFIXES.iter().any(|p| l.starts_with(p)))
        .collect();

    if !output.status.success() || !diagnostics.is_empty() {
        if diagnostics.is_empty() {
            diagnostics = output
                .stderr
                .lines()
                .chain(output.stdout.lines())
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
        }
        diagnostics.truncate(MAX_DIAGNOSTIC_LINES);
        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        return Err(ExportError::ClientError(if diagnostics.is_empty() {
            status
        } else {
            format!("{}: {}", status, diagnostics.join(" | "))
        }));
    }

    if !spool_path.exists() {
        return Err(ExportError::ClientError(format!(
            "client exited cleanly but produced no spool at {}",
            spool_path.display()
        )));
    }
    Ok(())
}
