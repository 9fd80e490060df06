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

//! Subprocess execution with a wall-clock deadline.
//!
//! stdout and stderr go to anonymous temp files rather than pipes, so a
//! chatty client can never block on a full pipe while we wait for it, and
//! nothing is left on disk once the handles drop.

use crate::domain::errors::{ExportError, Result};
use log::warn;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit status plus whatever the process printed.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `command` to completion or kills it once `timeout` has elapsed.
///
/// Capture files are created in `scratch_dir`.
pub fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
    scratch_dir: &Path,
) -> Result<ProcessOutput> {
    let mut stdout_file = tempfile::tempfile_in(scratch_dir)?;
    let mut stderr_file = tempfile::tempfile_in(scratch_dir)?;

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone()?))
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        let now = Instant::now();
        if now >= deadline {
            warn!("Killing client process {} after {:?}", child.id(), timeout);
            // The process may have exited between try_wait and kill.
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExportError::Timeout(timeout));
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    };

    Ok(ProcessOutput {
        status,
        stdout: read_capture(&mut stdout_file)?,
        stderr: read_capture(&mut stderr_file)?,
    })
}

fn read_capture(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
