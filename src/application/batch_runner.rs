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

//! # Batch Runner
//!
//! Executes one query through the client port under the retry policy. Each
//! attempt spools into a fresh temp file; the file of a failed attempt is
//! dropped (and so deleted) before the next attempt starts, and the file of
//! the successful one is handed back as a [`SpoolArtifact`] that deletes
//! itself when the caller is done reading it.

use crate::domain::entities::ExtractionJob;
use crate::domain::errors::Result;
use crate::domain::retry::RetryPolicy;
use crate::ports::client_port::ClientPort;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{Builder, NamedTempFile};

/// Spooled output of one successful invocation. Removed on drop.
#[derive(Debug)]
pub struct SpoolArtifact {
    file: NamedTempFile,
}

impl SpoolArtifact {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Clone)]
pub struct BatchRunner {
    client: Arc<dyn ClientPort>,
    policy: RetryPolicy,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl BatchRunner {
    pub fn new(
        client: Arc<dyn ClientPort>,
        policy: RetryPolicy,
        temp_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            policy,
            temp_dir: temp_dir.into(),
            timeout,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Same client and backoff, with the job's attempt budget, timeout and
    /// scratch directory.
    pub fn for_job(&self, job: &ExtractionJob) -> Self {
        Self {
            client: Arc::clone(&self.client),
            policy: self.policy.with_max_attempts(job.max_retries),
            temp_dir: job.temp_dir.clone(),
            timeout: job.timeout,
        }
    }

    /// Runs `query`, retrying transient failures. `label` names the work in
    /// logs and in the `ExtractionFailure` raised when the budget runs out.
    pub fn run(&self, label: &str, query: &str) -> Result<SpoolArtifact> {
        self.policy.run(label, |attempt| {
            let spool = Builder::new()
                .prefix("spool_")
                .suffix(".txt")
                .tempfile_in(&self.temp_dir)?;
            debug!(
                "{}: attempt {} spooling to {}",
                label,
                attempt,
                spool.path().display()
            );
            self.client.execute(query, spool.path(), self.timeout)?;
            Ok(SpoolArtifact { file: spool })
        })
    }
}
