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

//! # Retry Policy
//!
//! A client invocation can fail for reasons that go away on their own (the
//! listener restarting, a dropped connection) or for reasons that never will
//! (bad credentials, a missing table). `RetryPolicy` decides which is which
//! and how long to wait in between. It is an immutable value handed to the
//! batch runner, so two jobs never share retry state.

use crate::domain::errors::{ExportError, Result};
use log::{debug, warn};
use std::time::Duration;

/// Failure signatures known to be safe to retry.
pub const DEFAULT_TRANSIENT_SIGNATURES: [&str; 10] = [
    "ORA-03113", // end-of-file on communication channel
    "ORA-03114", // not connected to ORACLE
    "ORA-03135", // connection lost contact
    "ORA-12170", // connect timeout
    "ORA-12541", // no listener
    "ORA-12537", // connection closed
    "ORA-12547", // lost contact
    "ORA-12560", // protocol adapter error
    "ORA-03106", // fatal two-task communication protocol error
    "Connection reset",
];

/// How long to sleep before attempt `n + 1`.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Backoff {
    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exp = attempt.saturating_sub(1) as i32;
                let millis = initial.as_millis() as f64 * multiplier.powi(exp);
                let capped = millis.min(max.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

/// Max attempts, backoff and the retryable-error predicate in one value.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    max_total_wait: Duration,
    transient_signatures: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_secs(5),
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            max_total_wait: Duration::from_secs(120),
            transient_signatures: DEFAULT_TRANSIENT_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        backoff: Backoff,
        max_total_wait: Duration,
        transient_signatures: Vec<String>,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            max_total_wait,
            transient_signatures,
        }
    }

    /// Same policy with a different attempt budget.
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self.clone()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Timeouts and whitelisted client signatures are retryable; nothing else is.
    pub fn is_retryable(&self, error: &ExportError) -> bool {
        match error {
            ExportError::Timeout(_) => true,
            ExportError::ClientError(diagnostic) => self
                .transient_signatures
                .iter()
                .any(|sig| diagnostic.contains(sig.as_str())),
            _ => false,
        }
    }

    /// Runs `op` until it succeeds, fails permanently or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. Every failure that ends the
    /// loop is reported as `ExtractionFailure` carrying the last diagnostic.
    pub fn run<T, F>(&self, target: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut waited = Duration::ZERO;
        let mut attempt = 1;
        loop {
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !self.is_retryable(&err) {
                debug!("{}: non-transient failure on attempt {}", target, attempt);
                return Err(ExportError::ExtractionFailure {
                    target: target.to_string(),
                    attempts: attempt,
                    diagnostic: err.diagnostic(),
                });
            }
            if attempt >= self.max_attempts {
                return Err(ExportError::ExtractionFailure {
                    target: target.to_string(),
                    attempts: attempt,
                    diagnostic: err.diagnostic(),
                });
            }

            let remaining = self.max_total_wait.saturating_sub(waited);
            let delay = self.backoff.delay(attempt).min(remaining);
            warn!(
                "{}: attempt {}/{} failed ({}), retrying in {:?}",
                target,
                attempt,
                self.max_attempts,
                err.diagnostic(),
                delay
            );
            if !delay.is_zero() {
                std::thread::sleep(delay);
                waited += delay;
            }
            attempt += 1;
        }
    }
}
