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

//! # Client Port
//!
//! This Port defines the contract for the "Query Runner".
//!
//! Anything that implements `ClientPort` must be able to take one SQL
//! statement, run it to completion within a time budget, and leave the rows
//! as delimited text in the file it was given.

use crate::domain::errors::Result;
use std::path::Path;
use std::time::Duration;

/// `ClientPort` runs one statement per call.
pub trait ClientPort: Send + Sync {
    /// Executes `query` and spools its rows into `spool_path`.
    ///
    /// Implementations must return:
    /// - `ExportError::Timeout` when `timeout` elapses (the invocation is killed),
    /// - `ExportError::ClientError` with the client's diagnostic text on failure.
    ///
    /// Any scratch files the implementation creates are its own to remove.
    fn execute(&self, query: &str, spool_path: &Path, timeout: Duration) -> Result<()>;
}
