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

//! Port for appending rows to the output artifact.

use crate::domain::entities::Row;
use crate::domain::errors::Result;
use std::path::PathBuf;

/// What a finished artifact looks like on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStats {
    pub path: PathBuf,
    pub rows: u64,
    pub bytes: u64,
}

/// A sink owns its artifact from open to `finish`.
///
/// Framing (CSV header, JSON brackets) is the sink's business; callers only
/// append rows and close once.
pub trait RowSink {
    /// Appends rows; returns how many were written.
    fn write_rows(&mut self, rows: &[Row]) -> Result<u64>;

    /// Writes trailing framing, flushes and closes the artifact.
    fn finish(self: Box<Self>) -> Result<ArtifactStats>;
}
