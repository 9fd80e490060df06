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

//! Core error definitions for the spool exporter.
//!
//! This module provides a centralized `ExportError` enum and a `Result` type
//! used throughout the application. Malformed rows are deliberately absent:
//! they are counted by the row parser and reported in the job summary, never
//! raised.

use std::time::Duration;
use thiserror::Error;

/// Error types encountered during an extraction job.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Missing or invalid configuration. Raised before any extraction work.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The table or its columns could not be resolved.
    #[error("Metadata discovery failed: {0}")]
    MetadataError(String),

    /// A client invocation kept failing until the retry budget ran out, or
    /// failed with a non-transient signature.
    #[error("Extraction failed for {target} after {attempts} attempt(s): {diagnostic}")]
    ExtractionFailure {
        target: String,
        attempts: u32,
        diagnostic: String,
    },

    /// A single client invocation failed. Carries the client's diagnostic text.
    #[error("Client invocation failed: {0}")]
    ClientError(String),

    /// A single client invocation exceeded its wall-clock budget.
    #[error("Client invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Artifact generation failed: {0}")]
    ArtifactError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExportError {
    /// The text a caller should see when this error ends a retry loop.
    pub fn diagnostic(&self) -> String {
        match self {
            ExportError::ClientError(d) => d.clone(),
            ExportError::ExtractionFailure { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::ArtifactError(e.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::ArtifactError(e.to_string())
    }
}

/// A specialized Result type for the spool exporter.
pub type Result<T> = std::result::Result<T, ExportError>;
