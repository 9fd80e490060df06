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

//! # Metadata Port
//!
//! In Hexagonal Architecture, a **Port** is like a "Slot" or a "Contract".
//!
//! This Port defines what it means to "resolve columns" of a table. It
//! doesn't care whether the answer comes from a `sqlplus` catalog query, a
//! cache, or a mock in a test.

use crate::domain::entities::ColumnDescriptor;
use crate::domain::errors::Result;

/// `MetadataPort` is a **Trait**. Think of it as an Interface.
///
/// `Send + Sync` because the orchestrator shares it across worker threads.
pub trait MetadataPort: Send + Sync {
    /// Returns the columns of `schema.table` in declaration order.
    ///
    /// Fails with `ExportError::MetadataError` when the table does not exist,
    /// is not visible to the caller, or the database cannot be reached.
    fn resolve_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>>;
}
