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


//! # Oracle Spool Exporter
//!
//! Extracts one Oracle table into a CSV or JSON artifact by driving the
//! `sqlplus` client one bounded batch at a time.
//!
//! This crate follows the **Hexagonal Architecture** (Ports and Adapters):
//! `domain` holds plain data and policies, `ports` the traits the pipeline
//! talks through, `infrastructure` the adapters (subprocess, spool parser,
//! artifact sinks), and `application` the pipeline itself.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;
