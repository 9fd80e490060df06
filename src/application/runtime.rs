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

//! # Runtime Context
//!
//! This module acts as the "Engine Room" of the application. It sets up the
//! resources that live for the whole run:
//! 1. **Thread Pool**: the `rayon` global pool that parallel batch waves run on.
//! 2. **Client**: the `sqlplus` adapter, shared by the metadata lookup and
//!    every batch.
//! 3. **Metadata cache**: one per run, so a table is described exactly once.

use super::batch_runner::BatchRunner;
use super::metadata_resolver::{CachedMetadata, MetadataResolver};
use super::orchestrator::ExtractionOrchestrator;
use crate::config::AppConfig;
use crate::domain::errors::Result;
use crate::infrastructure::sqlplus::SqlPlusClient;
use crate::ports::client_port::ClientPort;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Default share of the host's cores when no worker count is configured.
const DEFAULT_CPU_PERCENT: u8 = 50;

/// `RuntimeContext` holds shared resources that exist for the entire life of the app.
pub struct RuntimeContext {
    pub orchestrator: ExtractionOrchestrator,
    /// Size of the rayon pool.
    pub num_threads: usize,
}

impl RuntimeContext {
    /// Initializes the global thread pool and wires the adapters together.
    pub fn init(config: &AppConfig) -> Result<Self> {
        let num_threads = pool_size(
            config.export.parallel,
            config.export.cpu_percent,
            num_cpus::get(),
        );
        info!(
            "Initializing worker pool with {} threads (Target CPU: {}%)",
            num_threads,
            config.export.cpu_percent.unwrap_or(DEFAULT_CPU_PERCENT)
        );

        // Rayon's global pool is what `into_par_iter()` in the orchestrator uses.
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .unwrap_or_else(|e| {
                info!("Global thread pool already initialized (likely in a test): {}", e);
            });

        let connection = config.connection()?;
        info!(
            "Using {} as {:?}",
            config.database.client_path, connection
        );
        let temp_dir = config.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        let client: Arc<dyn ClientPort> = Arc::new(SqlPlusClient::new(
            &config.database.client_path,
            connection,
            config.script_settings()?,
            &temp_dir,
        ));
        let runner = BatchRunner::new(
            client,
            config.retry_policy(),
            &temp_dir,
            Duration::from_secs(config.export.timeout_secs),
        );
        let resolver = MetadataResolver::new(runner.clone(), config.spool_format()?);
        let metadata = Arc::new(CachedMetadata::new(Arc::new(resolver)));

        Ok(Self {
            orchestrator: ExtractionOrchestrator::new(metadata, runner, config.pipeline_settings()?),
            num_threads,
        })
    }
}

/// An explicit worker count wins; otherwise take `cpu_percent` of the cores.
/// Always at least one thread.
pub fn pool_size(parallel: Option<usize>, cpu_percent: Option<u8>, total_cpus: usize) -> usize {
    let cpu_percent = cpu_percent.unwrap_or(DEFAULT_CPU_PERCENT);
    let n = parallel.unwrap_or_else(|| (total_cpus as f64 * (cpu_percent as f64 / 100.0)).ceil() as usize);
    n.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        assert_eq!(pool_size(Some(6), Some(10), 16), 6);
        assert_eq!(pool_size(None, None, 16), 8);
        assert_eq!(pool_size(None, Some(25), 6), 2);
        assert_eq!(pool_size(Some(0), None, 4), 1);
        assert_eq!(pool_size(None, Some(1), 1), 1);
    }

    #[test]
    fn test_init_wires_components() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.database.username = "scott".into();
        config.database.password = Some("tiger".into());
        config.database.connection_string = Some("//db:1521/ORCL".into());
        config.export.temp_dir = Some(dir.path().join("scratch").display().to_string());
        config.export.parallel = Some(2);

        let ctx = RuntimeContext::init(&config).unwrap();
        assert_eq!(ctx.num_threads, 2);
        assert!(dir.path().join("scratch").is_dir());
    }
}
