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

use clap::Parser;
use log::{error, info};
use oracle_spool_exporter::application::runtime::RuntimeContext;
use oracle_spool_exporter::config::{AppConfig, CliArgs};
use std::process;

fn main() {
    // 1. Initialize Logging
    env_logger::init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    // 3. Load Config, then apply CLI overrides
    let mut config = match &args.config {
        Some(path) => match AppConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config: {}", e);
                process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    if let Err(e) = config.merge_cli(&args).and_then(|_| config.validate()) {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    let job = match config.to_job() {
        Ok(job) => job,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    // 4. Wire the pipeline
    let ctx = match RuntimeContext::init(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Startup failed: {}", e);
            process::exit(1);
        }
    };

    // 5. Run
    info!("Starting extraction of {}...", job.qualified_name());
    match ctx.orchestrator.run(&job) {
        Ok(summary) => {
            info!(
                "Extraction finished: {} rows -> {}",
                summary.rows, summary.artifact
            );
        }
        Err(e) => {
            error!("Extraction failed: {}", e);
            process::exit(1);
        }
    }
}
