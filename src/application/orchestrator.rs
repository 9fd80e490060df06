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

//! The core application logic that drives one extraction job.
//!
//! Columns are resolved once, the artifact is opened once, and batches are
//! fetched until one comes back short. With `workers > 1` batches are fetched
//! in waves on the rayon pool and handed over a channel to this thread, which
//! stays the only writer. Whatever happens, the artifact is closed properly
//! and a run report is written next to it.

use super::batch_runner::BatchRunner;
use super::query_builder::{PageOrdering, Pagination, QueryBuilder};
use super::reorder::ReorderBuffer;
use crate::domain::entities::{Batch, ExtractionJob, JobProgress, JobSummary, Row};
use crate::domain::errors::{ExportError, Result};
use crate::domain::spool::SpoolFormat;
use crate::domain::temporal::TemporalFormat;
use crate::infrastructure::artifacts::{save_report, ArtifactValidator};
use crate::infrastructure::sinks::open_sink;
use crate::infrastructure::spool::RowParser;
use crate::ports::metadata_port::MetadataPort;
use crate::ports::sink_port::{ArtifactStats, RowSink};
use crossbeam_channel::unbounded;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Job-independent knobs of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub spool_format: SpoolFormat,
    pub timestamp_format: TemporalFormat,
    /// Upper-cased column name -> Oracle format model.
    pub column_formats: HashMap<String, String>,
    pub pagination: Pagination,
    /// Re-read the artifact after a successful run and save `validation.json`.
    pub validate: bool,
    /// Run `COUNT(*)` before extracting, for progress and validation.
    pub count_rows: bool,
}

/// Everything a worker needs to fetch any batch of the job.
struct BatchPlan<'a> {
    job: &'a ExtractionJob,
    runner: BatchRunner,
    builder: QueryBuilder,
    parser: RowParser,
}

pub struct ExtractionOrchestrator {
    metadata: Arc<dyn MetadataPort>,
    runner: BatchRunner,
    settings: PipelineSettings,
}

impl ExtractionOrchestrator {
    pub fn new(metadata: Arc<dyn MetadataPort>, runner: BatchRunner, settings: PipelineSettings) -> Self {
        Self {
            metadata,
            runner,
            settings,
        }
    }

    /// Runs `job` to completion.
    ///
    /// On failure the rows of every batch written so far stay in the (still
    /// well-formed) artifact, and the error is returned after the report is
    /// saved.
    pub fn run(&self, job: &ExtractionJob) -> Result<JobSummary> {
        if job.batch_size == 0 {
            return Err(ExportError::ConfigError("batch size must be positive".to_string()));
        }
        let start_time = Instant::now();
        info!(
            "Extracting {} into {} ({} rows per batch, {} worker(s))",
            job.qualified_name(),
            job.artifact_path().display(),
            job.batch_size,
            job.workers.max(1)
        );
        std::fs::create_dir_all(job.table_dir())?;
        std::fs::create_dir_all(&job.temp_dir)?;

        let mut progress = JobProgress::default();
        let outcome = self.extract(job, &mut progress);
        let duration = start_time.elapsed().as_secs_f64();

        let (summary, result) = match outcome {
            Ok(stats) => {
                let summary = JobSummary::success(job, &progress, stats.bytes, duration);
                info!(
                    "{} finished: {} rows in {} batches ({} skipped), {} bytes, {:.2}s",
                    job.qualified_name(),
                    summary.rows,
                    summary.batches,
                    summary.skipped_rows,
                    summary.bytes,
                    duration
                );
                (summary.clone(), Ok(summary))
            }
            Err(e) => {
                error!("{} failed: {}", job.qualified_name(), e);
                let bytes = std::fs::metadata(job.artifact_path())
                    .map(|m| m.len())
                    .unwrap_or(0);
                let summary = JobSummary::failure(job, &progress, bytes, duration, e.to_string());
                (summary, Err(e))
            }
        };

        match self.generate_report(job, &summary) {
            Ok(path) => info!("Report written to {}", path.display()),
            Err(e) => warn!("Could not write run report: {}", e),
        }
        result
    }

    fn extract(&self, job: &ExtractionJob, progress: &mut JobProgress) -> Result<ArtifactStats> {
        let columns = self.metadata.resolve_columns(&job.schema, &job.table)?;

        let plan = BatchPlan {
            job,
            runner: self.runner.for_job(job),
            builder: QueryBuilder::new(
                job,
                &columns,
                &self.settings.timestamp_format,
                &self.settings.column_formats,
                self.settings.pagination,
            ),
            parser: RowParser::new(self.settings.spool_format.clone(), &columns),
        };
        if plan.builder.ordering() == PageOrdering::Unstable {
            warn!(
                "{}: no ORDER BY given; rows may repeat or go missing across batch boundaries",
                job.qualified_name()
            );
        }

        if self.settings.count_rows {
            progress.source_rows = self.count_source_rows(&plan);
        }

        let names = columns.iter().map(|c| c.name.clone()).collect();
        let mut sink = open_sink(&job.artifact_path(), job.output_format, job.compress, names)?;

        let fetched = if job.workers > 1 {
            self.fetch_parallel(&plan, sink.as_mut(), progress)
        } else {
            self.fetch_sequential(&plan, sink.as_mut(), progress)
        };
        // Close the artifact even when fetching failed.
        let finished = sink.finish();
        fetched?;
        let stats = finished?;

        if self.settings.validate {
            let validator = ArtifactValidator::new(
                &columns,
                &self.settings.timestamp_format,
                &self.settings.column_formats,
            )
            .with_source_rows(progress.source_rows);
            let report = validator.validate(&stats.path, job.output_format)?;
            let saved = save_report(&report, &job.table_dir())?;
            info!("Validation report written to {}", saved.display());
        }
        Ok(stats)
    }

    fn fetch_sequential(
        &self,
        plan: &BatchPlan,
        sink: &mut dyn RowSink,
        progress: &mut JobProgress,
    ) -> Result<()> {
        let mut index = 0;
        loop {
            let batch = self.fetch_batch(plan, index)?;
            if write_batch(plan.job, &batch, sink, progress)? {
                return Ok(());
            }
            index += 1;
        }
    }

    /// Fetches waves of `workers` batches concurrently; this thread writes.
    fn fetch_parallel(
        &self,
        plan: &BatchPlan,
        sink: &mut dyn RowSink,
        progress: &mut JobProgress,
    ) -> Result<()> {
        let width = plan.job.workers as u64;
        let mut reorder = ReorderBuffer::new(0);
        let mut wave_start = 0;
        // Index of the first short batch, once seen.
        let mut end: Option<u64> = None;
        let mut failure: Option<(u64, ExportError)> = None;

        loop {
            let wave: Vec<u64> = (wave_start..wave_start + width).collect();
            debug!("{}: fetching batches {:?}", plan.job.qualified_name(), wave);
            let (tx, rx) = unbounded::<(u64, Result<Batch>)>();

            std::thread::scope(|s| -> Result<()> {
                s.spawn(move || {
                    wave.into_par_iter().for_each_with(tx, |tx, index| {
                        // The receiver only goes away if writing failed.
                        let _ = tx.send((index, self.fetch_batch(plan, index)));
                    });
                });

                for (index, fetched) in rx.iter() {
                    let released = if plan.job.preserve_order {
                        reorder.push(index, (index, fetched))
                    } else {
                        vec![(index, fetched)]
                    };
                    for (index, fetched) in released {
                        match fetched {
                            Err(e) => {
                                let earlier = failure.as_ref().map_or(true, |(i, _)| index < *i);
                                if earlier {
                                    failure = Some((index, e));
                                }
                            }
                            Ok(batch) => {
                                let past_end = end.map_or(false, |e| batch.index > e);
                                let stopped = plan.job.preserve_order && failure.is_some();
                                if past_end || stopped {
                                    debug!("Discarding batch {}", batch.index);
                                    continue;
                                }
                                if write_batch(plan.job, &batch, sink, progress)? {
                                    end = Some(end.map_or(batch.index, |e| e.min(batch.index)));
                                }
                            }
                        }
                    }
                }
                Ok(())
            })?;

            // A failure past the end of the table does not matter.
            if let Some((index, e)) = failure.take() {
                if end.map_or(true, |end| index < end) {
                    return Err(e);
                }
            }
            if end.is_some() {
                return Ok(());
            }
            wave_start += width;
        }
    }

    /// Rows the job should extract: `COUNT(*)` under the job's predicate,
    /// minus the start offset. A failed count only costs the progress figure.
    fn count_source_rows(&self, plan: &BatchPlan) -> Option<u64> {
        let label = format!("{} row count", plan.job.qualified_name());
        let counted = plan
            .runner
            .run(&label, &plan.builder.count_query())
            .and_then(|spool| {
                let parser = RowParser::with_header(
                    self.settings.spool_format.clone(),
                    vec!["COUNT".to_string()],
                );
                let first = parser.open(spool.path())?.next().transpose()?;
                first
                    .and_then(|row| row.fields.into_iter().next().flatten())
                    .and_then(|text| text.trim().parse::<u64>().ok())
                    .ok_or_else(|| ExportError::ArtifactError("no numeric count in spool".to_string()))
            });

        match counted {
            Ok(total) => {
                let rows = total.saturating_sub(plan.job.start_offset);
                info!("{}: {} rows to extract", plan.job.qualified_name(), rows);
                Some(rows)
            }
            Err(e) => {
                warn!("{}: row count unavailable: {}", plan.job.qualified_name(), e);
                None
            }
        }
    }

    /// Runs, parses and discards the spool of batch `index`.
    fn fetch_batch(&self, plan: &BatchPlan, index: u64) -> Result<Batch> {
        let offset = plan.job.offset_of(index);
        let query = plan.builder.build(offset, plan.job.batch_size);
        let label = format!("{} batch {}", plan.job.qualified_name(), index);

        let spool = plan.runner.run(&label, &query)?;
        let mut parsed = plan.parser.open(spool.path())?;
        let rows = parsed.by_ref().collect::<Result<Vec<Row>>>()?;
        let stats = parsed.stats();

        Ok(Batch {
            index,
            offset,
            rows,
            malformed: stats.malformed,
            records_seen: stats.records_seen(),
        })
    }

    fn generate_report(&self, job: &ExtractionJob, summary: &JobSummary) -> Result<PathBuf> {
        let report = json!({
            "summary": summary,
            "batch_size": job.batch_size,
            "start_offset": job.start_offset,
            "workers": job.workers.max(1),
            "mb_per_sec": if summary.duration > 0.0 {
                (summary.bytes as f64 / 1024.0 / 1024.0) / summary.duration
            } else {
                0.0
            },
            "timestamp": chrono::Local::now().to_rfc3339(),
        });

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = job.table_dir().join(format!("report_{}.json", timestamp));
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &report)?;
        Ok(path)
    }
}

/// Appends one batch; returns whether it was the last one.
fn write_batch(
    job: &ExtractionJob,
    batch: &Batch,
    sink: &mut dyn RowSink,
    progress: &mut JobProgress,
) -> Result<bool> {
    sink.write_rows(&batch.rows)?;
    progress.record(batch);
    if batch.malformed > 0 {
        warn!(
            "{}: batch {} skipped {} malformed row(s)",
            job.qualified_name(),
            batch.index,
            batch.malformed
        );
    }
    match (progress.source_rows, progress.percent()) {
        (Some(total), Some(pct)) => info!(
            "{}: batch {} (offset {}) wrote {} rows, {} of {} ({:.1}%)",
            job.qualified_name(),
            batch.index,
            batch.offset,
            batch.rows.len(),
            progress.rows,
            total,
            pct
        ),
        _ => info!(
            "{}: batch {} (offset {}) wrote {} rows, {} total",
            job.qualified_name(),
            batch.index,
            batch.offset,
            batch.rows.len(),
            progress.rows
        ),
    }
    Ok(batch.is_last(job.batch_size))
}
