//! Runs a job across workers and reduces their counts.
//!
//! A job moves through fixed phases:
//!
//! 1. **CollectingSpec**: the [`JobSpec`] is validated, the manifest is gated
//!    (non-empty, every file present) and the matcher is compiled once. A
//!    failure here aborts before any file or audit log is touched.
//! 2. **Broadcasting**: one immutable job context is shared with every
//!    worker at spawn time.
//! 3. **Partitioning**: each worker resolves its own byte range.
//! 4. **ProcessingOwnedFiles**: each worker runs the operation on the files it
//!    owns and sends one audit entry per file.
//! 5. **Reducing**: worker results are collected over a channel and summed.
//! 6. **Reporting**: the global count and elapsed time are returned.
//!
//! Workers share nothing mutable but atomic counters and the audit channel.
//! No phase can be cancelled, and a worker stuck on a file read stalls the
//! whole job at the reduction.
use crossbeam_channel::bounded;
use rayon::ThreadPoolBuilder;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::audit::{AuditLog, AuditSender, OperationLogEntry};
use crate::config::{Backend, SweepConfig};
use crate::errors::{SearchError, SearchResult};
use crate::job::{JobSpec, OperationKind};
use crate::manifest::Manifest;
use crate::metrics::SweepMetrics;
use crate::partition::{owned_files, work_range};
use crate::replace::ReplaceTransaction;
use crate::results::{FileOutcome, JobReport, WorkerResult};
use crate::search::{FileProcessor, PatternMatcher};

/// The stages a job passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobPhase {
    CollectingSpec,
    Broadcasting,
    Partitioning,
    ProcessingOwnedFiles,
    Reducing,
    Reporting,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollectingSpec => "collecting spec",
            Self::Broadcasting => "broadcasting",
            Self::Partitioning => "partitioning",
            Self::ProcessingOwnedFiles => "processing owned files",
            Self::Reducing => "reducing",
            Self::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// How workers are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionBackend {
    /// One worker on the calling thread
    Sequential,
    /// A fixed pool with one thread per worker
    WorkerPool {
        workers: NonZeroUsize,
        synchronized_start: bool,
    },
}

impl ExecutionBackend {
    pub fn from_config(config: &SweepConfig) -> Self {
        match config.backend {
            Backend::Sequential => Self::Sequential,
            Backend::Pool => Self::WorkerPool {
                workers: config.worker_count,
                synchronized_start: config.synchronized_start,
            },
        }
    }

    pub fn workers(&self) -> NonZeroUsize {
        match self {
            Self::Sequential => NonZeroUsize::MIN,
            Self::WorkerPool { workers, .. } => *workers,
        }
    }
}

/// The per-file operation a job applies
#[derive(Debug, Clone)]
enum FileOperation {
    Scan(FileProcessor),
    Replace(ReplaceTransaction),
}

impl FileOperation {
    fn for_job(spec: &JobSpec, config: &SweepConfig) -> SearchResult<Self> {
        let matcher = Arc::new(PatternMatcher::for_job(spec)?);
        Ok(match spec.operation {
            OperationKind::Replace => Self::Replace(
                ReplaceTransaction::new(matcher, spec.replacement_text())
                    .with_line_buffer(config.line_buffer_capacity)
                    .preserve_metadata(config.preserve_metadata)
                    .dry_run(config.dry_run),
            ),
            op => Self::Scan(
                FileProcessor::new(matcher, config.encoding_mode)
                    .with_line_buffer(config.line_buffer_capacity)
                    .reporting(op.reports_occurrences()),
            ),
        })
    }

    fn process(&self, path: &Path) -> FileOutcome {
        let result = match self {
            Self::Scan(processor) => processor
                .process_file(path)
                .map(|scan| (scan.count, scan.occurrences)),
            Self::Replace(transaction) => transaction.apply(path).map(|count| (count, Vec::new())),
        };
        match result {
            Ok((count, occurrences)) => FileOutcome::succeeded(path.to_path_buf(), count, occurrences),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                FileOutcome::failed(path.to_path_buf(), e)
            }
        }
    }
}

/// A job that passed validation, with its matcher compiled
struct PreparedJob {
    spec: JobSpec,
    manifest: Manifest,
    operation: FileOperation,
}

/// Everything a worker reads; built once and shared at spawn
#[derive(Debug)]
struct JobContext {
    spec: JobSpec,
    manifest: Manifest,
    operation: FileOperation,
    workers: NonZeroUsize,
    audit: AuditSender,
    metrics: SweepMetrics,
}

impl JobContext {
    /// Partitions, processes the owned files and accumulates the local count
    fn run_worker(&self, rank: usize) -> WorkerResult {
        trace!("Worker {} entering {}", rank, JobPhase::Partitioning);
        let range = work_range(self.manifest.total_size(), self.workers, rank);
        let owned = owned_files(&self.manifest, self.workers, rank);
        if owned.is_empty() {
            self.metrics.record_idle_worker();
        }

        trace!("Worker {} entering {}", rank, JobPhase::ProcessingOwnedFiles);
        let mut result = WorkerResult::new(rank, range);
        for record in owned {
            let outcome = self.operation.process(&record.path);
            self.metrics
                .record_file(record.byte_size, outcome.count, outcome.is_failure());
            self.audit.record(OperationLogEntry::for_file(
                &self.spec,
                &record.path,
                outcome.count,
            ));
            result.add_file_outcome(outcome);
        }
        debug!(
            "Worker {} done: {} files, local count {}",
            rank,
            result.files.len(),
            result.local_count
        );
        result
    }
}

/// Drives jobs from a configuration
#[derive(Debug, Clone)]
pub struct Coordinator {
    config: SweepConfig,
    backend: ExecutionBackend,
}

impl Coordinator {
    pub fn new(config: SweepConfig) -> Self {
        let backend = ExecutionBackend::from_config(&config);
        Self { config, backend }
    }

    /// Replaces the backend chosen by the configuration
    pub fn with_backend(mut self, backend: ExecutionBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn backend(&self) -> ExecutionBackend {
        self.backend
    }

    /// Enumerates the configured root and runs the job over it
    pub fn run_discovered(&self, spec: JobSpec) -> SearchResult<JobReport> {
        let manifest = Manifest::discover(&self.config)?;
        self.run(spec, manifest)
    }

    /// Runs a job, appending to the configured audit log
    pub fn run(&self, spec: JobSpec, manifest: Manifest) -> SearchResult<JobReport> {
        let job = self.prepare(spec, manifest)?;
        let audit = match &self.config.audit_log {
            Some(path) => AuditLog::open(path).unwrap_or_else(|e| {
                warn!("{}; continuing without an audit log", e);
                AuditLog::disabled()
            }),
            None => AuditLog::disabled(),
        };
        let report = self.execute(job, audit.sender());
        match audit.finish() {
            Ok(lines) => debug!("Audit log received {} entries", lines),
            Err(e) => warn!("{}", e),
        }
        report
    }

    /// Runs a job, sending audit entries to `audit`
    pub fn run_with_audit(
        &self,
        spec: JobSpec,
        manifest: Manifest,
        audit: AuditSender,
    ) -> SearchResult<JobReport> {
        let job = self.prepare(spec, manifest)?;
        self.execute(job, audit)
    }

    /// Every check that must pass before any file is touched
    fn prepare(&self, spec: JobSpec, manifest: Manifest) -> SearchResult<PreparedJob> {
        debug!("Job phase: {}", JobPhase::CollectingSpec);
        let options = spec.options.or(self.config.match_options());
        let spec = spec.with_options(options);
        spec.validate()?;
        manifest.verify()?;
        let operation = FileOperation::for_job(&spec, &self.config)?;
        Ok(PreparedJob {
            spec,
            manifest,
            operation,
        })
    }

    fn execute(&self, job: PreparedJob, audit: AuditSender) -> SearchResult<JobReport> {
        info!(
            "Starting {} for '{}' over {} files ({} bytes)",
            job.spec.operation,
            job.spec.pattern,
            job.manifest.len(),
            job.manifest.total_size()
        );

        debug!("Job phase: {}", JobPhase::Broadcasting);
        let metrics = SweepMetrics::new();
        let context = Arc::new(JobContext {
            spec: job.spec,
            manifest: job.manifest,
            operation: job.operation,
            workers: self.backend.workers(),
            audit,
            metrics: metrics.clone(),
        });

        let start = Instant::now();
        let results = match self.backend {
            ExecutionBackend::Sequential => vec![context.run_worker(0)],
            ExecutionBackend::WorkerPool {
                workers,
                synchronized_start,
            } => fan_out(&context, workers, synchronized_start)?,
        };

        debug!("Job phase: {}", JobPhase::Reducing);
        let spec = context.spec.clone();
        drop(context);
        let report = JobReport::reduce(spec, results, start.elapsed());

        debug!("Job phase: {}", JobPhase::Reporting);
        metrics.log_stats();
        info!(
            "{} complete: {} across {} files in {:?}",
            report.spec.operation,
            report.global_count,
            report.files_processed(),
            report.elapsed
        );
        Ok(report)
    }
}

/// Spawns one task per worker on a dedicated pool and gathers their results
fn fan_out(
    context: &Arc<JobContext>,
    workers: NonZeroUsize,
    synchronized_start: bool,
) -> SearchResult<Vec<WorkerResult>> {
    let n = workers.get();
    let pool = ThreadPoolBuilder::new()
        .num_threads(n)
        .thread_name(|i| format!("sweep-worker-{}", i))
        .build()
        .map_err(|e| SearchError::config_error(format!("failed to start worker pool: {}", e)))?;

    let (tx, rx) = bounded(n);
    let barrier = synchronized_start.then(|| Arc::new(Barrier::new(n)));

    pool.scope(|s| {
        for rank in 0..n {
            let context = Arc::clone(context);
            let tx = tx.clone();
            let barrier = barrier.clone();
            s.spawn(move |_| {
                if let Some(barrier) = barrier {
                    barrier.wait();
                }
                let result = context.run_worker(rank);
                if tx.send(result).is_err() {
                    warn!("Worker {} result dropped: reducer is gone", rank);
                }
            });
        }
    });
    drop(tx);

    let results: Vec<WorkerResult> = rx.iter().collect();
    if results.len() != n {
        return Err(SearchError::config_error(format!(
            "expected {} worker results, got {}",
            n,
            results.len()
        )));
    }
    Ok(results)
}
