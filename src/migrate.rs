// migrate module: moves every file of one store into another
mod buffer;
mod helpers;
#[cfg(test)]
mod mock_transport;
mod partition;
mod worker;

use std::path::PathBuf;

use indicatif::ProgressBar;
use serde::Serialize;

pub use buffer::{DEFAULT_CHUNK_SIZE, StagedReader, StreamBuffer};
pub use helpers::{file_url, files_url};
pub use partition::partition;

use self::worker::{WorkerCtx, run_worker};
use crate::MigrateError;
use crate::transport::{Transport, list_files};

pub const DEFAULT_MAX_ATTEMPTS: usize = 10;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TEMP_PREFIX: &str = "temp-";

/// Step of a file's move that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Fetch,
    Send,
    Delete,
    /// The worker owning the file died or never started.
    Worker,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureStage::Fetch => "fetch",
            FailureStage::Send => "send",
            FailureStage::Delete => "delete",
            FailureStage::Worker => "worker",
        };
        f.write_str(s)
    }
}

/// A file that was not moved. After a `Delete` failure the file exists in both stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub stage: FailureStage,
    pub message: String,
}

impl FileFailure {
    pub fn new(file: impl Into<String>, stage: FailureStage, message: impl Into<String>) -> Self {
        Self { file: file.into(), stage, message: message.into() }
    }
}

/// What one worker reports for its partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub success: bool,
    pub failed: Vec<FileFailure>,
}

impl MigrationOutcome {
    pub fn from_failures(failed: Vec<FileFailure>) -> Self {
        Self { success: failed.is_empty(), failed }
    }

    /// Every file of `files` counted as failed at `stage`.
    pub fn all_failed(files: &[String], stage: FailureStage, message: &str) -> Self {
        Self::from_failures(files.iter().map(|f| FileFailure::new(f, stage, message)).collect())
    }
}

/// Aggregate result of a migration run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationResult {
    pub success: bool,
    pub total_files: usize,
    pub failed: Vec<FileFailure>,
}

impl MigrationResult {
    /// AND of the worker flags, failures concatenated in worker order.
    pub fn combine<I>(total_files: usize, outcomes: I) -> Self
    where
        I: IntoIterator<Item = MigrationOutcome>,
    {
        let mut success = true;
        let mut failed = Vec::new();
        for o in outcomes {
            success &= o.success;
            failed.extend(o.failed);
        }
        Self { success, total_files, failed }
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.file.as_str()).collect()
    }

    pub fn migrated(&self) -> usize {
        self.total_files.saturating_sub(self.failed.len())
    }
}

/// Spill file settings for the per-worker buffers.
#[derive(Clone, Debug)]
pub struct BufferOptions {
    pub chunk_size: usize,
    pub temp_dir: Option<PathBuf>,
    pub temp_prefix: String,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            temp_dir: None,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
        }
    }
}

/// Moves all files from `source` to `dest` with a fixed pool of workers.
///
/// The engine keeps no state between runs; each `migrate` call creates its
/// buffers, spawns one scoped thread per non-empty partition and joins them
/// all before returning.
pub struct MigrationEngine<T> {
    transport: T,
    source: String,
    dest: String,
    workers: usize,
    max_attempts: usize,
    buffers: BufferOptions,
    progress: ProgressBar,
}

impl<T: Transport> MigrationEngine<T> {
    pub fn new(transport: T, source: &str, dest: &str, workers: usize) -> Self {
        if workers == 0 {
            tracing::warn!("worker count 0 requested, using 1");
        }
        Self {
            transport,
            source: source.to_string(),
            dest: dest.to_string(),
            workers: workers.max(1),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            buffers: BufferOptions::default(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn buffer_options(mut self, opts: BufferOptions) -> Self {
        self.buffers = opts;
        self
    }

    /// Progress bar advanced once per processed file; its length is set to the file count.
    pub fn progress(mut self, pb: ProgressBar) -> Self {
        self.progress = pb;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one migration.
    ///
    /// `Err` means nothing was attempted: buffers could not be created, a
    /// store url is invalid, or the source file list is unavailable. Anything
    /// that goes wrong per file ends up in the returned result instead.
    pub fn migrate(&self) -> Result<MigrationResult, MigrateError> {
        files_url(&self.dest)?;
        let mut buffers = self.create_buffers()?;
        let files = list_files(&self.transport, &self.source, self.max_attempts)?;
        tracing::info!(
            "[migrate] {} files listed at {}, {} workers",
            files.len(),
            self.source,
            self.workers
        );
        self.progress.set_length(files.len() as u64);

        let parts = partition(&files, self.workers);
        let outcomes: Vec<MigrationOutcome> = std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for (worker_id, (part, buffer)) in parts.iter().zip(buffers.iter_mut()).enumerate() {
                if part.is_empty() {
                    continue;
                }
                let ctx = WorkerCtx {
                    worker_id,
                    transport: &self.transport,
                    source: &self.source,
                    dest: &self.dest,
                    max_attempts: self.max_attempts,
                    progress: &self.progress,
                };
                let spawned = std::thread::Builder::new()
                    .name(format!("migrate-worker-{}", worker_id))
                    .spawn_scoped(scope, move || run_worker(&ctx, part, buffer));
                handles.push((worker_id, *part, spawned));
            }
            handles
                .into_iter()
                .map(|(worker_id, part, spawned)| match spawned {
                    Ok(h) => h.join().unwrap_or_else(|_| {
                        tracing::error!("[migrate] worker_id={} panicked", worker_id);
                        let e = MigrateError::WorkerPanicked(worker_id);
                        MigrationOutcome::all_failed(part, FailureStage::Worker, &e.to_string())
                    }),
                    Err(e) => {
                        tracing::error!("[migrate] worker_id={} failed to start: {}", worker_id, e);
                        let msg = format!("worker {} failed to start: {}", worker_id, e);
                        MigrationOutcome::all_failed(part, FailureStage::Worker, &msg)
                    }
                })
                .collect()
        });

        let result = MigrationResult::combine(files.len(), outcomes);
        self.progress.finish_and_clear();
        Ok(result)
    }

    fn create_buffers(&self) -> Result<Vec<StreamBuffer>, MigrateError> {
        (0..self.workers)
            .map(|i| {
                let prefix = format!("{}{}-", self.buffers.temp_prefix, i);
                StreamBuffer::with_spill_dir(
                    &prefix,
                    self.buffers.chunk_size,
                    self.buffers.temp_dir.as_deref(),
                )
                .map_err(|e| MigrateError::BufferCreateFailed(e.to_string()))
            })
            .collect()
    }
}
