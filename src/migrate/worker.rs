use std::panic::{self, AssertUnwindSafe};

use indicatif::ProgressBar;

use super::buffer::StreamBuffer;
use super::helpers::{file_url, files_url};
use super::{FailureStage, FileFailure, MigrationOutcome};
use crate::MigrateError;
use crate::transport::{Transport, Upload};

pub(crate) struct WorkerCtx<'a, T> {
    pub(crate) worker_id: usize,
    pub(crate) transport: &'a T,
    pub(crate) source: &'a str,
    pub(crate) dest: &'a str,
    pub(crate) max_attempts: usize,
    pub(crate) progress: &'a ProgressBar,
}

/// Move every file of `files`, in order, reusing `buffer` for each one.
/// A failed file is recorded and the loop moves on; a panic while moving a
/// file fails only that file.
pub(crate) fn run_worker<T: Transport>(
    ctx: &WorkerCtx<'_, T>,
    files: &[String],
    buffer: &mut StreamBuffer,
) -> MigrationOutcome {
    let mut failed = Vec::new();
    for name in files {
        ctx.progress.set_message(name.clone());
        let moved = panic::catch_unwind(AssertUnwindSafe(|| move_file(ctx, name, buffer)))
            .unwrap_or_else(|_| {
                Err((FailureStage::Worker, MigrateError::WorkerPanicked(ctx.worker_id)))
            });
        match moved {
            Ok(bytes) => {
                tracing::debug!(
                    "[migrate] worker_id={} moved {} ({} bytes)",
                    ctx.worker_id,
                    name,
                    bytes
                );
            }
            Err((stage, e)) => {
                tracing::warn!("[migrate] worker_id={} {}", ctx.worker_id, e);
                failed.push(FileFailure::new(name, stage, e.to_string()));
            }
        }
        ctx.progress.inc(1);
    }
    if !failed.is_empty() {
        tracing::info!(
            "[migrate] worker_id={} could not migrate {} of {} files",
            ctx.worker_id,
            failed.len(),
            files.len()
        );
    }
    MigrationOutcome::from_failures(failed)
}

// copy, then delete from the source only once the destination has the file
fn move_file<T: Transport>(
    ctx: &WorkerCtx<'_, T>,
    name: &str,
    buffer: &mut StreamBuffer,
) -> Result<u64, (FailureStage, MigrateError)> {
    let bytes = copy_file(ctx, name, buffer)?;
    let url = file_url(ctx.source, name).map_err(|e| (FailureStage::Delete, e))?;
    if !ctx.transport.delete(url.as_str(), ctx.max_attempts) {
        return Err((FailureStage::Delete, MigrateError::DeleteFailed(name.to_string())));
    }
    Ok(bytes)
}

fn copy_file<T: Transport>(
    ctx: &WorkerCtx<'_, T>,
    name: &str,
    buffer: &mut StreamBuffer,
) -> Result<u64, (FailureStage, MigrateError)> {
    let from = file_url(ctx.source, name).map_err(|e| (FailureStage::Fetch, e))?;
    let fetched = ctx.transport.get(from.as_str(), ctx.max_attempts, |body| {
        let n = buffer.write(body)?;
        Ok(n)
    });
    let Some(bytes) = fetched else {
        return Err((FailureStage::Fetch, MigrateError::FetchFailed(name.to_string())));
    };

    let to = files_url(ctx.dest).map_err(|e| (FailureStage::Send, e))?;
    let buffer = &*buffer;
    let sent = ctx.transport.post(to.as_str(), ctx.max_attempts, name, || {
        buffer.reader().map(|r| Box::new(r) as Upload)
    });
    if !sent {
        return Err((FailureStage::Send, MigrateError::SendFailed(name.to_string())));
    }
    Ok(bytes)
}
