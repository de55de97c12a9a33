use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::migrate::{FileFailure, MigrationResult};

/// Try to enable ANSI escape sequence support on Windows consoles.
#[cfg(windows)]
pub fn try_enable_ansi_on_windows() -> bool {
    enable_ansi_support::enable_ansi_support().is_ok()
}

#[cfg(not(windows))]
pub fn try_enable_ansi_on_windows() -> bool {
    true
}

/// Convert a byte count into a human readable string using IEC units (KiB/MiB/GiB).
pub fn human_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GiB", b / GB)
    } else if b >= MB {
        format!("{:.2} MiB", b / MB)
    } else if b >= KB {
        format!("{:.2} KiB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Progress bar counting migrated files. Hidden in quiet mode; the length is
/// set once the file list is known.
pub fn init_progress(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}",
        )?
        .progress_chars("=> "),
    );
    Ok(pb)
}

/// Print a startup line describing the run.
pub fn print_header(source: &str, dest: &str, workers: usize, attempts: usize, chunk: usize) {
    let route = format!("{} -> {}", source, dest);
    let conf = format!(
        "Worker:{}    Attempts:{}    Chunk:{}",
        workers,
        attempts,
        human_bytes(chunk as u64)
    );
    if try_enable_ansi_on_windows() {
        println!("{}    {}", route.green(), conf.cyan());
    } else {
        println!("{}    {}", route, conf);
    }
}

/// Print a concise summary of a finished migration, followed by the files that did not move.
pub fn print_summary(result: &MigrationResult, elapsed_secs: f64) {
    let line = format!(
        "moved {}/{} files in {:.2}s, {} failed",
        result.migrated(),
        result.total_files,
        elapsed_secs,
        result.failed.len()
    );
    let colored = try_enable_ansi_on_windows();
    if result.success {
        if colored {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
        return;
    }
    if colored {
        println!("{}", line.red());
    } else {
        println!("{}", line);
    }
    println!("Could not migrate the following files:");
    for f in &result.failed {
        println!("  {} ({})", f.file, f.stage);
    }
}

/// Write per-file failures as JSON Lines into `dir`, one object per file.
/// Returns the written path, or None when nothing could be written.
pub fn write_failures_jsonl(dir: &Path, failures: &[FileFailure]) -> Option<PathBuf> {
    if failures.is_empty() {
        return None;
    }
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!("cannot create log dir {}: {}", dir.display(), e);
        return None;
    }
    let path = dir.join(format!("failures_{}.jsonl", Utc::now().format("%Y%m%d_%H%M%S")));
    let mut f = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("cannot open failure list {}: {}", path.display(), e);
            return None;
        }
    };
    for failure in failures {
        if let Ok(line) = serde_json::to_string(failure) {
            let _ = writeln!(f, "{}", line);
        }
    }
    Some(path)
}

/// Install the global tracing subscriber.
///
/// Verbose runs log at debug level into `<log_dir>/smig.log`; the returned
/// guard must live until exit so buffered lines get flushed. Otherwise logs go
/// to stderr filtered by `RUST_LOG` (default `warn`).
pub fn init_logging(
    verbose: bool,
    log_dir: &Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;

    if verbose && std::fs::create_dir_all(log_dir).is_ok() {
        let appender = tracing_appender::rolling::never(log_dir, "smig.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("storemigrate=debug,smig=debug"))
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_names(true)
            .try_init();
        return Some(guard);
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    None
}

/// Run `op` up to `max_attempts` times (at least once), sleeping
/// `backoff * attempt` between tries. Returns the first success or the last error.
pub fn retry_operation<F, T>(max_attempts: usize, backoff: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 0..max_attempts {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                let transient = e
                    .downcast_ref::<crate::MigrateError>()
                    .is_none_or(crate::MigrateError::is_retriable);
                tracing::debug!(
                    "attempt {}/{} failed ({}): {:#}",
                    attempt + 1,
                    max_attempts,
                    if transient { "transient" } else { "permanent" },
                    e
                );
                last_err = Some(e);
                if attempt + 1 < max_attempts {
                    let step = u32::try_from(attempt + 1).unwrap_or(u32::MAX);
                    let wait = backoff.saturating_mul(step);
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        crate::MigrateError::OperationFailed("operation failed".to_string()).into()
    }))
}
