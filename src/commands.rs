use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cli_table::{Cell, CellStruct, Style, Table, format::Justify, print_stdout};

use crate::config::Config;
use crate::migrate::{BufferOptions, MigrationEngine, MigrationResult};
use crate::transport::{HttpTransport, list_files};
use crate::util;

/// Arguments of `smig mv`; unset options fall back to the config.
#[derive(Clone, Debug, Default)]
pub struct MoveArgs {
    pub source: String,
    pub dest: String,
    pub concurrency: Option<usize>,
    pub max_attempts: Option<usize>,
    pub chunk_size: Option<usize>,
    pub json: bool,
    pub quiet: bool,
}

/// Run one migration and report it. Returns whether every file was moved.
pub fn handle_move(config: &Config, args: MoveArgs) -> Result<bool> {
    let MoveArgs { source, dest, concurrency, max_attempts, chunk_size, json, quiet } = args;
    let workers = concurrency.unwrap_or(config.workers).max(1);
    let attempts = max_attempts.unwrap_or(config.max_attempts).max(1);
    let chunk = chunk_size.unwrap_or(config.chunk_size).max(1);

    let transport = http_transport(config)?;
    if !quiet {
        util::print_header(&source, &dest, workers, attempts, chunk);
    }
    let progress = util::init_progress(quiet)?;
    let engine = MigrationEngine::new(transport, &source, &dest, workers)
        .max_attempts(attempts)
        .buffer_options(BufferOptions {
            chunk_size: chunk,
            temp_dir: config.temp_dir.clone(),
            temp_prefix: config.temp_prefix.clone(),
        })
        .progress(progress);

    let start = Instant::now();
    let result = engine
        .migrate()
        .with_context(|| format!("migration from {} to {} did not start", source, dest))?;
    let elapsed = start.elapsed().as_secs_f64();
    report(&result, elapsed, json, quiet);
    Ok(result.success)
}

fn http_transport(config: &Config) -> Result<HttpTransport> {
    HttpTransport::new(
        Duration::from_secs(config.request_timeout_secs),
        Duration::from_millis(config.backoff_ms),
    )
}

fn report(result: &MigrationResult, elapsed: f64, json: bool, quiet: bool) {
    if !quiet {
        util::print_summary(result, elapsed);
    }
    let mut failures_path: Option<PathBuf> = None;
    if !result.failed.is_empty() {
        failures_path = crate::config::logs_dir()
            .ok()
            .and_then(|dir| util::write_failures_jsonl(&dir, &result.failed));
        if !quiet && let Some(ref p) = failures_path {
            println!("failure list written to {}", p.display());
        }
    }
    if json {
        let summary = serde_json::json!({
            "success": result.success,
            "files": result.total_files,
            "migrated": result.migrated(),
            "failed": result.failed_names(),
            "elapsed_secs": elapsed,
            "failures_path": failures_path.as_ref().map(|p| p.to_string_lossy().to_string()),
        });
        if let Ok(line) = serde_json::to_string(&summary) {
            println!("{}", line);
        }
    }
}

pub fn handle_list(config: &Config, store: &str, json: bool) -> Result<()> {
    let transport = http_transport(config)?;
    let files = list_files(&transport, store, config.max_attempts)?;
    if json {
        println!("{}", serde_json::to_string(&files)?);
        return Ok(());
    }
    if files.is_empty() {
        println!("no files at {}", store);
        return Ok(());
    }
    let title = vec!["#".cell().bold(true), "File".cell().bold(true)];
    let rows: Vec<Vec<CellStruct>> = files
        .iter()
        .enumerate()
        .map(|(i, f)| vec![(i + 1).cell().justify(Justify::Right), f.cell()])
        .collect();
    print_stdout(rows.table().title(title))?;
    Ok(())
}

/// Updated defaults for `smig set`.
#[derive(Clone, Debug, Default)]
pub struct SetArgs {
    pub workers: Option<usize>,
    pub max_attempts: Option<usize>,
    pub chunk_size: Option<usize>,
    pub backoff_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub temp_dir: Option<PathBuf>,
}

/// Apply `args` to `config`; returns whether anything changed.
pub fn apply_set(config: &mut Config, args: SetArgs) -> Result<bool> {
    let before = config.clone();
    if let Some(w) = args.workers {
        anyhow::ensure!(w > 0, "worker count must be at least 1");
        config.workers = w;
    }
    if let Some(a) = args.max_attempts {
        anyhow::ensure!(a > 0, "attempts must be at least 1");
        config.max_attempts = a;
    }
    if let Some(c) = args.chunk_size {
        anyhow::ensure!(c > 0, "chunk size must be at least 1 byte");
        config.chunk_size = c;
    }
    if let Some(b) = args.backoff_ms {
        config.backoff_ms = b;
    }
    if let Some(t) = args.timeout_secs {
        config.request_timeout_secs = t;
    }
    if let Some(d) = args.temp_dir {
        anyhow::ensure!(d.is_dir(), "temp dir does not exist: {}", d.display());
        config.temp_dir = Some(d);
    }
    Ok(*config != before)
}

pub fn handle_set(config: &mut Config, args: SetArgs) -> Result<()> {
    if apply_set(config, args)? {
        config.save()?;
        println!("configuration saved");
    } else {
        println!("nothing to change");
    }
    Ok(())
}
