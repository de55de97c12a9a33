use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(short, long, global = true, help = "Write debug logs to ~/.storemigrate/logs/smig.log")]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(
        about = "Move every file from SOURCE store to DEST store",
        name = "mv",
        display_order = 1
    )]
    Move {
        #[clap(help = "Source store url, e.g. http://127.0.0.1:8080/oldStorage")]
        source: String,
        #[clap(help = "Destination store url, e.g. http://127.0.0.1:8080/newStorage")]
        dest: String,
        #[clap(short = 'c', long = "concurrency", help = "Number of workers (default from config)")]
        concurrency: Option<usize>,
        #[clap(short = 'r', long = "retries", help = "Attempts per request (default from config)")]
        max_attempts: Option<usize>,
        #[clap(long = "chunk-size", help = "In-memory bytes per worker before spilling to disk")]
        chunk_size: Option<usize>,
        #[clap(long, help = "Print a one-line JSON summary")]
        json: bool,
        #[clap(short, long, help = "No progress bar or human summary")]
        quiet: bool,
    },
    #[clap(about = "List the files of a store", name = "ls", display_order = 2)]
    List {
        store: String,
        #[clap(long, help = "Print the list as JSON")]
        json: bool,
    },
    #[clap(about = "Configure defaults", display_order = 3)]
    Set {
        #[clap(short = 'c', long = "concurrency", help = "Default number of workers")]
        workers: Option<usize>,
        #[clap(short = 'r', long = "retries", help = "Default attempts per request")]
        max_attempts: Option<usize>,
        #[clap(long = "chunk-size", help = "Default in-memory bytes per worker")]
        chunk_size: Option<usize>,
        #[clap(long = "backoff-ms", help = "Base delay between attempts")]
        backoff_ms: Option<u64>,
        #[clap(long = "timeout-secs", help = "Per-request timeout")]
        timeout_secs: Option<u64>,
        #[clap(long = "temp-dir", help = "Directory for spill files")]
        temp_dir: Option<PathBuf>,
    },
}
