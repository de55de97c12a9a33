use clap::Parser;

use storemigrate::cli::{Cli, Commands};
use storemigrate::commands::{self, MoveArgs, SetArgs};
use storemigrate::config::{self, Config};
use storemigrate::util;

fn main() {
    let cli = Cli::parse();
    let log_dir = config::logs_dir().unwrap_or_else(|_| std::env::temp_dir());
    let log_guard = util::init_logging(cli.verbose, &log_dir);

    let code = match run(cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            2
        }
    };
    // flush the file log before exiting
    drop(log_guard);
    if code != 0 {
        std::process::exit(code);
    }
}

// Ok(false) when the command finished but not everything was migrated.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = Config::init()?;
    match cli.command {
        Commands::Move { source, dest, concurrency, max_attempts, chunk_size, json, quiet } => {
            commands::handle_move(
                &config,
                MoveArgs { source, dest, concurrency, max_attempts, chunk_size, json, quiet },
            )
        }
        Commands::List { store, json } => {
            commands::handle_list(&config, &store, json)?;
            Ok(true)
        }
        Commands::Set { workers, max_attempts, chunk_size, backoff_ms, timeout_secs, temp_dir } => {
            commands::handle_set(
                &mut config,
                SetArgs { workers, max_attempts, chunk_size, backoff_ms, timeout_secs, temp_dir },
            )?;
            Ok(true)
        }
    }
}
