//! Cabsync - Main entry point

use cabsync::{execute, load_env_file, Cli};
use cabsync_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // The env file may carry logging settings, so load it first
    let env_loaded = load_env_file(cli.env_file.as_deref());

    // Initialize logging based on verbose flag and environment
    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .log_file_prefix("cabsync")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment overrides: {e:#}");
            log_config
        }
    };

    // Keep the guard alive so buffered file logs are flushed on exit
    let guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {e}");
            None
        }
    };

    let mut stdout = std::io::stdout().lock();
    let outcome = execute(&cli, env_loaded, &mut stdout).await;

    let code = outcome.exit_code();
    drop(guard);
    process::exit(code);
}
