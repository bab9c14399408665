// src/main.rs
//! addond - CLI entry point

use addond::{Error, Server};
use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "addond")]
#[command(version)]
#[command(about = "Versioned add-on storage and delivery server", long_about = None)]
struct Cli {
    /// Path to the server configuration file
    #[arg(short, long, default_value = "server.cfg")]
    config: String,

    /// Server directory (defaults to the current directory)
    #[arg(short = 'd', long)]
    server_dir: Option<String>,

    /// Listening port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Log per-request service times
    #[arg(long)]
    timings: bool,
}

// Exit codes are a documented interface for init scripts:
// 1 config/directory error, 2 I/O fault or bad port, 4 internal
// dispatch error, 10 bad command line.
const EXIT_CONFIG: u8 = 1;
const EXIT_IO: u8 = 2;
const EXIT_INTERNAL: u8 = 4;
const EXIT_USAGE: u8 = 10;

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                // --help and --version land here.
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            match e.downcast_ref::<Error>() {
                Some(Error::Config(_)) => ExitCode::from(EXIT_CONFIG),
                Some(Error::Io(_)) | Some(Error::IoFault { .. }) => ExitCode::from(EXIT_IO),
                Some(_) => ExitCode::from(EXIT_INTERNAL),
                None => ExitCode::from(EXIT_CONFIG),
            }
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let server_dir = cli.server_dir.unwrap_or_else(|| ".".to_string());

    if !Path::new(&server_dir).is_dir() {
        return Err(Error::Config(format!(
            "server directory '{}' does not exist or is not a directory",
            server_dir
        ))
        .into());
    }
    if Path::new(&server_dir).join(&cli.config).is_dir() {
        return Err(Error::Config(format!(
            "server configuration file '{}' is not a file",
            cli.config
        ))
        .into());
    }

    eprintln!("addond v{} starting...", env!("CARGO_PKG_VERSION"));

    // The whole server runs on one thread; concurrency is cooperative.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the runtime")?;

    runtime.block_on(async {
        let mut server = Server::new(&server_dir, &cli.config, cli.port)?;
        server.report_timings = cli.timings;
        server.run().await?;
        Ok::<(), Error>(())
    })?;

    Ok(())
}
