//! benchenvctl - put a Linux host into a benchmarking environment and back
//!
//! Records CPU, frequency, ASLR, turbo and swap state, applies a profile,
//! and restores the recorded state on request.

use benchenv_common::Interrupt;
use benchenvctl::cli::Cli;
use benchenvctl::commands::{self, Context};
use benchenvctl::errors::{exit_code_for, EXIT_GENERAL_ERROR, EXIT_INTERRUPTED};
use benchenvctl::logging::{init_tracing, LogEntry};
use benchenvctl::output;
use clap::Parser;
use std::time::Instant;
use tracing::debug;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let started = Instant::now();
    let command = cli.command.name();
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Keep the process alive on SIGINT; the engine stops between steps
    let interrupt = Interrupt::new();
    let listener = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            output::error("Interrupted");
            listener.trigger();
        }
    });

    let worker_interrupt = interrupt.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let ctx = Context::from_cli(&cli, worker_interrupt)?;
        commands::execute(&cli, &ctx)
    })
    .await;

    let (mut exit_code, error) = match outcome {
        Ok(Ok(code)) => (code, None),
        Ok(Err(e)) => {
            output::error(format!("{:#}", e));
            (exit_code_for(&e), Some(format!("{:#}", e)))
        }
        Err(join_err) => {
            output::error(format!("Unexpected error: {}", join_err));
            (EXIT_GENERAL_ERROR, Some(join_err.to_string()))
        }
    };
    if interrupt.is_set() {
        exit_code = EXIT_INTERRUPTED;
    }

    let entry = LogEntry {
        ts: LogEntry::now(),
        req_id: LogEntry::generate_req_id(),
        command: command.to_string(),
        args,
        exit_code,
        duration_ms: started.elapsed().as_millis() as u64,
        ok: exit_code == 0,
        error,
    };
    if let Err(e) = entry.write() {
        debug!("could not write invocation log: {}", e);
    }

    std::process::exit(exit_code);
}
