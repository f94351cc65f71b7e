// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk: print and scan desk.
//
// Entry point. Initialises logging, loads configuration, starts the temp
// sweeper and runs the console front end.
//
// Usage: printdesk [config.json]

mod console;
mod services;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use printdesk_core::error::Result;
use printdesk_exec::ProcessRunner;

use services::config_file::{self, CONFIG_FILE};
use services::data_dir;
use services::desk::PrintDesk;
use services::sweeper;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Printdesk starting");

    if let Err(e) = run().await {
        tracing::error!(error = %e, "printdesk stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => data_dir::data_dir()?.join(CONFIG_FILE),
    };
    let config = config_file::load_or_init(&config_path)?;

    let work_dir = config.work_dir();
    data_dir::ensure_dir(&work_dir)?;
    // No session is open yet, so anything left here belongs to an earlier run.
    sweeper::sweep_once(data_dir::ensure_dir(&config.session_dir())?, config.sweep_max_age());
    let scan_dir = match &config.scan_output_dir {
        Some(dir) => data_dir::ensure_dir(dir)?.to_path_buf(),
        None => data_dir::data_subdir("scans")?,
    };
    tracing::info!(
        printer = %config.printer_name,
        work_dir = %work_dir.display(),
        scans = %scan_dir.display(),
        "configuration ready"
    );

    let sweeper = sweeper::spawn(work_dir, config.sweep_max_age(), config.sweep_interval());

    let runner = Arc::new(ProcessRunner::new(config.process_grace()));
    let desk = PrintDesk::new(config, runner, scan_dir);
    let result = console::run(&desk).await;

    sweeper.abort();
    result
}
