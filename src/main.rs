use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use log::{debug, info};

use check_dup_sets::config::Config;
use check_dup_sets::engine::Engine;
use check_dup_sets::error::DupError;
use check_dup_sets::logging::{init_logging, level_for};
use check_dup_sets::report::{ConsoleSink, print_report, write_json};
use check_dup_sets::scanner::{read_path_lines, walk_files};
use check_dup_sets::signal::{self, EXIT_CODE_INTERRUPTED};
use check_dup_sets::utils::format_human_elapsed;
use check_dup_sets::Cli;

fn main() {
    if let Err(err) = run() {
        if matches!(err.downcast_ref::<DupError>(), Some(DupError::Cancelled)) {
            eprintln!("Interrupted");
            process::exit(EXIT_CODE_INTERRUPTED);
        }
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    init_logging(level_for(cli.verbose, cli.quiet)).context("Failed to initialise logging")?;
    info!("Starting check-dup-sets v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    cli.apply_to(&mut config);
    config.validate()?;
    debug!("Effective configuration: {:?}", config);

    let cancel = signal::install_handler().context("Failed to install Ctrl+C handler")?;

    let paths = if cli.stdin {
        info!("Reading paths from stdin");
        read_path_lines(io::stdin().lock()).context("Failed to read paths from stdin")?
    } else {
        let root = cli.path.clone().unwrap_or_else(|| PathBuf::from("."));
        let spinner = if config.progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        walk_files(&root, &cancel, &spinner)?
    };

    let summary_only = config.summary_only;
    let mut sink = ConsoleSink::new(summary_only);
    let report = Engine::new(config)
        .with_cancel(cancel)
        .run(&paths, &mut sink)?;

    print_report(&report, summary_only).context("Failed to write report")?;
    if let Some(json_path) = &cli.json {
        write_json(&report, json_path)?;
        info!("Wrote JSON report to '{}'", json_path.display());
    }

    info!(
        "Completed in {}",
        format_human_elapsed(start_time.elapsed())
    );
    Ok(())
}
