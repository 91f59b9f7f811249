//! `hts` — run hydrothermal scheduling studies from the command line.
//!
//! Each study file is read, dispatched with its configured method, simulated
//! and written under `<out>/<study_name>/<epoch_seconds>/` (text report plus
//! CSV series). When more than one study is given, a comparison of their
//! mean scenarios lands under `<out>/multi/<epoch_seconds>/`.

use anyhow::{Context, Result};
use clap::Parser;
use hts_algo::StudyResult;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "hts", author, version, about = "Stochastic hydrothermal scheduling studies", long_about = None)]
struct Cli {
    /// Study files (JSON), one per study to run
    #[arg(required = true)]
    studies: Vec<PathBuf>,

    /// Root directory for study outputs
    #[arg(short, long, default_value = "results")]
    out: PathBuf,

    /// Set the logging level
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install log subscriber");
    }

    if let Err(err) = run(&cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("reading system clock")?
        .as_secs();

    let mut results: Vec<StudyResult> = Vec::with_capacity(cli.studies.len());
    for path in &cli.studies {
        let study = hts_io::read_study(path)?;
        info!(
            study = %study.config.study_name,
            method = %study.config.method,
            file = %path.display(),
            "running study"
        );
        let result = hts_algo::run_study(&study)
            .with_context(|| format!("running study {}", study.config.study_name))?;
        if !result.converged {
            info!(
                study = %study.config.study_name,
                iterations = result.iterations,
                "study stopped at the iteration limit; results reported anyway"
            );
        }

        let study_dir = cli
            .out
            .join(&result.config.study_name)
            .join(epoch.to_string());
        hts_io::write_report(&result, &study_dir)?;
        hts_io::export_csvs(&result, &study_dir)?;
        info!(output = %study_dir.display(), "study output written");
        results.push(result);
    }

    if results.len() > 1 {
        let multi_dir = cli.out.join("multi").join(epoch.to_string());
        hts_io::export_comparison(&results, &multi_dir)?;
        info!(output = %multi_dir.display(), "multi-study comparison written");
    }

    Ok(())
}
