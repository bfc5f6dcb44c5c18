/// Validate Data: dependency graph and cross-file integrity gate.
///
/// Usage: validate_data [--root <dir>] [--config <config.ron>] [--catalog <catalog.ron>] [--json]
///
/// Exits 1 when any error is found. Warnings never fail the gate.

use anyhow::{Context, Result};
use authority_web::core::domain::DomainCatalog;
use authority_web::core::integrity::Validator;
use authority_web::core::report::ValidationReport;
use clap::Parser;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(name = "validate_data")]
#[command(about = "Validate quests, dialogs, items, encounters and maps")]
struct Args {
    /// Dataset root directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Validator config (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Domain catalog (RON) the allowed authority domains come from
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Print the full report as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<bool> {
    let mut builder = Validator::builder();
    if let Some(path) = &args.config {
        builder = builder
            .config_file(path)
            .with_context(|| format!("loading config {}", path.display()))?;
    }
    if let Some(path) = &args.catalog {
        let catalog = DomainCatalog::load_from_ron(path)
            .with_context(|| format!("loading catalog {}", path.display()))?;
        builder = builder.catalog(catalog);
    }
    let validator = builder.build().context("building validator")?;
    let report = validator.validate_dir(&args.root);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serializing report")?
        );
    } else {
        print_report(&report, validator.config().max_warnings_shown);
    }
    Ok(report.is_ok())
}

fn print_report(report: &ValidationReport, max_warnings: usize) {
    println!("\n=== Dataset Validation Report ===\n");
    let stats = &report.stats;
    println!(
        "Checked {} quests, {} quest dialogs, {} location dialogs, {} items, {} encounters, {} maps ({} regions)\n",
        stats.quests,
        stats.quest_dialogs,
        stats.location_dialogs,
        stats.items,
        stats.encounters,
        stats.maps,
        stats.regions
    );

    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in report.warnings.iter().take(max_warnings) {
        println!("WARNING: {}", warning);
    }
    if report.warnings.len() > max_warnings {
        println!(
            "WARNING: ... and {} more",
            report.warnings.len() - max_warnings
        );
    }

    for error in &report.errors {
        println!("ERROR: {}", error);
    }

    if !report.errors.is_empty() {
        let counts: Vec<String> = report
            .counts_by_kind()
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(kind, n)| format!("{} {}", n, kind))
            .collect();
        println!("\nBy kind: {}", counts.join(", "));
    }

    println!("\n{}", report.summary());
}
