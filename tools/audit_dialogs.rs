/// Audit Dialogs: checks every `start_next_available_quest` key against
/// the quest locations.
///
/// Usage: audit_dialogs [--root <dir>] [--config <config.ron>] [--verbose]

use anyhow::{Context, Result};
use authority_web::core::audit::audit_dataset_dialogs;
use authority_web::core::config::ValidatorConfig;
use authority_web::core::dataset::Dataset;
use clap::Parser;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(name = "audit_dialogs")]
#[command(about = "Check start_next_available_quest keys against quest locations")]
struct Args {
    /// Dataset root directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Validator config (RON) whose layout is used
    #[arg(long)]
    config: Option<PathBuf>,

    /// List every key in use and the files using it
    #[arg(short, long)]
    verbose: bool,
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
    let config = match &args.config {
        Some(path) => ValidatorConfig::load_from_ron(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ValidatorConfig::default(),
    };
    let dataset = Dataset::load(&args.root, &config.layout);
    let audit = audit_dataset_dialogs(&dataset);

    println!("\n=== Dialog Audit ===\n");
    println!(
        "{} quest locations, {} keys in use",
        audit.quest_locations.len(),
        audit.used.len()
    );
    if args.verbose {
        for (key, files) in &audit.used {
            let files: Vec<&str> = files.iter().map(String::as_str).collect();
            println!("  {} <- {}", key, files.join(", "));
        }
    }
    for err in &dataset.load_errors {
        println!("WARNING: skipped: {}", err);
    }
    for err in audit.errors() {
        println!("ERROR: {}", err);
    }
    println!(
        "\nSummary: {} errors, {} warnings",
        audit.unknown.len(),
        dataset.load_errors.len()
    );
    Ok(audit.is_ok())
}
