/// Generate Web: writes the quest list and one dialog per quest.
///
/// Usage: generate_web [--root <dir>] [--catalog <catalog.ron>] [--force]
///
/// Refuses to overwrite a quest list it would not reproduce unless
/// `--force` is given or FORCE_GENERATE_AUTHORITY_WEB=1 is set. Exits 2 on
/// refusal and leaves every file untouched.

use anyhow::{Context, Result};
use authority_web::core::config::ValidatorConfig;
use authority_web::core::domain::DomainCatalog;
use authority_web::core::generator::{force_from_env, GenerateError, WebGenerator};
use clap::Parser;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(name = "generate_web")]
#[command(about = "Regenerate the quest web and its dialogs from a domain catalog")]
struct Args {
    /// Dataset root directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Domain catalog (RON). Defaults to the builtin catalog
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Validator config (RON) whose layout names the output paths
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overwrite an existing dataset even if it does not match
    #[arg(long)]
    force: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<i32> {
    let catalog = match &args.catalog {
        Some(path) => DomainCatalog::load_from_ron(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => DomainCatalog::builtin().context("loading builtin catalog")?,
    };
    let layout = match &args.config {
        Some(path) => {
            ValidatorConfig::load_from_ron(path)
                .with_context(|| format!("loading config {}", path.display()))?
                .layout
        }
        None => ValidatorConfig::default().layout,
    };

    let generator = WebGenerator::new(&catalog);
    let web = generator.generate().context("generating quest web")?;
    let force = args.force || force_from_env();

    match web.write_to(&args.root, &layout, force) {
        Ok(summary) => {
            println!(
                "Wrote {} quests to {}",
                web.quests.len(),
                summary.quests_path.display()
            );
            println!(
                "Wrote {} dialogs under {}",
                summary.dialog_files,
                args.root.join(&layout.quest_dialogs).display()
            );
            Ok(0)
        }
        Err(err @ GenerateError::Guard { .. }) => {
            eprintln!("ERROR: {}", err);
            Ok(2)
        }
        Err(err) => Err(err).context("writing dataset"),
    }
}
