/// Dialog Preview: interactive walk through quest and location dialogs.
///
/// Usage: dialog_preview [--root <dir>] [--quest <n> | --location <name>]
///
/// Commands:
///   <n>                take offered choice n
///   quest <n>          start a quest's dialog
///   location <name>    start a location's dialog
///   available          list quests that could start now
///   state              dump the game state as JSON
///   help               list commands
///   quit               exit

use anyhow::{Context, Result};
use authority_web::core::config::ValidatorConfig;
use authority_web::core::dataset::Dataset;
use authority_web::core::runtime::{available_quests, DialogEngine, FsDialogSource};
use authority_web::schema::quest::QuestNum;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dialog_preview")]
#[command(about = "Walk dialogs interactively against a fresh game state")]
struct Args {
    /// Dataset root directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Validator config (RON) whose layout is used
    #[arg(long)]
    config: Option<PathBuf>,

    /// Quest dialog to open first
    #[arg(long)]
    quest: Option<u32>,

    /// Location dialog to open first
    #[arg(long, conflicts_with = "quest")]
    location: Option<String>,
}

type Engine = DialogEngine<FsDialogSource>;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ValidatorConfig::load_from_ron(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ValidatorConfig::default(),
    };
    let dataset = Dataset::load(&args.root, &config.layout);
    for err in &dataset.load_errors {
        eprintln!("WARNING: {}", err);
    }
    println!("Loaded {} quests", dataset.quests.len());
    println!("Type 'help' for commands.\n");

    let source = FsDialogSource::new(&args.root, config.layout.clone());
    let mut engine = DialogEngine::new(source).with_quests(dataset.quests);

    if let Some(num) = args.quest {
        open(&mut engine, Start::Quest(QuestNum(num)));
    } else if let Some(location) = &args.location {
        open(&mut engine, Start::Location(location.clone()));
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("dialog> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "quest" => match parts.get(1).and_then(|n| n.parse::<u32>().ok()) {
                Some(num) => open(&mut engine, Start::Quest(QuestNum(num))),
                None => println!("Usage: quest <n>"),
            },
            "location" | "loc" => match parts.get(1) {
                Some(name) => open(&mut engine, Start::Location(name.to_string())),
                None => println!("Usage: location <name>"),
            },
            "available" => {
                let available = available_quests(engine.quests(), engine.state());
                if available.is_empty() {
                    println!("No quests available.");
                }
                for quest in available {
                    println!(
                        "  {:>3}  {}  ({})",
                        quest.quest_num,
                        quest.name,
                        quest.location.as_deref().unwrap_or("-")
                    );
                }
            }
            "state" => match serde_json::to_string_pretty(engine.state()) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("ERROR: {}", e),
            },
            other => match other.parse::<usize>() {
                Ok(pick) => take(&mut engine, pick),
                Err(_) => println!("Unknown command: {}. Type 'help'.", other),
            },
        }
    }

    Ok(())
}

enum Start {
    Quest(QuestNum),
    Location(String),
}

fn open(engine: &mut Engine, start: Start) {
    let started = match &start {
        Start::Quest(num) => engine.start_quest_dialog(*num),
        Start::Location(name) => engine.start_location_dialog(name),
    };
    if started {
        show(engine);
    } else {
        println!("Could not open that dialog (see log for details).");
    }
}

/// `pick` is 1-based over the offered choices.
fn take(engine: &mut Engine, pick: usize) {
    let index = match pick
        .checked_sub(1)
        .and_then(|i| engine.offered_choices().get(i).map(|(index, _)| *index))
    {
        Some(index) => index,
        None => {
            println!("No such choice.");
            return;
        }
    };
    match engine.choose(index) {
        Ok(step) => {
            if let Some(num) = step.started_quest {
                println!("[started quest {}]", num);
            }
            show(engine);
        }
        Err(e) => println!("ERROR: {}", e),
    }
}

fn show(engine: &Engine) {
    let (Some(node), Some(text)) = (engine.current_node(), engine.rendered_text()) else {
        return;
    };
    println!("\n{}:", node.speaker);
    println!("{}\n", text);
    if engine.is_finished() {
        println!("--- End ---\n");
        return;
    }
    for (n, (_, choice)) in engine.offered_choices().iter().enumerate() {
        println!("  {}. {}", n + 1, choice.text);
    }
    println!();
}

fn print_help() {
    println!("Commands:");
    println!("  <n>              take offered choice n");
    println!("  quest <n>        start a quest's dialog");
    println!("  location <name>  start a location's dialog");
    println!("  available        list quests that could start now");
    println!("  state            dump the game state as JSON");
    println!("  help             list commands");
    println!("  quit             exit");
}
