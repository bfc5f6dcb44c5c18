/// Runtime integration tests: walking generated dialogs from disk.

use authority_web::core::dataset::{Dataset, DatasetLayout};
use authority_web::core::domain::DomainCatalog;
use authority_web::core::generator::WebGenerator;
use authority_web::core::runtime::{available_quests, DialogEngine, FsDialogSource};
use authority_web::schema::quest::QuestNum;
use std::fs;
use std::path::{Path, PathBuf};

fn generated_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "authority-web-rt-{}-{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&root);
    let catalog = DomainCatalog::builtin().unwrap();
    let web = WebGenerator::new(&catalog).generate().unwrap();
    web.write_to(&root, &DatasetLayout::default(), false).unwrap();
    root
}

fn engine_for(root: &Path) -> DialogEngine<FsDialogSource> {
    let layout = DatasetLayout::default();
    let dataset = Dataset::load(root, &layout);
    assert_eq!(dataset.quests.len(), 100);
    DialogEngine::new(FsDialogSource::new(root, layout)).with_quests(dataset.quests)
}

/// Take the first offered choice until the dialog ends.
fn play_through(engine: &mut DialogEngine<FsDialogSource>) -> usize {
    let mut steps = 0;
    while !engine.is_finished() {
        let (index, _) = engine.offered_choices()[0];
        engine.choose(index).unwrap();
        steps += 1;
        assert!(steps < 20, "dialog does not terminate");
    }
    steps
}

#[test]
fn prologue_dialog_completes_its_quest() {
    let root = generated_root("prologue");
    let mut engine = engine_for(&root);

    assert!(engine.start_quest_dialog(QuestNum(1)));
    assert_eq!(engine.current_node_id(), Some("start"));
    assert_eq!(play_through(&mut engine), 3);
    assert!(engine.state().is_completed(QuestNum(1)));
    assert!(engine.state().is_true("Q_READY_001"));
    assert_eq!(engine.state().active_quest, None);
}

#[test]
fn whole_web_can_be_played_to_an_ending() {
    let root = generated_root("full");
    let mut engine = engine_for(&root);

    let mut played = 0;
    while let Some(num) = available_quests(engine.quests(), engine.state())
        .first()
        .map(|q| q.quest_num)
    {
        assert!(engine.start_quest_dialog(num), "quest {} dialog", num);
        play_through(&mut engine);
        assert!(engine.state().is_completed(num), "quest {} not completed", num);
        played += 1;
        assert!(played <= 100);
    }

    let state = engine.state();
    assert_eq!(state.completed_quests.len(), 100);
    assert_eq!(state.seal_count(), 5);
    assert!(state.is_true("KEYSTONE_TRIAL_DONE"));
    assert!(state.is_true("BOSS_UNLOCKED"));
    assert_eq!(state.text("CENSURE_MODE"), "reduced");
    assert_eq!(state.text("ENDING_ID"), "INK");
    assert!(engine.rendered_text().unwrap().ends_with("Ending: INK."));
}

#[test]
fn keystone_stays_locked_until_three_seals() {
    let root = generated_root("keystone");
    let mut engine = engine_for(&root);
    engine.state_mut().completed_quests.insert(QuestNum(1));
    let keystone_open = |engine: &DialogEngine<FsDialogSource>| {
        available_quests(engine.quests(), engine.state())
            .iter()
            .any(|q| q.quest_num == QuestNum(97))
    };

    for key in ["INK", "BLOOD"] {
        engine.state_mut().scores.insert(format!("SEAL_{}", key), 1);
    }
    assert!(!keystone_open(&engine));
    engine.state_mut().scores.insert("SEAL_DEBT".to_string(), 1);
    assert!(keystone_open(&engine));
}

#[test]
fn missing_dialog_file_leaves_state_untouched() {
    let root = generated_root("missing");
    fs::remove_file(root.join("data/dialogs/quest_005.json")).unwrap();
    let mut engine = engine_for(&root);
    let before = engine.state().clone();

    assert!(!engine.start_quest_dialog(QuestNum(5)));
    assert!(!engine.is_active());
    assert_eq!(engine.state(), &before);
}
