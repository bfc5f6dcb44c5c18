/// Validation integration tests: hand-built datasets on disk, checked
/// through the library and through the `validate_data`/`audit_dialogs`
/// binaries.

use authority_web::core::config::ValidatorConfig;
use authority_web::core::integrity::Validator;
use authority_web::core::report::{ValidationError, ValidationReport};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
#[cfg(feature = "cli")]
use std::process::Command;

fn temp_root(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "authority-web-val-{}-{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(root: &Path, relative: &str, value: &Value) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn quest(num: u32, deps: &[u32]) -> Value {
    json!({
        "quest_id": format!("quest.test.q{}", num),
        "quest_num": num,
        "name": format!("Quest {}", num),
        "region": "Fenmire",
        "location": "fenmire",
        "authority_domain": "META",
        "dependencies": deps,
    })
}

fn sound_dialog(num: u32) -> Value {
    json!({"quest_id": num, "start": "start", "nodes": {
        "start": {"speaker": "Reeve", "text": "Ready?", "choices": [
            {"text": "Yes.", "next": "end", "effects": [{"start_quest": num}, {"complete_quest": num}]}
        ]},
        "end": {"speaker": "Narrator", "text": "Done.", "end": true}
    }})
}

/// Two sound quests, one item in one region, one location dialog.
fn write_dataset(root: &Path) {
    write(root, "data/quests.json", &json!([quest(1, &[]), quest(2, &[1])]));
    write(root, "data/dialogs/quest_001.json", &sound_dialog(1));
    write(root, "data/dialogs/quest_002.json", &sound_dialog(2));
    write(root, "data/items.json", &json!([{"id": "rope", "weight": 1.0}]));
    write(root, "data/encounters.json", &json!([{"id": "wolves"}]));
    write(
        root,
        "maps/fenmire.json",
        &json!({"regions": [
            {"id": "reed_bank", "exits": [{"to": "ferry"}], "items": [{"id": "rope"}]},
            {"id": "ferry", "exits": [{"to": "reed_bank"}]}
        ]}),
    );
    write(
        root,
        "dialogs/dlg_fenmire.json",
        &json!({"start": "a", "nodes": {
            "a": {"speaker": "Ferryman", "text": "Cross?", "choices": [
                {"text": "Yes.", "next": "b", "start_next_available_quest": "fenmire"}
            ]},
            "b": {"speaker": "Ferryman", "text": "Off you go.", "end": true}
        }}),
    );
}

fn validator() -> Validator {
    Validator::builder()
        .config(ValidatorConfig {
            min_quests: 1,
            ..ValidatorConfig::default()
        })
        .build()
        .unwrap()
}

fn messages(report: &ValidationReport) -> Vec<String> {
    report.errors.iter().map(ToString::to_string).collect()
}

#[test]
fn clean_dataset_passes() {
    let root = temp_root("clean");
    write_dataset(&root);
    let report = validator().validate_dir(&root);
    assert!(report.is_ok(), "{:#?}", report.errors);
    assert!(report.warnings.is_empty());
}

#[test]
fn two_quest_cycle_is_a_graph_error_naming_both() {
    let root = temp_root("cycle");
    write_dataset(&root);
    write(&root, "data/quests.json", &json!([quest(1, &[2]), quest(2, &[1])]));

    let report = validator().validate_dir(&root);
    let graph: Vec<&ValidationError> = report
        .errors
        .iter()
        .filter(|e| matches!(e, ValidationError::Graph { .. }))
        .collect();
    assert_eq!(graph.len(), 1);
    let text = graph[0].to_string();
    assert!(text.contains("quest.test.q1"), "{}", text);
    assert!(text.contains("quest.test.q2"), "{}", text);
}

#[test]
fn dead_end_node_is_a_schema_error() {
    let root = temp_root("dead-end");
    write_dataset(&root);
    let mut dialog = sound_dialog(2);
    dialog["nodes"]["start"]["choices"] = json!([]);
    write(&root, "data/dialogs/quest_002.json", &dialog);

    let report = validator().validate_dir(&root);
    assert!(report.errors.iter().any(|e| matches!(
        e,
        ValidationError::Schema { location, message }
            if location == "data/dialogs/quest_002.json" && message.contains("dead end: node 'start'")
    )));
}

#[test]
fn completing_another_quest_is_not_enough() {
    let root = temp_root("wrong-completion");
    write_dataset(&root);
    write(
        &root,
        "data/dialogs/quest_002.json",
        &json!({"quest_id": 2, "start": "start", "nodes": {
            "start": {"speaker": "Reeve", "text": "Ready?", "choices": [
                {"text": "Yes.", "next": "end", "effects": [{"complete_quest": 1}]}
            ]},
            "end": {"speaker": "Narrator", "text": "Done.", "end": true}
        }}),
    );
    let report = validator().validate_dir(&root);
    assert_eq!(
        messages(&report),
        vec!["schema error: data/dialogs/quest_002.json: no reachable complete_quest effect for quest 2".to_string()]
    );
}

#[test]
fn unknown_placed_item_names_map_region_and_item() {
    let root = temp_root("item");
    write_dataset(&root);
    write(
        &root,
        "maps/fenmire.json",
        &json!({"regions": [
            {"id": "reed_bank", "exits": [{"to": "ferry"}], "items": [{"id": "rope"}]},
            {"id": "ferry", "exits": [{"to": "reed_bank"}], "items": [{"id": "oar"}]}
        ]}),
    );
    let report = validator().validate_dir(&root);
    assert_eq!(
        messages(&report),
        vec!["referential error: maps/fenmire.json region=ferry: item 'oar' not found in data/items.json".to_string()]
    );
}

#[test]
fn every_parse_error_is_collected() {
    let root = temp_root("parse");
    write_dataset(&root);
    fs::write(root.join("data/dialogs/quest_001.json"), "{ not json").unwrap();
    fs::write(root.join("maps/broken.json"), "[1, 2,").unwrap();
    write(&root, "data/items.json", &json!([{"id": "rope"}, {"id": "rope"}]));

    let report = validator().validate_dir(&root);
    let counts = report.counts_by_kind();
    assert_eq!(counts[0], ("parse", 2));
    assert!(messages(&report).iter().any(|m| m.contains("duplicate item id 'rope'")));
    // The unreadable dialog is reported once, as a parse error.
    assert!(!messages(&report).iter().any(|m| m.contains("missing dialog for quest 1")));
}

#[test]
fn unknown_start_next_location_is_referential() {
    let root = temp_root("start-next");
    write_dataset(&root);
    write(
        &root,
        "dialogs/dlg_fenmire.json",
        &json!({"start": "a", "nodes": {
            "a": {"speaker": "Ferryman", "text": "Cross?", "choices": [
                {"text": "Yes.", "next": "b", "start_next_available_quest": "Atlantis"}
            ]},
            "b": {"speaker": "Ferryman", "text": "Off you go.", "end": true}
        }}),
    );
    let report = validator().validate_dir(&root);
    assert_eq!(report.errors.len(), 1);
    assert!(messages(&report)[0].contains("'atlantis' is not a quest location"));
}

#[cfg(feature = "cli")]
fn write_config(root: &Path) -> PathBuf {
    let path = root.join("validator.ron");
    fs::write(&path, "ValidatorConfig(min_quests: 1)").unwrap();
    path
}

#[cfg(feature = "cli")]
#[test]
fn validate_data_cli_exit_codes_and_output() {
    let root = temp_root("cli");
    write_dataset(&root);
    let config = write_config(&root);

    let ok = Command::new(env!("CARGO_BIN_EXE_validate_data"))
        .arg("--root")
        .arg(&root)
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(ok.status.success());
    assert!(String::from_utf8_lossy(&ok.stdout).contains("Summary: 0 errors, 0 warnings"));

    write(&root, "data/quests.json", &json!([quest(1, &[2]), quest(2, &[1])]));
    let failed = Command::new(env!("CARGO_BIN_EXE_validate_data"))
        .arg("--root")
        .arg(&root)
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(failed.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&failed.stdout);
    assert!(stdout.contains("ERROR: graph error: dependency cycle"), "{}", stdout);

    let json_out = Command::new(env!("CARGO_BIN_EXE_validate_data"))
        .arg("--root")
        .arg(&root)
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .output()
        .unwrap();
    assert_eq!(json_out.status.code(), Some(1));
    let report: Value = serde_json::from_slice(&json_out.stdout).unwrap();
    assert_eq!(report["errors"][0]["kind"], "graph");
}

#[cfg(feature = "cli")]
#[test]
fn audit_dialogs_cli_flags_unknown_keys() {
    let root = temp_root("audit-cli");
    write_dataset(&root);
    let run = || {
        Command::new(env!("CARGO_BIN_EXE_audit_dialogs"))
            .arg("--root")
            .arg(&root)
            .output()
            .unwrap()
    };
    assert!(run().status.success());

    write(
        &root,
        "dialogs/dlg_ferry.json",
        &json!({"start": "a", "nodes": {
            "a": {"speaker": "F", "text": "?", "choices": [
                {"text": "Go.", "next": "b", "start_next_available_quest": "nowhere"}
            ]},
            "b": {"speaker": "F", "text": ".", "end": true}
        }}),
    );
    let failed = run();
    assert_eq!(failed.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&failed.stdout).contains("'nowhere'"));
}

#[cfg(feature = "cli")]
#[test]
fn generate_web_cli_refuses_with_exit_two() {
    let root = temp_root("gen-cli");
    write(&root, "data/quests.json", &json!([quest(1, &[])]));
    let before = fs::read_to_string(root.join("data/quests.json")).unwrap();

    let refused = Command::new(env!("CARGO_BIN_EXE_generate_web"))
        .arg("--root")
        .arg(&root)
        .env_remove("FORCE_GENERATE_AUTHORITY_WEB")
        .output()
        .unwrap();
    assert_eq!(refused.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&refused.stderr).contains("refusing to overwrite"));
    assert_eq!(fs::read_to_string(root.join("data/quests.json")).unwrap(), before);

    let forced = Command::new(env!("CARGO_BIN_EXE_generate_web"))
        .arg("--root")
        .arg(&root)
        .env("FORCE_GENERATE_AUTHORITY_WEB", "1")
        .output()
        .unwrap();
    assert!(forced.status.success());
    assert!(root.join("data/dialogs/quest_100.json").exists());
}
