/// Free-form scans over raw JSON documents: `start_next_available_quest`
/// keys and hand-inlined canonical identifiers.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::dataset::{Dataset, JsonDoc};
use super::report::ValidationError;
use crate::schema::quest::Quest;

pub const START_NEXT_KEY: &str = "start_next_available_quest";

/// Object keys whose string values are narrative prose.
const NARRATIVE_KEYS: &[&str] = &[
    "text",
    "speaker",
    "name",
    "narrative_premise",
    "player_motivation",
];

/// Visit every object in `value` with its JSON pointer.
fn walk_objects<'v, F>(value: &'v Value, pointer: &mut String, visit: &mut F)
where
    F: FnMut(&str, &'v serde_json::Map<String, Value>),
{
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let len = pointer.len();
                pointer.push_str(&format!("/{}", i));
                walk_objects(item, pointer, visit);
                pointer.truncate(len);
            }
        }
        Value::Object(map) => {
            visit(pointer, map);
            for (key, child) in map {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(key);
                walk_objects(child, pointer, visit);
                pointer.truncate(len);
            }
        }
        _ => {}
    }
}

/// Normalised location keys of every quest that has one.
pub fn quest_locations(quests: &[Quest]) -> BTreeSet<String> {
    quests.iter().filter_map(Quest::location_key).collect()
}

/// One `start_next_available_quest` occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartNextRef {
    pub file: String,
    pub pointer: String,
    /// Trimmed, lower-cased location key.
    pub key: String,
}

/// Every non-empty `start_next_available_quest` value anywhere in `doc`.
pub fn start_next_refs(doc: &JsonDoc) -> Vec<StartNextRef> {
    let mut refs = Vec::new();
    let mut pointer = String::new();
    walk_objects(&doc.value, &mut pointer, &mut |at, map| {
        let Some(raw) = map.get(START_NEXT_KEY) else {
            return;
        };
        let key = match raw {
            Value::String(s) => s.trim().to_lowercase(),
            Value::Null => String::new(),
            other => other.to_string().trim().to_lowercase(),
        };
        if !key.is_empty() {
            refs.push(StartNextRef {
                file: doc.file.clone(),
                pointer: at.to_string(),
                key,
            });
        }
    });
    refs
}

/// Result of checking `start_next_available_quest` keys against quest
/// locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DialogAudit {
    pub quest_locations: BTreeSet<String>,
    /// Every key used, with the files using it.
    pub used: BTreeMap<String, BTreeSet<String>>,
    pub unknown: Vec<StartNextRef>,
}

impl DialogAudit {
    pub fn is_ok(&self) -> bool {
        self.unknown.is_empty()
    }

    pub fn errors(&self) -> Vec<ValidationError> {
        self.unknown
            .iter()
            .map(|r| {
                ValidationError::referential(
                    format!("{}#{}", r.file, r.pointer),
                    format!("{} '{}' is not a quest location", START_NEXT_KEY, r.key),
                )
            })
            .collect()
    }
}

pub fn audit_start_next<'a, I>(docs: I, quests: &[Quest]) -> DialogAudit
where
    I: IntoIterator<Item = &'a JsonDoc>,
{
    let mut audit = DialogAudit {
        quest_locations: quest_locations(quests),
        ..DialogAudit::default()
    };
    for doc in docs {
        for r in start_next_refs(doc) {
            audit
                .used
                .entry(r.key.clone())
                .or_default()
                .insert(r.file.clone());
            if !audit.quest_locations.contains(&r.key) {
                audit.unknown.push(r);
            }
        }
    }
    audit
}

/// `start_next_available_quest` audit over every dialog in a dataset.
pub fn audit_dataset_dialogs(dataset: &Dataset) -> DialogAudit {
    audit_start_next(
        dataset
            .quest_dialogs
            .values()
            .chain(dataset.location_dialogs.values()),
        &dataset.quests,
    )
}

/// A canonical identifier written out inside narrative text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineIdHit {
    pub file: String,
    pub pointer: String,
    pub id: String,
}

impl InlineIdHit {
    pub fn to_error(&self) -> ValidationError {
        ValidationError::referential(
            format!("{}#{}", self.file, self.pointer),
            format!("inline identifier '{}' outside the canonical definitions", self.id),
        )
    }
}

/// Identifiers matching `pattern` in the narrative strings of `doc`.
pub fn inline_ids(doc: &JsonDoc, pattern: &Regex) -> Vec<InlineIdHit> {
    let mut hits = Vec::new();
    let mut pointer = String::new();
    walk_objects(&doc.value, &mut pointer, &mut |at, map| {
        for key in NARRATIVE_KEYS {
            if let Some(Value::String(text)) = map.get(*key) {
                for found in pattern.find_iter(text) {
                    hits.push(InlineIdHit {
                        file: doc.file.clone(),
                        pointer: format!("{}/{}", at, key),
                        id: found.as_str().to_string(),
                    });
                }
            }
        }
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ValidatorConfig;
    use serde_json::json;

    fn doc(file: &str, value: Value) -> JsonDoc {
        JsonDoc {
            file: file.to_string(),
            value,
        }
    }

    fn quests_at(locations: &[&str]) -> Vec<Quest> {
        locations
            .iter()
            .enumerate()
            .map(|(i, loc)| {
                serde_json::from_value(json!({
                    "quest_id": format!("quest.test.q{}", i + 1),
                    "quest_num": i + 1,
                    "name": "Q",
                    "region": "R",
                    "location": loc,
                }))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn finds_nested_start_next_keys() {
        let d = doc(
            "dialogs/dlg_fenmire.json",
            json!({"nodes": {"a": {"choices": [
                {"text": "go", "next": "b", "start_next_available_quest": " Fenmire "},
                {"text": "stay", "next": "b", "start_next_available_quest": ""}
            ]}}}),
        );
        let refs = start_next_refs(&d);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].key, "fenmire");
        assert_eq!(refs[0].pointer, "/nodes/a/choices/0");
    }

    #[test]
    fn unknown_location_is_reported() {
        let d = doc(
            "dialogs/dlg_x.json",
            json!({"start_next_available_quest": "nowhere", "also": {"start_next_available_quest": "eldhollow"}}),
        );
        let audit = audit_start_next([&d], &quests_at(&["eldhollow", "Fenmire"]));
        assert_eq!(audit.quest_locations.len(), 2);
        assert_eq!(audit.used.len(), 2);
        assert_eq!(audit.unknown.len(), 1);
        assert!(audit.errors()[0].to_string().contains("'nowhere'"));
    }

    #[test]
    fn inline_ids_in_narrative_text_only() {
        let re = ValidatorConfig::default().inline_id_regex().unwrap();
        let d = doc(
            "data/dialogs/quest_004.json",
            json!({"nodes": {"start": {
                "speaker": "Scribe",
                "text": "File this under quest.ink.arc.03 and forget it.",
                "choices": [{"text": "Fine.", "next": "ending.final.ink"}]
            }}}),
        );
        let hits = inline_ids(&d, &re);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "quest.ink.arc.03");
        assert_eq!(hits[0].pointer, "/nodes/start/text");
    }
}
