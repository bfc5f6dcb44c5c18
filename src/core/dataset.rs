/// On-disk dataset layout and JSON document loading.

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::report::ValidationError;
use crate::schema::quest::{Quest, QuestNum};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where each document lives, relative to the dataset root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    pub quests: String,
    pub quest_dialogs: String,
    pub items: String,
    pub encounters: String,
    pub maps: String,
    pub location_dialogs: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            quests: "data/quests.json".to_string(),
            quest_dialogs: "data/dialogs".to_string(),
            items: "data/items.json".to_string(),
            encounters: "data/encounters.json".to_string(),
            maps: "maps".to_string(),
            location_dialogs: "dialogs".to_string(),
        }
    }
}

impl DatasetLayout {
    /// `data/dialogs/quest_007.json` for quest 7.
    pub fn quest_dialog(&self, quest: QuestNum) -> String {
        format!("{}/{}", self.quest_dialogs, quest_dialog_file_name(quest))
    }

    /// `dialogs/dlg_<location>.json`.
    pub fn location_dialog(&self, location: &str) -> String {
        format!("{}/dlg_{}.json", self.location_dialogs, location)
    }

    pub fn resolve(&self, root: &Path, relative: &str) -> PathBuf {
        root.join(relative)
    }
}

pub fn quest_dialog_file_name(quest: QuestNum) -> String {
    format!("quest_{}.json", quest.padded())
}

/// Quest number encoded in a `quest_NNN.json` file name.
pub fn quest_num_from_file_name(name: &str) -> Option<QuestNum> {
    let digits = name.strip_prefix("quest_")?.strip_suffix(".json")?;
    if digits.len() < 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|n| *n > 0).map(QuestNum)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DatasetError> {
    let contents = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty JSON (two-space indent) plus a trailing newline.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, DatasetError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DatasetError> {
    let text = to_pretty_json(value)?;
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, text).map_err(io_err)
}

/// Sorted `.json` file names in `dir`. A missing directory has none.
pub fn list_json_files(dir: &Path) -> Result<Vec<String>, DatasetError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let io_err = |source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// A parsed JSON document and its dataset-relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDoc {
    pub file: String,
    pub value: serde_json::Value,
}

impl JsonDoc {
    /// Convert into a typed value, reporting failure as a schema finding.
    pub fn typed<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        serde_json::from_value(self.value.clone())
            .map_err(|err| ValidationError::schema(&self.file, err))
    }
}

/// Every document of a dataset, loaded without stopping at the first bad
/// file. Read and parse failures are kept in `load_errors`.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub layout: DatasetLayout,
    /// Quest records that converted cleanly, in file order.
    pub quests: Vec<Quest>,
    /// Number of records in `quests.json`, including ones that failed.
    pub quest_records: usize,
    pub quests_doc: Option<JsonDoc>,
    /// Quest dialog documents keyed by file name.
    pub quest_dialogs: BTreeMap<String, JsonDoc>,
    /// Supplemental location dialogs keyed by file name.
    pub location_dialogs: BTreeMap<String, JsonDoc>,
    pub items: Option<JsonDoc>,
    pub encounters: Option<JsonDoc>,
    pub maps: Vec<JsonDoc>,
    pub load_errors: Vec<ValidationError>,
}

impl Dataset {
    /// Load every document under `root` according to `layout`.
    pub fn load(root: &Path, layout: &DatasetLayout) -> Dataset {
        let mut dataset = Dataset {
            layout: layout.clone(),
            ..Dataset::default()
        };

        dataset.quests_doc = dataset.load_doc(root, &layout.quests);
        if let Some(doc) = &dataset.quests_doc {
            let (quests, records, errors) = parse_quest_records(doc);
            dataset.quests = quests;
            dataset.quest_records = records;
            dataset.load_errors.extend(errors);
        }

        dataset.quest_dialogs = dataset.load_dir(root, &layout.quest_dialogs);
        dataset.location_dialogs = dataset.load_dir(root, &layout.location_dialogs);
        dataset.items = dataset.load_doc(root, &layout.items);
        dataset.encounters = dataset.load_doc(root, &layout.encounters);
        dataset.maps = dataset.load_dir(root, &layout.maps).into_values().collect();

        info!(
            "loaded {} quests, {} quest dialogs, {} location dialogs, {} maps ({} load errors)",
            dataset.quests.len(),
            dataset.quest_dialogs.len(),
            dataset.location_dialogs.len(),
            dataset.maps.len(),
            dataset.load_errors.len()
        );
        dataset
    }

    fn load_doc(&mut self, root: &Path, relative: &str) -> Option<JsonDoc> {
        let path = root.join(relative);
        debug!("loading {}", path.display());
        match read_json::<serde_json::Value>(&path) {
            Ok(value) => Some(JsonDoc {
                file: relative.to_string(),
                value,
            }),
            Err(DatasetError::Json { source, .. }) => {
                self.load_errors.push(ValidationError::parse(relative, source));
                None
            }
            Err(DatasetError::Io { source, .. }) => {
                self.load_errors.push(ValidationError::parse(relative, source));
                None
            }
            Err(err) => {
                self.load_errors.push(ValidationError::parse(relative, err));
                None
            }
        }
    }

    fn load_dir(&mut self, root: &Path, relative_dir: &str) -> BTreeMap<String, JsonDoc> {
        let mut docs = BTreeMap::new();
        let names = match list_json_files(&root.join(relative_dir)) {
            Ok(names) => names,
            Err(err) => {
                self.load_errors.push(ValidationError::parse(relative_dir, err));
                return docs;
            }
        };
        for name in names {
            let relative = format!("{}/{}", relative_dir, name);
            if let Some(doc) = self.load_doc(root, &relative) {
                docs.insert(name, doc);
            }
        }
        docs
    }

    /// Every loaded document, quests first.
    pub fn documents(&self) -> impl Iterator<Item = &JsonDoc> {
        self.quests_doc
            .iter()
            .chain(self.quest_dialogs.values())
            .chain(self.location_dialogs.values())
            .chain(self.items.iter())
            .chain(self.encounters.iter())
            .chain(self.maps.iter())
    }

    pub fn quest(&self, num: QuestNum) -> Option<&Quest> {
        self.quests.iter().find(|q| q.quest_num == num)
    }
}

/// Convert each record of `quests.json` on its own so one bad record does
/// not hide the rest.
fn parse_quest_records(doc: &JsonDoc) -> (Vec<Quest>, usize, Vec<ValidationError>) {
    let Some(records) = doc.value.as_array() else {
        return (
            Vec::new(),
            0,
            vec![ValidationError::schema(&doc.file, "expected an array of quests")],
        );
    };
    let mut quests = Vec::new();
    let mut errors = Vec::new();
    for (position, record) in records.iter().enumerate() {
        match serde_json::from_value::<Quest>(record.clone()) {
            Ok(quest) => quests.push(quest),
            Err(err) => errors.push(ValidationError::schema(
                format!("{}[{}]", doc.file, position),
                err,
            )),
        }
    }
    (quests, records.len(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = DatasetLayout::default();
        assert_eq!(layout.quest_dialog(QuestNum(7)), "data/dialogs/quest_007.json");
        assert_eq!(layout.location_dialog("fenmire"), "dialogs/dlg_fenmire.json");
    }

    #[test]
    fn quest_num_from_names() {
        assert_eq!(quest_num_from_file_name("quest_042.json"), Some(QuestNum(42)));
        assert_eq!(quest_num_from_file_name("quest_1234.json"), Some(QuestNum(1234)));
        assert_eq!(quest_num_from_file_name("quest_42.json"), None);
        assert_eq!(quest_num_from_file_name("quest_000.json"), None);
        assert_eq!(quest_num_from_file_name("dlg_fenmire.json"), None);
    }

    #[test]
    fn pretty_json_ends_with_newline() {
        let text = to_pretty_json(&serde_json::json!({"a": [1]})).unwrap();
        assert_eq!(text, "{\n  \"a\": [\n    1\n  ]\n}\n");
    }

    #[test]
    fn bad_records_are_reported_individually() {
        let doc = JsonDoc {
            file: "data/quests.json".to_string(),
            value: serde_json::json!([
                {"quest_id": "quest.meta.prologue", "quest_num": 1, "name": "A", "region": "R"},
                {"quest_id": "quest.meta.other", "name": "B", "region": "R"}
            ]),
        };
        let (quests, records, errors) = parse_quest_records(&doc);
        assert_eq!(quests.len(), 1);
        assert_eq!(records, 2);
        assert!(matches!(&errors[0], ValidationError::Schema { location, .. } if location == "data/quests.json[1]"));
    }
}
