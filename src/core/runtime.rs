/// Dialog traversal: load a graph, offer the choices whose conditions hold,
/// apply the chosen effects in order and move on until a terminal node.

use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::dataset::{read_json, DatasetError, DatasetLayout};
use super::interpreter::{apply_effect, apply_effects, conditions_hold};
use super::template::Template;
use crate::schema::dialog::{Choice, DialogDefect, DialogGraph, Node};
use crate::schema::effect::{Effect, FlagValue};
use crate::schema::quest::{Quest, QuestNum};
use crate::schema::state::GameState;

#[derive(Debug, Error)]
pub enum TraversalError {
    #[error("dialog source error: {0}")]
    Source(#[from] DatasetError),
    #[error("no dialog for {0}")]
    NotFound(DialogKey),
    #[error("dialog for {key} is unusable: {reason}")]
    Unusable { key: DialogKey, reason: DialogDefect },
    #[error("no dialog is active")]
    NoActiveDialog,
    #[error("dialog has finished")]
    Finished,
    #[error("choice {index} is not offered at node '{node}'")]
    ChoiceUnavailable { node: String, index: usize },
    #[error("node '{0}' not found")]
    MissingNode(String),
}

/// Which dialog to load: a quest's own graph or a location's
/// supplemental one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DialogKey {
    Quest(QuestNum),
    Location(String),
}

impl DialogKey {
    /// Location keys are matched trimmed and lower-cased.
    pub fn location(name: &str) -> Self {
        Self::Location(name.trim().to_lowercase())
    }
}

impl fmt::Display for DialogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quest(num) => write!(f, "quest {}", num),
            Self::Location(name) => write!(f, "location '{}'", name),
        }
    }
}

/// Where the engine gets dialog graphs from.
pub trait DialogSource {
    fn load(&self, key: &DialogKey) -> Result<DialogGraph, TraversalError>;
}

/// Dialogs read from a dataset directory.
#[derive(Debug, Clone)]
pub struct FsDialogSource {
    root: PathBuf,
    layout: DatasetLayout,
}

impl FsDialogSource {
    pub fn new(root: &Path, layout: DatasetLayout) -> Self {
        Self {
            root: root.to_path_buf(),
            layout,
        }
    }

    pub fn path_for(&self, key: &DialogKey) -> PathBuf {
        let relative = match key {
            DialogKey::Quest(num) => self.layout.quest_dialog(*num),
            DialogKey::Location(name) => self.layout.location_dialog(name),
        };
        self.layout.resolve(&self.root, &relative)
    }
}

impl DialogSource for FsDialogSource {
    fn load(&self, key: &DialogKey) -> Result<DialogGraph, TraversalError> {
        let path = self.path_for(key);
        debug!("loading {} from {}", key, path.display());
        Ok(read_json(&path)?)
    }
}

/// Dialogs held in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryDialogSource {
    dialogs: BTreeMap<DialogKey, DialogGraph>,
}

impl MemoryDialogSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: DialogKey, dialog: DialogGraph) {
        self.dialogs.insert(key, dialog);
    }

    pub fn with_quest(mut self, num: QuestNum, dialog: DialogGraph) -> Self {
        self.insert(DialogKey::Quest(num), dialog);
        self
    }

    pub fn with_location(mut self, name: &str, dialog: DialogGraph) -> Self {
        self.insert(DialogKey::location(name), dialog);
        self
    }
}

impl DialogSource for MemoryDialogSource {
    fn load(&self, key: &DialogKey) -> Result<DialogGraph, TraversalError> {
        self.dialogs
            .get(key)
            .cloned()
            .ok_or_else(|| TraversalError::NotFound(key.clone()))
    }
}

/// Quests the player could start now: not yet started, every dependency
/// completed, every availability condition holding. Ordered by number.
pub fn available_quests<'q>(quests: &'q [Quest], state: &GameState) -> Vec<&'q Quest> {
    let mut available: Vec<&Quest> = quests
        .iter()
        .filter(|q| !state.is_started(q.quest_num) && !state.is_completed(q.quest_num))
        .filter(|q| q.dependencies.iter().all(|dep| state.is_completed(*dep)))
        .filter(|q| conditions_hold(state, &q.availability_conditions))
        .collect();
    available.sort_by_key(|q| q.quest_num);
    available
}

/// What one `choose` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Node the dialog moved to.
    pub node: String,
    pub finished: bool,
    /// Quest started through `start_next_available_quest`, if any.
    pub started_quest: Option<QuestNum>,
}

#[derive(Debug, Clone)]
struct Position {
    key: DialogKey,
    node: String,
    finished: bool,
}

/// Drives one dialog at a time against a `GameState`.
pub struct DialogEngine<S: DialogSource> {
    source: S,
    cache: FxHashMap<DialogKey, DialogGraph>,
    quests: Vec<Quest>,
    state: GameState,
    active: Option<Position>,
}

impl<S: DialogSource> DialogEngine<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: FxHashMap::default(),
            quests: Vec::new(),
            state: GameState::new(),
            active: None,
        }
    }

    /// Quest list used for `complete_quest` outcomes and
    /// `start_next_available_quest`.
    pub fn with_quests(mut self, quests: Vec<Quest>) -> Self {
        self.quests = quests;
        self
    }

    pub fn with_state(mut self, state: GameState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    /// Forget the cached graph for `key` so the next start reloads it from
    /// the source. Ends the active dialog if it is the one forgotten.
    pub fn invalidate(&mut self, key: &DialogKey) {
        self.cache.remove(key);
        if self.active.as_ref().is_some_and(|p| &p.key == key) {
            debug!("dropping active dialog for {}", key);
            self.active = None;
        }
    }

    /// Drop the active dialog without touching the game state.
    pub fn end_dialog(&mut self) {
        self.active = None;
    }

    /// Load (or fetch from cache) the graph for `key`. Graphs without a
    /// usable start node are rejected.
    pub fn load(&mut self, key: &DialogKey) -> Result<&DialogGraph, TraversalError> {
        if !self.cache.contains_key(key) {
            let dialog = self.source.load(key)?;
            let fatal = dialog.defects(None).into_iter().find(|d| {
                matches!(
                    d,
                    DialogDefect::NoNodes | DialogDefect::MissingStart | DialogDefect::StartNotFound(_)
                )
            });
            if let Some(reason) = fatal {
                return Err(TraversalError::Unusable {
                    key: key.clone(),
                    reason,
                });
            }
            self.cache.insert(key.clone(), dialog);
        }
        self.cache
            .get(key)
            .ok_or_else(|| TraversalError::NotFound(key.clone()))
    }

    /// Start `key` at its start node, discarding any dialog in progress.
    /// A dialog that fails to load is logged and leaves nothing active.
    pub fn start_dialog(&mut self, key: DialogKey) -> bool {
        self.active = None;
        let (start, finished) = match self.load(&key) {
            Ok(dialog) => {
                let finished = dialog.start_node().is_some_and(Node::is_terminal);
                (dialog.start.clone(), finished)
            }
            Err(err) => {
                warn!("cannot start dialog for {}: {}", key, err);
                return false;
            }
        };
        info!("started dialog for {} at '{}'", key, start);
        self.active = Some(Position {
            key,
            node: start,
            finished,
        });
        true
    }

    pub fn start_quest_dialog(&mut self, num: QuestNum) -> bool {
        self.start_dialog(DialogKey::Quest(num))
    }

    pub fn start_location_dialog(&mut self, location: &str) -> bool {
        self.start_dialog(DialogKey::location(location))
    }

    pub fn active_key(&self) -> Option<&DialogKey> {
        self.active.as_ref().map(|p| &p.key)
    }

    pub fn current_node_id(&self) -> Option<&str> {
        self.active.as_ref().map(|p| p.node.as_str())
    }

    pub fn current_node(&self) -> Option<&Node> {
        let position = self.active.as_ref()?;
        self.cache.get(&position.key)?.nodes.get(&position.node)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The active dialog reached a terminal node.
    pub fn is_finished(&self) -> bool {
        self.active.as_ref().is_some_and(|p| p.finished)
    }

    /// Choices of the current node whose conditions hold, with their index
    /// in the node's choice list. Empty once finished.
    pub fn offered_choices(&self) -> Vec<(usize, &Choice)> {
        if self.is_finished() {
            return Vec::new();
        }
        let Some(node) = self.current_node() else {
            return Vec::new();
        };
        node.choices
            .iter()
            .enumerate()
            .filter(|(_, choice)| conditions_hold(&self.state, &choice.conditions))
            .collect()
    }

    /// Current node text with `{FLAG}` slots filled from the game state.
    /// Unknown flags stay as written.
    pub fn rendered_text(&self) -> Option<String> {
        let node = self.current_node()?;
        let text = match Template::parse(&node.text) {
            Ok(template) => template.render_with(|name| self.state.flag(name).map(flag_text)),
            Err(_) => node.text.clone(),
        };
        Some(text)
    }

    /// Take choice `index` (an index into the current node's choices).
    /// The choice must currently be offered.
    pub fn choose(&mut self, index: usize) -> Result<Step, TraversalError> {
        let position = self.active.as_ref().ok_or(TraversalError::NoActiveDialog)?;
        if position.finished {
            return Err(TraversalError::Finished);
        }
        let dialog = self
            .cache
            .get(&position.key)
            .ok_or_else(|| TraversalError::NotFound(position.key.clone()))?;
        let node = dialog
            .nodes
            .get(&position.node)
            .ok_or_else(|| TraversalError::MissingNode(position.node.clone()))?;
        let choice = node
            .choices
            .get(index)
            .filter(|c| conditions_hold(&self.state, &c.conditions))
            .ok_or_else(|| TraversalError::ChoiceUnavailable {
                node: position.node.clone(),
                index,
            })?;
        let next = dialog
            .nodes
            .get(&choice.next)
            .ok_or_else(|| TraversalError::MissingNode(choice.next.clone()))?;
        let finished = next.is_terminal();

        debug!("{}: '{}' choice {} -> '{}'", position.key, position.node, index, choice.next);
        for effect in &choice.effects {
            let newly_completed = match effect {
                Effect::CompleteQuest(num) => !self.state.is_completed(*num),
                _ => false,
            };
            apply_effect(&mut self.state, effect);
            if newly_completed {
                if let Some(quest) = effect
                    .quest_ref()
                    .and_then(|num| self.quests.iter().find(|q| q.quest_num == num))
                {
                    debug!("quest {} completed, applying outcomes", quest.quest_num);
                    apply_effects(&mut self.state, &quest.outcomes);
                }
            }
        }

        let mut started_quest = None;
        if let Some(location) = choice.start_next_available_quest.as_deref() {
            let location = location.trim().to_lowercase();
            if !location.is_empty() {
                let next_quest = available_quests(&self.quests, &self.state)
                    .into_iter()
                    .find(|q| q.location_key().as_deref() == Some(location.as_str()))
                    .map(|q| q.quest_num);
                match next_quest {
                    Some(num) => {
                        apply_effect(&mut self.state, &Effect::StartQuest(num));
                        info!("started quest {} at '{}'", num, location);
                        started_quest = Some(num);
                    }
                    None => debug!("no quest available at '{}'", location),
                }
            }
        }

        let next = choice.next.clone();
        if let Some(position) = self.active.as_mut() {
            position.node = next.clone();
            position.finished = finished;
        }
        Ok(Step {
            node: next,
            finished,
            started_quest,
        })
    }
}

impl DialogEngine<MemoryDialogSource> {
    /// Register or replace a dialog. A replaced graph takes effect on the
    /// next start.
    pub fn insert_dialog(&mut self, key: DialogKey, dialog: DialogGraph) {
        self.invalidate(&key);
        self.source.insert(key, dialog);
    }
}

fn flag_text(value: FlagValue) -> String {
    match value {
        FlagValue::Text(text) => text,
        FlagValue::Int(n) => n.to_string(),
        FlagValue::Bool(b) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::effect::{CompareOp, Condition};
    use serde_json::json;

    fn dialog(value: serde_json::Value) -> DialogGraph {
        serde_json::from_value(value).unwrap()
    }

    fn two_node(effects: serde_json::Value) -> DialogGraph {
        dialog(json!({"quest_id": 1, "start": "start", "nodes": {
            "start": {"speaker": "Scribe", "text": "Sign?", "choices": [
                {"text": "Sign.", "next": "end", "effects": effects}
            ]},
            "end": {"speaker": "Narrator", "text": "Signed.", "end": true}
        }}))
    }

    fn quest(num: u32, location: &str, deps: &[u32]) -> Quest {
        serde_json::from_value(json!({
            "quest_id": format!("quest.test.q{}", num),
            "quest_num": num,
            "name": "Q",
            "region": "R",
            "location": location,
            "dependencies": deps,
        }))
        .unwrap()
    }

    #[test]
    fn two_node_traversal_applies_effects_once_in_order() {
        let source = MemoryDialogSource::new().with_quest(
            QuestNum(1),
            two_node(json!([
                {"set_flag": "TALLY", "value": 5},
                {"inc_flag": "TALLY", "delta": 2},
                {"complete_quest": 1}
            ])),
        );
        let mut engine = DialogEngine::new(source);
        assert!(engine.start_quest_dialog(QuestNum(1)));
        assert_eq!(engine.current_node_id(), Some("start"));
        assert_eq!(engine.offered_choices().len(), 1);

        let step = engine.choose(0).unwrap();
        assert_eq!(step.node, "end");
        assert!(step.finished);
        assert!(engine.is_finished());
        assert!(engine.offered_choices().is_empty());
        assert_eq!(engine.state().score("TALLY"), 7);
        assert!(engine.state().is_completed(QuestNum(1)));
        assert!(matches!(engine.choose(0), Err(TraversalError::Finished)));
        assert_eq!(engine.state().score("TALLY"), 7);
    }

    #[test]
    fn count_true_gates_choice() {
        let seals = ["SEAL_A", "SEAL_B", "SEAL_C"];
        let mut graph = two_node(json!([]));
        let start = graph.nodes.get_mut("start").unwrap();
        start.choices[0].conditions = vec![Condition::count_true(seals, CompareOp::Ge, 3)];

        let mut engine = DialogEngine::new(MemoryDialogSource::new().with_quest(QuestNum(1), graph));
        engine.state_mut().scores.insert("SEAL_A".to_string(), 1);
        engine.state_mut().scores.insert("SEAL_B".to_string(), 1);
        assert!(engine.start_quest_dialog(QuestNum(1)));
        assert!(engine.offered_choices().is_empty());
        assert!(matches!(
            engine.choose(0),
            Err(TraversalError::ChoiceUnavailable { index: 0, .. })
        ));
        assert_eq!(engine.current_node_id(), Some("start"));

        engine.state_mut().scores.insert("SEAL_C".to_string(), 1);
        assert_eq!(engine.offered_choices().len(), 1);
        assert!(engine.choose(0).is_ok());
    }

    #[test]
    fn missing_or_empty_dialog_leaves_nothing_active() {
        let empty = dialog(json!({"quest_id": 2, "start": "start", "nodes": {}}));
        let mut engine = DialogEngine::new(
            MemoryDialogSource::new()
                .with_quest(QuestNum(1), two_node(json!([])))
                .with_quest(QuestNum(2), empty),
        );
        assert!(engine.start_quest_dialog(QuestNum(1)));
        let before = engine.state().clone();

        assert!(!engine.start_quest_dialog(QuestNum(2)));
        assert!(!engine.is_active());
        assert!(!engine.start_quest_dialog(QuestNum(9)));
        assert!(matches!(engine.choose(0), Err(TraversalError::NoActiveDialog)));
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn completion_applies_quest_outcomes_once() {
        let mut q = quest(1, "fenmire", &[]);
        q.outcomes = vec![Effect::GrantSeal("ink".to_string()), Effect::ComputeBossUnlock];
        let mut state = GameState::new();
        state.boss_seal_threshold = 1;
        let mut engine = DialogEngine::new(
            MemoryDialogSource::new().with_quest(QuestNum(1), two_node(json!([{"complete_quest": 1}]))),
        )
        .with_quests(vec![q])
        .with_state(state);

        assert!(engine.start_quest_dialog(QuestNum(1)));
        engine.choose(0).unwrap();
        assert_eq!(engine.state().score("SEAL_INK"), 1);
        assert!(engine.state().is_true("BOSS_UNLOCKED"));

        engine.state_mut().scores.insert("SEAL_INK".to_string(), 0);
        assert!(engine.start_quest_dialog(QuestNum(1)));
        engine.choose(0).unwrap();
        assert_eq!(engine.state().score("SEAL_INK"), 0);
    }

    #[test]
    fn start_next_available_quest_picks_lowest_ready_quest() {
        let location = dialog(json!({"start": "a", "nodes": {
            "a": {"speaker": "Keeper", "text": "Next?", "choices": [
                {"text": "Yes.", "next": "b", "start_next_available_quest": " Fenmire "}
            ]},
            "b": {"speaker": "Keeper", "text": "Go.", "end": true}
        }}));
        let quests = vec![
            quest(1, "fenmire", &[]),
            quest(2, "fenmire", &[]),
            quest(3, "eldhollow", &[]),
        ];
        let mut engine = DialogEngine::new(MemoryDialogSource::new().with_location("fenmire", location))
            .with_quests(quests);
        engine.state_mut().completed_quests.insert(QuestNum(1));

        assert!(engine.start_location_dialog("FENMIRE"));
        let step = engine.choose(0).unwrap();
        assert_eq!(step.started_quest, Some(QuestNum(2)));
        assert_eq!(engine.state().active_quest, Some(QuestNum(2)));
    }

    #[test]
    fn available_quests_respect_dependencies_and_conditions() {
        let mut gated = quest(3, "x", &[]);
        gated.availability_conditions = vec![Condition::flag(
            "KEYSTONE_TRIAL_DONE",
            CompareOp::Eq,
            FlagValue::Bool(true),
        )];
        let quests = vec![quest(1, "x", &[]), quest(2, "x", &[1]), gated];
        let mut state = GameState::new();
        let nums = |state: &GameState| -> Vec<u32> {
            available_quests(&quests, state).iter().map(|q| q.quest_num.0).collect()
        };
        assert_eq!(nums(&state), vec![1]);

        state.completed_quests.insert(QuestNum(1));
        state.scores.insert("KEYSTONE_TRIAL_DONE".to_string(), 1);
        assert_eq!(nums(&state), vec![2, 3]);
    }

    #[test]
    fn text_interpolates_flags() {
        let ending = dialog(json!({"quest_id": 1, "start": "end", "nodes": {
            "end": {"speaker": "Narrator", "text": "Ending: {ENDING_ID}. {UNKNOWN}", "end": true}
        }}));
        let mut engine = DialogEngine::new(MemoryDialogSource::new().with_quest(QuestNum(1), ending));
        engine
            .state_mut()
            .strings
            .insert("ENDING_ID".to_string(), "INK".to_string());
        assert!(engine.start_quest_dialog(QuestNum(1)));
        assert!(engine.is_finished());
        assert_eq!(engine.rendered_text().unwrap(), "Ending: INK. {UNKNOWN}");
    }

    #[test]
    fn starting_a_new_dialog_discards_position() {
        let mut engine = DialogEngine::new(
            MemoryDialogSource::new()
                .with_quest(QuestNum(1), two_node(json!([])))
                .with_location("fenmire", two_node(json!([]))),
        );
        assert!(engine.start_quest_dialog(QuestNum(1)));
        engine.choose(0).unwrap();
        assert!(engine.start_location_dialog("fenmire"));
        assert_eq!(engine.active_key(), Some(&DialogKey::location("fenmire")));
        assert_eq!(engine.current_node_id(), Some("start"));
        assert!(!engine.is_finished());
    }

    #[test]
    fn replacing_a_dialog_serves_the_new_graph() {
        let line = |text: &str| {
            dialog(json!({"start": "a", "nodes": {
                "a": {"speaker": "Ferryman", "text": text, "choices": [
                    {"text": "Go.", "next": "b"}
                ]},
                "b": {"speaker": "Ferryman", "text": "Gone.", "end": true}
            }}))
        };
        let mut engine = DialogEngine::new(MemoryDialogSource::new());
        engine.insert_dialog(DialogKey::location("ferry"), line("old"));
        assert!(engine.start_location_dialog("ferry"));
        assert_eq!(engine.current_node().map(|n| n.text.as_str()), Some("old"));

        engine.insert_dialog(DialogKey::location(" Ferry "), line("new"));
        assert!(!engine.is_active());
        assert!(engine.start_location_dialog("ferry"));
        assert_eq!(engine.current_node().map(|n| n.text.as_str()), Some("new"));
    }

    #[test]
    fn invalidating_another_key_keeps_the_active_dialog() {
        let source = MemoryDialogSource::new().with_quest(QuestNum(1), two_node(json!([])));
        let mut engine = DialogEngine::new(source);
        assert!(engine.start_quest_dialog(QuestNum(1)));
        engine.invalidate(&DialogKey::location("ferry"));
        assert_eq!(engine.current_node_id(), Some("start"));
    }
}
