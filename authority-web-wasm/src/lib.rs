//! WASM bindings for authority-web, dialog traversal for the browser client.

use wasm_bindgen::prelude::*;

use authority_web::core::domain::DomainCatalog;
use authority_web::core::generator::WebGenerator;
use authority_web::core::runtime::{available_quests, DialogEngine, DialogKey, MemoryDialogSource};
use authority_web::schema::dialog::DialogGraph;
use authority_web::schema::quest::{Quest, QuestNum};
use authority_web::schema::state::GameState;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct ChoiceView {
    index: usize,
    text: String,
}

#[derive(serde::Serialize)]
struct NodeView {
    dialog: String,
    node: String,
    speaker: String,
    text: String,
    finished: bool,
    choices: Vec<ChoiceView>,
}

#[derive(serde::Serialize)]
struct QuestView {
    quest_num: u32,
    quest_id: String,
    name: String,
    location: Option<String>,
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

fn source_for(dialogs: Vec<DialogGraph>) -> Result<MemoryDialogSource, JsError> {
    let mut source = MemoryDialogSource::new();
    for dialog in dialogs {
        let num = dialog
            .quest_id
            .ok_or_else(|| JsError::new("Quest dialog without quest_id"))?;
        source.insert(DialogKey::Quest(num), dialog);
    }
    Ok(source)
}

// ---------------------------------------------------------------------------
// DialogSession: main WASM export
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct DialogSession {
    engine: DialogEngine<MemoryDialogSource>,
}

#[wasm_bindgen]
impl DialogSession {
    /// A session over the web generated from the builtin catalog.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<DialogSession, JsError> {
        let catalog = DomainCatalog::builtin().map_err(|e| js_err("Catalog error", e))?;
        let web = WebGenerator::new(&catalog)
            .generate()
            .map_err(|e| js_err("Generation error", e))?;
        let source = source_for(web.dialogs)?;
        Ok(DialogSession {
            engine: DialogEngine::new(source).with_quests(web.quests),
        })
    }

    /// A session over a dataset passed in as JSON: the quest list and an
    /// array of quest dialogs.
    pub fn from_json(quests_json: &str, dialogs_json: &str) -> Result<DialogSession, JsError> {
        let quests: Vec<Quest> =
            serde_json::from_str(quests_json).map_err(|e| js_err("Invalid quests JSON", e))?;
        let dialogs: Vec<DialogGraph> =
            serde_json::from_str(dialogs_json).map_err(|e| js_err("Invalid dialogs JSON", e))?;
        let source = source_for(dialogs)?;
        Ok(DialogSession {
            engine: DialogEngine::new(source).with_quests(quests),
        })
    }

    /// Register or replace a supplemental location dialog.
    pub fn add_location_dialog(&mut self, location: &str, dialog_json: &str) -> Result<(), JsError> {
        let dialog: DialogGraph =
            serde_json::from_str(dialog_json).map_err(|e| js_err("Invalid dialog JSON", e))?;
        self.engine
            .insert_dialog(DialogKey::location(location), dialog);
        Ok(())
    }

    pub fn start_quest(&mut self, quest_num: u32) -> bool {
        self.engine.start_quest_dialog(QuestNum(quest_num))
    }

    pub fn start_location(&mut self, location: &str) -> bool {
        self.engine.start_location_dialog(location)
    }

    /// The current node as JSON, or `null` when no dialog is active.
    pub fn current(&self) -> Result<String, JsError> {
        let view = self.node_view();
        serde_json::to_string(&view).map_err(|e| js_err("Serialization error", e))
    }

    /// Take choice `index` and return the new current node as JSON.
    pub fn choose(&mut self, index: usize) -> Result<String, JsError> {
        self.engine
            .choose(index)
            .map_err(|e| js_err("Traversal error", e))?;
        self.current()
    }

    /// JSON array of quests that could start now.
    pub fn available_quests(&self) -> Result<String, JsError> {
        let quests: Vec<QuestView> = available_quests(self.engine.quests(), self.engine.state())
            .into_iter()
            .map(|q| QuestView {
                quest_num: q.quest_num.0,
                quest_id: q.quest_id.clone(),
                name: q.name.clone(),
                location: q.location.clone(),
            })
            .collect();
        serde_json::to_string(&quests).map_err(|e| js_err("Serialization error", e))
    }

    pub fn state(&self) -> Result<String, JsError> {
        serde_json::to_string(self.engine.state()).map_err(|e| js_err("Serialization error", e))
    }

    /// Replace the game state with a saved one. Ends the active dialog.
    pub fn load_state(&mut self, state_json: &str) -> Result<(), JsError> {
        let state: GameState =
            serde_json::from_str(state_json).map_err(|e| js_err("Invalid state JSON", e))?;
        *self.engine.state_mut() = state;
        self.engine.end_dialog();
        Ok(())
    }

    /// Fresh game state, no active dialog.
    pub fn reset(&mut self) {
        *self.engine.state_mut() = GameState::new();
        self.engine.end_dialog();
    }
}

// Private helpers
impl DialogSession {
    fn node_view(&self) -> Option<NodeView> {
        let node = self.engine.current_node()?;
        let choices = self
            .engine
            .offered_choices()
            .into_iter()
            .map(|(index, choice)| ChoiceView {
                index,
                text: choice.text.clone(),
            })
            .collect();
        Some(NodeView {
            dialog: self.engine.active_key()?.to_string(),
            node: self.engine.current_node_id()?.to_string(),
            speaker: node.speaker.clone(),
            text: self.engine.rendered_text()?,
            finished: self.engine.is_finished(),
            choices,
        })
    }
}
