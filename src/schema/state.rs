use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::effect::FlagValue;
use super::quest::QuestNum;

/// String flag holding the clause the player bound to (`""` while unbound).
pub const CLAUSE_FLAG: &str = "CLAUSE_SET";
/// String flag holding the censure resolution.
pub const CENSURE_MODE_FLAG: &str = "CENSURE_MODE";
/// Censure mode before the hearing resolves it.
pub const CENSURE_UNRESOLVED: &str = "unresolved";
/// Numeric flag derived from the seal count.
pub const BOSS_UNLOCKED_FLAG: &str = "BOSS_UNLOCKED";
pub const KEYSTONE_DONE_FLAG: &str = "KEYSTONE_TRIAL_DONE";
pub const ENDING_FLAG: &str = "ENDING_ID";
pub const CENSURE_SCORE_FLAG: &str = "CENSURE";
/// Seals are numeric flags named `SEAL_<DOMAIN>`.
pub const SEAL_PREFIX: &str = "SEAL_";
/// Seals needed before the boss unlocks, unless a state says otherwise.
pub const DEFAULT_BOSS_SEALS: usize = 3;

pub fn seal_flag(domain_key: &str) -> String {
    format!("{}{}", SEAL_PREFIX, domain_key)
}

pub fn domain_score_flag(domain_key: &str) -> String {
    format!("DOMAIN_{}_SCORE", domain_key)
}

fn default_boss_seals() -> usize {
    DEFAULT_BOSS_SEALS
}

/// World state the dialog core reads and writes. Owned by the game session;
/// the core only touches it through effects and conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Numeric flags and scores. Booleans are stored as 0/1.
    #[serde(default)]
    pub scores: BTreeMap<String, i64>,
    /// String-valued flags (clause, censure mode, ending id).
    #[serde(default)]
    pub strings: BTreeMap<String, String>,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub active_quest: Option<QuestNum>,
    #[serde(default)]
    pub started_quests: BTreeSet<QuestNum>,
    #[serde(default)]
    pub completed_quests: BTreeSet<QuestNum>,
    #[serde(default)]
    pub current_map: Option<String>,
    #[serde(default)]
    pub current_scene: Option<String>,
    #[serde(default = "default_boss_seals")]
    pub boss_seal_threshold: usize,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// A fresh session: nothing started, clause unbound, censure unresolved.
    pub fn new() -> Self {
        let mut strings = BTreeMap::new();
        strings.insert(CLAUSE_FLAG.to_string(), String::new());
        strings.insert(CENSURE_MODE_FLAG.to_string(), CENSURE_UNRESOLVED.to_string());
        Self {
            scores: BTreeMap::new(),
            strings,
            inventory: Vec::new(),
            active_quest: None,
            started_quests: BTreeSet::new(),
            completed_quests: BTreeSet::new(),
            current_map: None,
            current_scene: None,
            boss_seal_threshold: DEFAULT_BOSS_SEALS,
        }
    }

    /// Current value of a flag. String flags win over numeric ones of the
    /// same name; unknown flags read as `None`.
    pub fn flag(&self, name: &str) -> Option<FlagValue> {
        if let Some(text) = self.strings.get(name) {
            return Some(FlagValue::Text(text.clone()));
        }
        self.scores.get(name).map(|n| FlagValue::Int(*n))
    }

    pub fn score(&self, name: &str) -> i64 {
        self.scores.get(name).copied().unwrap_or(0)
    }

    pub fn text(&self, name: &str) -> &str {
        self.strings.get(name).map(String::as_str).unwrap_or("")
    }

    /// A flag is true when it is a non-zero number or a non-empty string.
    pub fn is_true(&self, name: &str) -> bool {
        match self.flag(name) {
            Some(FlagValue::Int(n)) => n != 0,
            Some(FlagValue::Bool(b)) => b,
            Some(FlagValue::Text(s)) => !s.is_empty(),
            None => false,
        }
    }

    /// Number of `SEAL_*` flags currently true.
    pub fn seal_count(&self) -> usize {
        self.scores
            .iter()
            .filter(|(name, value)| name.starts_with(SEAL_PREFIX) && **value != 0)
            .count()
    }

    pub fn is_completed(&self, quest: QuestNum) -> bool {
        self.completed_quests.contains(&quest)
    }

    pub fn is_started(&self, quest: QuestNum) -> bool {
        self.started_quests.contains(&quest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_defaults() {
        let state = GameState::new();
        assert_eq!(state.text(CLAUSE_FLAG), "");
        assert_eq!(state.text(CENSURE_MODE_FLAG), CENSURE_UNRESOLVED);
        assert_eq!(state.boss_seal_threshold, DEFAULT_BOSS_SEALS);
        assert!(!state.is_true(CLAUSE_FLAG));
        assert!(state.is_true(CENSURE_MODE_FLAG));
        assert_eq!(state.seal_count(), 0);
    }

    #[test]
    fn seal_count_ignores_other_scores() {
        let mut state = GameState::new();
        state.scores.insert(seal_flag("INK"), 1);
        state.scores.insert(seal_flag("BLOOD"), 0);
        state.scores.insert(domain_score_flag("INK"), 5);
        assert_eq!(state.seal_count(), 1);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = GameState::new();
        state.scores.insert("CENSURE".to_string(), 2);
        state.completed_quests.insert(QuestNum(1));
        let json = serde_json::to_string(&state).unwrap();
        let back: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let state: GameState = serde_json::from_str("{}").unwrap();
        assert_eq!(state.boss_seal_threshold, DEFAULT_BOSS_SEALS);
        assert!(state.scores.is_empty());
    }
}
