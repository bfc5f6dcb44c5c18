use serde::{Deserialize, Serialize};
use std::fmt;

use super::effect::{Condition, Effect};

/// 1-based position of a quest in `quests.json`. Also the key of the quest's
/// dialog file and the unit of every dependency reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestNum(pub u32);

impl QuestNum {
    /// Zero-padded form used in dialog file names: `7` → `"007"`.
    pub fn padded(self) -> String {
        format!("{:03}", self.0)
    }

    /// Position of this quest in the ordered quest list.
    pub fn position(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    pub fn from_position(position: usize) -> Self {
        Self(position as u32 + 1)
    }
}

impl fmt::Display for QuestNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of authority tags a quest can belong to. The narrative
/// domains themselves come from the domain catalog, so only the two fixed
/// members are spelled out here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthorityDomain {
    /// No authority binding (`""`).
    Unbound,
    /// Story-spine quests outside every narrative domain.
    Meta,
    /// One of the catalog's narrative domains, by upper-case key.
    Narrative(String),
}

impl AuthorityDomain {
    pub fn key(&self) -> &str {
        match self {
            Self::Unbound => "",
            Self::Meta => "META",
            Self::Narrative(key) => key,
        }
    }
}

impl From<String> for AuthorityDomain {
    fn from(raw: String) -> Self {
        let key = raw.trim().to_uppercase();
        match key.as_str() {
            "" => Self::Unbound,
            "META" => Self::Meta,
            _ => Self::Narrative(key),
        }
    }
}

impl From<AuthorityDomain> for String {
    fn from(domain: AuthorityDomain) -> Self {
        domain.key().to_string()
    }
}

impl Default for AuthorityDomain {
    fn default() -> Self {
        Self::Unbound
    }
}

/// Design notes carried alongside each quest for writers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestMeta {
    #[serde(rename = "type")]
    pub kind: String,
    pub estimated_minutes: u32,
    pub unique_mechanic: String,
    pub narrative_premise: String,
    pub player_motivation: String,
    #[serde(default)]
    pub branching_outcomes: Vec<String>,
    pub failure_states: String,
}

/// One record of `quests.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    /// Canonical string identifier, e.g. `quest.ink.arc.03`.
    pub quest_id: String,
    pub quest_num: QuestNum,
    pub name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub authority_domain: AuthorityDomain,
    #[serde(default)]
    pub dependencies: Vec<QuestNum>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_conditions: Vec<Condition>,
    #[serde(default)]
    pub outcomes: Vec<Effect>,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub rewards: Vec<String>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<QuestMeta>,
}

impl Quest {
    /// Normalised location key as used by `start_next_available_quest`.
    pub fn location_key(&self) -> Option<String> {
        self.location
            .as_deref()
            .map(|loc| loc.trim().to_lowercase())
            .filter(|loc| !loc.is_empty())
    }
}
