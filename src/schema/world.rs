/// Read-only world data the validator cross-references: items, maps and
/// encounters. Identifier fields are defaulted so a missing id surfaces as
/// a validation finding instead of a parse failure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedItem {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub exits: Vec<Exit>,
    #[serde(default)]
    pub items: Vec<PlacedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDoc {
    #[serde(default)]
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActId {
    Number(u32),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawn {
    #[serde(default)]
    pub id: Option<String>,
}

/// An `encounters.json` entry in either accepted shape: a flat record with
/// its own `id`, or a spawn table `{region, act, spawns: [{id}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub act: Option<ActId>,
    #[serde(default)]
    pub spawns: Option<Vec<Spawn>>,
}

/// Shape an encounter entry resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncounterShape<'a> {
    Flat(&'a str),
    Table(Vec<Option<&'a str>>),
    Malformed,
}

impl EncounterEntry {
    pub fn shape(&self) -> EncounterShape<'_> {
        if let Some(id) = self.id.as_deref().filter(|id| !id.trim().is_empty()) {
            return EncounterShape::Flat(id);
        }
        match (&self.region, &self.act, &self.spawns) {
            (Some(region), Some(_), Some(spawns)) if !region.trim().is_empty() => {
                EncounterShape::Table(
                    spawns
                        .iter()
                        .map(|s| s.id.as_deref().filter(|id| !id.trim().is_empty()))
                        .collect(),
                )
            }
            _ => EncounterShape::Malformed,
        }
    }
}
