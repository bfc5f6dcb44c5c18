/// Domain catalog: the narrative archetypes, regions and prose banks the
/// generator draws from.

use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::template::Template;
use crate::schema::state::seal_flag;

const BUILTIN_CATALOG: &str = include_str!("../../domain_data/authority_web.ron");

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid domain catalog: {0}")]
    Invalid(String),
}

/// One narrative archetype (Ink, Blood, ...).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "Domain")]
pub struct Domain {
    /// Upper-case key used in flags and `authority_domain` (`INK`).
    pub key: String,
    /// Lower-case clause id, also the canonical quest-id segment (`ink`).
    pub clause: String,
    pub title: String,
    pub virtue: String,
    pub wound: String,
    pub verb: String,
    /// Label of this domain's crown in the final quest.
    pub ending: String,
    pub palette: Vec<String>,
    pub speakers: Vec<String>,
    pub nouns: Vec<String>,
}

impl Domain {
    pub fn seal_flag(&self) -> String {
        seal_flag(&self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename = "Region")]
pub struct RegionInfo {
    pub id: String,
    pub name: String,
}

/// Authored framing for a fixed story-spine quest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "Beat")]
pub struct Beat {
    pub name: String,
    pub mechanic: Template,
    /// Index of the domain whose vocabulary flavours this quest.
    pub flavour: usize,
    #[serde(default)]
    pub beat: Option<Template>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "Gates")]
pub struct Gates {
    pub keystone: Beat,
    pub hearing: Beat,
    pub price: Beat,
    pub finale: Beat,
}

/// Boilerplate shared by every generated quest record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "QuestDefaults")]
pub struct QuestDefaults {
    pub kind: String,
    pub minutes: u32,
    pub arc_minutes: u32,
    pub tags: Vec<String>,
    pub objectives: Vec<String>,
    pub rewards: Vec<String>,
    pub mechanic: String,
    pub motivation: String,
    pub branching: Vec<String>,
    pub failure: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "Prose")]
pub struct Prose {
    pub premise: Template,
    pub default_beat: Template,
    pub invitation_name: Template,
    pub invitation_mechanic: Template,
    pub invitation_beat: Template,
    pub arc_name: Template,
    pub arc_mechanic: Template,
    pub arc_beat: Template,
    pub seal_mechanic: Template,
    pub seal_beat: Template,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "KeystoneText")]
pub struct KeystoneText {
    pub speaker: String,
    pub open: Template,
    pub enter: Vec<Template>,
    pub measure: Template,
    pub take: Template,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "HearingText")]
pub struct HearingText {
    pub speaker: String,
    pub open: Template,
    pub reduce: Template,
    pub defy: Template,
    pub verdict: Template,
    pub finalize: Template,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "FinaleText")]
pub struct FinaleText {
    pub speaker: String,
    pub open: Template,
    pub choice: Template,
    pub ending_suffix: Template,
}

/// Text for the generic `start → hinge → vow → end` dialog and the
/// special-role overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "DialogText")]
pub struct DialogText {
    pub intro: Template,
    pub hinge_open: Template,
    pub hinge_line: Template,
    pub hinge_close: Template,
    pub vow: Template,
    pub end: Template,
    pub narrator: String,
    pub proceed: Vec<Template>,
    pub clause_choice: Template,
    pub answer_for: Template,
    pub answer_against: Template,
    pub invoke_clause: Template,
    pub close: Vec<Template>,
    pub keystone: KeystoneText,
    pub hearing: HearingText,
    pub finale: FinaleText,
}

// RON deserialization shape. Validation happens in `DomainCatalog::validate`.
#[derive(Debug, Deserialize)]
#[serde(rename = "Catalog")]
struct RonCatalog {
    arc_length: usize,
    keystone_seals: usize,
    regions: Vec<RegionInfo>,
    verbs: Vec<String>,
    domains: Vec<Domain>,
    prologue: Beat,
    gates: Gates,
    quest: QuestDefaults,
    prose: Prose,
    dialog: DialogText,
}

/// Everything the generator needs to know about the narrative world.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainCatalog {
    pub arc_length: usize,
    pub keystone_seals: usize,
    pub regions: Vec<RegionInfo>,
    pub verbs: Vec<String>,
    pub domains: Vec<Domain>,
    pub prologue: Beat,
    pub gates: Gates,
    pub quest: QuestDefaults,
    pub prose: Prose,
    pub dialog: DialogText,
}

impl DomainCatalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<DomainCatalog, DomainError> {
        Self::parse_ron(BUILTIN_CATALOG)
    }

    /// Load a catalog from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<DomainCatalog, DomainError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a catalog from a RON string.
    pub fn parse_ron(input: &str) -> Result<DomainCatalog, DomainError> {
        let raw: RonCatalog = ron::from_str(input)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RonCatalog) -> Result<DomainCatalog, DomainError> {
        let catalog = DomainCatalog {
            arc_length: raw.arc_length,
            keystone_seals: raw.keystone_seals,
            regions: raw.regions,
            verbs: raw.verbs,
            domains: raw.domains,
            prologue: raw.prologue,
            gates: raw.gates,
            quest: raw.quest,
            prose: raw.prose,
            dialog: raw.dialog,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check the invariants the generator relies on: non-empty banks,
    /// unique keys, a reachable keystone and in-range beat flavours.
    /// Catalogs built or edited in code should pass this before use.
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |msg: String| Err(DomainError::Invalid(msg));

        if self.domains.is_empty() {
            return invalid("no domains".to_string());
        }
        if self.regions.is_empty() {
            return invalid("no regions".to_string());
        }
        if self.verbs.is_empty() {
            return invalid("verb bank is empty".to_string());
        }
        if self.arc_length == 0 {
            return invalid("arc_length must be at least 1".to_string());
        }
        if self.keystone_seals > self.domains.len() {
            return invalid(format!(
                "keystone needs {} seals but only {} domains exist",
                self.keystone_seals,
                self.domains.len()
            ));
        }
        if self.dialog.proceed.is_empty() || self.dialog.close.is_empty() {
            return invalid("dialog needs at least one proceed and one close line".to_string());
        }
        if self.dialog.keystone.enter.is_empty() {
            return invalid("keystone dialog needs at least one enter line".to_string());
        }

        let mut keys = FxHashSet::default();
        let mut clauses = FxHashSet::default();
        for domain in &self.domains {
            if domain.key.is_empty() || domain.key != domain.key.to_uppercase() {
                return invalid(format!("domain key '{}' must be upper-case", domain.key));
            }
            if domain.key == "META" {
                return invalid("'META' is reserved".to_string());
            }
            if domain.clause.is_empty()
                || !domain
                    .clause
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            {
                return invalid(format!(
                    "clause '{}' must be a lower-case identifier",
                    domain.clause
                ));
            }
            if !keys.insert(domain.key.as_str()) {
                return invalid(format!("duplicate domain key '{}'", domain.key));
            }
            if !clauses.insert(domain.clause.as_str()) {
                return invalid(format!("duplicate clause '{}'", domain.clause));
            }
            for (bank, values) in [
                ("palette", &domain.palette),
                ("speakers", &domain.speakers),
                ("nouns", &domain.nouns),
            ] {
                if values.is_empty() {
                    return invalid(format!("domain '{}' has an empty {} bank", domain.key, bank));
                }
            }
        }

        let beats = [
            ("prologue", &self.prologue),
            ("keystone", &self.gates.keystone),
            ("hearing", &self.gates.hearing),
            ("price", &self.gates.price),
            ("finale", &self.gates.finale),
        ];
        for (name, beat) in beats {
            if beat.flavour >= self.domains.len() {
                return invalid(format!(
                    "{} flavour index {} is out of range",
                    name, beat.flavour
                ));
            }
        }
        Ok(())
    }

    pub fn domain(&self, key: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.key == key)
    }

    pub fn domain_index(&self, key: &str) -> Option<usize> {
        self.domains.iter().position(|d| d.key == key)
    }

    /// `SEAL_<KEY>` for every domain, in catalog order.
    pub fn seal_flags(&self) -> Vec<String> {
        self.domains.iter().map(Domain::seal_flag).collect()
    }

    /// The closed set of `authority_domain` values: unbound, `META`, and
    /// one per domain.
    pub fn authority_domains(&self) -> Vec<String> {
        let mut all = vec![String::new(), "META".to_string()];
        all.extend(self.domains.iter().map(|d| d.key.clone()));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_parses() {
        let catalog = DomainCatalog::builtin().unwrap();
        assert_eq!(catalog.domains.len(), 5);
        assert_eq!(catalog.regions.len(), 6);
        assert_eq!(catalog.arc_length, 18);
        assert_eq!(catalog.keystone_seals, 3);
        assert_eq!(catalog.domain("SILENCE").map(|d| d.clause.as_str()), Some("silence"));
        assert_eq!(catalog.domain_index("DEBT"), Some(3));
        assert_eq!(catalog.seal_flags()[4], "SEAL_WITNESS");
        assert_eq!(
            catalog.authority_domains(),
            vec!["", "META", "INK", "BLOOD", "SILENCE", "DEBT", "WITNESS"]
        );
    }

    fn tweak(from: &str, to: &str) -> Result<DomainCatalog, DomainError> {
        assert!(BUILTIN_CATALOG.contains(from), "fixture text not found: {}", from);
        DomainCatalog::parse_ron(&BUILTIN_CATALOG.replacen(from, to, 1))
    }

    #[test]
    fn rejects_duplicate_keys() {
        let result = tweak(r#"key: "BLOOD""#, r#"key: "INK""#);
        assert!(matches!(result, Err(DomainError::Invalid(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn rejects_zero_arc_length() {
        assert!(matches!(
            tweak("arc_length: 18", "arc_length: 0"),
            Err(DomainError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unreachable_keystone() {
        assert!(matches!(
            tweak("keystone_seals: 3", "keystone_seals: 6"),
            Err(DomainError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_bad_template() {
        let result = tweak("Invitation: {title}", "Invitation: {title");
        assert!(matches!(result, Err(DomainError::Ron(_))));
    }

    #[test]
    fn rejects_out_of_range_flavour() {
        let result = tweak("mechanic: \"Choose Reduced vs Defied Censure\", flavour: 2", "mechanic: \"Choose Reduced vs Defied Censure\", flavour: 9");
        assert!(matches!(result, Err(DomainError::Invalid(_))));
    }

    #[test]
    fn validate_catches_edits_made_in_code() {
        let mut catalog = DomainCatalog::builtin().unwrap();
        assert!(catalog.validate().is_ok());
        catalog.domains[1].speakers.clear();
        assert!(matches!(
            catalog.validate(),
            Err(DomainError::Invalid(msg)) if msg == "domain 'BLOOD' has an empty speakers bank"
        ));
    }
}
