/// Validator configuration, loaded from RON. Every field has a default, so
/// an empty `()` file is a valid configuration.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::dataset::DatasetLayout;
use super::domain::DomainError;

/// Canonical quest id: `quest.` followed by two to nine segments.
pub const DEFAULT_QUEST_ID_PATTERN: &str = r"^quest\.[a-z0-9_\- ]+(?:\.[a-z0-9_\- ]+){1,8}$";
/// Hand-inlined canonical identifiers in narrative text.
pub const DEFAULT_INLINE_ID_PATTERN: &str =
    r"\b(?:quest|choice|boss|faction|world|ending)\.[a-z0-9_\-]+(?:\.[a-z0-9_\-]+){1,5}\b";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("domain catalog error: {0}")]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename = "ValidatorConfig")]
pub struct ValidatorConfig {
    pub layout: DatasetLayout,
    /// Matched case-insensitively against every `quest_id`.
    pub quest_id_pattern: String,
    /// Matched case-insensitively against narrative text.
    pub inline_id_pattern: String,
    /// Files allowed to spell canonical ids out (dataset-relative).
    pub canonical_files: Vec<String>,
    /// Allowed `authority_domain` values. Derived from the domain catalog
    /// when absent.
    pub allowed_domains: Option<Vec<String>>,
    pub min_quests: usize,
    /// How many missing supplemental dialogs to list before summarising.
    pub max_warnings_shown: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let layout = DatasetLayout::default();
        Self {
            canonical_files: vec![layout.quests.clone()],
            layout,
            quest_id_pattern: DEFAULT_QUEST_ID_PATTERN.to_string(),
            inline_id_pattern: DEFAULT_INLINE_ID_PATTERN.to_string(),
            allowed_domains: None,
            min_quests: 100,
            max_warnings_shown: 20,
        }
    }
}

impl ValidatorConfig {
    pub fn load_from_ron(path: &Path) -> Result<ValidatorConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<ValidatorConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    pub fn quest_id_regex(&self) -> Result<Regex, ConfigError> {
        Ok(RegexBuilder::new(&self.quest_id_pattern)
            .case_insensitive(true)
            .build()?)
    }

    pub fn inline_id_regex(&self) -> Result<Regex, ConfigError> {
        Ok(RegexBuilder::new(&self.inline_id_pattern)
            .case_insensitive(true)
            .build()?)
    }

    pub fn is_canonical_file(&self, file: &str) -> bool {
        self.canonical_files.iter().any(|allowed| allowed == file)
    }
}
