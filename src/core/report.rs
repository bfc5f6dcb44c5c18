/// Validator findings and the aggregate report.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One validation finding. Every kind names where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A document could not be read or is not well-formed JSON.
    #[error("parse error: {file}: {message}")]
    Parse { file: String, message: String },
    /// A record or dialog is structurally invalid.
    #[error("schema error: {location}: {message}")]
    Schema { location: String, message: String },
    /// A reference does not resolve, or an id is duplicated.
    #[error("referential error: {location}: {message}")]
    Referential { location: String, message: String },
    /// The quest dependency graph has a cycle. `quests` lists the cycle in
    /// traversal order, closing back on its first member.
    #[error("graph error: dependency cycle {}", .quests.join(" -> "))]
    Graph { quests: Vec<String> },
}

impl ValidationError {
    pub fn parse(file: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.to_string(),
        }
    }

    pub fn schema(location: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Schema {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn referential(location: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Referential {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Schema { .. } => "schema",
            Self::Referential { .. } => "referential",
            Self::Graph { .. } => "graph",
        }
    }
}

/// Counts of what a validation run looked at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    pub quests: usize,
    pub quest_dialogs: usize,
    pub location_dialogs: usize,
    pub items: usize,
    pub encounters: usize,
    pub maps: usize,
    pub regions: usize,
}

/// Everything a validation pass found. Errors fail the gate; warnings
/// never do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub stats: DatasetStats,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend<I>(&mut self, errors: I)
    where
        I: IntoIterator<Item = ValidationError>,
    {
        self.errors.extend(errors);
    }

    /// Record a warning once; repeats are dropped.
    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Number of errors of each kind, in taxonomy order.
    pub fn counts_by_kind(&self) -> Vec<(&'static str, usize)> {
        ["parse", "schema", "referential", "graph"]
            .into_iter()
            .map(|kind| (kind, self.errors.iter().filter(|e| e.kind() == kind).count()))
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Summary: {} errors, {} warnings",
            self.errors.len(),
            self.warnings.len()
        )
    }
}
