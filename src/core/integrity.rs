/// Cross-document integrity checks over a loaded dataset. Every check runs
/// independently and every violation is collected into one report.

use log::{info, warn};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::path::Path;

use super::audit::{audit_dataset_dialogs, inline_ids, quest_locations};
use super::config::{ConfigError, ValidatorConfig};
use super::dataset::{quest_dialog_file_name, quest_num_from_file_name, Dataset, JsonDoc};
use super::depgraph::check_dependencies;
use super::domain::DomainCatalog;
use super::report::{ValidationError, ValidationReport};
use crate::schema::dialog::DialogGraph;
use crate::schema::effect::Effect;
use crate::schema::quest::QuestNum;
use crate::schema::world::{EncounterEntry, EncounterShape, Item, MapDoc};

/// The dataset gate. Built via `Validator::builder()`.
pub struct Validator {
    config: ValidatorConfig,
    quest_id_re: Regex,
    inline_id_re: Regex,
    allowed_domains: FxHashSet<String>,
}

/// Builder for constructing a `Validator`.
#[derive(Default)]
pub struct ValidatorBuilder {
    config: Option<ValidatorConfig>,
    catalog: Option<DomainCatalog>,
}

impl ValidatorBuilder {
    pub fn config(mut self, config: ValidatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        self.config = Some(ValidatorConfig::load_from_ron(path)?);
        Ok(self)
    }

    /// Catalog the allowed authority domains are derived from when the
    /// config does not list them. Defaults to the builtin catalog.
    pub fn catalog(mut self, catalog: DomainCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<Validator, ConfigError> {
        let config = self.config.unwrap_or_default();
        let quest_id_re = config.quest_id_regex()?;
        let inline_id_re = config.inline_id_regex()?;
        let domains = match &config.allowed_domains {
            Some(domains) => domains.clone(),
            None => match self.catalog {
                Some(catalog) => catalog.authority_domains(),
                None => DomainCatalog::builtin()?.authority_domains(),
            },
        };
        let allowed_domains = domains
            .iter()
            .map(|d| d.trim().to_uppercase())
            .collect();
        Ok(Validator {
            config,
            quest_id_re,
            inline_id_re,
            allowed_domains,
        })
    }
}

impl Validator {
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::default()
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Load the dataset under `root` with the configured layout and
    /// validate it.
    pub fn validate_dir(&self, root: &Path) -> ValidationReport {
        let dataset = Dataset::load(root, &self.config.layout);
        self.validate(&dataset)
    }

    pub fn validate(&self, dataset: &Dataset) -> ValidationReport {
        let mut report = ValidationReport::new();
        report.extend(dataset.load_errors.iter().cloned());

        self.check_quests(dataset, &mut report);
        self.check_quest_dialogs(dataset, &mut report);
        self.check_location_dialogs(dataset, &mut report);
        let items = self.check_items(dataset, &mut report);
        self.check_encounters(dataset, &mut report);
        self.check_maps(dataset, &items, &mut report);
        self.check_free_text(dataset, &mut report);

        report.stats.quests = dataset.quests.len();
        report.stats.quest_dialogs = dataset.quest_dialogs.len();
        report.stats.location_dialogs = dataset.location_dialogs.len();
        report.stats.maps = dataset.maps.len();

        if report.is_ok() {
            info!("validation passed ({} warnings)", report.warnings.len());
        } else {
            warn!("validation failed: {}", report.summary());
        }
        report
    }

    fn check_quests(&self, dataset: &Dataset, report: &mut ValidationReport) {
        let file = &self.config.layout.quests;
        if dataset.quests_doc.is_none() {
            return;
        }
        if dataset.quest_records < self.config.min_quests {
            report.push(ValidationError::schema(
                file.as_str(),
                format!(
                    "expected at least {} quests, found {}",
                    self.config.min_quests, dataset.quest_records
                ),
            ));
        }

        let mut ids: FxHashMap<&str, QuestNum> = FxHashMap::default();
        for quest in &dataset.quests {
            let location = format!("{} quest {}", file, quest.quest_num);
            if !self.quest_id_re.is_match(&quest.quest_id) {
                report.push(ValidationError::schema(
                    location.as_str(),
                    format!("quest_id '{}' is not canonical", quest.quest_id),
                ));
            }
            if let Some(first) = ids.insert(&quest.quest_id, quest.quest_num) {
                report.push(ValidationError::referential(
                    location.as_str(),
                    format!("duplicate quest_id '{}' (also quest {})", quest.quest_id, first),
                ));
            }
            if !self.allowed_domains.contains(quest.authority_domain.key()) {
                report.push(ValidationError::schema(
                    location.as_str(),
                    format!("unknown authority_domain '{}'", quest.authority_domain.key()),
                ));
            }
            for effect in &quest.outcomes {
                if let Some(err) = unresolved_quest_ref(dataset, effect, &location) {
                    report.push(err);
                }
            }
        }

        report.extend(check_dependencies(&dataset.quests, dataset.quest_records, file));
    }

    fn check_quest_dialogs(&self, dataset: &Dataset, report: &mut ValidationReport) {
        let layout = &self.config.layout;
        let unreadable: FxHashSet<&str> = dataset
            .load_errors
            .iter()
            .filter_map(|e| match e {
                ValidationError::Parse { file, .. } => Some(file.as_str()),
                _ => None,
            })
            .collect();

        for quest in &dataset.quests {
            let name = quest_dialog_file_name(quest.quest_num);
            let Some(doc) = dataset.quest_dialogs.get(&name) else {
                let path = layout.quest_dialog(quest.quest_num);
                if !unreadable.contains(path.as_str()) {
                    report.push(ValidationError::referential(
                        path,
                        format!("missing dialog for quest {}", quest.quest_num),
                    ));
                }
                continue;
            };
            let Some(dialog) = typed_dialog(doc, report) else {
                continue;
            };
            match dialog.quest_id {
                Some(num) if num == quest.quest_num => {}
                Some(num) => report.push(ValidationError::schema(
                    doc.file.as_str(),
                    format!("quest_id {} does not match file quest {}", num, quest.quest_num),
                )),
                None => report.push(ValidationError::schema(doc.file.as_str(), "missing quest_id")),
            }
            self.check_dialog(dataset, doc, &dialog, Some(quest.quest_num), report);
        }

        for name in dataset.quest_dialogs.keys() {
            let owned = quest_num_from_file_name(name).and_then(|num| dataset.quest(num));
            if owned.is_none() {
                report.warn(format!(
                    "{}/{} does not belong to any quest",
                    layout.quest_dialogs, name
                ));
            }
        }
    }

    fn check_location_dialogs(&self, dataset: &Dataset, report: &mut ValidationReport) {
        for doc in dataset.location_dialogs.values() {
            if let Some(dialog) = typed_dialog(doc, report) {
                self.check_dialog(dataset, doc, &dialog, None, report);
            }
        }

        let mut missing = 0;
        for location in quest_locations(&dataset.quests) {
            let name = format!("dlg_{}.json", location);
            if !dataset.location_dialogs.contains_key(&name) {
                report.warn(format!(
                    "missing supplemental location dialog: {}",
                    self.config.layout.location_dialog(&location)
                ));
                missing += 1;
            }
        }
        if missing > 0 {
            warn!("{} supplemental location dialogs missing", missing);
        }
    }

    fn check_dialog(
        &self,
        dataset: &Dataset,
        doc: &JsonDoc,
        dialog: &DialogGraph,
        owner: Option<QuestNum>,
        report: &mut ValidationReport,
    ) {
        for defect in dialog.defects(owner) {
            report.push(ValidationError::schema(doc.file.as_str(), defect));
        }
        for (node, effect) in dialog.effects() {
            let location = format!("{} node {}", doc.file, node);
            if let Some(err) = unresolved_quest_ref(dataset, effect, &location) {
                report.push(err);
            }
        }
    }

    /// Item ids present and unique. Returns the set of known ids.
    fn check_items(&self, dataset: &Dataset, report: &mut ValidationReport) -> FxHashSet<String> {
        let mut known = FxHashSet::default();
        let Some(doc) = &dataset.items else {
            return known;
        };
        let items: Vec<Item> = match doc.typed() {
            Ok(items) => items,
            Err(err) => {
                report.push(err);
                return known;
            }
        };
        report.stats.items = items.len();
        for (i, item) in items.iter().enumerate() {
            let id = item.id.trim();
            if id.is_empty() {
                report.push(ValidationError::schema(format!("{}[{}]", doc.file, i), "item missing id"));
            } else if !known.insert(id.to_string()) {
                report.push(ValidationError::referential(
                    format!("{}[{}]", doc.file, i),
                    format!("duplicate item id '{}'", id),
                ));
            }
        }
        known
    }

    fn check_encounters(&self, dataset: &Dataset, report: &mut ValidationReport) {
        let Some(doc) = &dataset.encounters else {
            return;
        };
        let entries: Vec<EncounterEntry> = match doc.typed() {
            Ok(entries) => entries,
            Err(err) => {
                report.push(err);
                return;
            }
        };
        if entries.is_empty() {
            report.push(ValidationError::schema(doc.file.as_str(), "no encounters defined"));
        }

        let mut seen: FxHashMap<String, String> = FxHashMap::default();

        for (i, entry) in entries.iter().enumerate() {
            let location = format!("{}[{}]", doc.file, i);
            match entry.shape() {
                EncounterShape::Flat(id) => record_encounter(&mut seen, id, location, report),
                EncounterShape::Table(spawns) => {
                    for (j, spawn) in spawns.into_iter().enumerate() {
                        let at = format!("{}.spawns[{}]", location, j);
                        match spawn {
                            Some(id) => record_encounter(&mut seen, id, at, report),
                            None => report.push(ValidationError::schema(at, "spawn missing id")),
                        }
                    }
                }
                EncounterShape::Malformed => report.push(ValidationError::schema(
                    location,
                    "encounter needs an id or a region/act/spawns table",
                )),
            }
        }
        report.stats.encounters = seen.len();
    }

    fn check_maps(&self, dataset: &Dataset, items: &FxHashSet<String>, report: &mut ValidationReport) {
        if dataset.maps.is_empty() {
            report.push(ValidationError::schema(
                self.config.layout.maps.as_str(),
                "no map files found",
            ));
            return;
        }

        let maps: Vec<(&JsonDoc, MapDoc)> = dataset
            .maps
            .iter()
            .filter_map(|doc| match doc.typed::<MapDoc>() {
                Ok(map) => Some((doc, map)),
                Err(err) => {
                    report.push(err);
                    None
                }
            })
            .collect();

        // Region ids are a global key, so collect them across all maps first.
        let mut regions: BTreeMap<&str, &str> = BTreeMap::new();
        for (doc, map) in &maps {
            if map.regions.is_empty() {
                report.push(ValidationError::schema(doc.file.as_str(), "map has no regions"));
            }
            for (i, region) in map.regions.iter().enumerate() {
                let id = region.id.trim();
                if id.is_empty() {
                    report.push(ValidationError::schema(
                        format!("{} regions[{}]", doc.file, i),
                        "region missing id",
                    ));
                    continue;
                }
                if let Some(first) = regions.insert(id, doc.file.as_str()) {
                    report.push(ValidationError::referential(
                        format!("{} region={}", doc.file, id),
                        format!("region id '{}' already defined in {}", id, first),
                    ));
                }
            }
        }
        report.stats.regions = regions.len();

        for (doc, map) in &maps {
            for region in &map.regions {
                let location = format!("{} region={}", doc.file, region.id);
                for exit in &region.exits {
                    let to = exit.to.trim();
                    if to.is_empty() {
                        report.push(ValidationError::schema(location.as_str(), "exit missing target"));
                    } else if !regions.contains_key(to) {
                        report.push(ValidationError::referential(
                            location.as_str(),
                            format!("exit to unknown region '{}'", to),
                        ));
                    }
                }
                for placed in &region.items {
                    if !items.contains(placed.id.trim()) {
                        report.push(ValidationError::referential(
                            location.as_str(),
                            format!(
                                "item '{}' not found in {}",
                                placed.id, self.config.layout.items
                            ),
                        ));
                    }
                }
            }
        }
    }

    /// `start_next_available_quest` keys and hand-inlined identifiers.
    fn check_free_text(&self, dataset: &Dataset, report: &mut ValidationReport) {
        report.extend(audit_dataset_dialogs(dataset).errors());
        for doc in dataset.documents() {
            if self.config.is_canonical_file(&doc.file) {
                continue;
            }
            for hit in inline_ids(doc, &self.inline_id_re) {
                report.push(hit.to_error());
            }
        }
    }
}

fn typed_dialog(doc: &JsonDoc, report: &mut ValidationReport) -> Option<DialogGraph> {
    match doc.typed::<DialogGraph>() {
        Ok(dialog) => Some(dialog),
        Err(err) => {
            report.push(err);
            None
        }
    }
}

fn record_encounter(
    seen: &mut FxHashMap<String, String>,
    id: &str,
    location: String,
    report: &mut ValidationReport,
) {
    if let Some(first) = seen.get(id) {
        report.push(ValidationError::referential(
            location,
            format!("duplicate encounter id '{}' (first at {})", id, first),
        ));
    } else {
        seen.insert(id.to_string(), location);
    }
}

fn unresolved_quest_ref(dataset: &Dataset, effect: &Effect, location: &str) -> Option<ValidationError> {
    let num = effect.quest_ref()?;
    if dataset.quest(num).is_some() {
        return None;
    }
    Some(ValidationError::referential(
        location,
        format!("effect refers to missing quest {}", num),
    ))
}
