/// Deterministic generator for the quest web and its dialogs.
///
/// The web is laid out in fixed sections: one prologue, one invitation per
/// domain, one linear arc per domain ending in a seal quest, then four gate
/// quests in sequence. Flavour text is picked from the catalog banks with
/// `bank[seed % bank.len()]`, so the same catalog always yields the same
/// bytes.

use log::{debug, info};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::dataset::{read_json, write_json, DatasetError, DatasetLayout};
use super::dialog_templates::{build_dialog, DialogContext};
use super::domain::{Beat, Domain, DomainCatalog, DomainError, RegionInfo};
use super::template::{Template, TemplateError};
use crate::schema::dialog::DialogGraph;
use crate::schema::effect::{CompareOp, Condition, Effect, FlagValue};
use crate::schema::quest::{AuthorityDomain, Quest, QuestMeta, QuestNum};
use crate::schema::state::{
    domain_score_flag, BOSS_UNLOCKED_FLAG, CENSURE_MODE_FLAG, CENSURE_UNRESOLVED,
    KEYSTONE_DONE_FLAG,
};

/// Environment variable that overrides the overwrite guard when set to `1`.
pub const FORCE_ENV: &str = "FORCE_GENERATE_AUTHORITY_WEB";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(
        "refusing to overwrite {}: {reason} (pass --force or set FORCE_GENERATE_AUTHORITY_WEB=1)",
        .path.display()
    )]
    Guard { path: PathBuf, reason: String },
    #[error("internal consistency error: expected {expected} {what}, got {actual}")]
    InternalConsistency {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("template error in {context}: {source}")]
    Template {
        context: String,
        #[source]
        source: TemplateError,
    },
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("catalog error: {0}")]
    Catalog(#[from] DomainError),
}

/// Whether the force override is set in the environment.
pub fn force_from_env() -> bool {
    std::env::var(FORCE_ENV).map(|v| v == "1").unwrap_or(false)
}

/// `bank[seed % bank.len()]`; an empty bank yields `""`.
pub fn seeded_pick(bank: &[String], seed: usize) -> &str {
    if bank.is_empty() {
        return "";
    }
    &bank[seed % bank.len()]
}

/// What a quest number stands for in the web.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestRole {
    Prologue,
    Invitation(usize),
    /// Non-final step of a domain arc.
    Arc { domain: usize, step: usize },
    /// Final step of a domain arc.
    Seal(usize),
    Keystone,
    Hearing,
    Price,
    Final,
}

impl QuestRole {
    pub fn domain(self) -> Option<usize> {
        match self {
            Self::Invitation(d) | Self::Arc { domain: d, .. } | Self::Seal(d) => Some(d),
            _ => None,
        }
    }
}

/// Quest numbering for a given domain count and arc length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebLayout {
    pub domains: usize,
    pub arc_length: usize,
}

impl WebLayout {
    pub fn for_catalog(catalog: &DomainCatalog) -> Self {
        Self {
            domains: catalog.domains.len(),
            arc_length: catalog.arc_length,
        }
    }

    /// `1 prologue + D invitations + D × arc + 4 gates`.
    pub fn total(&self) -> usize {
        1 + self.domains + self.domains * self.arc_length + 4
    }

    pub fn prologue(&self) -> QuestNum {
        QuestNum(1)
    }

    pub fn invitation(&self, domain: usize) -> QuestNum {
        QuestNum::from_position(1 + domain)
    }

    pub fn arc_quest(&self, domain: usize, step: usize) -> QuestNum {
        QuestNum::from_position(1 + self.domains + domain * self.arc_length + step)
    }

    pub fn seal(&self, domain: usize) -> QuestNum {
        self.arc_quest(domain, self.arc_length.saturating_sub(1))
    }

    fn gate(&self, offset: usize) -> QuestNum {
        QuestNum::from_position(1 + self.domains + self.domains * self.arc_length + offset)
    }

    pub fn keystone(&self) -> QuestNum {
        self.gate(0)
    }

    pub fn hearing(&self) -> QuestNum {
        self.gate(1)
    }

    pub fn price(&self) -> QuestNum {
        self.gate(2)
    }

    pub fn final_quest(&self) -> QuestNum {
        self.gate(3)
    }

    pub fn role(&self, num: QuestNum) -> Option<QuestRole> {
        let position = num.position()?;
        let arcs_start = 1 + self.domains;
        let gates_start = arcs_start + self.domains * self.arc_length;
        match position {
            0 => Some(QuestRole::Prologue),
            p if p < arcs_start => Some(QuestRole::Invitation(p - 1)),
            p if p < gates_start => {
                let offset = p - arcs_start;
                let domain = offset / self.arc_length;
                let step = offset % self.arc_length;
                if step + 1 == self.arc_length {
                    Some(QuestRole::Seal(domain))
                } else {
                    Some(QuestRole::Arc { domain, step })
                }
            }
            p => match p - gates_start {
                0 => Some(QuestRole::Keystone),
                1 => Some(QuestRole::Hearing),
                2 => Some(QuestRole::Price),
                3 => Some(QuestRole::Final),
                _ => None,
            },
        }
    }
}

/// A generated quest list with one dialog per quest, in quest order.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedWeb {
    pub quests: Vec<Quest>,
    pub dialogs: Vec<DialogGraph>,
}

/// Files written by `GeneratedWeb::write_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub quests_path: PathBuf,
    pub dialog_files: usize,
}

impl GeneratedWeb {
    /// Refuse to replace an existing quest list that this web would not
    /// reproduce. A missing file is fine.
    pub fn check_guard(&self, quests_path: &Path) -> Result<(), GenerateError> {
        if !quests_path.exists() {
            return Ok(());
        }
        let refuse = |reason: String| {
            Err(GenerateError::Guard {
                path: quests_path.to_path_buf(),
                reason,
            })
        };

        let existing: Vec<serde_json::Value> = match read_json(quests_path) {
            Ok(existing) => existing,
            Err(err) => return refuse(format!("existing file is not a quest list ({})", err)),
        };
        if existing.len() != self.quests.len() {
            return refuse(format!(
                "existing dataset has {} quests, generator produces {}",
                existing.len(),
                self.quests.len()
            ));
        }
        for (position, (record, quest)) in existing.iter().zip(&self.quests).enumerate() {
            let existing_id = record.get("quest_id");
            if existing_id.and_then(|id| id.as_str()) != Some(quest.quest_id.as_str()) {
                return refuse(format!(
                    "record {} has quest_id {}, generator produces '{}'",
                    position + 1,
                    existing_id.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string()),
                    quest.quest_id
                ));
            }
        }
        Ok(())
    }

    /// Write the quest list and every dialog under `root`. Unless `force`
    /// is set the guard runs first, and nothing is written on refusal.
    pub fn write_to(
        &self,
        root: &Path,
        layout: &DatasetLayout,
        force: bool,
    ) -> Result<WriteSummary, GenerateError> {
        let quests_path = root.join(&layout.quests);
        if force {
            debug!("guard skipped for {}", quests_path.display());
        } else {
            self.check_guard(&quests_path)?;
        }

        write_json(&quests_path, &self.quests)?;
        for (quest, dialog) in self.quests.iter().zip(&self.dialogs) {
            write_json(&root.join(layout.quest_dialog(quest.quest_num)), dialog)?;
        }
        info!(
            "wrote {} quests to {} and {} dialogs",
            self.quests.len(),
            quests_path.display(),
            self.dialogs.len()
        );
        Ok(WriteSummary {
            quests_path,
            dialog_files: self.dialogs.len(),
        })
    }
}

pub type Vars = FxHashMap<&'static str, String>;

/// Render `template` with `vars`, naming `context` on failure.
pub(crate) fn render(template: &Template, vars: &Vars, context: &str) -> Result<String, GenerateError> {
    template.render(vars).map_err(|source| GenerateError::Template {
        context: context.to_string(),
        source,
    })
}

fn count_word(n: usize) -> String {
    const WORDS: [&str; 11] = [
        "no", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];
    WORDS.get(n).map(|w| w.to_string()).unwrap_or_else(|| n.to_string())
}

/// Builds a `GeneratedWeb` from a catalog.
pub struct WebGenerator<'a> {
    catalog: &'a DomainCatalog,
    layout: WebLayout,
}

impl<'a> WebGenerator<'a> {
    pub fn new(catalog: &'a DomainCatalog) -> Self {
        Self {
            catalog,
            layout: WebLayout::for_catalog(catalog),
        }
    }

    pub fn layout(&self) -> WebLayout {
        self.layout
    }

    pub fn generate(&self) -> Result<GeneratedWeb, GenerateError> {
        self.catalog.validate()?;
        let mut roles = Vec::with_capacity(self.layout.total());
        roles.push(QuestRole::Prologue);
        roles.extend((0..self.catalog.domains.len()).map(QuestRole::Invitation));
        for domain in 0..self.catalog.domains.len() {
            for step in 0..self.catalog.arc_length {
                if step + 1 == self.catalog.arc_length {
                    roles.push(QuestRole::Seal(domain));
                } else {
                    roles.push(QuestRole::Arc { domain, step });
                }
            }
        }
        roles.extend([
            QuestRole::Keystone,
            QuestRole::Hearing,
            QuestRole::Price,
            QuestRole::Final,
        ]);

        if roles.len() != self.layout.total() {
            return Err(GenerateError::InternalConsistency {
                what: "quests",
                expected: self.layout.total(),
                actual: roles.len(),
            });
        }

        let mut quests = Vec::with_capacity(roles.len());
        let mut dialogs = Vec::with_capacity(roles.len());
        for (position, role) in roles.into_iter().enumerate() {
            let num = QuestNum::from_position(position);
            if self.layout.role(num) != Some(role) {
                return Err(GenerateError::InternalConsistency {
                    what: "quest number for role",
                    expected: position + 1,
                    actual: self.expected_num(role).0 as usize,
                });
            }
            let vars = self.vars(num, role);
            let quest = self.quest(num, role, &vars)?;
            let dialog = build_dialog(&DialogContext {
                num,
                role,
                layout: self.layout,
                catalog: self.catalog,
                domain: self.flavour_domain(role),
                vars: &vars,
            })?;
            debug!("generated {} '{}'", quest.quest_id, quest.name);
            quests.push(quest);
            dialogs.push(dialog);
        }

        info!(
            "generated {} quests across {} domains",
            quests.len(),
            self.catalog.domains.len()
        );
        Ok(GeneratedWeb { quests, dialogs })
    }

    fn expected_num(&self, role: QuestRole) -> QuestNum {
        match role {
            QuestRole::Prologue => self.layout.prologue(),
            QuestRole::Invitation(d) => self.layout.invitation(d),
            QuestRole::Arc { domain, step } => self.layout.arc_quest(domain, step),
            QuestRole::Seal(d) => self.layout.seal(d),
            QuestRole::Keystone => self.layout.keystone(),
            QuestRole::Hearing => self.layout.hearing(),
            QuestRole::Price => self.layout.price(),
            QuestRole::Final => self.layout.final_quest(),
        }
    }

    fn beat(&self, role: QuestRole) -> Option<&'a Beat> {
        let gates = &self.catalog.gates;
        match role {
            QuestRole::Prologue => Some(&self.catalog.prologue),
            QuestRole::Keystone => Some(&gates.keystone),
            QuestRole::Hearing => Some(&gates.hearing),
            QuestRole::Price => Some(&gates.price),
            QuestRole::Final => Some(&gates.finale),
            _ => None,
        }
    }

    /// The domain whose vocabulary flavours a quest's prose and dialog.
    fn flavour_domain(&self, role: QuestRole) -> &'a Domain {
        let index = role
            .domain()
            .or_else(|| self.beat(role).map(|b| b.flavour))
            .unwrap_or(0);
        let domains = &self.catalog.domains;
        &domains[index.min(domains.len().saturating_sub(1))]
    }

    fn region(&self, num: QuestNum) -> &'a RegionInfo {
        let regions = &self.catalog.regions;
        &regions[num.0 as usize % regions.len()]
    }

    fn vars(&self, num: QuestNum, role: QuestRole) -> Vars {
        let q = num.0 as usize;
        let domain = self.flavour_domain(role);
        let region = self.region(num);
        let step = match role {
            QuestRole::Arc { step, .. } => step,
            QuestRole::Seal(_) => self.catalog.arc_length.saturating_sub(1),
            _ => 0,
        };

        let mut vars = Vars::default();
        vars.insert("region", region.name.clone());
        vars.insert("region_id", region.id.clone());
        vars.insert("key", domain.key.clone());
        vars.insert("clause", domain.clause.clone());
        vars.insert("title", domain.title.clone());
        vars.insert("title_lower", domain.title.to_lowercase());
        vars.insert("virtue", domain.virtue.clone());
        vars.insert("wound", domain.wound.clone());
        vars.insert("verb", domain.verb.clone());
        vars.insert("ending", domain.ending.clone());
        vars.insert("palette_a", seeded_pick(&domain.palette, q + 1).to_string());
        vars.insert("palette_b", seeded_pick(&domain.palette, q + 3).to_string());
        vars.insert("palette_c", seeded_pick(&domain.palette, q + 5).to_string());
        vars.insert("name_noun", seeded_pick(&domain.nouns, q + step).to_string());
        vars.insert("name_verb", seeded_pick(&self.catalog.verbs, q * 7 + step).to_string());
        vars.insert("speaker", seeded_pick(&domain.speakers, q).to_string());
        vars.insert("domain_count", count_word(self.catalog.domains.len()));
        vars.insert("seals", self.catalog.keystone_seals.to_string());
        vars.insert("quest_num", num.padded());
        vars
    }

    fn canonical_id(&self, role: QuestRole) -> String {
        let clause = |d: usize| self.catalog.domains[d].clause.as_str();
        match role {
            QuestRole::Prologue => "quest.meta.prologue".to_string(),
            QuestRole::Invitation(d) => format!("quest.{}.invitation", clause(d)),
            QuestRole::Arc { domain, step } => format!("quest.{}.arc.{:02}", clause(domain), step + 1),
            QuestRole::Seal(d) => format!("quest.{}.seal", clause(d)),
            QuestRole::Keystone => "quest.meta.keystone_trial".to_string(),
            QuestRole::Hearing => "quest.meta.censure_hearing".to_string(),
            QuestRole::Price => "quest.meta.ladder_price".to_string(),
            QuestRole::Final => "quest.meta.final".to_string(),
        }
    }

    fn quest(&self, num: QuestNum, role: QuestRole, vars: &Vars) -> Result<Quest, GenerateError> {
        let catalog = self.catalog;
        let prose = &catalog.prose;
        let defaults = &catalog.quest;
        let quest_id = self.canonical_id(role);
        let ctx = |part: &str| format!("{} {}", quest_id, part);

        let (name, mechanic, beat) = match role {
            QuestRole::Invitation(_) => (
                render(&prose.invitation_name, vars, &ctx("name"))?,
                render(&prose.invitation_mechanic, vars, &ctx("mechanic"))?,
                render(&prose.invitation_beat, vars, &ctx("beat"))?,
            ),
            QuestRole::Arc { .. } => (
                render(&prose.arc_name, vars, &ctx("name"))?,
                render(&prose.arc_mechanic, vars, &ctx("mechanic"))?,
                render(&prose.arc_beat, vars, &ctx("beat"))?,
            ),
            QuestRole::Seal(_) => (
                render(&prose.arc_name, vars, &ctx("name"))?,
                render(&prose.seal_mechanic, vars, &ctx("mechanic"))?,
                render(&prose.seal_beat, vars, &ctx("beat"))?,
            ),
            _ => {
                let story = self.beat(role).unwrap_or(&catalog.prologue);
                let beat = story.beat.as_ref().unwrap_or(&prose.default_beat);
                (
                    story.name.clone(),
                    render(&story.mechanic, vars, &ctx("mechanic"))?,
                    render(beat, vars, &ctx("beat"))?,
                )
            }
        };

        let mut premise_vars = vars.clone();
        premise_vars.insert("beat", beat);
        let premise = render(&prose.premise, &premise_vars, &ctx("premise"))?;

        let domain_key = role.domain().map(|d| catalog.domains[d].key.clone());
        let authority_domain = match &domain_key {
            Some(key) => AuthorityDomain::Narrative(key.clone()),
            None => AuthorityDomain::Meta,
        };

        let dependencies = match role {
            QuestRole::Prologue => Vec::new(),
            QuestRole::Invitation(_) => vec![self.layout.prologue()],
            QuestRole::Arc { domain, step: 0 } => vec![self.layout.invitation(domain)],
            QuestRole::Seal(domain) if catalog.arc_length == 1 => {
                vec![self.layout.invitation(domain)]
            }
            QuestRole::Arc { .. } | QuestRole::Seal(_) => vec![QuestNum(num.0 - 1)],
            QuestRole::Keystone => vec![self.layout.prologue()],
            QuestRole::Hearing => vec![self.layout.keystone()],
            QuestRole::Price => vec![self.layout.hearing()],
            QuestRole::Final => vec![self.layout.price()],
        };

        let availability_conditions = match role {
            QuestRole::Keystone => vec![Condition::All(vec![Condition::count_true(
                catalog.seal_flags(),
                CompareOp::Ge,
                catalog.keystone_seals as i64,
            )])],
            QuestRole::Hearing => vec![Condition::flag(
                KEYSTONE_DONE_FLAG,
                CompareOp::Eq,
                FlagValue::Bool(true),
            )],
            QuestRole::Price => vec![Condition::flag(
                CENSURE_MODE_FLAG,
                CompareOp::Ne,
                FlagValue::Text(CENSURE_UNRESOLVED.to_string()),
            )],
            QuestRole::Final => vec![Condition::flag(
                BOSS_UNLOCKED_FLAG,
                CompareOp::Eq,
                FlagValue::Bool(true),
            )],
            _ => Vec::new(),
        };

        let score = |delta: i64| {
            domain_key.as_ref().map(|key| Effect::IncFlag {
                name: domain_score_flag(key),
                delta,
            })
        };
        let outcomes: Vec<Effect> = match role {
            QuestRole::Prologue => Vec::new(),
            QuestRole::Invitation(_) | QuestRole::Arc { .. } => score(1).into_iter().collect(),
            QuestRole::Seal(d) => {
                let mut effects = vec![Effect::GrantSeal(catalog.domains[d].key.clone())];
                effects.extend(score(2));
                effects.push(Effect::ComputeBossUnlock);
                effects
            }
            QuestRole::Keystone => vec![
                Effect::SetFlag {
                    name: KEYSTONE_DONE_FLAG.to_string(),
                    value: FlagValue::Bool(true),
                },
                Effect::ComputeBossUnlock,
            ],
            QuestRole::Hearing | QuestRole::Price | QuestRole::Final => {
                vec![Effect::ComputeBossUnlock]
            }
        };

        let minutes = match role {
            QuestRole::Arc { .. } | QuestRole::Seal(_) => defaults.arc_minutes,
            _ => defaults.minutes,
        };
        let region = self.region(num);

        Ok(Quest {
            quest_id,
            quest_num: num,
            name,
            region: region.name.clone(),
            location: Some(region.id.clone()),
            authority_domain,
            dependencies,
            availability_conditions,
            outcomes,
            is_terminal: role == QuestRole::Final,
            tags: defaults.tags.clone(),
            objectives: defaults.objectives.clone(),
            rewards: defaults.rewards.clone(),
            meta: Some(QuestMeta {
                kind: defaults.kind.clone(),
                estimated_minutes: minutes,
                unique_mechanic: mechanic,
                narrative_premise: premise,
                player_motivation: defaults.motivation.clone(),
                branching_outcomes: defaults.branching.clone(),
                failure_states: defaults.failure.clone(),
            }),
        })
    }
}
