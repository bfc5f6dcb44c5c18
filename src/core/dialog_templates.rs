/// Dialog graphs for generated quests: the generic
/// `start → hinge → vow → end` template and the per-role overrides.

use std::collections::BTreeMap;

use super::domain::{Domain, DomainCatalog};
use super::generator::{render, GenerateError, QuestRole, Vars, WebLayout};
use super::template::Template;
use crate::schema::dialog::{Choice, DialogGraph, Node};
use crate::schema::effect::{CompareOp, Condition, Effect, FlagValue};
use crate::schema::quest::QuestNum;
use crate::schema::state::{domain_score_flag, CENSURE_SCORE_FLAG, CLAUSE_FLAG, ENDING_FLAG};

/// Everything a dialog builder may read about the quest it is building for.
pub struct DialogContext<'a> {
    pub num: QuestNum,
    pub role: QuestRole,
    pub layout: WebLayout,
    pub catalog: &'a DomainCatalog,
    pub domain: &'a Domain,
    pub vars: &'a Vars,
}

impl DialogContext<'_> {
    fn render(&self, template: &Template, part: &str) -> Result<String, GenerateError> {
        render(template, self.vars, &format!("dialog {} {}", self.num.padded(), part))
    }

    fn speaker(&self) -> String {
        self.vars.get("speaker").cloned().unwrap_or_default()
    }

    fn start_effects(&self) -> Vec<Effect> {
        vec![Effect::StartQuest(self.num)]
    }

    fn complete_effects(&self) -> Vec<Effect> {
        vec![
            Effect::SetFlag {
                name: format!("Q_READY_{}", self.num.padded()),
                value: FlagValue::Bool(true),
            },
            Effect::CompleteQuest(self.num),
        ]
    }

    fn end_node(&self, suffix: Option<String>) -> Result<Node, GenerateError> {
        let mut text = self.render(&self.catalog.dialog.end, "end")?;
        if let Some(suffix) = suffix {
            text.push_str(&suffix);
        }
        Ok(Node::terminal(self.catalog.dialog.narrator.clone(), text))
    }
}

pub type DialogBuilder = fn(&DialogContext<'_>) -> Result<DialogGraph, GenerateError>;

/// Builders that replace the generic template for special-role quests,
/// keyed by the quest number each role lands on in `layout`.
pub fn override_table(layout: &WebLayout) -> BTreeMap<QuestNum, DialogBuilder> {
    let mut table: BTreeMap<QuestNum, DialogBuilder> = BTreeMap::new();
    table.insert(layout.keystone(), keystone_dialog);
    table.insert(layout.hearing(), hearing_dialog);
    table.insert(layout.final_quest(), final_dialog);
    table
}

/// The dialog for one quest: its override if it has one, otherwise the
/// generic template.
pub fn build_dialog(ctx: &DialogContext<'_>) -> Result<DialogGraph, GenerateError> {
    match override_table(&ctx.layout).get(&ctx.num) {
        Some(builder) => builder(ctx),
        None => generic_dialog(ctx),
    }
}

fn graph(num: QuestNum, nodes: Vec<(&str, Node)>) -> DialogGraph {
    DialogGraph {
        quest_id: Some(num),
        start: "start".to_string(),
        nodes: nodes
            .into_iter()
            .map(|(id, node)| (id.to_string(), node))
            .collect(),
    }
}

fn clause_unset(op: CompareOp) -> Condition {
    Condition::flag(CLAUSE_FLAG, op, FlagValue::Text(String::new()))
}

pub fn generic_dialog(ctx: &DialogContext<'_>) -> Result<DialogGraph, GenerateError> {
    let text = &ctx.catalog.dialog;
    let speaker = ctx.speaker();

    let mut start_choices = Vec::new();
    for (i, line) in text.proceed.iter().enumerate() {
        start_choices.push(
            Choice::new(ctx.render(line, &format!("proceed {}", i))?, "hinge")
                .with_effects(ctx.start_effects()),
        );
    }
    // Invitations let the player bind to the domain's clause, once.
    if let QuestRole::Invitation(_) = ctx.role {
        let mut effects = ctx.start_effects();
        effects.push(Effect::SetClause(ctx.domain.clause.clone()));
        start_choices.push(
            Choice::new(ctx.render(&text.clause_choice, "clause")?, "vow")
                .with_effects(effects)
                .with_conditions(vec![clause_unset(CompareOp::Eq)]),
        );
    }

    let mut hinge_text = ctx.render(&text.hinge_open, "hinge")?;
    hinge_text.push_str("\n\n");
    let mut lines = Vec::with_capacity(ctx.catalog.domains.len());
    for domain in &ctx.catalog.domains {
        let mut vars = ctx.vars.clone();
        vars.insert("title", domain.title.clone());
        vars.insert("verb", domain.verb.clone());
        lines.push(render(&text.hinge_line, &vars, "hinge line")?);
    }
    hinge_text.push_str(&lines.join("\n"));
    hinge_text.push_str("\n\n");
    hinge_text.push_str(&ctx.render(&text.hinge_close, "hinge")?);

    let answers = vec![
        Choice::new(ctx.render(&text.answer_for, "answer")?, "vow").with_effects(vec![
            Effect::IncFlag {
                name: domain_score_flag(&ctx.domain.key),
                delta: 1,
            },
        ]),
        Choice::new(ctx.render(&text.answer_against, "answer")?, "vow").with_effects(vec![
            Effect::IncFlag {
                name: CENSURE_SCORE_FLAG.to_string(),
                delta: 1,
            },
        ]),
        Choice::new(ctx.render(&text.invoke_clause, "answer")?, "vow")
            .with_effects(vec![Effect::IncFlag {
                name: CENSURE_SCORE_FLAG.to_string(),
                delta: -1,
            }])
            .with_conditions(vec![clause_unset(CompareOp::Ne)]),
    ];

    let mut close = Vec::new();
    for line in &text.close {
        close.push(Choice::new(ctx.render(line, "close")?, "end").with_effects(ctx.complete_effects()));
    }

    Ok(graph(
        ctx.num,
        vec![
            (
                "start",
                Node::line(speaker.clone(), ctx.render(&text.intro, "intro")?, start_choices),
            ),
            ("hinge", Node::line(speaker.clone(), hinge_text, answers)),
            ("vow", Node::line(speaker, ctx.render(&text.vow, "vow")?, close)),
            ("end", ctx.end_node(None)?),
        ],
    ))
}

fn keystone_dialog(ctx: &DialogContext<'_>) -> Result<DialogGraph, GenerateError> {
    let text = &ctx.catalog.dialog.keystone;
    let mut enter = Vec::new();
    for line in &text.enter {
        enter.push(Choice::new(ctx.render(line, "enter")?, "vow").with_effects(ctx.start_effects()));
    }
    let mut finish = ctx.complete_effects();
    finish.push(Effect::ComputeBossUnlock);

    Ok(graph(
        ctx.num,
        vec![
            ("start", Node::line(text.speaker.clone(), ctx.render(&text.open, "open")?, enter)),
            (
                "vow",
                Node::line(
                    text.speaker.clone(),
                    ctx.render(&text.measure, "measure")?,
                    vec![Choice::new(ctx.render(&text.take, "take")?, "end").with_effects(finish)],
                ),
            ),
            ("end", ctx.end_node(None)?),
        ],
    ))
}

fn hearing_dialog(ctx: &DialogContext<'_>) -> Result<DialogGraph, GenerateError> {
    let text = &ctx.catalog.dialog.hearing;
    let verdict = |mode: &str| {
        let mut effects = ctx.start_effects();
        effects.push(Effect::SetCensureMode(mode.to_string()));
        effects
    };
    let mut finish = ctx.complete_effects();
    finish.push(Effect::ComputeBossUnlock);

    Ok(graph(
        ctx.num,
        vec![
            (
                "start",
                Node::line(
                    text.speaker.clone(),
                    ctx.render(&text.open, "open")?,
                    vec![
                        Choice::new(ctx.render(&text.reduce, "reduce")?, "vow")
                            .with_effects(verdict("reduced")),
                        Choice::new(ctx.render(&text.defy, "defy")?, "vow")
                            .with_effects(verdict("defied")),
                    ],
                ),
            ),
            (
                "vow",
                Node::line(
                    text.speaker.clone(),
                    ctx.render(&text.verdict, "verdict")?,
                    vec![Choice::new(ctx.render(&text.finalize, "finalize")?, "end")
                        .with_effects(finish)],
                ),
            ),
            ("end", ctx.end_node(None)?),
        ],
    ))
}

fn final_dialog(ctx: &DialogContext<'_>) -> Result<DialogGraph, GenerateError> {
    let text = &ctx.catalog.dialog.finale;
    let mut endings = Vec::with_capacity(ctx.catalog.domains.len());
    for domain in &ctx.catalog.domains {
        let mut vars = ctx.vars.clone();
        vars.insert("ending", domain.ending.clone());
        vars.insert("key", domain.key.clone());
        let mut effects = ctx.start_effects();
        effects.push(Effect::SetFlag {
            name: ENDING_FLAG.to_string(),
            value: FlagValue::Text(domain.key.clone()),
        });
        effects.extend(ctx.complete_effects());
        endings.push(
            Choice::new(render(&text.choice, &vars, "final ending")?, "end").with_effects(effects),
        );
    }
    let suffix = ctx.render(&text.ending_suffix, "ending")?;

    Ok(graph(
        ctx.num,
        vec![
            ("start", Node::line(text.speaker.clone(), ctx.render(&text.open, "open")?, endings)),
            ("end", ctx.end_node(Some(suffix))?),
        ],
    ))
}
