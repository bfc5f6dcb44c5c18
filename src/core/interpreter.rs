/// Effect application and condition evaluation against `GameState`.

use log::debug;

use crate::schema::effect::{CompareOp, Condition, Effect, FlagValue};
use crate::schema::state::{
    seal_flag, GameState, BOSS_UNLOCKED_FLAG, CENSURE_MODE_FLAG, CLAUSE_FLAG,
};

/// Apply one effect. Total for every well-formed effect.
pub fn apply_effect(state: &mut GameState, effect: &Effect) {
    match effect {
        Effect::SetFlag { name, value } => match value {
            FlagValue::Text(text) => {
                state.scores.remove(name);
                state.strings.insert(name.clone(), text.clone());
            }
            FlagValue::Bool(b) => {
                state.strings.remove(name);
                state.scores.insert(name.clone(), i64::from(*b));
            }
            FlagValue::Int(n) => {
                state.strings.remove(name);
                state.scores.insert(name.clone(), *n);
            }
        },
        Effect::IncFlag { name, delta } => {
            let slot = state.scores.entry(name.clone()).or_insert(0);
            *slot = slot.saturating_add(*delta);
        }
        Effect::StartQuest(num) => {
            state.started_quests.insert(*num);
            state.active_quest = Some(*num);
        }
        Effect::CompleteQuest(num) => {
            state.started_quests.insert(*num);
            state.completed_quests.insert(*num);
            if state.active_quest == Some(*num) {
                state.active_quest = None;
            }
        }
        Effect::GrantSeal(domain) => {
            state
                .scores
                .insert(seal_flag(&domain.to_uppercase()), 1);
        }
        Effect::SetClause(clause) => {
            if state.text(CLAUSE_FLAG).is_empty() {
                state.strings.insert(CLAUSE_FLAG.to_string(), clause.clone());
            } else {
                debug!(
                    "clause already bound to '{}', ignoring '{}'",
                    state.text(CLAUSE_FLAG),
                    clause
                );
            }
        }
        Effect::SetCensureMode(mode) => {
            state
                .strings
                .insert(CENSURE_MODE_FLAG.to_string(), mode.clone());
        }
        Effect::ComputeBossUnlock => {
            let unlocked = state.seal_count() >= state.boss_seal_threshold;
            state
                .scores
                .insert(BOSS_UNLOCKED_FLAG.to_string(), i64::from(unlocked));
        }
        Effect::Teleport(target) => {
            if let Some(map) = &target.map {
                state.current_map = Some(map.clone());
            }
            if let Some(scene) = &target.scene {
                state.current_scene = Some(scene.clone());
            }
        }
    }
}

/// Apply effects strictly in the given order.
pub fn apply_effects<'a, I>(state: &mut GameState, effects: I)
where
    I: IntoIterator<Item = &'a Effect>,
{
    for effect in effects {
        apply_effect(state, effect);
    }
}

/// Evaluate a condition. Never mutates state.
pub fn evaluate_condition(state: &GameState, condition: &Condition) -> bool {
    match condition {
        Condition::FlagEquals { flag, op, value } => compare_flag(state, flag, *op, value),
        Condition::CountTrue { flags, op, value } => {
            let count = flags.iter().filter(|name| state.is_true(name)).count() as i64;
            op.holds(count.cmp(value))
        }
        Condition::All(inner) => inner.iter().all(|c| evaluate_condition(state, c)),
    }
}

/// All conditions hold. An empty list always holds.
pub fn conditions_hold(state: &GameState, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| evaluate_condition(state, c))
}

fn compare_flag(state: &GameState, flag: &str, op: CompareOp, expected: &FlagValue) -> bool {
    match expected {
        // Unset string flags read as "".
        FlagValue::Text(expected) => {
            if !op.is_equality() {
                return false;
            }
            let actual = match state.flag(flag) {
                Some(FlagValue::Text(text)) => text,
                Some(other) => other.as_int().map(|n| n.to_string()).unwrap_or_default(),
                None => String::new(),
            };
            op.holds(actual.as_str().cmp(expected.as_str()))
        }
        // Unset numeric flags read as 0; booleans compare as 0/1.
        numeric => {
            let expected = numeric.as_int().unwrap_or(0);
            let actual = match state.flag(flag) {
                Some(FlagValue::Text(text)) => {
                    if text.is_empty() {
                        0
                    } else {
                        return op == CompareOp::Ne;
                    }
                }
                Some(other) => other.as_int().unwrap_or(0),
                None => 0,
            };
            op.holds(actual.cmp(&expected))
        }
    }
}
