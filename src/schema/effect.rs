use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::quest::QuestNum;

/// Value stored in or compared against a world-state flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    /// Numeric view of the value; booleans count as 0/1, text has none.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Comparison operator used by conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
}

impl CompareOp {
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Ge => ordering != Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
            Self::Le => ordering != Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
        }
    }

    /// Whether the operator only tests (in)equality.
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

/// Destination of a `teleport` effect. Either part may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeleportTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
}

/// A single world-state mutation. Effects attached to a choice or a quest
/// outcome are applied strictly in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireEffect", into = "WireEffect")]
pub enum Effect {
    SetFlag { name: String, value: FlagValue },
    /// Adds `delta` to a numeric flag, creating it at zero first.
    IncFlag { name: String, delta: i64 },
    StartQuest(QuestNum),
    CompleteQuest(QuestNum),
    /// Grants the seal of a narrative domain (by domain key, e.g. `INK`).
    GrantSeal(String),
    /// Binds the player to a clause. Only the first binding sticks.
    SetClause(String),
    SetCensureMode(String),
    /// Recomputes the boss-unlock flag from the current seal count.
    ComputeBossUnlock,
    Teleport(TeleportTarget),
}

impl Effect {
    /// The quest this effect refers to, if any.
    pub fn quest_ref(&self) -> Option<QuestNum> {
        match self {
            Self::StartQuest(num) | Self::CompleteQuest(num) => Some(*num),
            _ => None,
        }
    }

    pub fn completes(&self, quest: QuestNum) -> bool {
        matches!(self, Self::CompleteQuest(num) if *num == quest)
    }
}

/// A pure predicate over world state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireCondition", into = "WireCondition")]
pub enum Condition {
    FlagEquals {
        flag: String,
        op: CompareOp,
        value: FlagValue,
    },
    /// Counts how many of `flags` are currently true and compares the count.
    CountTrue {
        flags: Vec<String>,
        op: CompareOp,
        value: i64,
    },
    /// Every nested condition must hold.
    All(Vec<Condition>),
}

impl Condition {
    pub fn flag(flag: impl Into<String>, op: CompareOp, value: FlagValue) -> Self {
        Self::FlagEquals {
            flag: flag.into(),
            op,
            value,
        }
    }

    pub fn count_true<I, S>(flags: I, op: CompareOp, value: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::CountTrue {
            flags: flags.into_iter().map(Into::into).collect(),
            op,
            value,
        }
    }
}

// Wire helpers: the JSON data keys each effect by its own field name
// (`{"inc_flag": "X", "delta": 1}`) rather than by a tag field, so the
// serde shape lives in these intermediate enums.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireEffect {
    SetFlag {
        set_flag: String,
        value: FlagValue,
    },
    IncFlag {
        inc_flag: String,
        delta: i64,
    },
    StartQuest {
        start_quest: QuestNum,
    },
    CompleteQuest {
        complete_quest: QuestNum,
    },
    GrantSeal {
        grant_seal: String,
    },
    SetClause {
        set_clause: String,
    },
    SetCensureMode {
        set_censure_mode: String,
    },
    ComputeBossUnlock {
        compute_boss_unlock: bool,
    },
    Teleport {
        teleport: TeleportTarget,
    },
}

impl From<WireEffect> for Effect {
    fn from(wire: WireEffect) -> Self {
        match wire {
            WireEffect::SetFlag { set_flag, value } => Effect::SetFlag {
                name: set_flag,
                value,
            },
            WireEffect::IncFlag { inc_flag, delta } => Effect::IncFlag {
                name: inc_flag,
                delta,
            },
            WireEffect::StartQuest { start_quest } => Effect::StartQuest(start_quest),
            WireEffect::CompleteQuest { complete_quest } => Effect::CompleteQuest(complete_quest),
            WireEffect::GrantSeal { grant_seal } => Effect::GrantSeal(grant_seal),
            WireEffect::SetClause { set_clause } => Effect::SetClause(set_clause),
            WireEffect::SetCensureMode { set_censure_mode } => {
                Effect::SetCensureMode(set_censure_mode)
            }
            WireEffect::ComputeBossUnlock { .. } => Effect::ComputeBossUnlock,
            WireEffect::Teleport { teleport } => Effect::Teleport(teleport),
        }
    }
}

impl From<Effect> for WireEffect {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::SetFlag { name, value } => WireEffect::SetFlag {
                set_flag: name,
                value,
            },
            Effect::IncFlag { name, delta } => WireEffect::IncFlag {
                inc_flag: name,
                delta,
            },
            Effect::StartQuest(num) => WireEffect::StartQuest { start_quest: num },
            Effect::CompleteQuest(num) => WireEffect::CompleteQuest {
                complete_quest: num,
            },
            Effect::GrantSeal(key) => WireEffect::GrantSeal { grant_seal: key },
            Effect::SetClause(clause) => WireEffect::SetClause { set_clause: clause },
            Effect::SetCensureMode(mode) => WireEffect::SetCensureMode {
                set_censure_mode: mode,
            },
            Effect::ComputeBossUnlock => WireEffect::ComputeBossUnlock {
                compute_boss_unlock: true,
            },
            Effect::Teleport(target) => WireEffect::Teleport { teleport: target },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireCondition {
    All {
        all: Vec<Condition>,
    },
    CountTrue {
        count_true: Vec<String>,
        op: CompareOp,
        value: i64,
    },
    Flag {
        flag: String,
        op: CompareOp,
        value: FlagValue,
    },
}

impl From<WireCondition> for Condition {
    fn from(wire: WireCondition) -> Self {
        match wire {
            WireCondition::All { all } => Condition::All(all),
            WireCondition::CountTrue {
                count_true,
                op,
                value,
            } => Condition::CountTrue {
                flags: count_true,
                op,
                value,
            },
            WireCondition::Flag { flag, op, value } => Condition::FlagEquals { flag, op, value },
        }
    }
}

impl From<Condition> for WireCondition {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::All(all) => WireCondition::All { all },
            Condition::CountTrue { flags, op, value } => WireCondition::CountTrue {
                count_true: flags,
                op,
                value,
            },
            Condition::FlagEquals { flag, op, value } => WireCondition::Flag { flag, op, value },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keyed_effects() {
        let json = r#"[
            {"set_flag": "Q_READY_007", "value": true},
            {"inc_flag": "CENSURE", "delta": -1},
            {"start_quest": 7},
            {"complete_quest": 7},
            {"grant_seal": "INK"},
            {"set_clause": "ink"},
            {"set_censure_mode": "defied"},
            {"compute_boss_unlock": true},
            {"teleport": {"map": "fenmire"}}
        ]"#;
        let effects: Vec<Effect> = serde_json::from_str(json).unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::SetFlag {
                    name: "Q_READY_007".to_string(),
                    value: FlagValue::Bool(true)
                },
                Effect::IncFlag {
                    name: "CENSURE".to_string(),
                    delta: -1
                },
                Effect::StartQuest(QuestNum(7)),
                Effect::CompleteQuest(QuestNum(7)),
                Effect::GrantSeal("INK".to_string()),
                Effect::SetClause("ink".to_string()),
                Effect::SetCensureMode("defied".to_string()),
                Effect::ComputeBossUnlock,
                Effect::Teleport(TeleportTarget {
                    map: Some("fenmire".to_string()),
                    scene: None
                }),
            ]
        );
    }

    #[test]
    fn unknown_effect_tag_is_rejected() {
        let result: Result<Effect, _> = serde_json::from_str(r#"{"gain_item": "rope"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn effect_serializes_in_keyed_shape() {
        let value = serde_json::to_value(Effect::IncFlag {
            name: "DOMAIN_INK_SCORE".to_string(),
            delta: 2,
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"inc_flag": "DOMAIN_INK_SCORE", "delta": 2}));

        let value = serde_json::to_value(Effect::ComputeBossUnlock).unwrap();
        assert_eq!(value, serde_json::json!({"compute_boss_unlock": true}));
    }

    #[test]
    fn parse_conditions() {
        let json = r#"[
            {"flag": "CLAUSE_SET", "op": "==", "value": ""},
            {"count_true": ["SEAL_INK", "SEAL_BLOOD"], "op": ">=", "value": 2},
            {"all": [{"flag": "KEYSTONE_TRIAL_DONE", "op": "==", "value": true}]}
        ]"#;
        let conditions: Vec<Condition> = serde_json::from_str(json).unwrap();
        assert_eq!(
            conditions[0],
            Condition::flag("CLAUSE_SET", CompareOp::Eq, FlagValue::Text(String::new()))
        );
        assert_eq!(
            conditions[1],
            Condition::count_true(["SEAL_INK", "SEAL_BLOOD"], CompareOp::Ge, 2)
        );
        assert!(matches!(&conditions[2], Condition::All(inner) if inner.len() == 1));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let result: Result<Condition, _> =
            serde_json::from_str(r#"{"flag": "X", "op": "~=", "value": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn compare_op_orderings() {
        assert!(CompareOp::Ge.holds(Ordering::Equal));
        assert!(CompareOp::Ge.holds(Ordering::Greater));
        assert!(!CompareOp::Ge.holds(Ordering::Less));
        assert!(CompareOp::Ne.holds(Ordering::Less));
        assert!(!CompareOp::Lt.holds(Ordering::Equal));
        assert!(CompareOp::Eq.is_equality());
        assert!(!CompareOp::Gt.is_equality());
    }

    #[test]
    fn flag_value_numeric_view() {
        assert_eq!(FlagValue::Bool(true).as_int(), Some(1));
        assert_eq!(FlagValue::Int(-3).as_int(), Some(-3));
        assert_eq!(FlagValue::Text("x".to_string()).as_int(), None);
    }
}
