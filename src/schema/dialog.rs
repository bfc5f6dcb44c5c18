use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

use super::effect::{Condition, Effect};
use super::quest::QuestNum;

/// One selectable answer on a dialog node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub next: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
    /// Gate for offering the choice. Empty means always offered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Location key whose next available quest starts when this is chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_next_available_quest: Option<String>,
}

impl Choice {
    pub fn new(text: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            next: next.into(),
            effects: Vec::new(),
            conditions: Vec::new(),
            start_next_available_quest: None,
        }
    }

    pub fn with_effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions;
        self
    }
}

/// A single line of dialog. Terminal nodes end the traversal and carry no
/// choices; every other node must offer at least one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub speaker: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, alias = "terminal", skip_serializing_if = "is_false")]
    pub end: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Node {
    pub fn line(speaker: impl Into<String>, text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            choices,
            end: false,
        }
    }

    pub fn terminal(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            choices: Vec::new(),
            end: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.end
    }
}

/// A structural defect in a dialog graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogDefect {
    #[error("dialog missing 'start'")]
    MissingStart,
    #[error("dialog has no nodes")]
    NoNodes,
    #[error("start node '{0}' not found")]
    StartNotFound(String),
    #[error("dead end: node '{0}' is not terminal and has no choices")]
    DeadEnd(String),
    #[error("terminal node '{0}' offers choices")]
    TerminalWithChoices(String),
    #[error("node '{node}' choice {index} points at missing node '{next}'")]
    DanglingNext {
        node: String,
        index: usize,
        next: String,
    },
    #[error("no reachable complete_quest effect for quest {0}")]
    MissingCompletion(QuestNum),
}

/// A quest (or location) dialog: a start pointer into a map of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogGraph {
    /// Owning quest. Absent for supplemental location dialogs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest_id: Option<QuestNum>,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub nodes: BTreeMap<String, Node>,
}

impl DialogGraph {
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.get(&self.start)
    }

    /// Node ids reachable from `start` by following choices, in visit order.
    pub fn reachable(&self) -> Vec<&str> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();

        if let Some((id, _)) = self.nodes.get_key_value(&self.start) {
            seen.insert(id.as_str());
            queue.push_back(id.as_str());
        }

        while let Some(id) = queue.pop_front() {
            order.push(id);
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            for choice in &node.choices {
                if let Some((next, _)) = self.nodes.get_key_value(&choice.next) {
                    if seen.insert(next.as_str()) {
                        queue.push_back(next.as_str());
                    }
                }
            }
        }

        order
    }

    /// Whether some choice on a reachable node completes `quest`.
    pub fn completes_reachably(&self, quest: QuestNum) -> bool {
        self.reachable()
            .into_iter()
            .filter_map(|id| self.nodes.get(id))
            .flat_map(|node| node.choices.iter())
            .flat_map(|choice| choice.effects.iter())
            .any(|effect| effect.completes(quest))
    }

    /// Every effect on every choice, with the node id that carries it.
    pub fn effects(&self) -> impl Iterator<Item = (&str, &Effect)> {
        self.nodes.iter().flat_map(|(id, node)| {
            node.choices
                .iter()
                .flat_map(move |choice| choice.effects.iter().map(move |e| (id.as_str(), e)))
        })
    }

    /// Check the graph invariants: a resolvable start, no dead ends, no
    /// dangling `next` pointers. When `owner` is given, also require a
    /// reachable `complete_quest` for that quest.
    pub fn defects(&self, owner: Option<QuestNum>) -> Vec<DialogDefect> {
        let mut defects = Vec::new();

        if self.nodes.is_empty() {
            defects.push(DialogDefect::NoNodes);
        }
        if self.start.trim().is_empty() {
            defects.push(DialogDefect::MissingStart);
        } else if !self.nodes.is_empty() && !self.nodes.contains_key(&self.start) {
            defects.push(DialogDefect::StartNotFound(self.start.clone()));
        }

        for (id, node) in &self.nodes {
            if node.is_terminal() {
                if !node.choices.is_empty() {
                    defects.push(DialogDefect::TerminalWithChoices(id.clone()));
                }
                continue;
            }
            if node.choices.is_empty() {
                defects.push(DialogDefect::DeadEnd(id.clone()));
            }
            for (index, choice) in node.choices.iter().enumerate() {
                if !self.nodes.contains_key(&choice.next) {
                    defects.push(DialogDefect::DanglingNext {
                        node: id.clone(),
                        index,
                        next: choice.next.clone(),
                    });
                }
            }
        }

        if let Some(quest) = owner {
            if !self.completes_reachably(quest) {
                defects.push(DialogDefect::MissingCompletion(quest));
            }
        }

        defects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_graph(effects: Vec<Effect>) -> DialogGraph {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "start".to_string(),
            Node::line("Scribe", "Sign here.", vec![Choice::new("Sign.", "end").with_effects(effects)]),
        );
        nodes.insert("end".to_string(), Node::terminal("Narrator", "Done."));
        DialogGraph {
            quest_id: Some(QuestNum(3)),
            start: "start".to_string(),
            nodes,
        }
    }

    #[test]
    fn sound_graph_has_no_defects() {
        let graph = two_node_graph(vec![Effect::CompleteQuest(QuestNum(3))]);
        assert!(graph.defects(Some(QuestNum(3))).is_empty());
        assert_eq!(graph.reachable(), vec!["start", "end"]);
    }

    #[test]
    fn completion_for_another_quest_does_not_count() {
        let graph = two_node_graph(vec![Effect::CompleteQuest(QuestNum(4))]);
        assert_eq!(
            graph.defects(Some(QuestNum(3))),
            vec![DialogDefect::MissingCompletion(QuestNum(3))]
        );
    }

    #[test]
    fn unreachable_completion_does_not_count() {
        let mut graph = two_node_graph(Vec::new());
        graph.nodes.insert(
            "orphan".to_string(),
            Node::line(
                "Ghost",
                "Nobody comes here.",
                vec![Choice::new("Finish.", "end")
                    .with_effects(vec![Effect::CompleteQuest(QuestNum(3))])],
            ),
        );
        assert!(!graph.completes_reachably(QuestNum(3)));
    }

    #[test]
    fn dead_end_and_dangling_next_are_reported() {
        let mut graph = two_node_graph(vec![Effect::CompleteQuest(QuestNum(3))]);
        graph
            .nodes
            .insert("stuck".to_string(), Node::line("Scribe", "...", Vec::new()));
        graph.nodes.get_mut("start").unwrap().choices.push(Choice::new("Wander.", "nowhere"));

        let defects = graph.defects(Some(QuestNum(3)));
        assert!(defects.contains(&DialogDefect::DeadEnd("stuck".to_string())));
        assert!(defects.contains(&DialogDefect::DanglingNext {
            node: "start".to_string(),
            index: 1,
            next: "nowhere".to_string(),
        }));
    }

    #[test]
    fn missing_start_is_reported() {
        let mut graph = two_node_graph(vec![Effect::CompleteQuest(QuestNum(3))]);
        graph.start = "intro".to_string();
        assert_eq!(
            graph.defects(None),
            vec![DialogDefect::StartNotFound("intro".to_string())]
        );
    }

    #[test]
    fn terminal_alias_parses() {
        let json = r#"{
            "start": "a",
            "nodes": {
                "a": {"speaker": "X", "text": "hi", "choices": [{"text": "bye", "next": "b"}]},
                "b": {"speaker": "X", "text": "gone", "terminal": true}
            }
        }"#;
        let graph: DialogGraph = serde_json::from_str(json).unwrap();
        assert!(graph.nodes["b"].is_terminal());
        assert!(graph.quest_id.is_none());
        assert!(graph.defects(None).is_empty());
    }
}
