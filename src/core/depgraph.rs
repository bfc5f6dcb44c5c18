/// Quest dependency graph: numbering, dangling references and cycle
/// detection by three-color depth-first search.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use super::report::ValidationError;
use crate::schema::quest::{Quest, QuestNum};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed graph over quest numbers. Edges run from a quest to each of
/// its dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    deps: BTreeMap<QuestNum, Vec<QuestNum>>,
    labels: FxHashMap<QuestNum, String>,
}

impl DependencyGraph {
    pub fn from_quests(quests: &[Quest]) -> Self {
        let mut graph = Self::default();
        for quest in quests {
            graph.add_quest(quest.quest_num, &quest.quest_id, &quest.dependencies);
        }
        graph
    }

    /// Add a node. Re-adding a number merges its dependencies.
    pub fn add_quest(&mut self, num: QuestNum, label: &str, dependencies: &[QuestNum]) {
        self.deps
            .entry(num)
            .or_default()
            .extend(dependencies.iter().copied());
        self.labels.entry(num).or_insert_with(|| label.to_string());
    }

    pub fn contains(&self, num: QuestNum) -> bool {
        self.deps.contains_key(&num)
    }

    pub fn dependencies(&self, num: QuestNum) -> &[QuestNum] {
        self.deps.get(&num).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `"7 (quest.ink.arc.01)"`, or just the number when unlabelled.
    pub fn label(&self, num: QuestNum) -> String {
        match self.labels.get(&num) {
            Some(label) if !label.is_empty() => format!("{} ({})", num, label),
            _ => num.to_string(),
        }
    }

    /// `(quest, missing dependency)` for every reference to an unknown quest.
    pub fn dangling(&self) -> Vec<(QuestNum, QuestNum)> {
        self.deps
            .iter()
            .flat_map(|(quest, deps)| {
                deps.iter()
                    .filter(|dep| !self.deps.contains_key(dep))
                    .map(move |dep| (*quest, *dep))
            })
            .collect()
    }

    /// Every cycle closed by a back edge during one full traversal. Each
    /// cycle starts and ends on the same quest. Dangling edges are ignored.
    pub fn find_cycles(&self) -> Vec<Vec<QuestNum>> {
        let mut color: FxHashMap<QuestNum, Color> =
            self.deps.keys().map(|n| (*n, Color::White)).collect();
        let mut cycles = Vec::new();

        for &root in self.deps.keys() {
            if color.get(&root) != Some(&Color::White) {
                continue;
            }
            // Explicit stack of (node, index of next dependency to visit).
            let mut stack: Vec<(QuestNum, usize)> = vec![(root, 0)];
            color.insert(root, Color::Gray);

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                let deps = self.dependencies(node);
                if top.1 >= deps.len() {
                    color.insert(node, Color::Black);
                    stack.pop();
                    continue;
                }
                let child = deps[top.1];
                top.1 += 1;

                match color.get(&child) {
                    Some(Color::White) => {
                        color.insert(child, Color::Gray);
                        stack.push((child, 0));
                    }
                    Some(Color::Gray) => {
                        let from = stack
                            .iter()
                            .position(|(n, _)| *n == child)
                            .unwrap_or(0);
                        let mut cycle: Vec<QuestNum> =
                            stack[from..].iter().map(|(n, _)| *n).collect();
                        cycle.push(child);
                        cycles.push(cycle);
                    }
                    Some(Color::Black) | None => {}
                }
            }
        }

        cycles
    }

    pub fn find_cycle(&self) -> Option<Vec<QuestNum>> {
        self.find_cycles().into_iter().next()
    }

    /// Quests ordered so every dependency precedes its dependents, or the
    /// first cycle found.
    pub fn topological_order(&self) -> Result<Vec<QuestNum>, Vec<QuestNum>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(cycle);
        }
        let mut order = Vec::with_capacity(self.deps.len());
        let mut done: FxHashMap<QuestNum, bool> = FxHashMap::default();
        for &root in self.deps.keys() {
            let mut stack = vec![(root, false)];
            while let Some((node, expanded)) = stack.pop() {
                if done.get(&node).copied().unwrap_or(false) {
                    continue;
                }
                if expanded {
                    done.insert(node, true);
                    order.push(node);
                    continue;
                }
                stack.push((node, true));
                for dep in self.dependencies(node).iter().rev() {
                    if self.contains(*dep) && !done.get(dep).copied().unwrap_or(false) {
                        stack.push((*dep, false));
                    }
                }
            }
        }
        Ok(order)
    }
}

/// Numbering, reference and acyclicity checks over the quest list.
/// `records` is the number of records in the source file, so quests that
/// failed to parse still count towards the expected range.
pub fn check_dependencies(quests: &[Quest], records: usize, file: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen: BTreeMap<QuestNum, usize> = BTreeMap::new();
    for (position, quest) in quests.iter().enumerate() {
        *seen.entry(quest.quest_num).or_insert(0) += 1;
        let expected = QuestNum::from_position(position);
        if records == quests.len() && quest.quest_num != expected {
            errors.push(ValidationError::schema(
                format!("{} quest {}", file, quest.quest_id),
                format!(
                    "quest_num {} does not match its position (expected {})",
                    quest.quest_num, expected
                ),
            ));
        }
    }
    for (num, count) in &seen {
        if *count > 1 {
            errors.push(ValidationError::referential(
                file,
                format!("duplicate quest_num {} ({} records)", num, count),
            ));
        }
        if num.0 == 0 || num.0 as usize > records {
            errors.push(ValidationError::schema(
                file,
                format!("quest_num {} is outside 1..{}", num, records),
            ));
        }
    }
    for n in 1..=records {
        let num = QuestNum::from_position(n - 1);
        if !seen.contains_key(&num) {
            errors.push(ValidationError::schema(file, format!("missing quest number {}", num)));
        }
    }

    let graph = DependencyGraph::from_quests(quests);
    for (quest, dep) in graph.dangling() {
        errors.push(ValidationError::referential(
            format!("{} quest {}", file, graph.label(quest)),
            format!("depends on missing quest {}", dep),
        ));
    }
    for cycle in graph.find_cycles() {
        errors.push(ValidationError::Graph {
            quests: cycle.into_iter().map(|n| graph.label(n)).collect(),
        });
    }

    errors
}
