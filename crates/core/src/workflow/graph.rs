//! Adjacency view over a workflow for traversal and analysis.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::model::{NodeType, Workflow};
use crate::error::CoreError;
use crate::types::NodeId;

/// Read-only graph built from a workflow's nodes and connections.
///
/// Connections whose endpoints do not exist are ignored here; they are
/// reported by workflow validation instead.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    /// Node ids in insertion order.
    order: Vec<NodeId>,
    /// node_id -> downstream node_ids.
    adjacency: HashMap<NodeId, Vec<NodeId>>,
    /// node_id -> upstream node_ids.
    reverse_adjacency: HashMap<NodeId, Vec<NodeId>>,
    triggers: Vec<NodeId>,
}

impl WorkflowGraph {
    pub fn new(workflow: &Workflow) -> Self {
        let mut order = Vec::with_capacity(workflow.nodes.len());
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut reverse_adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut triggers = Vec::new();

        for node in &workflow.nodes {
            if adjacency.contains_key(&node.id) {
                continue;
            }
            adjacency.insert(node.id.clone(), Vec::new());
            reverse_adjacency.insert(node.id.clone(), Vec::new());
            order.push(node.id.clone());
            if node.node_type == NodeType::Trigger {
                triggers.push(node.id.clone());
            }
        }

        for conn in &workflow.connections {
            if !adjacency.contains_key(&conn.to) {
                continue;
            }
            let Some(downstream) = adjacency.get_mut(&conn.from) else {
                continue;
            };
            downstream.push(conn.to.clone());
            if let Some(upstream) = reverse_adjacency.get_mut(&conn.to) {
                upstream.push(conn.from.clone());
            }
        }

        Self {
            order,
            adjacency,
            reverse_adjacency,
            triggers,
        }
    }

    /// Node ids in insertion order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.order
    }

    pub fn triggers(&self) -> &[NodeId] {
        &self.triggers
    }

    pub fn downstream(&self, node_id: &str) -> &[NodeId] {
        self.adjacency.get(node_id).map_or(&[], Vec::as_slice)
    }

    pub fn upstream(&self, node_id: &str) -> &[NodeId] {
        self.reverse_adjacency.get(node_id).map_or(&[], Vec::as_slice)
    }

    /// Nodes with no incoming edges.
    pub fn entry_points(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|id| self.upstream(id).is_empty())
            .map(String::as_str)
            .collect()
    }

    /// Every node reachable from any trigger, triggers included.
    pub fn reachable_from_triggers(&self) -> HashSet<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = self.triggers.iter().map(String::as_str).collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            stack.extend(self.downstream(id).iter().map(String::as_str));
        }
        seen
    }

    /// Nodes no trigger can reach, in insertion order.
    pub fn unreachable_nodes(&self) -> Vec<&str> {
        let reachable = self.reachable_from_triggers();
        self.order
            .iter()
            .map(String::as_str)
            .filter(|id| !reachable.contains(id))
            .collect()
    }

    /// First cycle reachable from `starts`, as the node path that closes it
    /// (`[a, b, a]`), or `None` when the reachable subgraph is acyclic.
    pub fn find_cycle_from(&self, starts: &[NodeId]) -> Option<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Colour {
            White,
            Grey,
            Black,
        }

        let mut colour: HashMap<&str, Colour> = self
            .order
            .iter()
            .map(|id| (id.as_str(), Colour::White))
            .collect();

        for start in starts {
            if colour.get(start.as_str()) != Some(&Colour::White) {
                continue;
            }
            // Iterative DFS; each frame is (node, index of next child).
            let mut path: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            colour.insert(start.as_str(), Colour::Grey);

            while let Some(frame) = path.last_mut() {
                let node = frame.0;
                let children = self.downstream(node);
                if frame.1 >= children.len() {
                    colour.insert(node, Colour::Black);
                    path.pop();
                    continue;
                }
                let child = children[frame.1].as_str();
                frame.1 += 1;
                match colour.get(child).copied().unwrap_or(Colour::Black) {
                    Colour::White => {
                        colour.insert(child, Colour::Grey);
                        path.push((child, 0));
                    }
                    Colour::Grey => {
                        let from = path.iter().position(|(id, _)| *id == child).unwrap_or(0);
                        let mut cycle: Vec<NodeId> =
                            path[from..].iter().map(|(id, _)| id.to_string()).collect();
                        cycle.push(child.to_string());
                        return Some(cycle);
                    }
                    Colour::Black => {}
                }
            }
        }
        None
    }

    /// Whether any cycle is reachable from `starts`.
    pub fn has_cycle_from(&self, starts: &[NodeId]) -> bool {
        self.find_cycle_from(starts).is_some()
    }

    /// Topological order of the nodes reachable from the triggers (Kahn's
    /// algorithm). Ties are broken by insertion order, so the same workflow
    /// always yields the same order.
    pub fn execution_order(&self) -> Result<Vec<NodeId>, CoreError> {
        let reachable = self.reachable_from_triggers();
        let index: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut in_degree: HashMap<&str, usize> = reachable.iter().map(|id| (*id, 0)).collect();
        for id in &reachable {
            for child in self.downstream(id) {
                if let Some(deg) = in_degree.get_mut(child.as_str()) {
                    *deg += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .filter_map(|(id, _)| index.get(id).copied())
            .collect();

        let mut sorted = Vec::with_capacity(reachable.len());
        while let Some(i) = ready.pop_first() {
            let id = self.order[i].as_str();
            sorted.push(id.to_string());
            for child in self.downstream(id) {
                if let Some(deg) = in_degree.get_mut(child.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        if let Some(ci) = index.get(child.as_str()) {
                            ready.insert(*ci);
                        }
                    }
                }
            }
        }

        if sorted.len() != reachable.len() {
            return Err(CoreError::Validation(
                "Workflow contains a cycle reachable from a trigger".to_string(),
            ));
        }
        Ok(sorted)
    }
}
