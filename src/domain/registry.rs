//! In-memory catalog of learning path nodes

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{Difficulty, Node, ProblemNode, TreasureNode, TreasureTier};

/// Owned catalog of nodes keyed by id.
///
/// Listing order is by id. Cross-node invariants are not checked here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Node>,
}

impl NodeRegistry {
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut registry = Self::default();
        registry.load(nodes);
        registry
    }

    /// Replace the whole catalog. A later node wins over an earlier one
    /// with the same id.
    pub fn load(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.nodes = nodes
            .into_iter()
            .map(|n| (n.id().to_string(), n))
            .collect();
        debug!("load: {} nodes", self.nodes.len());
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn all(&self) -> Vec<&Node> {
        self.nodes.values().collect()
    }

    /// Owned copy of every node, in id order.
    pub fn to_vec(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn problems_only(&self) -> Vec<&ProblemNode> {
        self.nodes.values().filter_map(Node::as_problem).collect()
    }

    pub fn treasures_only(&self) -> Vec<&TreasureNode> {
        self.nodes.values().filter_map(Node::as_treasure).collect()
    }

    pub fn by_difficulty(&self, difficulty: Difficulty) -> Vec<&ProblemNode> {
        self.problems_only()
            .into_iter()
            .filter(|p| p.difficulty == difficulty)
            .collect()
    }

    pub fn by_tier(&self, tier: TreasureTier) -> Vec<&TreasureNode> {
        self.treasures_only()
            .into_iter()
            .filter(|t| t.tier == tier)
            .collect()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&ProblemNode> {
        self.problems_only()
            .into_iter()
            .filter(|p| p.tags.contains(tag))
            .collect()
    }

    /// Insert or replace by id.
    pub fn add(&mut self, node: Node) {
        self.nodes.insert(node.id().to_string(), node);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.nodes.remove(id).is_some()
    }

    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Re-tier treasures by their position along the path.
    ///
    /// `path_order` lists treasure ids in path order; ids that are not
    /// treasures in this registry are skipped. Returns the number of
    /// treasures whose tier changed.
    pub fn assign_treasure_tiers(&mut self, path_order: &[&str]) -> usize {
        let total = path_order.len();
        let mut changed = 0;
        for (index, id) in path_order.iter().enumerate() {
            if let Some(Node::Treasure(treasure)) = self.nodes.get_mut(*id) {
                let tier = TreasureTier::for_path_position(index, total);
                if treasure.tier != tier {
                    treasure.tier = tier;
                    changed += 1;
                }
            }
        }
        debug!("assign_treasure_tiers: {} of {} changed", changed, total);
        changed
    }
}
