//! `Graph`: a set of parts and links (§3), independently deep-copyable so every executor
//! timestep can publish its own snapshot (§5).

use crate::link::{Link, PartId};
use crate::part::Part;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: HashMap<PartId, Part>,
    pub links: Vec<Link>,
    /// Semantic groups of node IDs (symmetric parts, etc.) consulted by the scheduler's
    /// group-alignment pass (§4.3).
    pub groups: Option<Vec<HashSet<PartId>>>,
    /// Recomputed every executor step, consumed only as BFS seeds by the relinker (§4.4 step 2).
    /// Insertion-ordered (not a `HashSet`) so the propagation BFS it seeds is reproducible run
    /// to run, per the §8 "constraint determinism" property.
    #[serde(skip)]
    pub active_tasks: Vec<PartId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_part(&mut self, part: Part) {
        self.nodes.insert(part.id().to_string(), part);
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    pub fn part(&self, id: &str) -> &Part {
        self.nodes
            .get(id)
            .unwrap_or_else(|| panic!("node {id} not present in graph"))
    }

    pub fn part_mut(&mut self, id: &str) -> &mut Part {
        self.nodes
            .get_mut(id)
            .unwrap_or_else(|| panic!("node {id} not present in graph"))
    }

    pub fn has_part(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Part> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Part> {
        self.nodes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every link incident to `node_id`, in storage order (feeds the deterministic BFS edge
    /// iteration the relinker relies on, §5).
    pub fn edges(&self, node_id: &str) -> Vec<&Link> {
        self.links.iter().filter(|l| l.has_node(node_id)).collect()
    }

    pub fn valence(&self, node_id: &str) -> usize {
        self.edges(node_id).len()
    }

    /// True when removing `node_id` would split the graph into more than one component.
    pub fn is_cut_node(&self, node_id: &str) -> bool {
        let remaining: Vec<&str> = self.nodes.keys().map(|s| s.as_str()).filter(|&id| id != node_id).collect();
        if remaining.len() < 2 {
            return false;
        }

        let start = remaining[0];
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for link in self.edges(current) {
                let other = link.other_node(current);
                if other == node_id || visited.contains(other) {
                    continue;
                }
                visited.insert(other);
                queue.push_back(other);
            }
        }

        visited.len() != remaining.len()
    }

    /// Sets `isActive = false` on every node (§4.4 step 1).
    pub fn clear_active_flags(&mut self) {
        for part in self.nodes.values_mut() {
            part.is_active = false;
        }
    }

    pub fn set_active(&mut self, node_id: &str, active: bool) {
        self.part_mut(node_id).is_active = active;
    }

    /// Records the set of tasks running at this step (§4.4 step 2), in iteration order, for the
    /// relinker to use as deterministic BFS seeds.
    pub fn set_active_tasks(&mut self, node_ids: Vec<PartId>) {
        self.active_tasks = node_ids;
    }
}
