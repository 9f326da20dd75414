//! Lays tasks out on a shared integer timeline (§4.3): type ordering, valence-based priority,
//! dependency layering, group alignment, then a gap-compression sweep.

use crate::geometry::PartKind;
use crate::graph::Graph;
use crate::task::{Task, TaskType};
use blend_config::EngineConfig;
use itertools::Itertools;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

pub struct Scheduler<'a> {
    config: &'a EngineConfig,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Assigns `start` to every task in place. `active`/`target` are only read (for valence and
    /// `groups`), never mutated.
    pub fn schedule(&self, tasks: &mut [Task], active: &Graph, target: &Graph) {
        let _span =
            tracing::info_span!(target: "blend_core::scheduler", blend_telemetry::tracing_setup::SPAN_SCHEDULE)
                .entered();

        let mut cur_start: i64 = 0;
        for bucket_type in [TaskType::Shrink, TaskType::Morph, TaskType::Grow] {
            let bucket: Vec<usize> = tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.task_type == bucket_type)
                .map(|(i, _)| i)
                .collect();
            if bucket.is_empty() {
                continue;
            }

            let ordered = sort_by_priority(&bucket, tasks, active);

            let mut future_start = cur_start;
            let layer_order: Vec<usize> = if bucket_type == TaskType::Morph {
                let mut cursor = cur_start;
                for &idx in &ordered {
                    tasks[idx].start = cursor;
                    cursor = tasks[idx].end_time();
                    future_start = future_start.max(cursor);
                }
                ordered
            } else {
                let (layered, reached) = sort_as_layers(&ordered, tasks, active, cur_start, bucket_type);
                future_start = future_start.max(reached);
                layered
            };

            // Group alignment (§4.3): SHRINK aligns against the source/active graph's groups;
            // MORPH and GROW both align against the target graph's groups (the reference
            // scheduler applies the same `else` branch to both).
            let group_graph = if bucket_type == TaskType::Shrink { active } else { target };
            if let Some(groups) = &group_graph.groups {
                for (group_index, group) in groups.iter().enumerate() {
                    let members: Vec<usize> = layer_order
                        .iter()
                        .copied()
                        .filter(|&idx| {
                            let lookup_id = if bucket_type == TaskType::Shrink {
                                &tasks[idx].node_id
                            } else {
                                tasks[idx].target_node_id.as_ref().unwrap_or(&tasks[idx].node_id)
                            };
                            group.contains(lookup_id)
                        })
                        .collect();
                    if members.is_empty() {
                        continue;
                    }
                    let mut common_start = future_start;
                    for &idx in &members {
                        common_start = common_start.min(tasks[idx].start);
                    }
                    for &idx in &members {
                        tasks[idx].start = common_start;
                        future_start = future_start.max(tasks[idx].end_time());
                    }
                    debug!(group_index, common_start, "aligned group start");
                }
            }

            cur_start = future_start;
        }

        self.compress_gaps(tasks);

        if self.config.strict_bucket_separation {
            self.enforce_bucket_separation(tasks);
        }
    }

    /// §9 Design Notes / Open Question: when enabled, undoes whatever gap compression bought the
    /// GROW bucket at the MORPH bucket's expense, by shifting every GROW task forward (preserving
    /// its spacing relative to the rest of the bucket) so none starts before the last MORPH task
    /// ends. No-op when either bucket is empty.
    fn enforce_bucket_separation(&self, tasks: &mut [Task]) {
        let morph_end = tasks
            .iter()
            .filter(|t| t.task_type == TaskType::Morph)
            .map(Task::end_time)
            .max();
        let Some(morph_end) = morph_end else { return };

        let grow_min_start = tasks
            .iter()
            .filter(|t| t.task_type == TaskType::Grow)
            .map(|t| t.start)
            .min();
        let Some(grow_min_start) = grow_min_start else { return };

        if grow_min_start < morph_end {
            let delta = morph_end - grow_min_start;
            for task in tasks.iter_mut().filter(|t| t.task_type == TaskType::Grow) {
                task.start += delta;
            }
        }
    }

    /// Removes dead time between independently-laid-out buckets (§4.3 gap compression).
    fn compress_gaps(&self, tasks: &mut [Task]) {
        let stride = self.config.gap_compression_stride.max(1);
        let mut cur_time: i64 = 0;
        loop {
            let before: Vec<usize> = (0..tasks.len()).filter(|&i| tasks[i].start < cur_time).collect();
            let after: Vec<usize> = (0..tasks.len()).filter(|&i| tasks[i].start >= cur_time).collect();

            if after.is_empty() {
                break;
            }
            if !before.is_empty() {
                let end = before.iter().map(|&i| tasks[i].end_time()).max().unwrap();
                let start = after.iter().map(|&i| tasks[i].start).min().unwrap();
                let delta = end - start;
                if delta < 0 {
                    for &i in &after {
                        tasks[i].start += delta;
                    }
                }
            }
            cur_time += stride;
        }
    }
}

/// Sheets after curves; within a kind, highest active-graph valence first (§4.3).
fn sort_by_priority(bucket: &[usize], tasks: &[Task], active: &Graph) -> Vec<usize> {
    let mut curves: Vec<(usize, usize)> = Vec::new();
    let mut sheets: Vec<(usize, usize)> = Vec::new();

    for &idx in bucket {
        let valence = active.valence(&tasks[idx].node_id);
        match active.part(&tasks[idx].node_id).kind() {
            PartKind::Curve => curves.push((idx, valence)),
            PartKind::Sheet => sheets.push((idx, valence)),
        }
    }

    curves
        .into_iter()
        .sorted_by_key(|&(_, v)| v)
        .chain(sheets.into_iter().sorted_by_key(|&(_, v)| v))
        .map(|(i, _)| i)
        .rev()
        .collect()
}

/// Splits the bucket's nodes into connected components (induced by the bucket's own node set on
/// `active`'s edges), peels each into degree layers (leaves first), and — for SHRINK only —
/// reverses the resulting start-value sequence so leaf-most parts finish last (§4.3). Returns
/// the task order and the max end time reached.
fn sort_as_layers(
    ordered: &[usize],
    tasks: &mut [Task],
    active: &Graph,
    start_time: i64,
    bucket_type: TaskType,
) -> (Vec<usize>, i64) {
    let components = split_components(ordered, tasks, active);

    let mut sorted = Vec::new();
    let mut cursor = start_time;
    let mut reached = start_time;

    for component in components {
        let layers = peel_layers(&component, tasks, active);
        let mut layer_cursor = cursor;
        for layer in layers {
            for &idx in &layer {
                tasks[idx].start = layer_cursor;
                reached = reached.max(tasks[idx].end_time());
            }
            layer_cursor = layer.iter().map(|&idx| tasks[idx].end_time()).max().unwrap_or(layer_cursor);
            sorted.extend(layer);
        }
        cursor = layer_cursor;
    }

    if bucket_type == TaskType::Shrink && !sorted.is_empty() {
        let mut starts: Vec<i64> = sorted.iter().map(|&idx| tasks[idx].start).collect();
        starts.reverse();
        for (&idx, new_start) in sorted.iter().zip(starts) {
            tasks[idx].start = new_start;
        }
    }

    (sorted, reached)
}

fn split_components(ordered: &[usize], tasks: &[Task], active: &Graph) -> Vec<Vec<usize>> {
    let in_bucket: HashSet<&str> = ordered.iter().map(|&i| tasks[i].node_id.as_str()).collect();
    let idx_by_node: HashMap<&str, usize> = ordered.iter().map(|&i| (tasks[i].node_id.as_str(), i)).collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut components = Vec::new();

    for &idx in ordered {
        let node_id = tasks[idx].node_id.as_str();
        if visited.contains(node_id) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(node_id);
        visited.insert(node_id);

        while let Some(current) = queue.pop_front() {
            component.push(idx_by_node[current]);
            for link in active.edges(current) {
                let other = link.other_node(current);
                if in_bucket.contains(other) && !visited.contains(other) {
                    visited.insert(other);
                    queue.push_back(other);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Repeatedly removes the minimum-current-degree node(s) from the induced subgraph; each removal
/// round is one layer (§4.3). Node IDs within a layer are ordered deterministically (by ID) so
/// scheduling is reproducible regardless of hash-map iteration order elsewhere.
fn peel_layers(component: &[usize], tasks: &[Task], active: &Graph) -> Vec<Vec<usize>> {
    let node_of: HashMap<usize, &str> = component.iter().map(|&i| (i, tasks[i].node_id.as_str())).collect();
    let members: HashSet<&str> = node_of.values().copied().collect();

    let mut degree: HashMap<&str, usize> = HashMap::new();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for &node in members.iter() {
        let neighbours: Vec<&str> = active
            .edges(node)
            .into_iter()
            .map(|l| l.other_node(node))
            .filter(|n| members.contains(n))
            .collect();
        degree.insert(node, neighbours.len());
        adjacency.insert(node, neighbours);
    }

    let idx_of: HashMap<&str, usize> = component.iter().map(|&i| (tasks[i].node_id.as_str(), i)).collect();
    let mut remaining: HashSet<&str> = members.clone();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let min_degree = remaining.iter().map(|n| degree[n]).min().unwrap();
        let mut layer_nodes: Vec<&str> = remaining.iter().copied().filter(|n| degree[n] == min_degree).collect();
        layer_nodes.sort_unstable();

        for &node in &layer_nodes {
            remaining.remove(node);
        }
        for &node in &layer_nodes {
            for &neighbour in &adjacency[node] {
                if remaining.contains(neighbour) {
                    *degree.get_mut(neighbour).unwrap() -= 1;
                }
            }
        }
        layers.push(layer_nodes.into_iter().map(|n| idx_of[n]).collect());
    }
    layers
}
