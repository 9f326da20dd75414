//! The `Correspondence` boundary (§6) and `build_tasks` (§6 "Exposed by the core").
//!
//! The node-to-node mapping between source and target graphs is computed by the shape
//! correspondence stage — out of scope per §1 — and handed to this crate as a `Correspondence`.
//! `build_tasks` turns it into one `Task` per corresponded node, growing the active graph with
//! placeholder parts/links for nodes that only exist in the target (§3 "active graph ... starts
//! as source, becomes target").

use crate::error::{BlendError, BlendResult};
use crate::geometry::PartKind;
use crate::graph::Graph;
use crate::link::{Link, PartId};
use crate::part::Part;
use crate::task::{Task, TaskType};
use blend_config::EngineConfig;
use std::collections::HashSet;
use tracing::debug;

/// Flags the correspondence stage attaches to a pair, consumed only at task-creation time (§6).
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrespondenceFlags {
    /// True when this node's feature line crosses another during correspondence — forces the
    /// owning GROW/MORPH task to reach `isDone` before it is allowed to participate in the
    /// global relink (§4.5.b `isRelinkable`).
    pub is_crossing: bool,
    /// Cached cut-node status of this node in the graph that owns it (source for SHRINK, target
    /// for GROW); copied onto the task's `properties.is_cut_node` rather than recomputed.
    pub is_cut_node: bool,
    /// Explicit task duration, when the correspondence stage wants one node to run longer or
    /// shorter than the rest. `None` falls back to `config.default_task_length` (§ambient config).
    pub length: Option<i64>,
}

/// One corresponded pair (or unpaired node) from the correspondence stage.
#[derive(Debug, Clone)]
pub enum CorrespondencePair {
    /// A source node with no target counterpart: it disappears over the blend.
    Shrink {
        source_id: PartId,
        flags: CorrespondenceFlags,
    },
    /// A target node with no source counterpart: it must be created in the active graph and
    /// grown in from nothing.
    Grow {
        target_id: PartId,
        flags: CorrespondenceFlags,
    },
    /// A source node mapped to a target node: its skeleton interpolates between the two.
    Morph {
        source_id: PartId,
        target_id: PartId,
        flags: CorrespondenceFlags,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Correspondence {
    pub pairs: Vec<CorrespondencePair>,
}

impl Correspondence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shrink(mut self, source_id: impl Into<String>, flags: CorrespondenceFlags) -> Self {
        self.pairs.push(CorrespondencePair::Shrink {
            source_id: source_id.into(),
            flags,
        });
        self
    }

    pub fn grow(mut self, target_id: impl Into<String>, flags: CorrespondenceFlags) -> Self {
        self.pairs.push(CorrespondencePair::Grow {
            target_id: target_id.into(),
            flags,
        });
        self
    }

    pub fn morph(
        mut self,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        flags: CorrespondenceFlags,
    ) -> Self {
        self.pairs.push(CorrespondencePair::Morph {
            source_id: source_id.into(),
            target_id: target_id.into(),
            flags,
        });
        self
    }
}

/// Builds one task per corresponded node and, for GROW nodes, inserts a collapsed placeholder
/// part into `active` plus whichever target links now have both endpoints present, so every
/// `Task::node()` the scheduler sees already exists in the active graph (§3, §4.2).
///
/// `active` is the mutable graph the blend runs on; the caller seeds it as a clone of the source
/// graph before calling this. `target` is read-only. `config.default_task_length` fills in the
/// duration of any task whose correspondence flags don't specify one.
pub fn build_tasks(
    active: &mut Graph,
    target: &Graph,
    correspondence: &Correspondence,
    config: &EngineConfig,
) -> BlendResult<Vec<Task>> {
    let _span = tracing::info_span!(
        target: "blend_core::correspondence",
        blend_telemetry::tracing_setup::SPAN_BUILD_TASKS,
        pairs = correspondence.pairs.len()
    )
    .entered();

    validate_groups(active, "active")?;
    validate_groups(target, "target")?;
    validate_links(active, "active")?;
    validate_links(target, "target")?;

    let mut seen_active_ids: HashSet<PartId> = HashSet::new();
    let mut tasks = Vec::with_capacity(correspondence.pairs.len());

    // Pass 1: validate, create tasks, and materialize GROW placeholders so every node id a task
    // can reference already exists in `active` by the time pass 2 wires up links.
    for pair in &correspondence.pairs {
        match pair {
            CorrespondencePair::Shrink { source_id, flags } => {
                if !active.has_part(source_id) {
                    return Err(BlendError::MissingTarget {
                        node_id: source_id.clone(),
                    });
                }
                register_unique(&mut seen_active_ids, source_id)?;
                let mut task = Task::new(TaskType::Shrink, source_id.clone(), None);
                task.properties.is_crossing = flags.is_crossing;
                task.properties.is_cut_node = flags.is_cut_node;
                task.length = flags.length.unwrap_or(config.default_task_length);
                debug!(node_id = %task.node_id, length = task.length, "created SHRINK task");
                tasks.push(task);
            }
            CorrespondencePair::Morph { source_id, target_id, flags } => {
                if !active.has_part(source_id) {
                    return Err(BlendError::MissingTarget {
                        node_id: source_id.clone(),
                    });
                }
                if !target.has_part(target_id) {
                    return Err(BlendError::MissingTarget {
                        node_id: target_id.clone(),
                    });
                }
                register_unique(&mut seen_active_ids, source_id)?;
                let mut task = Task::new(TaskType::Morph, source_id.clone(), Some(target_id.clone()));
                task.properties.is_crossing = flags.is_crossing;
                task.properties.is_cut_node = flags.is_cut_node;
                task.length = flags.length.unwrap_or(config.default_task_length);
                debug!(node_id = %task.node_id, target_id = %target_id, length = task.length, "created MORPH task");
                tasks.push(task);
            }
            CorrespondencePair::Grow { target_id, flags } => {
                if !target.has_part(target_id) {
                    return Err(BlendError::MissingTarget {
                        node_id: target_id.clone(),
                    });
                }
                register_unique(&mut seen_active_ids, target_id)?;
                insert_grow_placeholder(active, target, target_id);
                let mut task = Task::new(TaskType::Grow, target_id.clone(), Some(target_id.clone()));
                task.properties.is_crossing = flags.is_crossing;
                task.properties.is_cut_node = flags.is_cut_node;
                task.length = flags.length.unwrap_or(config.default_task_length);
                debug!(node_id = %task.node_id, length = task.length, "created GROW task and grew its placeholder");
                tasks.push(task);
            }
        }
    }

    wire_target_links(active, target, &seen_active_ids);

    Ok(tasks)
}

fn register_unique(seen: &mut HashSet<PartId>, id: &str) -> BlendResult<()> {
    if !seen.insert(id.to_string()) {
        return Err(BlendError::DuplicateTask { node_id: id.to_string() });
    }
    Ok(())
}

/// Inserts a zero-size placeholder at `target_id`'s position, matching the target part's kind
/// and control-point count, so `GrowTask::prepare` can immediately drag it toward the real
/// geometry (§4.2 GROW: "requiring targetNode() to exist").
fn insert_grow_placeholder(active: &mut Graph, target: &Graph, target_id: &str) {
    let target_part = target.part(target_id);
    let centroid = target_part.centroid();

    let part = match target_part.kind() {
        PartKind::Curve => {
            let control_points = match &target_part.geometry {
                crate::geometry::PartGeometry::Curve(c) => vec![centroid; c.control_points.len()],
                _ => unreachable!(),
            };
            Part::curve(crate::geometry::CurvePart::new(target_id, control_points))
        }
        PartKind::Sheet => Part::sheet(crate::geometry::SheetPart::new(target_id, [centroid; 4])),
    };
    active.add_part(part);
}

/// Copies every target link whose endpoints now both exist in `active` (either because they
/// were always there, or because pass 1 just grew them in) and that `active` doesn't already
/// carry, so the active graph's connectivity converges on the target's (§3 "active graph ...
/// becomes target").
fn wire_target_links(active: &mut Graph, target: &Graph, active_ids: &HashSet<PartId>) {
    let existing: HashSet<(String, String)> = active
        .links
        .iter()
        .map(|l| unordered_pair(&l.n1, &l.n2))
        .collect();

    let mut to_add: Vec<Link> = Vec::new();
    for link in &target.links {
        let n1_present = active.has_part(&link.n1) || active_ids.contains(&link.n1);
        let n2_present = active.has_part(&link.n2) || active_ids.contains(&link.n2);
        if !n1_present || !n2_present {
            continue;
        }
        if existing.contains(&unordered_pair(&link.n1, &link.n2)) {
            continue;
        }
        to_add.push(link.clone());
    }
    for link in to_add {
        active.add_link(link);
    }
}

fn unordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn validate_links(graph: &Graph, which: &str) -> BlendResult<()> {
    for link in &graph.links {
        if !graph.has_part(&link.n1) {
            return Err(BlendError::OrphanLink {
                link_id: format!("{which}:{}", link.id),
                missing_node: link.n1.clone(),
            });
        }
        if !graph.has_part(&link.n2) {
            return Err(BlendError::OrphanLink {
                link_id: format!("{which}:{}", link.id),
                missing_node: link.n2.clone(),
            });
        }
    }
    Ok(())
}

fn validate_groups(graph: &Graph, which: &str) -> BlendResult<()> {
    let Some(groups) = &graph.groups else { return Ok(()) };
    for (group_index, group) in groups.iter().enumerate() {
        for node_id in group {
            if !graph.has_part(node_id) {
                return Err(BlendError::MalformedGroup {
                    group_index,
                    node_id: format!("{which}:{node_id}"),
                });
            }
        }
    }
    Ok(())
}
