//! `Task`: the per-node state machine (§3, §4.2).

use crate::geometry::{curve_coord, PartGeometry};
use crate::graph::Graph;
use crate::link::PartId;
use glam::DVec3 as Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Shrink,
    Grow,
    Morph,
}

/// A captured skeleton snapshot: either curve control points or sheet corners, same shape as
/// the `PartGeometry` it was captured from (§4.2 "source basis" / "target basis").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Basis {
    Curve(Vec<Vec3>),
    Sheet([Vec3; 4]),
}

impl Basis {
    fn collapsed_to(&self, point: Vec3) -> Basis {
        match self {
            Basis::Curve(points) => Basis::Curve(vec![point; points.len()]),
            Basis::Sheet(_) => Basis::Sheet([point; 4]),
        }
    }

    fn lerp(&self, other: &Basis, t: f64) -> Basis {
        match (self, other) {
            (Basis::Curve(a), Basis::Curve(b)) => {
                Basis::Curve(a.iter().zip(b).map(|(x, y)| x.lerp(*y, t)).collect())
            }
            (Basis::Sheet(a), Basis::Sheet(b)) => {
                let mut out = [Vec3::ZERO; 4];
                for i in 0..4 {
                    out[i] = a[i].lerp(b[i], t);
                }
                Basis::Sheet(out)
            }
            _ => panic!("cannot interpolate between a curve basis and a sheet basis"),
        }
    }
}

/// Snapshot of `geometry`, resampled to `len` control points/corners when `geometry` is a curve
/// of a different length (MORPH between two curves with different control-point counts).
fn capture_basis(geometry: &PartGeometry, len_hint: Option<usize>) -> Basis {
    match geometry {
        PartGeometry::Curve(c) => {
            let n = len_hint.unwrap_or(c.control_points.len());
            if n == c.control_points.len() {
                Basis::Curve(c.control_points.clone())
            } else {
                let points = (0..n)
                    .map(|i| c.position(curve_coord(i as f64 / (n - 1) as f64)))
                    .collect();
                Basis::Curve(points)
            }
        }
        PartGeometry::Sheet(s) => Basis::Sheet(s.corners),
    }
}

/// Fixed record replacing the reference implementation's heterogeneous string→variant property
/// bag (§9). `relinked`/`propagated` are deliberately absent: they live on the relinker's
/// per-timestep `RelinkRunState` instead (§9), not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskProperties {
    pub is_cut_node: bool,
    pub is_crossing: bool,
    pub shrunk: bool,
    pub cut_node_grow: bool,
    pub cut_node_shrink: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_type: TaskType,
    /// The active-graph node this task owns; also this task's identity (one task per node).
    pub node_id: PartId,
    /// The corresponding target-graph node, for GROW and MORPH.
    pub target_node_id: Option<PartId>,
    pub start: i64,
    pub length: i64,
    pub is_done: bool,
    pub properties: TaskProperties,
    prepared: bool,
    source_basis: Option<Basis>,
    target_basis: Option<Basis>,
    /// Computed once per task by `Executor::prepare_relink`, `None` until then (§4.4 step 3b).
    pub link_deltas: Option<HashMap<String, Vec3>>,
}

impl Task {
    pub fn new(task_type: TaskType, node_id: impl Into<String>, target_node_id: Option<String>) -> Self {
        Self {
            task_type,
            node_id: node_id.into(),
            target_node_id,
            start: 0,
            length: 0,
            is_done: false,
            properties: TaskProperties::default(),
            prepared: false,
            source_basis: None,
            target_basis: None,
            link_deltas: None,
        }
    }

    pub fn end_time(&self) -> i64 {
        self.start + self.length
    }

    /// `(globalT - start) / length`, with values `< 0` meaning "not yet started" and clamped at
    /// the top so a task never reports more than perfectly done (§3).
    pub fn local_t(&self, global_t: f64) -> f64 {
        if self.length == 0 {
            return if global_t >= self.start as f64 { 1.0 } else { -1.0 };
        }
        let t = (global_t - self.start as f64) / self.length as f64;
        t.min(1.0)
    }

    pub fn is_active(&self, local_t: f64) -> bool {
        (0.0..1.0).contains(&local_t)
    }

    /// One-time setup: captures the source/target skeleton bases used by `execute`. Idempotent.
    pub fn prepare(&mut self, active: &Graph, target: &Graph) {
        if self.prepared {
            return;
        }
        let active_geometry = &active.part(&self.node_id).geometry;

        match self.task_type {
            TaskType::Shrink => {
                let centroid = active.part(&self.node_id).centroid();
                let source = capture_basis(active_geometry, None);
                self.target_basis = Some(source.collapsed_to(centroid));
                self.source_basis = Some(source);
            }
            TaskType::Grow => {
                let target_id = self
                    .target_node_id
                    .as_ref()
                    .unwrap_or_else(|| panic!("GROW task for {} has no target node", self.node_id));
                let target_geometry = &target.part(target_id).geometry;
                let centroid = target.part(target_id).centroid();
                let len_hint = match active_geometry {
                    PartGeometry::Curve(c) => Some(c.control_points.len()),
                    PartGeometry::Sheet(_) => None,
                };
                let target_basis = capture_basis(target_geometry, len_hint);
                self.source_basis = Some(target_basis.collapsed_to(centroid));
                self.target_basis = Some(target_basis);
            }
            TaskType::Morph => {
                let target_id = self
                    .target_node_id
                    .as_ref()
                    .unwrap_or_else(|| panic!("MORPH task for {} has no target node", self.node_id));
                let source = capture_basis(active_geometry, None);
                let len_hint = match &source {
                    Basis::Curve(points) => Some(points.len()),
                    Basis::Sheet(_) => None,
                };
                let target_geometry = &target.part(target_id).geometry;
                self.target_basis = Some(capture_basis(target_geometry, len_hint));
                self.source_basis = Some(source);
            }
        }
        self.prepared = true;
    }

    /// Advances the owned node's skeleton to `local_t ∈ [0,1]` (§4.2). SHRINK/GROW/MORPH differ
    /// only here: they all just lerp between the two captured bases.
    pub fn execute(&mut self, local_t: f64, active: &mut Graph) {
        if !self.prepared {
            panic!("Task::execute called before Task::prepare for node {}", self.node_id);
        }
        let t = local_t.clamp(0.0, 1.0);
        let source = self.source_basis.as_ref().expect("prepared");
        let target = self.target_basis.as_ref().expect("prepared");
        let basis = source.lerp(target, t);

        let part = active.part_mut(&self.node_id);
        match (&mut part.geometry, basis) {
            (PartGeometry::Curve(c), Basis::Curve(points)) => c.set_control_points(points),
            (PartGeometry::Sheet(s), Basis::Sheet(corners)) => s.set_corners(corners),
            _ => unreachable!("basis kind always matches its geometry's kind"),
        }

        if local_t >= 1.0 && !self.is_done {
            self.is_done = true;
            if self.task_type == TaskType::Shrink {
                self.properties.shrunk = true;
                part.shrunk = true;
            }
        }
    }

    /// Re-samples the node's cached geometry samples (§4.2). Called once at end-of-step for
    /// every task with `lt >= 0`, and once more per downstream task during local relink with a
    /// clamped `t`.
    pub fn geometry_morph(&self, clamped_t: f64, active: &mut Graph) {
        debug_assert!(clamped_t >= 0.0, "geometry_morph expects a non-negative local time");
        active.part_mut(&self.node_id).refresh_samples();
    }
}

/// The engine's task pool, indexed by the node id each task owns (one task per node, §3). Both
/// the executor and the relinker need "find the task that owns node X" far more often than
/// "iterate tasks in storage order", so this wraps a `Vec<Task>` with an id index instead of
/// making every caller build one.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: Vec<Task>,
    index: HashMap<PartId, usize>,
}

impl TaskSet {
    pub fn new(tasks: Vec<Task>) -> Self {
        let index = tasks.iter().enumerate().map(|(i, t)| (t.node_id.clone(), i)).collect();
        Self { tasks, index }
    }

    pub fn get(&self, node_id: &str) -> Option<&Task> {
        self.index.get(node_id).map(|&i| &self.tasks[i])
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut Task> {
        self.index.get(node_id).copied().map(move |i| &mut self.tasks[i])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.iter_mut()
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn as_mut_slice(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    /// Indices into storage order, ascending `start` (§4.4: "sorted task list: ascending start").
    /// Ties break on `node_id` so iteration order is reproducible regardless of how the tasks
    /// were originally built.
    pub fn order_by_start(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.tasks.len()).collect();
        order.sort_by(|&a, &b| {
            self.tasks[a]
                .start
                .cmp(&self.tasks[b].start)
                .then_with(|| self.tasks[a].node_id.cmp(&self.tasks[b].node_id))
        });
        order
    }

    pub fn into_inner(self) -> Vec<Task> {
        self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CurvePart, SheetPart};
    use crate::part::Part;

    fn make_graph_with_curve(id: &str, points: Vec<Vec3>) -> Graph {
        let mut g = Graph::new();
        g.add_part(Part::curve(CurvePart::new(id, points)));
        g
    }

    #[test]
    fn shrink_collapses_to_centroid_at_t_equals_1() {
        let mut active = make_graph_with_curve("a", vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)]);
        let target = Graph::new();
        let mut task = Task::new(TaskType::Shrink, "a", None);
        task.prepare(&active, &target);
        task.execute(1.0, &mut active);

        assert!(task.is_done);
        assert!(task.properties.shrunk);
        let PartGeometry::Curve(c) = &active.part("a").geometry else { unreachable!() };
        assert!(c.control_points.iter().all(|p| (*p - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-9));
    }

    #[test]
    fn grow_starts_collapsed_and_reaches_target_at_t_equals_1() {
        let mut active = make_graph_with_curve("a", vec![Vec3::ZERO, Vec3::ZERO]);
        let mut target = Graph::new();
        target.add_part(Part::curve(CurvePart::new("a_target", vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)])));

        let mut task = Task::new(TaskType::Grow, "a", Some("a_target".to_string()));
        task.prepare(&active, &target);
        task.execute(0.0, &mut active);
        let PartGeometry::Curve(c0) = &active.part("a").geometry else { unreachable!() };
        assert!((c0.control_points[1] - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-9); // collapsed to target centroid

        task.execute(1.0, &mut active);
        let PartGeometry::Curve(c1) = &active.part("a").geometry else { unreachable!() };
        assert!((c1.control_points[1] - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn morph_lerps_between_source_and_target_bases() {
        let mut active = make_graph_with_curve("a", vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]);
        let mut target = Graph::new();
        target.add_part(Part::curve(CurvePart::new("a_target", vec![Vec3::new(0.0, 4.0, 0.0), Vec3::new(2.0, 4.0, 0.0)])));

        let mut task = Task::new(TaskType::Morph, "a", Some("a_target".to_string()));
        task.prepare(&active, &target);
        task.execute(0.5, &mut active);

        let PartGeometry::Curve(c) = &active.part("a").geometry else { unreachable!() };
        assert!((c.control_points[0] - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn prepare_is_idempotent() {
        let mut active = make_graph_with_curve("a", vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]);
        let target = Graph::new();
        let mut task = Task::new(TaskType::Shrink, "a", None);
        task.prepare(&active, &target);
        task.execute(0.4, &mut active);
        // Re-preparing must not reset the captured basis mid-flight.
        task.prepare(&active, &target);
        assert!(task.source_basis.is_some());
    }

    #[test]
    fn sheet_part_is_supported_too() {
        let mut active = Graph::new();
        active.add_part(Part::sheet(SheetPart::new(
            "s",
            [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0), Vec3::new(2.0, 2.0, 0.0)],
        )));
        let target = Graph::new();
        let mut task = Task::new(TaskType::Shrink, "s", None);
        task.prepare(&active, &target);
        task.execute(1.0, &mut active);
        assert!(task.is_done);
    }
}
