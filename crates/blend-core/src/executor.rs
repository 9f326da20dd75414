//! Drives `globalTime` from 0 to 1 in fixed steps, executing every task and relinking after each
//! one, then publishing a frame snapshot (§4.4).

use crate::error::BlendResult;
use crate::graph::Graph;
use crate::relinker;
use crate::snapshot::FrameHistory;
use crate::task::{TaskSet, TaskType};
use blend_config::EngineConfig;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared interruption flag for `Executor::run` (§5 `forceStop`). A single-threaded caller can
/// use `Cell<bool>` instead; both satisfy the same trait so `run` doesn't care which one shows up.
pub trait ForceStop {
    fn is_set(&self) -> bool;
}

impl ForceStop for Arc<AtomicBool> {
    fn is_set(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl ForceStop for Rc<Cell<bool>> {
    fn is_set(&self) -> bool {
        self.get()
    }
}

/// A `ForceStop` that never fires, for callers who don't need interruption.
pub struct NeverStop;

impl ForceStop for NeverStop {
    fn is_set(&self) -> bool {
        false
    }
}

pub struct Executor<'a> {
    config: &'a EngineConfig,
    active: Graph,
    target: Graph,
    tasks: TaskSet,
    total_execution_time: i64,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a EngineConfig, active: Graph, target: Graph, tasks: TaskSet) -> Self {
        let total_execution_time = tasks.iter().map(|t| t.end_time()).max().unwrap_or(0);
        let mut executor = Self {
            config,
            active,
            target,
            tasks,
            total_execution_time,
        };
        executor.run_pre_pass();
        executor
    }

    /// §4.4 pre-pass: cut-node GROW/SHRINK tasks get their deformation basis prepared early and
    /// are flagged so the per-step loop gives them local relink treatment even though they are
    /// not MORPH.
    fn run_pre_pass(&mut self) {
        let grow_targets: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.task_type == TaskType::Grow)
            .filter_map(|t| t.target_node_id.clone())
            .collect();
        for target_id in grow_targets {
            if self.target.is_cut_node(&target_id) {
                if let Some(task) = self.tasks.get_mut(&target_id) {
                    task.prepare(&self.active, &self.target);
                    task.properties.cut_node_grow = true;
                }
            }
        }

        let shrink_nodes: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.task_type == TaskType::Shrink)
            .map(|t| t.node_id.clone())
            .collect();
        for node_id in shrink_nodes {
            if self.active.is_cut_node(&node_id) {
                if let Some(task) = self.tasks.get_mut(&node_id) {
                    task.properties.cut_node_shrink = true;
                }
            }
        }
    }

    pub fn total_execution_time(&self) -> i64 {
        self.total_execution_time
    }

    /// Runs every step from `globalTime = 0` to `1 + Δ`, honoring `stop` between steps, and
    /// returns the published frame history (§4.4, §5) so callers can `seek` it (§6).
    pub fn run(mut self, stop: &dyn ForceStop) -> BlendResult<FrameHistory> {
        let mut history = FrameHistory::new(self.config.frame_history);
        let step = self.config.time_step;
        let mut global_t = 0.0_f64;

        loop {
            if stop.is_set() {
                info!(global_t, "blend interrupted between timesteps");
                break;
            }

            self.step(global_t, &mut history);
            blend_telemetry::metrics::record_timestep();

            if global_t >= 1.0 {
                break;
            }
            global_t = (global_t + step).min(1.0 + step);
        }

        Ok(history)
    }

    /// A single timestep (§4.4 "per step"), reusable by `run` and by callers who want to drive
    /// the loop manually (e.g. the GUI scrubbing through a live blend).
    pub fn step(&mut self, global_t: f64, history: &mut FrameHistory) {
        let _span = tracing::info_span!(
            target: "blend_core::executor",
            blend_telemetry::tracing_setup::SPAN_EXECUTE_STEP,
            global_t
        )
        .entered();

        let absolute_t = global_t * self.total_execution_time as f64;

        // 1. clear per-step flags.
        self.active.clear_active_flags();

        // 2. record this step's running tasks, in ascending-start order, as relink BFS seeds.
        let order = self.tasks.order_by_start();
        let running: Vec<String> = order
            .iter()
            .filter_map(|&i| {
                let task = &self.tasks.as_slice()[i];
                let lt = task.local_t(absolute_t);
                (lt >= 0.0 && lt < 1.0 && !task.is_done).then(|| task.node_id.clone())
            })
            .collect();
        self.active.set_active_tasks(running);

        // 3. execute every task in ascending-start order, local-relinking as we go.
        for &idx in &order {
            let node_id = self.tasks.as_slice()[idx].node_id.clone();
            let lt = self.tasks.get(&node_id).unwrap().local_t(absolute_t);
            if lt < 0.0 || self.tasks.get(&node_id).unwrap().is_done {
                continue;
            }

            if self.tasks.get(&node_id).unwrap().link_deltas.is_none() {
                let deltas = relinker::prepare_relink_deltas(&self.active, &self.tasks, &node_id);
                self.tasks.get_mut(&node_id).unwrap().link_deltas = Some(deltas);
            }

            {
                let task = self.tasks.get_mut(&node_id).unwrap();
                task.prepare(&self.active, &self.target);
                task.execute(lt, &mut self.active);
            }

            relinker::relink_local(&mut self.active, &mut self.tasks, &node_id, lt);

            if (0.0..1.0).contains(&lt) {
                self.active.set_active(&node_id, true);
            }
        }

        // 4. second pass: resample geometry for every task that ran this step.
        for &idx in &order {
            let node_id = self.tasks.as_slice()[idx].node_id.clone();
            let lt = self.tasks.get(&node_id).unwrap().local_t(absolute_t);
            if lt < 0.0 {
                continue;
            }
            self.tasks.get(&node_id).unwrap().geometry_morph(lt.clamp(0.0, 1.0), &mut self.active);
        }

        // 5. whole-graph constraint-propagation relink, seeded by step 2's running set.
        let state = relinker::propagate(&mut self.active, &mut self.tasks);
        blend_telemetry::metrics::record_relinked_tasks(state.relinked_count() as u64);
        debug!(relinked = state.relinked_count(), "constraint propagation complete");

        // 6. publish the snapshot.
        history.push(self.active.clone());
    }

    pub fn active(&self) -> &Graph {
        &self.active
    }
}
