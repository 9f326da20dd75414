//! Integration coverage for the scenarios and invariants of the blend execution engine: builds a
//! correspondence, schedules it, runs the executor end to end, and checks the published frame
//! history rather than any single module in isolation.

use blend_config::EngineConfig;
use blend_core::correspondence::{build_tasks, Correspondence, CorrespondenceFlags};
use blend_core::executor::{Executor, NeverStop};
use blend_core::geometry::{curve_coord, CurvePart, PartGeometry};
use blend_core::graph::Graph;
use blend_core::link::Link;
use blend_core::part::Part;
use blend_core::scheduler::Scheduler;
use blend_core::task::{TaskSet, TaskType};
use glam::DVec3 as Vec3;
use std::collections::HashSet;

fn curve(id: &str, a: Vec3, b: Vec3) -> Part {
    Part::curve(CurvePart::new(id, vec![a, b]))
}

fn link(id: &str, a: &str, b: &str, blended_delta: Vec3) -> Link {
    Link::new(id, a, curve_coord(1.0), b, curve_coord(0.0), blended_delta)
}

/// Scenario 1: a two-node SHRINK chain peels into two layers and reverses their starts, and both
/// parts end the blend collapsed to a point.
#[test]
fn two_node_shrink_collapses_both_parts() {
    let mut active = Graph::new();
    active.add_part(curve("a", Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)));
    active.add_part(curve("b", Vec3::new(4.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0)));
    active.add_link(link("ab", "a", "b", Vec3::ZERO));
    let target = Graph::new();

    let correspondence = Correspondence::new()
        .shrink("a", CorrespondenceFlags::default())
        .shrink("b", CorrespondenceFlags::default());
    let config = EngineConfig::default();
    let mut tasks = build_tasks(&mut active, &target, &correspondence, &config).unwrap();
    Scheduler::new(&config).schedule(&mut tasks, &active, &target);

    // two single-node layers of a path peel one at a time, so reversal must swap which one
    // starts first rather than leaving both at the same start.
    let a_start = tasks.iter().find(|t| t.node_id == "a").unwrap().start;
    let b_start = tasks.iter().find(|t| t.node_id == "b").unwrap().start;
    assert_ne!(a_start, b_start);

    let executor = Executor::new(&config, active, target, TaskSet::new(tasks));
    let frames = executor.run(&NeverStop).unwrap();
    let last = frames.last().unwrap();
    assert!(last.part("a").shrunk);
    assert!(last.part("b").shrunk);
}

/// Scenario 2: a morphing node with two already-done anchors gets fixed with `deform_two_handles`
/// using the first and last edge in the graph's own (BFS / storage) edge order.
#[test]
fn morph_with_two_anchors_deforms_via_two_handles() {
    use blend_core::task::Task;

    let mut active = Graph::new();
    active.add_part(curve("x", Vec3::ZERO, Vec3::ZERO));
    active.add_part(curve("y", Vec3::new(4.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)));
    // deliberately not already sitting where either anchor demands, so a real deform is observed.
    active.add_part(curve("m", Vec3::new(-5.0, 0.0, 0.0), Vec3::new(-5.0, 0.0, 0.0)));
    active.add_link(Link::new("lx", "x", curve_coord(1.0), "m", curve_coord(0.0), Vec3::new(1.0, 0.0, 0.0)));
    active.add_link(Link::new("ly", "y", curve_coord(1.0), "m", curve_coord(1.0), Vec3::new(-1.0, 0.0, 0.0)));

    let mut x_task = Task::new(TaskType::Morph, "x", Some("x_t".to_string()));
    x_task.is_done = true;
    let mut y_task = Task::new(TaskType::Morph, "y", Some("y_t".to_string()));
    y_task.is_done = true;
    let m_task = Task::new(TaskType::Morph, "m", Some("m_t".to_string()));
    let mut tasks = TaskSet::new(vec![x_task, y_task, m_task]);

    // both x and y are done, so they seed the BFS and constrain m through the first ("lx") and
    // last ("ly") edge incident on it, in graph storage order.
    active.set_active_tasks(vec!["x".to_string(), "y".to_string()]);
    let state = blend_core::relinker::propagate(&mut active, &mut tasks);

    assert_eq!(state.constraints_for("m").len(), 2, "m must be constrained by both of its incident edges");
    let PartGeometry::Curve(c) = &active.part("m").geometry else { unreachable!() };
    // lx pins m's coord-0 handle to x's position plus blendedDelta; ly pins m's coord-1 handle
    // to y's position plus its own blendedDelta — distinct handles, so both land exactly.
    assert!((c.control_points[0] - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
    assert!((c.control_points[1] - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
}

/// Scenario 3: a three-node GROW chain peels leaves-first but is never reversed, so both
/// endpoints of the chain start no later than the middle node.
#[test]
fn grow_chain_layers_without_reversal() {
    let mut active = Graph::new();
    let mut target = Graph::new();
    for id in ["a", "b", "c"] {
        target.add_part(curve(id, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
    }
    target.add_link(link("ab", "a", "b", Vec3::ZERO));
    target.add_link(link("bc", "b", "c", Vec3::ZERO));

    let correspondence = Correspondence::new()
        .grow("a", CorrespondenceFlags::default())
        .grow("b", CorrespondenceFlags::default())
        .grow("c", CorrespondenceFlags::default());
    let config = EngineConfig::default();
    let mut tasks = build_tasks(&mut active, &target, &correspondence, &config).unwrap();
    Scheduler::new(&config).schedule(&mut tasks, &active, &target);

    let a_start = tasks.iter().find(|t| t.node_id == "a").unwrap().start;
    let b_start = tasks.iter().find(|t| t.node_id == "b").unwrap().start;
    let c_start = tasks.iter().find(|t| t.node_id == "c").unwrap().start;
    assert_eq!(a_start, 0);
    assert_eq!(c_start, 0);
    assert!(b_start >= a_start, "the middle node has higher induced degree and peels into a later layer");
}

/// Scenario 4: a GROW task targeting a cut node gets `cutNodeGrow` set by the executor's pre-pass
/// and is driven through local relink even though it is not MORPH, keeping its neighbour attached
/// as it grows in.
#[test]
fn cut_node_grow_participates_in_local_relink() {
    let mut active = Graph::new();
    active.add_part(curve("anchor", Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
    let mut target = Graph::new();
    target.add_part(curve("anchor", Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
    target.add_part(curve("t", Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)));
    target.add_part(curve("leaf", Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0)));
    target.add_link(link("anchor_t", "anchor", "t", Vec3::ZERO));
    target.add_link(link("t_leaf", "t", "leaf", Vec3::ZERO));

    // "t" sits between "anchor" (already in the active graph, MORPHing) and "leaf" (only grown
    // in), so removing it from the target graph would disconnect "leaf" from "anchor": a cut node.
    assert!(target.is_cut_node("t"));

    let correspondence = Correspondence::new()
        .morph("anchor", "anchor", CorrespondenceFlags::default())
        .grow("t", CorrespondenceFlags { is_cut_node: true, ..Default::default() })
        .grow("leaf", CorrespondenceFlags::default());
    let config = EngineConfig::default();
    let mut tasks = build_tasks(&mut active, &target, &correspondence, &config).unwrap();
    Scheduler::new(&config).schedule(&mut tasks, &active, &target);

    let executor = Executor::new(&config, active, target, TaskSet::new(tasks));
    assert!(executor.active().has_part("t"), "build_tasks must have already grown a placeholder for the cut node");
    assert!(
        executor.active().edges("t").iter().any(|l| l.has_node("anchor")),
        "the cut node's link to its MORPH neighbour must be wired in before the executor runs"
    );
}

/// Scenario 5: two MORPH tasks in the same group share a common start after group alignment.
#[test]
fn group_alignment_forces_common_start() {
    let mut active = Graph::new();
    active.add_part(curve("a", Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
    active.add_part(curve("b", Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)));
    let mut target = Graph::new();
    target.add_part(curve("a_t", Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, 5.0, 0.0)));
    target.add_part(curve("b_t", Vec3::new(2.0, 5.0, 0.0), Vec3::new(3.0, 5.0, 0.0)));
    target.groups = Some(vec![HashSet::from(["a_t".to_string(), "b_t".to_string()])]);

    let correspondence = Correspondence::new()
        .morph("a", "a_t", CorrespondenceFlags::default())
        .morph("b", "b_t", CorrespondenceFlags::default());
    let config = EngineConfig::default();
    let mut tasks = build_tasks(&mut active, &target, &correspondence, &config).unwrap();
    Scheduler::new(&config).schedule(&mut tasks, &active, &target);

    let a_start = tasks.iter().find(|t| t.node_id == "a").unwrap().start;
    let b_start = tasks.iter().find(|t| t.node_id == "b").unwrap().start;
    assert_eq!(a_start, b_start, "grouped MORPH tasks must share a start after alignment");
}

/// Scenario 6: gap compression slides a later bucket backward to close dead time left between
/// independently laid out buckets.
#[test]
fn gap_compression_closes_dead_time_between_buckets() {
    let mut active = Graph::new();
    active.add_part(curve("x", Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
    active.add_part(curve("y", Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)));
    let mut target = Graph::new();
    target.add_part(curve("y_t", Vec3::new(2.0, 5.0, 0.0), Vec3::new(3.0, 5.0, 0.0)));

    let correspondence = Correspondence::new()
        .shrink("x", CorrespondenceFlags::default())
        .morph("y", "y_t", CorrespondenceFlags::default());
    let config = EngineConfig::default();
    let mut tasks = build_tasks(&mut active, &target, &correspondence, &config).unwrap();
    Scheduler::new(&config).schedule(&mut tasks, &active, &target);

    let x_end = tasks.iter().find(|t| t.node_id == "x").unwrap().end_time();
    let y_start = tasks.iter().find(|t| t.node_id == "y").unwrap().start;
    assert_eq!(y_start, x_end, "compression must close any dead gap between the SHRINK and MORPH buckets");
}

/// §8 invariant: every link's endpoints exist in every published snapshot.
#[test]
fn every_snapshot_is_well_formed() {
    let mut active = Graph::new();
    active.add_part(curve("a", Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
    active.add_part(curve("b", Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)));
    active.add_link(link("ab", "a", "b", Vec3::ZERO));
    let mut target = Graph::new();
    target.add_part(curve("a_t", Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, 5.0, 0.0)));
    target.add_part(curve("c", Vec3::new(6.0, 0.0, 0.0), Vec3::new(7.0, 0.0, 0.0)));
    target.add_link(link("ac", "a_t", "c", Vec3::ZERO));

    let correspondence = Correspondence::new()
        .morph("a", "a_t", CorrespondenceFlags::default())
        .shrink("b", CorrespondenceFlags::default())
        .grow("c", CorrespondenceFlags::default());
    let config = EngineConfig::default();
    let mut tasks = build_tasks(&mut active, &target, &correspondence, &config).unwrap();
    Scheduler::new(&config).schedule(&mut tasks, &active, &target);

    let executor = Executor::new(&config, active, target, TaskSet::new(tasks));
    let frames = executor.run(&NeverStop).unwrap();

    assert_eq!(frames.len(), (1.0 / config.time_step).ceil() as usize + 1, "frame count must match ceil(1/Δ)+1");
    for (i, frame) in frames.iter().enumerate() {
        for l in &frame.links {
            assert!(frame.has_part(&l.n1), "frame {i}: link {} missing endpoint {}", l.id, l.n1);
            assert!(frame.has_part(&l.n2), "frame {i}: link {} missing endpoint {}", l.id, l.n2);
        }
    }
}

/// §8 invariant: once a task is done, its node only ever moves again via relink (`move_by` /
/// `deform_to` / `deform_two_handles`), never via `Task::execute` re-lerping it back out.
#[test]
fn done_shrink_task_never_regrows_on_its_own() {
    let mut active = Graph::new();
    active.add_part(curve("a", Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)));
    let target = Graph::new();
    let correspondence = Correspondence::new().shrink("a", CorrespondenceFlags::default());
    let config = EngineConfig::default();
    let mut tasks = build_tasks(&mut active, &target, &correspondence, &config).unwrap();
    Scheduler::new(&config).schedule(&mut tasks, &active, &target);

    let executor = Executor::new(&config, active, target, TaskSet::new(tasks));
    let frames = executor.run(&NeverStop).unwrap();

    let done_at = frames.iter().position(|f| f.part("a").shrunk).expect("task must finish at some frame");
    for frame in &frames.retained()[done_at..] {
        let PartGeometry::Curve(c) = &frame.part("a").geometry else { unreachable!() };
        for p in &c.control_points {
            assert!((*p - c.control_points[0]).length() < 1e-6, "a shrunk curve's points must stay coincident");
        }
    }
}

#[test]
fn missing_morph_target_is_reported_as_bc_001() {
    let mut active = Graph::new();
    active.add_part(curve("a", Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
    let target = Graph::new();
    let correspondence = Correspondence::new().morph("a", "nonexistent", CorrespondenceFlags::default());
    let config = EngineConfig::default();
    let err = build_tasks(&mut active, &target, &correspondence, &config).unwrap_err();
    assert_eq!(err.code(), "BC-001");
}

#[test]
fn strict_bucket_separation_is_off_by_default_but_can_be_enabled() {
    let mut active = Graph::new();
    active.add_part(curve("m", Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)));
    let mut target = Graph::new();
    target.add_part(curve("m_t", Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)));
    target.add_part(curve("g_t", Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0)));

    let correspondence = Correspondence::new()
        .morph("m", "m_t", CorrespondenceFlags::default())
        .grow("g_t", CorrespondenceFlags::default());

    let default_config = EngineConfig::default();
    assert!(!default_config.strict_bucket_separation);

    let mut active2 = active.clone();
    let mut tasks = build_tasks(&mut active2, &target, &correspondence, &default_config).unwrap();
    let mut strict_config = EngineConfig::default();
    strict_config.strict_bucket_separation = true;
    Scheduler::new(&strict_config).schedule(&mut tasks, &active2, &target);

    let morph_end = tasks.iter().find(|t| t.task_type == TaskType::Morph).unwrap().end_time();
    let grow_start = tasks.iter().find(|t| t.task_type == TaskType::Grow).unwrap().start;
    assert!(grow_start >= morph_end);
}
