//! Process-local counters for the blend engine.
//!
//! These are plain atomics rather than a metrics-registry crate: the engine is an embeddable
//! library, not a service with its own `/metrics` endpoint, so the host is expected to sample
//! `snapshot()` on whatever cadence it wants and forward the numbers to its own collector.

use std::sync::atomic::{AtomicU64, Ordering};

static TIMESTEPS_EXECUTED: AtomicU64 = AtomicU64::new(0);
static TASKS_RELINKED: AtomicU64 = AtomicU64::new(0);
static CONSTRAINTS_RECORDED: AtomicU64 = AtomicU64::new(0);
static FRAMES_EVICTED: AtomicU64 = AtomicU64::new(0);

pub fn record_timestep() {
    TIMESTEPS_EXECUTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_relinked_tasks(count: u64) {
    TASKS_RELINKED.fetch_add(count, Ordering::Relaxed);
}

pub fn record_constraints(count: u64) {
    CONSTRAINTS_RECORDED.fetch_add(count, Ordering::Relaxed);
}

pub fn record_frame_eviction() {
    FRAMES_EVICTED.fetch_add(1, Ordering::Relaxed);
}

/// A point-in-time read of every counter.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub timesteps_executed: u64,
    pub tasks_relinked: u64,
    pub constraints_recorded: u64,
    pub frames_evicted: u64,
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        timesteps_executed: TIMESTEPS_EXECUTED.load(Ordering::Relaxed),
        tasks_relinked: TASKS_RELINKED.load(Ordering::Relaxed),
        constraints_recorded: CONSTRAINTS_RECORDED.load(Ordering::Relaxed),
        frames_evicted: FRAMES_EVICTED.load(Ordering::Relaxed),
    }
}
