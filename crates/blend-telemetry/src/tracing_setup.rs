//! Span names used at the correspondence/scheduler/executor/relinker seams, collected here so
//! call sites agree on naming instead of inventing a string each time.

pub const SPAN_SCHEDULE: &str = "blend.schedule";
pub const SPAN_EXECUTE_STEP: &str = "blend.executor.step";
pub const SPAN_RELINK_GLOBAL: &str = "blend.relink.propagate";
pub const SPAN_BUILD_TASKS: &str = "blend.correspondence.build_tasks";
