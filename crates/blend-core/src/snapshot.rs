//! Per-timestep frame history (§5, §9 "frame history memory").
//!
//! Every executor step deep-copies the active graph and appends it here. The core contract is
//! only *random access by index* into whatever snapshots are retained — this wrapper adds an
//! optional keep-last-N eviction policy on top so long blends don't have to retain every frame.

use crate::graph::Graph;
use blend_config::FrameHistoryConfig;

pub type GraphSnapshot = Graph;

/// An append-only buffer of published snapshots, read by seek/export collaborators without any
/// synchronization because entries are immutable once pushed (§5).
#[derive(Debug, Default)]
pub struct FrameHistory {
    frames: Vec<GraphSnapshot>,
    /// `0` keeps everything; otherwise the most recent `keep_last` frames. Indices reported by
    /// `len()`/`get()` are always relative to the *logical* (unevicted) sequence.
    keep_last: usize,
    evicted: usize,
}

impl FrameHistory {
    pub fn new(config: FrameHistoryConfig) -> Self {
        Self {
            frames: Vec::new(),
            keep_last: config.keep_last,
            evicted: 0,
        }
    }

    pub fn push(&mut self, frame: GraphSnapshot) {
        self.frames.push(frame);
        if self.keep_last > 0 && self.frames.len() > self.keep_last {
            self.frames.remove(0);
            self.evicted += 1;
            blend_telemetry::metrics::record_frame_eviction();
        }
    }

    /// Logical frame count, including any already evicted — matches the executor's step count
    /// even once eviction has kicked in.
    pub fn len(&self) -> usize {
        self.frames.len() + self.evicted
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` if `idx` has been evicted or is out of range.
    pub fn get(&self, idx: usize) -> Option<&GraphSnapshot> {
        idx.checked_sub(self.evicted).and_then(|local| self.frames.get(local))
    }

    /// Linear index into the retained buffer by fractional time, clamped to the valid range
    /// (§6 `executor.seek`). Returns `None` if every matching frame has been evicted.
    pub fn seek(&self, t: f64) -> Option<&GraphSnapshot> {
        if self.is_empty() {
            return None;
        }
        let t = t.clamp(0.0, 1.0);
        let idx = ((self.len() as f64 - 1.0) * t).round() as usize;
        self.get(idx.min(self.len() - 1))
    }

    pub fn retained(&self) -> &[GraphSnapshot] {
        &self.frames
    }

    /// The most recently published, still-retained frame.
    pub fn last(&self) -> Option<&GraphSnapshot> {
        self.frames.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GraphSnapshot> {
        self.frames.iter()
    }

    pub fn into_retained(self) -> Vec<GraphSnapshot> {
        self.frames
    }
}

impl<'a> IntoIterator for &'a FrameHistory {
    type Item = &'a GraphSnapshot;
    type IntoIter = std::slice::Iter<'a, GraphSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_marker(id: &str) -> GraphSnapshot {
        let mut g = Graph::new();
        g.add_part(crate::part::Part::curve(crate::geometry::CurvePart::new(
            id,
            vec![glam::DVec3::ZERO, glam::DVec3::X],
        )));
        g
    }

    #[test]
    fn keep_all_retains_every_pushed_frame() {
        let mut history = FrameHistory::new(FrameHistoryConfig { keep_last: 0 });
        for i in 0..5 {
            history.push(frame_with_marker(&i.to_string()));
        }
        assert_eq!(history.len(), 5);
        assert!(history.get(0).unwrap().has_part("0"));
        assert!(history.get(4).unwrap().has_part("4"));
    }

    #[test]
    fn keep_last_evicts_oldest_frames_but_keeps_logical_length() {
        let mut history = FrameHistory::new(FrameHistoryConfig { keep_last: 2 });
        for i in 0..5 {
            history.push(frame_with_marker(&i.to_string()));
        }
        assert_eq!(history.len(), 5, "logical length tracks total pushes, not retained count");
        assert!(history.get(0).is_none(), "evicted frame is unavailable");
        assert!(history.get(4).unwrap().has_part("4"));
        assert!(history.get(3).unwrap().has_part("3"));
    }

    #[test]
    fn seek_clamps_into_range() {
        let mut history = FrameHistory::new(FrameHistoryConfig { keep_last: 0 });
        for i in 0..10 {
            history.push(frame_with_marker(&i.to_string()));
        }
        assert!(history.seek(0.0).unwrap().has_part("0"));
        assert!(history.seek(1.0).unwrap().has_part("9"));
        assert!(history.seek(2.0).unwrap().has_part("9"), "times above 1.0 clamp to the last frame");
    }
}
