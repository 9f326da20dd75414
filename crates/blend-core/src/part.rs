//! `Part`: the node type stored in a [`crate::graph::Graph`].
//!
//! Wraps whichever concrete [`GeometryPart`] the node carries plus the sampled-geometry cache
//! that `Task::geometry_morph` keeps fresh, and the per-step `is_active` flag the executor
//! toggles (§4.4).

use crate::geometry::{Coord, CurvePart, GeometryPart, PartKind, SheetPart};
use glam::DVec3 as Vec3;
use serde::{Deserialize, Serialize};

/// The point samples a part caches for downstream consumers (the synthesis stage, §1) to read
/// after every `geometryMorph` call. Standing in for the externally-owned sampled arrays of §5.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleSet {
    pub coords: Vec<Coord>,
    pub positions: Vec<Vec3>,
}

impl SampleSet {
    pub fn evenly_spaced_curve(count: usize) -> Self {
        let coords = (0..count)
            .map(|i| crate::geometry::curve_coord(i as f64 / (count.max(2) - 1) as f64))
            .collect();
        Self {
            coords,
            positions: Vec::new(),
        }
    }

    pub fn grid_sheet(resolution: usize) -> Self {
        let n = resolution.max(2);
        let mut coords = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                coords.push(crate::geometry::sheet_coord(
                    i as f64 / (n - 1) as f64,
                    j as f64 / (n - 1) as f64,
                ));
            }
        }
        Self {
            coords,
            positions: Vec::new(),
        }
    }

    fn refresh(&mut self, geometry: &dyn GeometryPart) {
        self.positions = self.coords.iter().map(|&c| geometry.position(c)).collect();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub geometry: PartGeometry,
    pub samples: SampleSet,
    /// Set by the executor at the start of each step, cleared, then set again as it iterates
    /// start-sorted tasks (§4.4 step 1/3e). Not persisted between steps.
    pub is_active: bool,
    /// True once this part's SHRINK task has collapsed it to a point (§9); consulted by
    /// `isRelinkable`.
    pub shrunk: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PartGeometry {
    Curve(CurvePart),
    Sheet(SheetPart),
}

impl Part {
    pub fn curve(curve: CurvePart) -> Self {
        let samples = SampleSet::evenly_spaced_curve(curve.control_points.len().max(2));
        Self {
            geometry: PartGeometry::Curve(curve),
            samples,
            is_active: false,
            shrunk: false,
        }
    }

    pub fn sheet(sheet: SheetPart) -> Self {
        let samples = SampleSet::grid_sheet(4);
        Self {
            geometry: PartGeometry::Sheet(sheet),
            samples,
            is_active: false,
            shrunk: false,
        }
    }

    pub fn id(&self) -> &str {
        match &self.geometry {
            PartGeometry::Curve(c) => c.id(),
            PartGeometry::Sheet(s) => s.id(),
        }
    }

    pub fn kind(&self) -> PartKind {
        match &self.geometry {
            PartGeometry::Curve(_) => PartKind::Curve,
            PartGeometry::Sheet(_) => PartKind::Sheet,
        }
    }

    pub fn position(&self, coord: Coord) -> Vec3 {
        match &self.geometry {
            PartGeometry::Curve(c) => c.position(coord),
            PartGeometry::Sheet(s) => s.position(coord),
        }
    }

    pub fn centroid(&self) -> Vec3 {
        match &self.geometry {
            PartGeometry::Curve(c) => c.centroid(),
            PartGeometry::Sheet(s) => s.centroid(),
        }
    }

    pub fn move_by(&mut self, delta: Vec3) {
        match &mut self.geometry {
            PartGeometry::Curve(c) => c.move_by(delta),
            PartGeometry::Sheet(s) => s.move_by(delta),
        }
    }

    pub fn deform_to(&mut self, handle: Coord, target: Vec3, fixed: bool) {
        match &mut self.geometry {
            PartGeometry::Curve(c) => c.deform_to(handle, target, fixed),
            PartGeometry::Sheet(s) => s.deform_to(handle, target, fixed),
        }
    }

    pub fn deform_two_handles(&mut self, handle_a: Coord, target_a: Vec3, handle_b: Coord, target_b: Vec3) {
        match &mut self.geometry {
            PartGeometry::Curve(c) => c.deform_two_handles(handle_a, target_a, handle_b, target_b),
            PartGeometry::Sheet(s) => s.deform_two_handles(handle_a, target_a, handle_b, target_b),
        }
    }

    pub fn is_cut_node_flag(&self) -> bool {
        match &self.geometry {
            PartGeometry::Curve(c) => c.is_cut_node(),
            PartGeometry::Sheet(s) => s.is_cut_node(),
        }
    }

    pub fn set_cut_node_flag(&mut self, value: bool) {
        match &mut self.geometry {
            PartGeometry::Curve(c) => c.is_cut_node = value,
            PartGeometry::Sheet(s) => s.is_cut_node = value,
        }
    }

    /// Re-evaluates every cached sample against the current geometry (§4.2 `geometryMorph`).
    pub fn refresh_samples(&mut self) {
        match &self.geometry {
            PartGeometry::Curve(c) => self.samples.refresh(c),
            PartGeometry::Sheet(s) => self.samples.refresh(s),
        }
    }
}
