//! The `GeometryPart` boundary (§6) and two concrete, minimal implementations of it.
//!
//! Production geometry — NURBS curve/sheet fitting, a real ARAP solve — lives outside this
//! crate entirely (§1 Non-goals); it reaches the engine only through the trait below. The
//! `CurvePart`/`SheetPart` types here exist so the engine is independently testable: each
//! approximates "drag one handle, the rest of the skeleton follows" with a basis-function
//! weighted translation of its control points rather than a real elastic solve.

use glam::DVec3 as Vec3;
use serde::{Deserialize, Serialize};

/// A parametric coordinate. A curve only looks at `[0]` (`t ∈ [0,1]`); a sheet looks at `[0]`
/// and `[1]` (`u, v ∈ [0,1]`). The remaining components are reserved so both part kinds can
/// share one coordinate type at every call site.
pub type Coord = [f64; 4];

pub fn curve_coord(t: f64) -> Coord {
    [t, 0.0, 0.0, 0.0]
}

pub fn sheet_coord(u: f64, v: f64) -> Coord {
    [u, v, 0.0, 0.0]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartKind {
    Curve,
    Sheet,
}

/// Snapped to zero below this magnitude (§7.2): avoids nudging geometry by float noise.
pub const DEGENERACY_EPS: f64 = 1e-7;

pub(crate) fn snap_degenerate(v: Vec3) -> Vec3 {
    if v.length() < DEGENERACY_EPS {
        Vec3::ZERO
    } else {
        v
    }
}

/// The interface the scheduler/executor/relinker drive every skeleton through. Implement it to
/// plug in real geometry; `CurvePart` and `SheetPart` below are this crate's own stand-in.
pub trait GeometryPart {
    fn id(&self) -> &str;
    fn kind(&self) -> PartKind;
    fn position(&self, coord: Coord) -> Vec3;
    fn move_by(&mut self, delta: Vec3);
    fn deform_to(&mut self, handle: Coord, target: Vec3, fixed: bool);
    fn deform_two_handles(&mut self, handle_a: Coord, target_a: Vec3, handle_b: Coord, target_b: Vec3);
    fn is_cut_node(&self) -> bool;
}

/// A polyline skeleton: `n >= 2` control points laid out at `t = i / (n - 1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvePart {
    pub id: String,
    pub control_points: Vec<Vec3>,
    pub is_cut_node: bool,
}

impl CurvePart {
    pub fn new(id: impl Into<String>, control_points: Vec<Vec3>) -> Self {
        assert!(control_points.len() >= 2, "a curve needs at least 2 control points");
        Self {
            id: id.into(),
            control_points,
            is_cut_node: false,
        }
    }

    pub fn centroid(&self) -> Vec3 {
        self.control_points.iter().copied().sum::<Vec3>() / self.control_points.len() as f64
    }

    /// Hat-function basis: 1.0 at the control point nearest `t`, falling linearly to 0 at its
    /// neighbours. This is the "ARAP-like" weighting referenced in the module doc.
    fn basis_weights(&self, t: f64) -> Vec<f64> {
        let n = self.control_points.len();
        let spacing = 1.0 / (n - 1) as f64;
        (0..n)
            .map(|i| {
                let s_i = i as f64 * spacing;
                (1.0 - (t - s_i).abs() / spacing).max(0.0)
            })
            .collect()
    }

    fn apply_weighted_delta(&mut self, weights: &[f64], delta: Vec3) {
        for (p, w) in self.control_points.iter_mut().zip(weights) {
            *p += delta * *w;
        }
    }

    /// Sets every control point directly, used by SHRINK/GROW/MORPH (§4.2) which interpolate a
    /// whole basis rather than drag a single handle.
    pub fn set_control_points(&mut self, points: Vec<Vec3>) {
        assert_eq!(points.len(), self.control_points.len());
        self.control_points = points;
    }
}

impl GeometryPart for CurvePart {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> PartKind {
        PartKind::Curve
    }

    fn position(&self, coord: Coord) -> Vec3 {
        let t = coord[0].clamp(0.0, 1.0);
        let n = self.control_points.len();
        if n == 1 {
            return self.control_points[0];
        }
        let scaled = t * (n - 1) as f64;
        let i = (scaled.floor() as usize).min(n - 2);
        let frac = scaled - i as f64;
        self.control_points[i].lerp(self.control_points[i + 1], frac)
    }

    fn move_by(&mut self, delta: Vec3) {
        for p in &mut self.control_points {
            *p += delta;
        }
    }

    fn deform_to(&mut self, handle: Coord, target: Vec3, fixed: bool) {
        let delta = snap_degenerate(target - self.position(handle));
        if fixed {
            self.move_by(delta);
        } else {
            let weights = self.basis_weights(handle[0].clamp(0.0, 1.0));
            self.apply_weighted_delta(&weights, delta);
        }
    }

    fn deform_two_handles(&mut self, handle_a: Coord, target_a: Vec3, handle_b: Coord, target_b: Vec3) {
        let delta_a = snap_degenerate(target_a - self.position(handle_a));
        let delta_b = snap_degenerate(target_b - self.position(handle_b));

        if (handle_a[0] - handle_b[0]).abs() < DEGENERACY_EPS {
            // Coincident handles (§7.2): fall back to a single-handle translation.
            self.deform_to(handle_a, target_a, false);
            return;
        }

        let weights_a = self.basis_weights(handle_a[0].clamp(0.0, 1.0));
        let weights_b = self.basis_weights(handle_b[0].clamp(0.0, 1.0));

        for ((p, wa), wb) in self
            .control_points
            .iter_mut()
            .zip(weights_a.iter())
            .zip(weights_b.iter())
        {
            let total = wa + wb;
            if total > 0.0 {
                *p += (delta_a * *wa + delta_b * *wb) / total;
            }
        }
    }

    fn is_cut_node(&self) -> bool {
        self.is_cut_node
    }
}

/// A 4-corner bilinear patch, `(u, v) ∈ [0,1]²`. Corners are ordered `(0,0), (1,0), (0,1), (1,1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetPart {
    pub id: String,
    pub corners: [Vec3; 4],
    pub is_cut_node: bool,
}

impl SheetPart {
    pub fn new(id: impl Into<String>, corners: [Vec3; 4]) -> Self {
        Self {
            id: id.into(),
            corners,
            is_cut_node: false,
        }
    }

    pub fn centroid(&self) -> Vec3 {
        self.corners.iter().copied().sum::<Vec3>() / 4.0
    }

    /// Bilinear basis functions; they sum to 1 and already double as ARAP-like falloff weights.
    fn basis_weights(&self, u: f64, v: f64) -> [f64; 4] {
        [
            (1.0 - u) * (1.0 - v),
            u * (1.0 - v),
            (1.0 - u) * v,
            u * v,
        ]
    }

    pub fn set_corners(&mut self, corners: [Vec3; 4]) {
        self.corners = corners;
    }
}

impl GeometryPart for SheetPart {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> PartKind {
        PartKind::Sheet
    }

    fn position(&self, coord: Coord) -> Vec3 {
        let u = coord[0].clamp(0.0, 1.0);
        let v = coord[1].clamp(0.0, 1.0);
        let w = self.basis_weights(u, v);
        self.corners[0] * w[0] + self.corners[1] * w[1] + self.corners[2] * w[2] + self.corners[3] * w[3]
    }

    fn move_by(&mut self, delta: Vec3) {
        for c in &mut self.corners {
            *c += delta;
        }
    }

    fn deform_to(&mut self, handle: Coord, target: Vec3, fixed: bool) {
        let delta = snap_degenerate(target - self.position(handle));
        if fixed {
            self.move_by(delta);
        } else {
            let weights = self.basis_weights(handle[0].clamp(0.0, 1.0), handle[1].clamp(0.0, 1.0));
            for (c, w) in self.corners.iter_mut().zip(weights.iter()) {
                *c += delta * *w;
            }
        }
    }

    fn deform_two_handles(&mut self, handle_a: Coord, target_a: Vec3, handle_b: Coord, target_b: Vec3) {
        let delta_a = snap_degenerate(target_a - self.position(handle_a));
        let delta_b = snap_degenerate(target_b - self.position(handle_b));

        if (handle_a[0] - handle_b[0]).abs() < DEGENERACY_EPS
            && (handle_a[1] - handle_b[1]).abs() < DEGENERACY_EPS
        {
            self.deform_to(handle_a, target_a, false);
            return;
        }

        let weights_a = self.basis_weights(handle_a[0].clamp(0.0, 1.0), handle_a[1].clamp(0.0, 1.0));
        let weights_b = self.basis_weights(handle_b[0].clamp(0.0, 1.0), handle_b[1].clamp(0.0, 1.0));

        for ((c, wa), wb) in self.corners.iter_mut().zip(weights_a.iter()).zip(weights_b.iter()) {
            let total = wa + wb;
            if total > 0.0 {
                *c += (delta_a * *wa + delta_b * *wb) / total;
            }
        }
    }

    fn is_cut_node(&self) -> bool {
        self.is_cut_node
    }
}
