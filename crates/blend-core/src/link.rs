//! `Link`: an undirected edge between two parts, expressed in each endpoint's local parametric
//! coordinates (§4.1) so moving a skeleton automatically moves the attachment with it.

use crate::geometry::Coord;
use crate::graph::Graph;
use glam::DVec3 as Vec3;
use serde::{Deserialize, Serialize};

pub type PartId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub n1: PartId,
    pub n2: PartId,
    pub coord1: Coord,
    pub coord2: Coord,
    /// Target offset `position_on_n2 - position_on_n1` this link should exhibit at blend end.
    pub blended_delta: Vec3,
}

impl Link {
    pub fn new(id: impl Into<String>, n1: impl Into<String>, coord1: Coord, n2: impl Into<String>, coord2: Coord, blended_delta: Vec3) -> Self {
        Self {
            id: id.into(),
            n1: n1.into(),
            n2: n2.into(),
            coord1,
            coord2,
            blended_delta,
        }
    }

    pub fn has_node(&self, node_id: &str) -> bool {
        self.n1 == node_id || self.n2 == node_id
    }

    pub fn other_node(&self, node_id: &str) -> &str {
        if self.n1 == node_id {
            &self.n2
        } else {
            &self.n1
        }
    }

    pub fn get_coord(&self, node_id: &str) -> Coord {
        if self.n1 == node_id {
            self.coord1
        } else {
            self.coord2
        }
    }

    pub fn get_coord_other(&self, node_id: &str) -> Coord {
        self.get_coord(self.other_node(node_id))
    }

    pub fn position(&self, graph: &Graph, node_id: &str) -> Vec3 {
        graph.part(node_id).position(self.get_coord(node_id))
    }

    pub fn position_other(&self, graph: &Graph, node_id: &str) -> Vec3 {
        let other = self.other_node(node_id);
        graph.part(other).position(self.get_coord(other))
    }

    /// `blendedDelta` pointing from the opposite endpoint toward `toward_id` (§4.1).
    pub fn get_to_delta(&self, toward_id: &str) -> Vec3 {
        if self.n2 == toward_id {
            self.blended_delta
        } else {
            -self.blended_delta
        }
    }
}
