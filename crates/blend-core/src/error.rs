//! Error taxonomy for the blend engine.
//!
//! Only the precondition-violation class from the spec is fatal (§7); geometric degeneracy and
//! empty constraints are recovered in place and never surface here.

use thiserror::Error;

pub type BlendResult<T> = Result<T, BlendError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlendError {
    /// BC-001: a GROW or MORPH task was built for a node with no corresponding target.
    #[error("BC-001 missing correspondence target for node {node_id}")]
    MissingTarget { node_id: String },

    /// BC-002: a link names an endpoint that isn't present in either graph.
    #[error("BC-002 orphan link {link_id}: endpoint {missing_node} not found")]
    OrphanLink {
        link_id: String,
        missing_node: String,
    },

    /// BC-003: a `groups` entry names a node ID absent from the graph it was declared on.
    #[error("BC-003 group {group_index} references unknown node {node_id}")]
    MalformedGroup { group_index: usize, node_id: String },

    /// BC-004: two tasks were built for the same active-graph node.
    #[error("BC-004 duplicate task for node {node_id}")]
    DuplicateTask { node_id: String },
}

impl BlendError {
    pub fn code(&self) -> &'static str {
        match self {
            BlendError::MissingTarget { .. } => "BC-001",
            BlendError::OrphanLink { .. } => "BC-002",
            BlendError::MalformedGroup { .. } => "BC-003",
            BlendError::DuplicateTask { .. } => "BC-004",
        }
    }
}
