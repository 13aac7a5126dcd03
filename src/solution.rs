//! Result records produced by a grouping run.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::feature::{FeatureRecord, NodeId};
use crate::network::CliqueId;

/// Final clique membership of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CliqueAssignment {
    pub node_id: NodeId,
    /// Identifier of the originating row in the caller's feature list
    pub source_id: u64,
    pub clique_id: CliqueId,
}

/// A confirmed parent/isotope pair inside one clique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IsotopeRelation {
    pub parent_id: NodeId,
    pub isotope_id: NodeId,
    pub parent_charge: i32,
    pub isotope_charge: i32,
}

/// Record that a feature was dropped as a near-duplicate of a survivor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DuplicateRemoval {
    pub removed_node: NodeId,
    pub removed_source: u64,
    pub kept_node: NodeId,
    pub kept_source: u64,
}

impl DuplicateRemoval {
    pub(crate) fn new(removed: &FeatureRecord, kept: &FeatureRecord) -> Self {
        Self {
            removed_node: removed.node_id,
            removed_source: removed.source_id,
            kept_node: kept.node_id,
            kept_source: kept.source_id,
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CliqueSolution {
    /// One entry per surviving feature, ascending by node id
    pub assignments: Vec<CliqueAssignment>,
    pub isotopes: Vec<IsotopeRelation>,
    pub removals: Vec<DuplicateRemoval>,
}

impl CliqueSolution {
    /// Number of surviving features
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Clique id of `node_id`, if the feature survived to assignment
    pub fn clique_of(&self, node_id: NodeId) -> Option<CliqueId> {
        self.assignments
            .binary_search_by_key(&node_id, |a| a.node_id)
            .ok()
            .map(|i| self.assignments[i].clique_id)
    }

    /// Members of every clique, keyed and ordered by clique id
    pub fn cliques(&self) -> BTreeMap<CliqueId, Vec<NodeId>> {
        let mut out: BTreeMap<CliqueId, Vec<NodeId>> = BTreeMap::new();
        for assignment in self.assignments.iter() {
            out.entry(assignment.clique_id)
                .or_default()
                .push(assignment.node_id);
        }
        out
    }
}
