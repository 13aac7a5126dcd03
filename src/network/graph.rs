use std::collections::HashMap;

use identity_hash::BuildIdentityHasher;
use ndarray::Array2;

use crate::feature::{FeatureRecord, NodeId};
use crate::similarity::SimilarityMatrix;

/// Identifier of one clique. Shares the node-id space: every clique starts
/// out labeled with the node id of its founding member.
pub type CliqueId = u32;

/// Weights are clamped to `[EPSILON, 1 - EPSILON]` before the logit so the
/// objective stays finite for weights of exactly 0 or 1.
const WEIGHT_EPSILON: f64 = 1e-6;

/// A pair only becomes a network edge above this similarity.
const EDGE_MIN_WEIGHT: f64 = 0.0;

pub(crate) fn logit_weight(weight: f64) -> f64 {
    let w = weight.clamp(WEIGHT_EPSILON, 1.0 - WEIGHT_EPSILON);
    (w / (1.0 - w)).ln()
}

fn ln_disconnected(weight: f64) -> f64 {
    (1.0 - weight.clamp(WEIGHT_EPSILON, 1.0 - WEIGHT_EPSILON)).ln()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NetworkEdge {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}

type CliqueMembers = HashMap<CliqueId, Vec<usize>, BuildIdentityHasher<CliqueId>>;

/// The similarity network restricted to features with at least one positive
/// edge, together with the current partition into cliques.
///
/// Member features are addressed by their position in ascending node-id
/// order; all weight bookkeeping happens in that compact position space.
#[derive(Debug, Clone)]
pub struct CliqueNetwork {
    node_ids: Vec<NodeId>,
    logit: Array2<f64>,
    neighbors: Vec<Vec<usize>>,
    edges: Vec<NetworkEdge>,
    assignment: Vec<CliqueId>,
    members: CliqueMembers,
    /// Partition-independent part of the log-likelihood: every pair starts
    /// out disconnected.
    base: f64,
}

impl CliqueNetwork {
    /// Build the network over every feature with at least one strictly
    /// positive off-diagonal similarity. Each member starts in its own
    /// clique labeled with its node id.
    pub fn from_similarity(similarity: &SimilarityMatrix, features: &[FeatureRecord]) -> Self {
        debug_assert_eq!(similarity.len(), features.len());
        let n = similarity.len();
        let mut is_member = vec![false; n];
        for i in 0..n {
            for j in (i + 1)..n {
                if similarity.get(i, j) > EDGE_MIN_WEIGHT {
                    is_member[i] = true;
                    is_member[j] = true;
                }
            }
        }
        let positions: Vec<usize> = (0..n).filter(|&i| is_member[i]).collect();
        let node_ids: Vec<NodeId> = positions.iter().map(|&i| features[i].node_id).collect();
        let m = positions.len();

        let mut logit = Array2::zeros((m, m));
        let mut neighbors = vec![Vec::new(); m];
        let mut edges = Vec::new();
        let mut base = 0.0;
        for a in 0..m {
            for b in (a + 1)..m {
                let weight = similarity.get(positions[a], positions[b]);
                let g = logit_weight(weight);
                logit[[a, b]] = g;
                logit[[b, a]] = g;
                base += ln_disconnected(weight);
                if weight > EDGE_MIN_WEIGHT {
                    neighbors[a].push(b);
                    neighbors[b].push(a);
                    edges.push(NetworkEdge { a, b, weight });
                }
            }
        }
        edges.sort_by(|x, y| {
            y.weight
                .total_cmp(&x.weight)
                .then_with(|| (x.a, x.b).cmp(&(y.a, y.b)))
        });

        let assignment: Vec<CliqueId> = node_ids.clone();
        let mut members = CliqueMembers::default();
        for (pos, &clique) in assignment.iter().enumerate() {
            members.insert(clique, vec![pos]);
        }
        Self {
            node_ids,
            logit,
            neighbors,
            edges,
            assignment,
            members,
            base,
        }
    }

    /// Number of member features
    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// Node ids of the members, ascending
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Current `(node id, clique id)` pairs in ascending node-id order
    pub fn assignments(&self) -> impl Iterator<Item = (NodeId, CliqueId)> + '_ {
        self.node_ids
            .iter()
            .copied()
            .zip(self.assignment.iter().copied())
    }

    pub(crate) fn edges(&self) -> &[NetworkEdge] {
        &self.edges
    }

    pub(crate) fn neighbors(&self, pos: usize) -> &[usize] {
        &self.neighbors[pos]
    }

    pub(crate) fn clique_of(&self, pos: usize) -> CliqueId {
        self.assignment[pos]
    }

    pub(crate) fn max_clique_id(&self) -> Option<CliqueId> {
        self.assignment.iter().copied().max()
    }

    /// Sum of logit weights between `pos` and the members of `clique`,
    /// skipping `pos` itself when it belongs to that clique.
    pub(crate) fn link_sum(&self, pos: usize, clique: CliqueId) -> f64 {
        self.members
            .get(&clique)
            .map(|members| {
                members
                    .iter()
                    .filter(|&&other| other != pos)
                    .map(|&other| self.logit[[pos, other]])
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Objective change from fusing cliques `a` and `b`
    pub(crate) fn merge_gain(&self, a: CliqueId, b: CliqueId) -> f64 {
        let (Some(left), Some(right)) = (self.members.get(&a), self.members.get(&b)) else {
            return 0.0;
        };
        let mut gain = 0.0;
        for &x in left.iter() {
            for &y in right.iter() {
                gain += self.logit[[x, y]];
            }
        }
        gain
    }

    /// Fuse `absorb` into `keep`. The caller picks `keep` as the smaller id.
    pub(crate) fn merge_cliques(&mut self, keep: CliqueId, absorb: CliqueId) {
        let absorbed = self.members.remove(&absorb).unwrap_or_default();
        for &pos in absorbed.iter() {
            self.assignment[pos] = keep;
        }
        self.members.entry(keep).or_default().extend(absorbed);
    }

    /// Move one member to the clique `to`, dropping its old clique if that
    /// leaves it empty.
    pub(crate) fn move_node(&mut self, pos: usize, to: CliqueId) {
        let from = self.assignment[pos];
        if let Some(members) = self.members.get_mut(&from) {
            members.retain(|&p| p != pos);
            if members.is_empty() {
                self.members.remove(&from);
            }
        }
        self.assignment[pos] = to;
        self.members.entry(to).or_default().push(pos);
    }

    /// Log-likelihood of the current partition
    pub(crate) fn log_likelihood(&self) -> f64 {
        let m = self.assignment.len();
        let mut q = 0.0;
        for a in 0..m {
            for b in (a + 1)..m {
                if self.assignment[a] == self.assignment[b] {
                    q += self.logit[[a, b]];
                }
            }
        }
        self.base + q
    }
}
