use std::collections::HashMap;

use identity_hash::BuildIdentityHasher;
use tracing::{debug, trace};

use crate::context::StageContext;
use crate::feature::{FeatureRecord, NodeId};
use crate::pipeline::CliqueError;
use crate::solution::CliqueAssignment;

use super::graph::{CliqueId, CliqueNetwork};

/// Greedy maximizer of the partition log-likelihood.
///
/// Each round first sweeps the edges in descending-weight order and fuses
/// endpoint cliques whenever that raises the objective, then sweeps the
/// nodes in ascending order and relocates each to the neighboring clique
/// with the best strictly positive gain. Every accepted operation raises
/// the objective, which is bounded above, so the search cannot cycle; it
/// stops when a round changes nothing or the relative gain drops below the
/// tolerance, and fails with [`CliqueError::NonConvergence`] when the round
/// budget runs out first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSolver {
    /// Relative log-likelihood gain below which a round counts as converged
    pub tolerance: f64,
    /// Hard bound on rounds before giving up
    pub max_rounds: usize,
}

impl Default for NetworkSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_rounds: 100,
        }
    }
}

impl NetworkSolver {
    pub fn new(tolerance: f64, max_rounds: usize) -> Self {
        Self {
            tolerance,
            max_rounds,
        }
    }

    /// Run merge and relocation rounds until convergence. Polls for
    /// cancellation once per round.
    pub fn solve(
        &self,
        network: &mut CliqueNetwork,
        stage: &StageContext<'_, '_>,
    ) -> Result<(), CliqueError> {
        let mut last = network.log_likelihood();
        let mut converged = network.is_empty();
        let mut round = 0;
        while round < self.max_rounds && !converged {
            round += 1;
            if stage.is_cancelled() {
                return Err(CliqueError::Cancelled);
            }
            let merges = self.merge_scan(network);
            let moves = self.move_scan(network);
            let now = network.log_likelihood();
            let gain = now - last;
            trace!("round {round}: {merges} merges, {moves} moves, log-likelihood {now:.6}");
            converged = if merges == 0 && moves == 0 {
                true
            } else if last == 0.0 {
                false
            } else {
                gain / last.abs() < self.tolerance
            };
            last = now;
            stage.report(round as f64 / self.max_rounds as f64);
        }
        if !converged {
            return Err(CliqueError::NonConvergence {
                rounds: self.max_rounds,
            });
        }
        debug!(
            "clique network settled after {round} rounds, log-likelihood {last:.6}"
        );
        Ok(())
    }

    /// Fuse endpoint cliques along edges, strongest first. Ties in weight
    /// fall back to the edge's position pair, and a fused clique keeps the
    /// smaller of the two ids, so the outcome is reproducible.
    fn merge_scan(&self, network: &mut CliqueNetwork) -> usize {
        let mut applied = 0;
        for index in 0..network.edges().len() {
            let edge = network.edges()[index];
            let ca = network.clique_of(edge.a);
            let cb = network.clique_of(edge.b);
            if ca == cb {
                continue;
            }
            if network.merge_gain(ca, cb) > 0.0 {
                let (keep, absorb) = if ca < cb { (ca, cb) } else { (cb, ca) };
                network.merge_cliques(keep, absorb);
                applied += 1;
            }
        }
        applied
    }

    /// Relocate nodes one by one to the best of their neighbors' cliques.
    /// Candidates are visited in ascending clique-id order and only a
    /// strictly better gain displaces the current best, so equal gains
    /// resolve to the smallest clique id.
    fn move_scan(&self, network: &mut CliqueNetwork) -> usize {
        let mut applied = 0;
        for pos in 0..network.len() {
            let current = network.clique_of(pos);
            let mut candidates: Vec<CliqueId> = network
                .neighbors(pos)
                .iter()
                .map(|&other| network.clique_of(other))
                .filter(|&clique| clique != current)
                .collect();
            candidates.sort_unstable();
            candidates.dedup();
            if candidates.is_empty() {
                continue;
            }
            let stay = network.link_sum(pos, current);
            let mut best: Option<(f64, CliqueId)> = None;
            for clique in candidates {
                let gain = network.link_sum(pos, clique) - stay;
                if gain > 0.0 && best.map(|(g, _)| gain > g).unwrap_or(true) {
                    best = Some((gain, clique));
                }
            }
            if let Some((_, target)) = best {
                network.move_node(pos, target);
                applied += 1;
            }
        }
        applied
    }
}

/// Project the solved network back onto the full feature table, giving every
/// feature outside the network a fresh singleton clique above the highest id
/// the solver left in use, in ascending node-id order.
pub(crate) fn complete_assignments(
    network: &CliqueNetwork,
    features: &[FeatureRecord],
) -> Vec<CliqueAssignment> {
    let mut by_node: HashMap<NodeId, CliqueId, BuildIdentityHasher<NodeId>> = HashMap::default();
    for (node_id, clique_id) in network.assignments() {
        by_node.insert(node_id, clique_id);
    }
    let mut next = network.max_clique_id().map(|id| id + 1).unwrap_or(1);
    let mut out = Vec::with_capacity(features.len());
    for feature in features.iter() {
        let clique_id = match by_node.get(&feature.node_id) {
            Some(&id) => id,
            None => {
                let id = next;
                next += 1;
                id
            }
        };
        out.push(CliqueAssignment {
            node_id: feature.node_id,
            source_id: feature.source_id,
            clique_id,
        });
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::RunContext;
    use crate::similarity::SimilarityMatrix;
    use ndarray::{arr2, Array2};

    fn feature(node_id: u32) -> FeatureRecord {
        FeatureRecord {
            mz: 100.0 + f64::from(node_id),
            mz_min: 99.0 + f64::from(node_id),
            mz_max: 101.0 + f64::from(node_id),
            rt: 5.0,
            rt_min: 4.0,
            rt_max: 6.0,
            intensity: 100.0,
            node_id,
            source_id: u64::from(node_id),
        }
    }

    fn features(n: u32) -> Vec<FeatureRecord> {
        (1..=n).map(feature).collect()
    }

    fn solve(values: Array2<f64>) -> Vec<(NodeId, CliqueId)> {
        let n = values.nrows() as u32;
        let features = features(n);
        let sim = SimilarityMatrix::from_values(values);
        let mut network = CliqueNetwork::from_similarity(&sim, &features);
        let ctx = RunContext::new();
        NetworkSolver::default()
            .solve(&mut network, &ctx.stage(0.0, 1.0))
            .unwrap();
        complete_assignments(&network, &features)
            .into_iter()
            .map(|a| (a.node_id, a.clique_id))
            .collect()
    }

    #[test]
    fn test_strong_pair_with_singleton() {
        let assigned = solve(arr2(&[
            [1.0, 0.9, 0.0],
            [0.9, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ]));
        assert_eq!(assigned, vec![(1, 1), (2, 1), (3, 2)]);
    }

    #[test]
    fn test_weak_bridge_keeps_groups_apart() {
        let assigned = solve(arr2(&[
            [1.0, 0.9, 0.2, 0.0],
            [0.9, 1.0, 0.2, 0.0],
            [0.2, 0.2, 1.0, 0.9],
            [0.0, 0.0, 0.9, 1.0],
        ]));
        assert_eq!(assigned, vec![(1, 1), (2, 1), (3, 3), (4, 3)]);
    }

    #[test]
    fn test_strong_bridge_pulls_groups_together() {
        let assigned = solve(arr2(&[
            [1.0, 0.9, 0.8, 0.8],
            [0.9, 1.0, 0.8, 0.8],
            [0.8, 0.8, 1.0, 0.9],
            [0.8, 0.8, 0.9, 1.0],
        ]));
        assert_eq!(assigned, vec![(1, 1), (2, 1), (3, 1), (4, 1)]);
    }

    #[test]
    fn test_all_isolated_get_ascending_singletons() {
        let assigned = solve(Array2::zeros((3, 3)));
        assert_eq!(assigned, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_deterministic_partition() {
        let values = arr2(&[
            [1.0, 0.9, 0.4, 0.1],
            [0.9, 1.0, 0.6, 0.2],
            [0.4, 0.6, 1.0, 0.7],
            [0.1, 0.2, 0.7, 1.0],
        ]);
        let first = solve(values.clone());
        let second = solve(values);
        assert_eq!(first, second);
    }

    #[test]
    fn test_exhausted_round_budget_is_an_error() {
        let sim = SimilarityMatrix::from_values(arr2(&[[1.0, 0.9], [0.9, 1.0]]));
        let features = features(2);
        let mut network = CliqueNetwork::from_similarity(&sim, &features);
        let ctx = RunContext::new();
        let err = NetworkSolver::new(1e-6, 1)
            .solve(&mut network, &ctx.stage(0.0, 1.0))
            .unwrap_err();
        assert_eq!(err, CliqueError::NonConvergence { rounds: 1 });
    }

    #[test]
    fn test_zero_round_budget_is_an_error() {
        let sim = SimilarityMatrix::from_values(arr2(&[[1.0, 0.9], [0.9, 1.0]]));
        let features = features(2);
        let mut network = CliqueNetwork::from_similarity(&sim, &features);
        let ctx = RunContext::new();
        let err = NetworkSolver::new(1e-6, 0)
            .solve(&mut network, &ctx.stage(0.0, 1.0))
            .unwrap_err();
        assert_eq!(err, CliqueError::NonConvergence { rounds: 0 });
    }

    #[test]
    fn test_empty_network_converges_immediately() {
        let sim = SimilarityMatrix::from_values(Array2::zeros((2, 2)));
        let features = features(2);
        let mut network = CliqueNetwork::from_similarity(&sim, &features);
        let ctx = RunContext::new();
        NetworkSolver::new(1e-6, 0)
            .solve(&mut network, &ctx.stage(0.0, 1.0))
            .unwrap();
    }
}
