/*!
The end-to-end grouping pipeline.

[`CliquePipeline`] runs the whole sequence over one feature table: extract
[`FeatureRecord`]s, build the EIC matrix, score cosine similarity, drop
duplicate features, solve the clique network, and annotate isotope pairs.
Each run allocates its own state, so separate tables can be processed on
separate threads without sharing anything beyond the parameters.
*/
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::config::{CliqueParams, IsotopeParams};
use crate::context::{RunContext, StageContext};
use crate::dedup::{filter_duplicates, FilteredFeatures};
use crate::eic::build_eic_matrix;
use crate::feature::{extract_features, FeatureRecord, NodeId, PeakRowLike, ScanRecord};
use crate::isotopes::{find_isotopes, IsotopeCandidate};
use crate::network::{complete_assignments, CliqueId, CliqueNetwork, NetworkSolver};
use crate::similarity::cosine_similarity;
use crate::solution::{CliqueAssignment, CliqueSolution, IsotopeRelation};

const EIC_PORTION: f64 = 0.1;
const SIMILARITY_PORTION: f64 = 0.6;
const NETWORK_PORTION: f64 = 0.1;
const ISOTOPE_PORTION: f64 = 0.2;

/// All the ways a grouping run can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CliqueError {
    #[error(
        "The retention time bound {rt} of feature {node_id} (source {source_id}) \
         does not match any scan time"
    )]
    InputInconsistency {
        node_id: NodeId,
        source_id: u64,
        rt: f64,
    },
    #[error("The clique network did not converge within {rounds} rounds")]
    NonConvergence { rounds: usize },
    #[error("The run was cancelled")]
    Cancelled,
}

impl CliqueError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Orchestrates one grouping run over a borrowed feature table.
#[derive(Debug)]
pub struct CliquePipeline<'a, P: PeakRowLike> {
    rows: &'a [P],
    scans: &'a [ScanRecord],
    params: CliqueParams,
}

impl<'a, P: PeakRowLike> CliquePipeline<'a, P> {
    pub fn new(rows: &'a [P], scans: &'a [ScanRecord], params: CliqueParams) -> Self {
        Self {
            rows,
            scans,
            params,
        }
    }

    /// Run every phase in order and collect the result.
    ///
    /// Progress is reported through `ctx` on a fixed split of the unit
    /// interval, 10% EIC extraction, 60% similarity, 10% network solving,
    /// and 20% isotope annotation, ending with an unconditional report of
    /// 1.0. Cancellation is polled at phase boundaries and inside every
    /// phase loop.
    pub fn run(&self, ctx: &RunContext<'_>) -> Result<CliqueSolution, CliqueError> {
        let features = extract_features(self.rows);
        debug!(
            "Grouping {} features over {} scans",
            features.len(),
            self.scans.len()
        );
        if ctx.is_cancelled() {
            return Err(CliqueError::Cancelled);
        }

        let stage = ctx.stage(0.0, EIC_PORTION);
        let eic = build_eic_matrix(self.scans, &features, &stage)?;
        stage.done();

        let stage = ctx.stage(EIC_PORTION, SIMILARITY_PORTION);
        let similarity = cosine_similarity(&eic, &stage)?;
        stage.done();

        let filtered = if self.params.filter_duplicates {
            filter_duplicates(similarity, features, &self.params)
        } else {
            FilteredFeatures {
                similarity,
                features,
                removals: Vec::new(),
            }
        };
        if !filtered.removals.is_empty() {
            debug!("Removed {} duplicate features", filtered.removals.len());
        }
        if ctx.is_cancelled() {
            return Err(CliqueError::Cancelled);
        }

        let stage = ctx.stage(EIC_PORTION + SIMILARITY_PORTION, NETWORK_PORTION);
        let mut network = CliqueNetwork::from_similarity(&filtered.similarity, &filtered.features);
        debug!(
            "Solving a network of {} nodes and {} edges",
            network.len(),
            network.n_edges()
        );
        let solver = NetworkSolver::new(self.params.convergence_tolerance, self.params.max_rounds);
        solver.solve(&mut network, &stage)?;
        stage.done();
        let assignments = complete_assignments(&network, &filtered.features);

        let stage = ctx.stage(
            EIC_PORTION + SIMILARITY_PORTION + NETWORK_PORTION,
            ISOTOPE_PORTION,
        );
        let isotopes = annotate_isotopes(
            &assignments,
            &filtered.features,
            &self.params.isotopes,
            &stage,
        )?;
        stage.done();
        ctx.report(1.0);

        let solution = CliqueSolution {
            assignments,
            isotopes,
            removals: filtered.removals,
        };
        debug!(
            "Assigned {} features to {} cliques with {} isotope pairs",
            solution.len(),
            solution.cliques().len(),
            solution.isotopes.len()
        );
        Ok(solution)
    }
}

/// Run the isotope detector over every clique, smallest clique id first.
///
/// `assignments` and `features` run in parallel, one entry per surviving
/// feature. Within a clique candidates are ordered by mass and then node id
/// so the lighter member of a pair is always the reported parent.
fn annotate_isotopes(
    assignments: &[CliqueAssignment],
    features: &[FeatureRecord],
    params: &IsotopeParams,
    stage: &StageContext<'_, '_>,
) -> Result<Vec<IsotopeRelation>, CliqueError> {
    let mut by_clique: BTreeMap<CliqueId, Vec<IsotopeCandidate>> = BTreeMap::new();
    for (assignment, feature) in assignments.iter().zip(features.iter()) {
        by_clique
            .entry(assignment.clique_id)
            .or_default()
            .push(IsotopeCandidate::new(
                feature.mz,
                feature.intensity,
                feature.node_id,
            ));
    }

    let n_cliques = by_clique.len();
    let mut out = Vec::new();
    for (done, mut candidates) in by_clique.into_values().enumerate() {
        if stage.is_cancelled() {
            return Err(CliqueError::Cancelled);
        }
        candidates.sort_unstable_by(|a, b| {
            a.mz.total_cmp(&b.mz)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        out.extend(find_isotopes(&candidates, params));
        stage.report((done + 1) as f64 / n_cliques as f64);
    }
    Ok(out)
}

/// Group `rows` into cliques in one call.
///
/// Convenience wrapper over [`CliquePipeline`] for callers that do not need
/// to hold onto the pipeline between runs.
pub fn assign_cliques<P: PeakRowLike>(
    rows: &[P],
    scans: &[ScanRecord],
    params: &CliqueParams,
    ctx: &RunContext<'_>,
) -> Result<CliqueSolution, CliqueError> {
    CliquePipeline::new(rows, scans, params.clone()).run(ctx)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CliqueError::InputInconsistency {
            node_id: 3,
            source_id: 77,
            rt: 4.25,
        };
        assert_eq!(
            err.to_string(),
            "The retention time bound 4.25 of feature 3 (source 77) does not match any scan time"
        );
        let err = CliqueError::NonConvergence { rounds: 20 };
        assert_eq!(
            err.to_string(),
            "The clique network did not converge within 20 rounds"
        );
        assert!(!err.is_cancelled());
        assert!(CliqueError::Cancelled.is_cancelled());
    }
}
