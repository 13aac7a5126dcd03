/*!
Near-duplicate feature removal.

Peak pickers occasionally emit the same chromatographic peak twice. Two
features whose chromatograms are all but identical and whose mass, retention
time, and height agree within tolerance are collapsed to one before
clustering, keeping the higher node id and recording what was dropped.
*/

use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::{debug, trace};

use crate::config::CliqueParams;
use crate::feature::FeatureRecord;
use crate::similarity::SimilarityMatrix;
use crate::solution::DuplicateRemoval;

/// Similarity two chromatograms must exceed before the tolerance tests are
/// even consulted.
pub(crate) const DUPLICATE_SIMILARITY: f64 = 0.99;

/// What the filter hands back: the compacted matrix and table plus a record
/// of every removal.
#[derive(Debug, Clone)]
pub struct FilteredFeatures {
    pub similarity: SimilarityMatrix,
    pub features: Vec<FeatureRecord>,
    pub removals: Vec<DuplicateRemoval>,
}

/// Remove near-identical features from the table and the similarity matrix.
///
/// A pair `(i, j)` with `i < j` qualifies when its similarity exceeds
/// [`DUPLICATE_SIMILARITY`] and mass, retention time, and intensity each
/// pass the tolerance test centered on feature `i`. The lower-node member of
/// every qualifying pair is deleted; when it qualified against several
/// partners the last pair in ascending `(i, j)` order decides the recorded
/// survivor. Row and column order of the survivors is preserved.
pub fn filter_duplicates(
    similarity: SimilarityMatrix,
    features: Vec<FeatureRecord>,
    params: &CliqueParams,
) -> FilteredFeatures {
    let n = features.len();
    // deleted position -> kept position
    let mut deletions: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, j) in (0..n).tuple_combinations() {
        if similarity.get(i, j) <= DUPLICATE_SIMILARITY {
            continue;
        }
        let first = &features[i];
        let second = &features[j];
        if !params.mz_tolerance.test(first.mz, second.mz) {
            continue;
        }
        if !params.rt_tolerance.test(first.rt, second.rt) {
            continue;
        }
        let height_error = (f64::from(first.intensity) - f64::from(second.intensity)).abs()
            / f64::from(first.intensity);
        // zero reference height makes this NaN, which never qualifies
        if !(height_error < params.intensity_tolerance) {
            continue;
        }
        trace!(
            "feature {} marked as duplicate of feature {}",
            first.node_id,
            second.node_id
        );
        deletions.insert(i, j);
    }
    if deletions.is_empty() {
        return FilteredFeatures {
            similarity,
            features,
            removals: Vec::new(),
        };
    }
    let removals: Vec<DuplicateRemoval> = deletions
        .iter()
        .map(|(&removed, &kept)| DuplicateRemoval::new(&features[removed], &features[kept]))
        .collect();
    let keep: Vec<usize> = (0..n).filter(|i| !deletions.contains_key(i)).collect();
    let similarity = similarity.subset(&keep);
    let features: Vec<FeatureRecord> = features
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !deletions.contains_key(i))
        .map(|(_, feature)| feature)
        .collect();
    debug!(
        "removed {} duplicate features, {} remain",
        removals.len(),
        features.len()
    );
    FilteredFeatures {
        similarity,
        features,
        removals,
    }
}
