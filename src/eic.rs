/*!
Extracted-ion-chromatogram construction.

The EIC matrix holds one column per feature and one row per scan. A cell is
the mean intensity of the raw points of that scan falling inside the
feature's m/z window, over the rows spanned by the feature's retention-time
window, and zero everywhere else.
*/

use ndarray::{Array2, ArrayView1, ShapeBuilder};
use tracing::debug;

use crate::context::StageContext;
use crate::feature::{FeatureRecord, ScanRecord};
use crate::pipeline::CliqueError;

/// Dense `[scans x features]` intensity matrix, column-major so that one
/// feature's chromatogram is contiguous in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct EicMatrix {
    values: Array2<f64>,
}

impl EicMatrix {
    pub fn from_values(values: Array2<f64>) -> Self {
        Self { values }
    }

    pub fn n_scans(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, scan: usize, feature: usize) -> f64 {
        self.values[[scan, feature]]
    }

    /// Chromatogram of one feature across all scans
    pub fn column(&self, feature: usize) -> ArrayView1<'_, f64> {
        self.values.column(feature)
    }
}

/// Row index of the scan whose time equals `rt` exactly.
///
/// Deliberately not nearest-neighbor: window bounds are expected to be
/// copied out of the scan time axis by the caller.
fn scan_row(scans: &[ScanRecord], rt: f64) -> Option<usize> {
    scans.iter().position(|scan| scan.time == rt)
}

/// Build the EIC matrix for `features` over `scans`.
///
/// Fails with [`CliqueError::InputInconsistency`] when a retention-time
/// window bound matches no scan time, and polls for cancellation once per
/// feature.
pub fn build_eic_matrix(
    scans: &[ScanRecord],
    features: &[FeatureRecord],
    stage: &StageContext<'_, '_>,
) -> Result<EicMatrix, CliqueError> {
    let n_features = features.len();
    let mut values = Array2::zeros((scans.len(), n_features).f());
    for (col, feature) in features.iter().enumerate() {
        if stage.is_cancelled() {
            return Err(CliqueError::Cancelled);
        }
        let row_min = scan_row(scans, feature.rt_min).ok_or_else(|| {
            CliqueError::InputInconsistency {
                node_id: feature.node_id,
                source_id: feature.source_id,
                rt: feature.rt_min,
            }
        })?;
        let row_max = scan_row(scans, feature.rt_max).ok_or_else(|| {
            CliqueError::InputInconsistency {
                node_id: feature.node_id,
                source_id: feature.source_id,
                rt: feature.rt_max,
            }
        })?;
        for row in row_min..row_max {
            let scan = &scans[row];
            let mut total = 0.0;
            let mut count = 0usize;
            for point in scan.points.iter() {
                if point.mz >= feature.mz_min && point.mz <= feature.mz_max {
                    total += f64::from(point.intensity);
                    count += 1;
                }
            }
            if count > 0 {
                values[[row, col]] = total / count as f64;
            }
        }
        stage.report((col + 1) as f64 / n_features as f64);
    }
    debug!(
        "built EIC matrix over {} scans and {} features",
        scans.len(),
        n_features
    );
    Ok(EicMatrix { values })
}
