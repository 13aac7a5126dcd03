//! Input seams and the normalized per-feature record.

use mzpeaks::coordinate::{Time, MZ};
use mzpeaks::peak::MZPoint;
use mzpeaks::{CoordinateLike, IntensityMeasurement};

/// Dense 1-based index identifying a feature for the lifetime of one run.
pub type NodeId = u32;

/// Row of an external feature list, as seen by the grouping pipeline.
///
/// Implement this on whatever type the upstream peak picker produces. The
/// retention-time window bounds must be actual scan times of the raw data the
/// feature was detected in; the EIC builder refuses anything else.
pub trait PeakRowLike {
    /// Centroid m/z
    fn mz(&self) -> f64;
    fn mz_min(&self) -> f64;
    fn mz_max(&self) -> f64;
    /// Apex retention time
    fn rt(&self) -> f64;
    fn rt_min(&self) -> f64;
    fn rt_max(&self) -> f64;
    /// Peak height
    fn intensity(&self) -> f32;
    /// Stable identifier of the row in its source list
    fn source_id(&self) -> u64;
}

/// One acquisition: a retention time and its centroided points.
#[derive(Debug, Clone, Default)]
pub struct ScanRecord {
    pub time: f64,
    pub points: Vec<MZPoint>,
}

impl ScanRecord {
    pub fn new(time: f64, points: Vec<MZPoint>) -> Self {
        Self { time, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Normalized summary of one detected chromatographic peak.
///
/// Records are created once per run, numbered densely from 1, and only ever
/// removed (never renumbered) by the duplicate filter.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct FeatureRecord {
    pub mz: f64,
    pub mz_min: f64,
    pub mz_max: f64,
    pub rt: f64,
    pub rt_min: f64,
    pub rt_max: f64,
    pub intensity: f32,
    pub node_id: NodeId,
    pub source_id: u64,
}

impl FeatureRecord {
    pub fn from_row<P: PeakRowLike>(row: &P, node_id: NodeId) -> Self {
        Self {
            mz: row.mz(),
            mz_min: row.mz_min(),
            mz_max: row.mz_max(),
            rt: row.rt(),
            rt_min: row.rt_min(),
            rt_max: row.rt_max(),
            intensity: row.intensity(),
            node_id,
            source_id: row.source_id(),
        }
    }
}

impl CoordinateLike<MZ> for FeatureRecord {
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl CoordinateLike<Time> for FeatureRecord {
    fn coordinate(&self) -> f64 {
        self.rt
    }
}

impl IntensityMeasurement for FeatureRecord {
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

/// Build the feature table from an external list, numbering rows from 1 in
/// input order.
pub fn extract_features<P: PeakRowLike>(rows: &[P]) -> Vec<FeatureRecord> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| FeatureRecord::from_row(row, i as NodeId + 1))
        .collect()
}
