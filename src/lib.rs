//! Clique grouping of co-eluting mass spectrometry features.
//!
//! Detected features are connected by the cosine similarity of their
//! extracted-ion chromatograms, the resulting weighted network is partitioned
//! into cliques by likelihood maximization, and isotope pairs are flagged
//! within each clique. [`assign_cliques`] runs the whole pipeline in one call.

pub mod config;
pub mod context;
pub mod dedup;
pub mod eic;
pub mod feature;
pub mod isotopes;
pub mod network;
pub mod pipeline;
pub mod similarity;
pub mod solution;

pub use config::{CliqueParams, IsotopeParams, MzTolerance, RtTolerance};
pub use context::{CancelToken, ProgressSink, RunContext, StageContext};
pub use feature::{extract_features, FeatureRecord, NodeId, PeakRowLike, ScanRecord};
pub use network::{CliqueId, CliqueNetwork, NetworkSolver};
pub use pipeline::{assign_cliques, CliqueError, CliquePipeline};
pub use solution::{CliqueAssignment, CliqueSolution, DuplicateRemoval, IsotopeRelation};
