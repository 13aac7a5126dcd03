/*!
Pairwise cosine similarity between feature chromatograms.

Two features that belong to the same compound elute together, so their EIC
columns are close to proportional and their cosine approaches one. The full
`[features x features]` matrix is the input of both the duplicate filter and
the clique network.
*/

use ndarray::{Array2, Axis};
use tracing::debug;

use crate::context::StageContext;
use crate::eic::EicMatrix;
use crate::pipeline::CliqueError;

/// Dense symmetric cosine-similarity matrix over feature chromatograms.
///
/// The diagonal is exactly 1 for any non-zero column; rows of all-zero
/// columns are 0 everywhere, diagonal included.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    values: Array2<f64>,
}

impl SimilarityMatrix {
    pub fn from_values(values: Array2<f64>) -> Self {
        debug_assert_eq!(values.nrows(), values.ncols());
        Self { values }
    }

    /// Number of features the matrix covers
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Copy of the matrix restricted to `keep`, in the given order.
    pub(crate) fn subset(&self, keep: &[usize]) -> SimilarityMatrix {
        SimilarityMatrix {
            values: self.values.select(Axis(0), keep).select(Axis(1), keep),
        }
    }
}

/// Compute the cosine-similarity matrix of all EIC columns.
///
/// `sim[i][j] = dot(col_i, col_j) / (|col_i| * |col_j|)`, with every entry
/// involving an all-zero column defined as 0.0 so no NaN can escape. Polls
/// for cancellation once per column.
pub fn cosine_similarity(
    eic: &EicMatrix,
    stage: &StageContext<'_, '_>,
) -> Result<SimilarityMatrix, CliqueError> {
    let n = eic.n_features();
    let norms: Vec<f64> = (0..n)
        .map(|j| {
            let column = eic.column(j);
            column.dot(&column).sqrt()
        })
        .collect();
    let mut values = Array2::zeros((n, n));
    for i in 0..n {
        if stage.is_cancelled() {
            return Err(CliqueError::Cancelled);
        }
        let column = eic.column(i);
        for j in i..n {
            let sim = if i == j {
                if norms[i] > 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else if norms[i] > 0.0 && norms[j] > 0.0 {
                column.dot(&eic.column(j)) / (norms[i] * norms[j])
            } else {
                0.0
            };
            values[[i, j]] = sim;
            values[[j, i]] = sim;
        }
        stage.report((i + 1) as f64 / n as f64);
    }
    debug!("computed {n} x {n} similarity matrix");
    Ok(SimilarityMatrix { values })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::{CancelToken, RunContext};
    use ndarray::arr2;

    fn eic() -> EicMatrix {
        // columns: a ramp, the same ramp doubled, all zero, an opposite ramp
        EicMatrix::from_values(arr2(&[
            [1.0, 2.0, 0.0, 3.0],
            [2.0, 4.0, 0.0, 2.0],
            [3.0, 6.0, 0.0, 1.0],
        ]))
    }

    #[test]
    fn test_symmetry_and_unit_diagonal() {
        let ctx = RunContext::new();
        let sim = cosine_similarity(&eic(), &ctx.stage(0.0, 1.0)).unwrap();
        assert_eq!(sim.len(), 4);
        for i in 0..sim.len() {
            for j in 0..sim.len() {
                assert_eq!(sim.get(i, j), sim.get(j, i));
                assert!(!sim.get(i, j).is_nan());
            }
        }
        assert_eq!(sim.get(0, 0), 1.0);
        assert_eq!(sim.get(1, 1), 1.0);
        assert_eq!(sim.get(3, 3), 1.0);
    }

    #[test]
    fn test_proportional_columns_score_one() {
        let ctx = RunContext::new();
        let sim = cosine_similarity(&eic(), &ctx.stage(0.0, 1.0)).unwrap();
        assert!(sim.get(0, 1) > 0.99);
        assert!((sim.get(0, 1) - 1.0).abs() < 1e-12);
        // correlated but not proportional stays clearly below one
        assert!(sim.get(0, 3) < 0.8);
        assert!(sim.get(0, 3) > 0.0);
    }

    #[test]
    fn test_zero_column_is_zero_not_nan() {
        let ctx = RunContext::new();
        let sim = cosine_similarity(&eic(), &ctx.stage(0.0, 1.0)).unwrap();
        for j in 0..sim.len() {
            assert_eq!(sim.get(2, j), 0.0);
            assert_eq!(sim.get(j, 2), 0.0);
        }
    }

    #[test]
    fn test_subset_keeps_order() {
        let ctx = RunContext::new();
        let sim = cosine_similarity(&eic(), &ctx.stage(0.0, 1.0)).unwrap();
        let sub = sim.subset(&[0, 3]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get(0, 1), sim.get(0, 3));
        assert_eq!(sub.get(1, 1), 1.0);
    }

    #[test]
    fn test_cancellation_poll() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = RunContext::new().with_cancel(&token);
        let err = cosine_similarity(&eic(), &ctx.stage(0.0, 1.0)).unwrap_err();
        assert!(err.is_cancelled());
    }
}
