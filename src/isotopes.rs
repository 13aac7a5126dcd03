/*!
Isotope pair detection inside a clique.

Once features are grouped, pairs whose masses differ by one isotope spacing
under some combination of charge states are flagged as parent/isotope
partners. The test is a pure numeric predicate over a bounded charge grid.
*/

use std::f64::consts::SQRT_2;

use itertools::Itertools;

use crate::config::IsotopeParams;
use crate::feature::NodeId;
use crate::solution::IsotopeRelation;

/// Mass difference between carbon-13 and carbon-12, the default spacing for
/// isotope pair detection.
pub const C13_MASS_SHIFT: f64 = 1.003355;

/// One clique member offered to the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotopeCandidate {
    pub mz: f64,
    pub intensity: f32,
    pub node_id: NodeId,
}

impl IsotopeCandidate {
    pub fn new(mz: f64, intensity: f32, node_id: NodeId) -> Self {
        Self {
            mz,
            intensity,
            node_id,
        }
    }
}

/// Relative error of the charge-scaled mass gap against the expected shift
fn shift_error(scaled_a: f64, scaled_b: f64, shift: f64) -> f64 {
    (scaled_b - scaled_a - shift).abs() / (scaled_a + shift)
}

/// Search the charge grid for a combination that explains `b` as an isotope
/// of `a`.
///
/// Both charges run over `1..=max_charge`; a combination qualifies when the
/// scaled mass of `b` exceeds that of `a` and the gap sits within
/// `sqrt(2) * ppm * 1e-6` of the shift. When several combinations qualify,
/// the one enumerated last wins.
fn charge_pair(
    a: &IsotopeCandidate,
    b: &IsotopeCandidate,
    params: &IsotopeParams,
) -> Option<(i32, i32)> {
    let limit = SQRT_2 * params.ppm * 1e-6;
    let mut hit = None;
    for charge_a in 1..=params.max_charge {
        for charge_b in 1..=params.max_charge {
            let scaled_a = a.mz * f64::from(charge_a);
            let scaled_b = b.mz * f64::from(charge_b);
            if scaled_b > scaled_a && shift_error(scaled_a, scaled_b, params.mass_shift) <= limit {
                hit = Some((charge_a, charge_b));
            }
        }
    }
    hit
}

/// Test every pair of clique members, in list order, for an isotope
/// relationship. The caller orders `candidates` by ascending mass so the
/// reported parent is the lighter member.
pub fn find_isotopes(
    candidates: &[IsotopeCandidate],
    params: &IsotopeParams,
) -> Vec<IsotopeRelation> {
    let mut out = Vec::new();
    for (a, b) in candidates.iter().tuple_combinations() {
        if let Some((parent_charge, isotope_charge)) = charge_pair(a, b, params) {
            out.push(IsotopeRelation {
                parent_id: a.node_id,
                isotope_id: b.node_id,
                parent_charge,
                isotope_charge,
            });
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn params(max_charge: i32, ppm: f64) -> IsotopeParams {
        IsotopeParams {
            max_charge,
            ppm,
            mass_shift: C13_MASS_SHIFT,
        }
    }

    #[test]
    fn test_c13_pair_at_charge_one() {
        let candidates = [
            IsotopeCandidate::new(100.0, 500.0, 1),
            IsotopeCandidate::new(101.003355, 120.0, 2),
        ];
        let found = find_isotopes(&candidates, &params(1, 5.0));
        assert_eq!(
            found,
            vec![IsotopeRelation {
                parent_id: 1,
                isotope_id: 2,
                parent_charge: 1,
                isotope_charge: 1,
            }]
        );
    }

    #[test]
    fn test_shift_out_of_tolerance() {
        let candidates = [
            IsotopeCandidate::new(100.0, 500.0, 1),
            IsotopeCandidate::new(101.5, 120.0, 2),
        ];
        let found = find_isotopes(&candidates, &params(1, 5.0));
        assert!(found.is_empty());
    }

    #[test]
    fn test_doubly_charged_pair() {
        // the gap is half a shift in m/z, so only charge 2 explains it
        let candidates = [
            IsotopeCandidate::new(100.0, 500.0, 4),
            IsotopeCandidate::new(100.0 + C13_MASS_SHIFT / 2.0, 120.0, 9),
        ];
        let found = find_isotopes(&candidates, &params(2, 5.0));
        assert_eq!(
            found,
            vec![IsotopeRelation {
                parent_id: 4,
                isotope_id: 9,
                parent_charge: 2,
                isotope_charge: 2,
            }]
        );
    }

    #[test]
    fn test_last_qualifying_combination_wins() {
        // masses equal to the shift make every (c, c + 1) combination land
        // exactly on it, so the scan settles on the highest such pair
        let candidates = [
            IsotopeCandidate::new(C13_MASS_SHIFT, 10.0, 1),
            IsotopeCandidate::new(C13_MASS_SHIFT, 10.0, 2),
        ];
        let found = find_isotopes(&candidates, &params(3, 5.0));
        assert_eq!(
            found,
            vec![IsotopeRelation {
                parent_id: 1,
                isotope_id: 2,
                parent_charge: 2,
                isotope_charge: 3,
            }]
        );
    }

    #[test]
    fn test_multiple_relations_in_one_list() {
        let candidates = [
            IsotopeCandidate::new(100.0, 500.0, 1),
            IsotopeCandidate::new(101.003355, 120.0, 2),
            IsotopeCandidate::new(102.006710, 30.0, 3),
        ];
        let found = find_isotopes(&candidates, &params(1, 10.0));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].parent_id, 1);
        assert_eq!(found[0].isotope_id, 2);
        assert_eq!(found[1].parent_id, 2);
        assert_eq!(found[1].isotope_id, 3);
    }
}
