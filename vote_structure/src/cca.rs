// Canonical correlation analysis between two vote matrices.
//
// Both sides are centered and reduced to an orthonormal basis of their column
// space (thin SVD, numerically null directions dropped). The singular values of
// `Qx^T Qy` are the canonical correlations, its singular vectors give the variates.

use log::{debug, info};
use nalgebra::DMatrix;
use snafu::prelude::*;
use std::collections::HashSet;

use crate::config::*;
use crate::matrix::VoteMatrix;
use crate::pca::standardize;

const RANK_TOLERANCE: f64 = 1e-10;

#[derive(PartialEq, Debug, Clone)]
pub struct CanonicalVariatePair {
    /// Starts at 1.
    pub axis: usize,
    /// In `[0, 1]`.
    pub correlation: f64,
    /// Unit variance scores of the first side, one per common station.
    pub x_scores: Vec<f64>,
    pub y_scores: Vec<f64>,
    /// Correlation of each column of the first side with `x_scores`.
    pub x_structure: Vec<(String, f64)>,
    pub y_structure: Vec<(String, f64)>,
}

impl CanonicalVariatePair {
    /// For example `axis1_r=0.993`.
    pub fn tag(&self) -> String {
        format!("axis{}_r={:.3}", self.axis, self.correlation)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct CcaResult {
    /// The common stations, sorted. Scores follow this order.
    pub stations: Vec<StationId>,
    /// By decreasing correlation.
    pub pairs: Vec<CanonicalVariatePair>,
}

impl CcaResult {
    pub fn correlations(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.correlation).collect()
    }
}

/// Correlates two matrices over the stations they share.
///
/// The rows of both sides are restricted to the common stations and sorted by
/// station identifier before anything else, so that they pair up one to one.
pub fn run_cca(x: &VoteMatrix, y: &VoteMatrix) -> AnalysisResult<CcaResult> {
    let y_ids: HashSet<StationId> = y.station_ids().into_iter().collect();
    let mut stations: Vec<StationId> = x
        .station_ids()
        .into_iter()
        .filter(|s| y_ids.contains(s))
        .collect();
    stations.sort();
    info!(
        "run_cca: {} vs {}: {} common stations",
        x.qualified_name(),
        y.qualified_name(),
        stations.len()
    );
    ensure!(
        !stations.is_empty(),
        DegenerateCcaSnafu {
            reason: "no common station".to_string(),
        }
    );

    let xb = x.restricted_block(&stations).context(DegenerateCcaSnafu {
        reason: "misaligned stations on the first side".to_string(),
    })?;
    let yb = y.restricted_block(&stations).context(DegenerateCcaSnafu {
        reason: "misaligned stations on the second side".to_string(),
    })?;
    canonical_correlation(stations, &x.candidates, &xb, &y.candidates, &yb)
}

/// The canonical correlation of two blocks whose rows are already aligned.
pub fn canonical_correlation(
    stations: Vec<StationId>,
    x_variables: &[String],
    x: &DMatrix<f64>,
    y_variables: &[String],
    y: &DMatrix<f64>,
) -> AnalysisResult<CcaResult> {
    let n = x.nrows();
    ensure!(
        n == y.nrows() && n == stations.len(),
        DegenerateCcaSnafu {
            reason: format!("row counts differ: {} and {}", n, y.nrows()),
        }
    );
    ensure!(
        n > 0,
        DegenerateCcaSnafu {
            reason: "no common station".to_string(),
        }
    );
    ensure!(
        n >= x.ncols() && n >= y.ncols(),
        DegenerateCcaSnafu {
            reason: format!(
                "{} stations for {} and {} columns",
                n,
                x.ncols(),
                y.ncols()
            ),
        }
    );

    let xc = standardize(x, false);
    let yc = standardize(y, false);
    let qx = orthonormal_basis(&xc)?;
    let qy = orthonormal_basis(&yc)?;
    debug!(
        "canonical_correlation: ranks {} and {}",
        qx.ncols(),
        qy.ncols()
    );

    let m = qx.transpose() * &qy;
    let svd = m.svd(true, true);
    let (um, vm_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return DegenerateCcaSnafu {
                reason: "the decomposition did not converge".to_string(),
            }
            .fail()
        }
    };
    let rho: Vec<f64> = svd.singular_values.iter().cloned().collect();
    let mut order: Vec<usize> = (0..rho.len()).collect();
    order.sort_by(|a, b| {
        rho[*b]
            .partial_cmp(&rho[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let axes = qx.ncols().min(qy.ncols()).min(order.len());

    // Unit variance scores.
    let scale = ((n.max(2) - 1) as f64).sqrt();
    let mut pairs: Vec<CanonicalVariatePair> = Vec::with_capacity(axes);
    for (pos, idx) in order.iter().take(axes).enumerate() {
        let a = &qx * um.column(*idx) * scale;
        let b = &qy * vm_t.row(*idx).transpose() * scale;
        let mut x_scores: Vec<f64> = a.iter().cloned().collect();
        let mut y_scores: Vec<f64> = b.iter().cloned().collect();
        let mut x_structure = structure(x_variables, &xc, &x_scores);
        let mut y_structure = structure(y_variables, &yc, &y_scores);

        // Orientation: the strongest structure correlation of the first side is positive.
        let strongest = x_structure
            .iter()
            .map(|(_, r)| *r)
            .fold(0.0_f64, |acc, r| if r.abs() > acc.abs() { r } else { acc });
        if strongest < 0.0 {
            for v in x_scores.iter_mut().chain(y_scores.iter_mut()) {
                *v = -*v;
            }
            for (_, r) in x_structure.iter_mut().chain(y_structure.iter_mut()) {
                *r = -*r;
            }
        }

        pairs.push(CanonicalVariatePair {
            axis: pos + 1,
            correlation: rho[*idx].clamp(0.0, 1.0),
            x_scores,
            y_scores,
            x_structure,
            y_structure,
        });
    }
    info!(
        "canonical_correlation: correlations {:?}",
        pairs.iter().map(|p| p.correlation).collect::<Vec<f64>>()
    );
    Ok(CcaResult { stations, pairs })
}

// Columns of the left singular vectors spanning the column space of a centered block.
fn orthonormal_basis(centered: &DMatrix<f64>) -> AnalysisResult<DMatrix<f64>> {
    let n = centered.nrows();
    let svd = centered.clone().svd(true, false);
    let u = svd.u.context(DegenerateCcaSnafu {
        reason: "the decomposition did not converge".to_string(),
    })?;
    let s: Vec<f64> = svd.singular_values.iter().cloned().collect();
    let s_max = s.iter().cloned().fold(0.0_f64, f64::max);
    let mut kept: Vec<usize> = (0..s.len())
        .filter(|i| s_max > 0.0 && s[*i] > RANK_TOLERANCE * s_max)
        .collect();
    kept.sort_by(|a, b| s[*b].partial_cmp(&s[*a]).unwrap_or(std::cmp::Ordering::Equal));
    ensure!(
        !kept.is_empty(),
        DegenerateCcaSnafu {
            reason: "one side has no variance over the common stations".to_string(),
        }
    );
    Ok(DMatrix::from_fn(n, kept.len(), |i, j| u[(i, kept[j])]))
}

fn structure(variables: &[String], centered: &DMatrix<f64>, scores: &[f64]) -> Vec<(String, f64)> {
    let score_norm: f64 = scores.iter().map(|s| s * s).sum::<f64>().sqrt();
    variables
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let col = centered.column(j);
            let col_norm = col.norm();
            let dot: f64 = col.iter().zip(scores.iter()).map(|(c, s)| c * s).sum();
            let r = if col_norm > 0.0 && score_norm > 0.0 {
                dot / (col_norm * score_norm)
            } else {
                0.0
            };
            (name.clone(), r)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geography::RegionGroup;
    use crate::matrix::StationRow;

    const A: [f64; 12] = [
        12.0, 30.0, 45.0, 60.0, 18.0, 90.0, 75.0, 33.0, 51.0, 66.0, 24.0, 80.0,
    ];
    const B: [f64; 12] = [
        200.0, 150.0, 120.0, 90.0, 170.0, 40.0, 60.0, 140.0, 110.0, 70.0, 190.0, 55.0,
    ];

    fn matrix(election_type: ElectionType, ids: &[String], columns: &[&[f64]]) -> VoteMatrix {
        let rows = ids
            .iter()
            .enumerate()
            .map(|(i, id)| StationRow {
                station: StationId::new(id).unwrap(),
                groups: vec![],
                arrondissement: None,
                region: RegionGroup::Autre,
                votes: columns.iter().map(|c| c[i]).collect(),
            })
            .collect();
        VoteMatrix {
            meta: ElectionMeta {
                election_type,
                year: 2022,
                round: Round::First,
                sub_unit: None,
            },
            id_column: "id_bvote".to_string(),
            group_columns: vec![],
            candidates: (0..columns.len()).map(|j| format!("c{}", j)).collect(),
            rows,
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}-{}", i % 5 + 1, i / 5 + 1)).collect()
    }

    #[test]
    fn aligned_copies_are_perfectly_correlated() {
        let x = matrix(ElectionType::Presidential, &ids(12), &[&A, &B]);
        let y = matrix(ElectionType::European, &ids(12), &[&A, &B]);
        let res = run_cca(&x, &y).unwrap();
        assert_eq!(res.pairs.len(), 2);
        for p in res.pairs.iter() {
            assert!((p.correlation - 1.0).abs() < 1e-9);
            assert!(p.tag().ends_with("r=1.000"));
        }
    }

    #[test]
    fn shuffled_rows_lose_correlation() {
        let x = matrix(ElectionType::Presidential, &ids(12), &[&A, &B]);
        // Same values, attached to other stations.
        let ra: Vec<f64> = (0..12).map(|i| A[(i + 5) % 12]).collect();
        let rb: Vec<f64> = (0..12).map(|i| B[(i + 5) % 12]).collect();
        let y = matrix(ElectionType::Presidential, &ids(12), &[&ra, &rb]);
        let aligned = run_cca(&x, &x.clone()).unwrap().correlations();
        let shuffled = run_cca(&x, &y).unwrap().correlations();
        assert!(aligned[0] > 0.999);
        assert!(shuffled[0] < 0.9);
        assert!(shuffled[0] < aligned[0]);
    }

    #[test]
    fn correlations_are_sorted_and_bounded() {
        let c: Vec<f64> = (0..12).map(|i| ((i * 5) % 7) as f64).collect();
        let x = matrix(ElectionType::Presidential, &ids(12), &[&A, &B, &c]);
        let d: Vec<f64> = (0..12).map(|i| A[i] * 0.5 + c[i]).collect();
        let y = matrix(ElectionType::Regional, &ids(12), &[&B, &d]);
        let res = run_cca(&x, &y).unwrap();
        assert_eq!(res.pairs.len(), 2);
        let cs = res.correlations();
        for w in cs.windows(2) {
            assert!(w[0] >= w[1]);
        }
        assert!(cs.iter().all(|r| (0.0..=1.0).contains(r)));
        for p in res.pairs.iter() {
            assert_eq!(p.x_scores.len(), 12);
            assert_eq!(p.x_structure.len(), 3);
            assert_eq!(p.y_structure.len(), 2);
        }
    }

    #[test]
    fn variates_are_uncorrelated_within_a_side() {
        let c: Vec<f64> = (0..12).map(|i| ((i * 5) % 7) as f64).collect();
        let x = matrix(ElectionType::Presidential, &ids(12), &[&A, &B, &c]);
        let y = matrix(ElectionType::Regional, &ids(12), &[&c, &A, &B]);
        let res = run_cca(&x, &y).unwrap();
        let dot: f64 = res.pairs[0]
            .x_scores
            .iter()
            .zip(res.pairs[1].x_scores.iter())
            .map(|(a, b)| a * b)
            .sum();
        assert!(dot.abs() < 1e-8);
    }

    #[test]
    fn only_shared_stations_are_used() {
        let first: Vec<String> = ["1-1", "1-2", "2-1"].iter().map(|s| s.to_string()).collect();
        let second: Vec<String> = ["1-2", "2-1", "3-1"].iter().map(|s| s.to_string()).collect();
        let x = matrix(ElectionType::Presidential, &first, &[&[5.0, 8.0, 1.0]]);
        let y = matrix(ElectionType::Presidential, &second, &[&[3.0, 9.0, 4.0]]);
        let res = run_cca(&x, &y).unwrap();
        let names: Vec<&str> = res.stations.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["1-2", "2-1"]);
        assert_eq!(res.pairs[0].x_scores.len(), 2);
    }

    #[test]
    fn degenerate_inputs_are_refused() {
        let x = matrix(ElectionType::Presidential, &ids(3), &[&[1.0, 2.0, 3.0]]);
        let disjoint: Vec<String> = vec!["9-9".to_string(), "9-8".to_string(), "9-7".to_string()];
        let y = matrix(ElectionType::Presidential, &disjoint, &[&[1.0, 2.0, 3.0]]);
        assert!(matches!(run_cca(&x, &y), Err(AnalysisError::DegenerateCca { .. })));

        let wide = matrix(
            ElectionType::Presidential,
            &ids(2),
            &[&[1.0, 2.0], &[3.0, 1.0], &[0.0, 7.0]],
        );
        assert!(matches!(run_cca(&wide, &wide), Err(AnalysisError::DegenerateCca { .. })));

        let flat = matrix(ElectionType::Presidential, &ids(3), &[&[4.0, 4.0, 4.0]]);
        assert!(matches!(run_cca(&x, &flat), Err(AnalysisError::DegenerateCca { .. })));
    }
}
