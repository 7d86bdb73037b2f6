// Principal component analysis of vote matrices.
//
// Sign convention: the singular vectors are only defined up to a sign. Each
// component is oriented so that its largest loading (in absolute value) is
// positive. Two matrices with different candidates can still end up with
// opposite orientations of comparable axes; distances and correlations are
// unaffected.

use log::{debug, info};
use nalgebra::DMatrix;
use snafu::prelude::*;
use std::collections::HashMap;

use crate::config::*;
use crate::matrix::VoteMatrix;

const VARIANCE_EPSILON: f64 = 1e-12;

#[derive(PartialEq, Debug, Clone)]
pub struct PcaResult {
    pub stations: Vec<StationId>,
    pub variables: Vec<String>,
    /// Singular values of the standardized matrix, kept components only.
    pub singular_values: Vec<f64>,
    /// Variance carried by each kept component.
    pub eigenvalues: Vec<f64>,
    /// Ratio of the total variance per kept component. Non increasing, sums to at most 1.
    pub explained_variance: Vec<f64>,
    /// One row per station, one score per component.
    pub coordinates: Vec<Vec<f64>>,
    /// One row per variable: its squared loading as a percentage of the component total.
    pub contributions: Vec<Vec<f64>>,
    index: HashMap<StationId, usize>,
}

impl PcaResult {
    pub fn num_components(&self) -> usize {
        self.explained_variance.len()
    }

    pub fn coordinates_of(&self, station: &StationId) -> Option<&[f64]> {
        self.index
            .get(station)
            .map(|idx| self.coordinates[*idx].as_slice())
    }

    pub fn contributions_of(&self, variable: &str) -> Option<&[f64]> {
        self.variables
            .iter()
            .position(|v| v == variable)
            .map(|idx| self.contributions[idx].as_slice())
    }

    /// The first `k` scores of every station. Missing components are zero.
    pub fn leading_coordinates(&self, k: usize) -> Vec<Vec<f64>> {
        self.coordinates
            .iter()
            .map(|c| (0..k).map(|i| c.get(i).cloned().unwrap_or(0.0)).collect())
            .collect()
    }
}

pub fn run_pca(matrix: &VoteMatrix, settings: &AnalysisSettings) -> AnalysisResult<PcaResult> {
    info!(
        "run_pca: {}: {} stations x {} candidates",
        matrix.qualified_name(),
        matrix.len(),
        matrix.candidates.len()
    );
    decompose(
        matrix.station_ids(),
        matrix.candidates.clone(),
        &matrix.numeric_block(),
        settings,
    )
}

/// Centers (and optionally scales) the columns, then decomposes with an SVD.
///
/// At most `min(rows, columns) - 1` components are kept.
pub fn decompose(
    stations: Vec<StationId>,
    variables: Vec<String>,
    data: &DMatrix<f64>,
    settings: &AnalysisSettings,
) -> AnalysisResult<PcaResult> {
    let (n, p) = data.shape();
    ensure!(
        n >= settings.min_rows && p >= settings.min_columns,
        InsufficientDataSnafu {
            rows: n,
            columns: p,
            reason: format!(
                "at least {} rows and {} columns are required",
                settings.min_rows, settings.min_columns
            ),
        }
    );

    let z = standardize(data, settings.scale_columns);
    let svd = z.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return InsufficientDataSnafu {
                rows: n,
                columns: p,
                reason: "the decomposition did not converge".to_string(),
            }
            .fail()
        }
    };
    let sv: Vec<f64> = svd.singular_values.iter().cloned().collect();
    let total: f64 = sv.iter().map(|s| s * s).sum();
    ensure!(
        total > VARIANCE_EPSILON,
        InsufficientDataSnafu {
            rows: n,
            columns: p,
            reason: "all the columns are constant".to_string(),
        }
    );

    let mut order: Vec<usize> = (0..sv.len()).collect();
    order.sort_by(|a, b| {
        sv[*b]
            .partial_cmp(&sv[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let kept = n.min(p).saturating_sub(1).max(1).min(order.len());
    let order = &order[..kept];

    let mut coordinates = vec![vec![0.0; kept]; n];
    let mut loadings = vec![vec![0.0; kept]; p];
    for (c, idx) in order.iter().enumerate() {
        let sign = orientation(&v_t, *idx);
        for (j, l) in loadings.iter_mut().enumerate() {
            l[c] = sign * v_t[(*idx, j)];
        }
        for (i, row) in coordinates.iter_mut().enumerate() {
            row[c] = sign * u[(i, *idx)] * sv[*idx];
        }
    }

    let mut contributions = vec![vec![0.0; kept]; p];
    for c in 0..kept {
        let norm: f64 = loadings.iter().map(|l| l[c] * l[c]).sum();
        if norm > 0.0 {
            for j in 0..p {
                contributions[j][c] = 100.0 * loadings[j][c] * loadings[j][c] / norm;
            }
        }
    }

    let singular_values: Vec<f64> = order.iter().map(|idx| sv[*idx]).collect();
    let explained_variance: Vec<f64> = singular_values.iter().map(|s| s * s / total).collect();
    let eigenvalues: Vec<f64> = singular_values.iter().map(|s| s * s / n as f64).collect();
    debug!("decompose: explained variance {:?}", explained_variance);

    let index = stations
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.clone(), idx))
        .collect();
    Ok(PcaResult {
        stations,
        variables,
        singular_values,
        eigenvalues,
        explained_variance,
        coordinates,
        contributions,
        index,
    })
}

/// Centered columns, divided by their (population) standard deviation when
/// `scale` is set. Constant columns stay at zero.
pub fn standardize(data: &DMatrix<f64>, scale: bool) -> DMatrix<f64> {
    let (n, p) = data.shape();
    let mut z = data.clone();
    if n == 0 {
        return z;
    }
    for j in 0..p {
        let mean = data.column(j).sum() / n as f64;
        let var = data.column(j).iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
        let sd = var.sqrt();
        for i in 0..n {
            let centered = data[(i, j)] - mean;
            z[(i, j)] = if scale && sd > VARIANCE_EPSILON {
                centered / sd
            } else {
                centered
            };
        }
    }
    z
}

// +1 or -1, so that the largest loading of the component is positive.
fn orientation(v_t: &DMatrix<f64>, component: usize) -> f64 {
    let row = v_t.row(component);
    let mut best = 0.0_f64;
    for x in row.iter() {
        if x.abs() > best.abs() {
            best = *x;
        }
    }
    if best < 0.0 {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<StationId> {
        (0..n)
            .filter_map(|i| StationId::new(format!("{}-{}", i / 10 + 1, i % 10 + 1).as_str()))
            .collect()
    }

    fn vars(p: usize) -> Vec<String> {
        (0..p).map(|j| format!("c{}", j)).collect()
    }

    fn dist(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
    }

    #[test]
    fn two_opposed_candidates_share_one_axis() {
        let stations: Vec<StationId> = ["1-1", "1-2", "2-1"]
            .iter()
            .filter_map(|s| StationId::new(s))
            .collect();
        let data = DMatrix::from_row_slice(3, 2, &[120.0, 30.0, 80.0, 60.0, 10.0, 200.0]);
        let res = decompose(
            stations,
            vec!["macron".to_string(), "le_pen".to_string()],
            &data,
            &AnalysisSettings::DEFAULT,
        )
        .unwrap();
        assert!(res.explained_variance[0] > 0.5);
        assert_eq!(res.num_components(), 1);
        let c = res.contributions_of("macron").unwrap();
        assert!((c[0] - 50.0).abs() < 1e-6);
    }

    #[test]
    fn variance_is_sorted_and_bounded() {
        let (n, p) = (12, 5);
        let data = DMatrix::from_fn(n, p, |i, j| {
            ((i * 7 + j * 13) % 11) as f64 * (j + 1) as f64 + (i * i) as f64 * 0.3
        });
        let res = decompose(ids(n), vars(p), &data, &AnalysisSettings::DEFAULT).unwrap();
        assert!(res.num_components() <= n.min(p) - 1);
        let total: f64 = res.explained_variance.iter().sum();
        assert!(total <= 1.0 + 1e-9);
        for w in res.explained_variance.windows(2) {
            assert!(w[0] + 1e-12 >= w[1]);
        }
        for c in 0..res.num_components() {
            let s: f64 = res.contributions.iter().map(|row| row[c]).sum();
            assert!((s - 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn projected_distances_never_exceed_standardized_ones() {
        let (n, p) = (6, 3);
        let data = DMatrix::from_fn(n, p, |i, j| ((i + 1) * (j + 2) % 7) as f64 + i as f64);
        let res = decompose(ids(n), vars(p), &data, &AnalysisSettings::DEFAULT).unwrap();
        let z = standardize(&data, true);
        for a in 0..n {
            for b in 0..n {
                let za: Vec<f64> = z.row(a).iter().cloned().collect();
                let zb: Vec<f64> = z.row(b).iter().cloned().collect();
                let projected = dist(&res.coordinates[a], &res.coordinates[b]);
                assert!(projected <= dist(&za, &zb) + 1e-9);
            }
        }
    }

    #[test]
    fn refuses_small_matrices() {
        let data = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let res = decompose(ids(2), vars(2), &data, &AnalysisSettings::DEFAULT);
        assert!(matches!(
            res,
            Err(AnalysisError::InsufficientData { rows: 2, columns: 2, .. })
        ));
        let data = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let res = decompose(ids(3), vars(1), &data, &AnalysisSettings::DEFAULT);
        assert!(matches!(res, Err(AnalysisError::InsufficientData { .. })));
    }

    #[test]
    fn constant_matrices_have_no_structure() {
        let data = DMatrix::from_element(4, 3, 5.0);
        let res = decompose(ids(4), vars(3), &data, &AnalysisSettings::DEFAULT);
        assert!(matches!(res, Err(AnalysisError::InsufficientData { .. })));
    }

    #[test]
    fn orientation_is_stable() {
        let (n, p) = (8, 3);
        let data = DMatrix::from_fn(n, p, |i, j| ((i * 3 + j * 5) % 7) as f64 + (i * j) as f64);
        let a = decompose(ids(n), vars(p), &data, &AnalysisSettings::DEFAULT).unwrap();
        let b = decompose(ids(n), vars(p), &data, &AnalysisSettings::DEFAULT).unwrap();
        assert_eq!(a, b);
        let s = ids(n);
        assert!(a.coordinates_of(&s[3]).is_some());
        assert_eq!(a.leading_coordinates(4)[0].len(), 4);
    }
}
