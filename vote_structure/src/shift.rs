// Displacement of stations between two PCAs of the same election type.

use log::{debug, info};

use crate::config::*;
use crate::matrix::common_stations;
use crate::pca::PcaResult;

#[derive(PartialEq, Debug, Clone)]
pub struct ShiftVector {
    pub station: StationId,
    pub delta_1: f64,
    pub delta_2: f64,
    pub magnitude: f64,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ShiftOptions {
    /// Flips the axes of the later result that are anti-correlated, over the
    /// common stations, with the same axes of the earlier result.
    pub align_signs: bool,
}

impl ShiftOptions {
    pub const DEFAULT: ShiftOptions = ShiftOptions { align_signs: false };
}

impl Default for ShiftOptions {
    fn default() -> Self {
        ShiftOptions::DEFAULT
    }
}

/// Per-station displacement `later - earlier` on the first two components.
///
/// Only the stations present in both results are considered; the output follows
/// the station order of `earlier`.
pub fn compute_shifts(
    earlier: &PcaResult,
    later: &PcaResult,
    options: &ShiftOptions,
) -> Vec<ShiftVector> {
    let common = common_stations(&earlier.stations, &later.stations);
    info!(
        "compute_shifts: {} common stations ({} and {} in the inputs)",
        common.len(),
        earlier.stations.len(),
        later.stations.len()
    );

    let pairs: Vec<(StationId, [f64; 2], [f64; 2])> = common
        .into_iter()
        .filter_map(|s| {
            let a = leading_pair(earlier.coordinates_of(&s)?);
            let b = leading_pair(later.coordinates_of(&s)?);
            Some((s, a, b))
        })
        .collect();

    let signs: [f64; 2] = if options.align_signs {
        let mut signs = [1.0, 1.0];
        for (c, sign) in signs.iter_mut().enumerate() {
            let dot: f64 = pairs.iter().map(|(_, a, b)| a[c] * b[c]).sum();
            if dot < 0.0 {
                debug!("compute_shifts: flipping component {} of the later result", c + 1);
                *sign = -1.0;
            }
        }
        signs
    } else {
        [1.0, 1.0]
    };

    pairs
        .into_iter()
        .map(|(station, a, b)| {
            let delta_1 = signs[0] * b[0] - a[0];
            let delta_2 = signs[1] * b[1] - a[1];
            ShiftVector {
                station,
                delta_1,
                delta_2,
                magnitude: (delta_1 * delta_1 + delta_2 * delta_2).sqrt(),
            }
        })
        .collect()
}

/// Largest displacements first.
pub fn sort_by_magnitude(shifts: &mut [ShiftVector]) {
    shifts.sort_by(|a, b| {
        b.magnitude
            .partial_cmp(&a.magnitude)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn leading_pair(coords: &[f64]) -> [f64; 2] {
    [
        coords.first().cloned().unwrap_or(0.0),
        coords.get(1).cloned().unwrap_or(0.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pca::decompose;
    use nalgebra::DMatrix;

    fn pca_of(ids: &[&str], rows: &[f64], p: usize) -> PcaResult {
        let stations: Vec<StationId> = ids.iter().filter_map(|s| StationId::new(s)).collect();
        let vars: Vec<String> = (0..p).map(|j| format!("v{}", j)).collect();
        let data = DMatrix::from_row_slice(ids.len(), p, rows);
        decompose(stations, vars, &data, &AnalysisSettings::DEFAULT).unwrap()
    }

    #[test]
    fn identical_results_do_not_move() {
        let ids = ["1-1", "1-2", "2-1", "2-2", "3-1"];
        let rows = [
            10.0, 20.0, 5.0, 40.0, 22.0, 3.0, 5.0, 60.0, 9.0, 80.0, 10.0, 1.0, 33.0, 33.0, 33.0,
        ];
        let a = pca_of(&ids, &rows, 3);
        let b = pca_of(&ids, &rows, 3);
        let shifts = compute_shifts(&a, &b, &ShiftOptions::DEFAULT);
        assert_eq!(shifts.len(), ids.len());
        assert!(shifts.iter().all(|s| s.magnitude == 0.0));
    }

    #[test]
    fn only_common_stations_are_compared() {
        let a = pca_of(&["1-1", "1-2", "2-1"], &[120.0, 30.0, 80.0, 60.0, 10.0, 200.0], 2);
        let b = pca_of(&["1-2", "2-1", "3-1"], &[70.0, 50.0, 20.0, 180.0, 90.0, 40.0], 2);
        let shifts = compute_shifts(&a, &b, &ShiftOptions::DEFAULT);
        let names: Vec<&str> = shifts.iter().map(|s| s.station.as_str()).collect();
        assert_eq!(names, vec!["1-2", "2-1"]);
        for s in shifts.iter() {
            // One component only: the second delta is zero.
            assert_eq!(s.delta_2, 0.0);
            assert!((s.magnitude - s.delta_1.abs()).abs() < 1e-12);
        }
    }

    #[test]
    fn sign_alignment_cancels_a_flipped_axis() {
        let ids = ["1-1", "1-2", "2-1", "2-2"];
        let rows = [1.0, 9.0, 4.0, 2.0, 8.0, 7.0, 3.0, 3.0];
        let a = pca_of(&ids, &rows, 2);
        let mut b = a.clone();
        for c in b.coordinates.iter_mut() {
            c[0] = -c[0];
        }
        let raw = compute_shifts(&a, &b, &ShiftOptions::DEFAULT);
        assert!(raw.iter().any(|s| s.magnitude > 0.0));
        let aligned = compute_shifts(&a, &b, &ShiftOptions { align_signs: true });
        assert!(aligned.iter().all(|s| s.magnitude.abs() < 1e-12));

        let mut sorted = raw.clone();
        sort_by_magnitude(&mut sorted);
        for w in sorted.windows(2) {
            assert!(w[0].magnitude >= w[1].magnitude);
        }
    }
}
