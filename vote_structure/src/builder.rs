use log::{debug, info};
use snafu::prelude::*;
use std::collections::HashSet;

use crate::config::*;
use crate::geography::classify_station;
use crate::identifiers::parse_election_meta;
use crate::matrix::{StationRow, VoteMatrix};
use crate::normalize::{normalize, RawTable};

/// A builder for canonical vote matrices, one per raw input.
///
/// ```
/// use vote_structure::builder::VoteMatrixBuilder;
/// use vote_structure::{Cell, ElectionType, RawTable, RegionGroup};
///
/// let mut table = RawTable::new(vec![
///     "ID_BVOTE".to_string(),
///     "Num Circ".to_string(),
///     "Macron".to_string(),
///     "Nb Exprimés".to_string(),
/// ]);
/// table.push_row(vec![
///     Cell::Text("18-03".to_string()),
///     Cell::Number(3.0),
///     Cell::Number(120.0),
///     Cell::Number(300.0),
/// ]);
///
/// let matrix = VoteMatrixBuilder::new(ElectionType::Presidential)
///     .build("presidentielle-2022-1er_tour.xlsx", &table)?;
///
/// assert_eq!(matrix.candidates, vec!["macron".to_string()]);
/// assert_eq!(matrix.rows[0].station.as_str(), "18-3");
/// assert_eq!(matrix.rows[0].region, RegionGroup::Nord);
/// assert_eq!(matrix.base_name(), "vote_matrix_2022_1er");
/// # Ok::<(), vote_structure::AnalysisError>(())
/// ```
#[derive(Debug, Clone)]
pub struct VoteMatrixBuilder {
    election_type: ElectionType,
    policy: NormalizationPolicy,
}

impl VoteMatrixBuilder {
    pub fn new(election_type: ElectionType) -> VoteMatrixBuilder {
        VoteMatrixBuilder {
            election_type,
            policy: NormalizationPolicy::for_election(election_type),
        }
    }

    /// Replaces the default normalization policy of the election type.
    pub fn policy(self, policy: NormalizationPolicy) -> VoteMatrixBuilder {
        VoteMatrixBuilder {
            election_type: self.election_type,
            policy,
        }
    }

    /// Builds the matrix of one raw table. `path` is the originating path of the
    /// table: the election metadata is read from it.
    pub fn build(&self, path: &str, table: &RawTable) -> AnalysisResult<VoteMatrix> {
        let meta = parse_election_meta(path, self.election_type)?;
        let normalized = normalize(table, &self.policy, path)?;

        let mut seen: HashSet<StationId> = HashSet::new();
        let mut rows: Vec<StationRow> = Vec::with_capacity(normalized.rows.len());
        for r in normalized.rows {
            let station = StationId::new(r.id.as_str()).context(SchemaSnafu {
                path,
                reason: "empty station identifier".to_string(),
            })?;
            ensure!(
                seen.insert(station.clone()),
                SchemaSnafu {
                    path,
                    reason: format!("duplicate station identifier {}", station),
                }
            );
            let region = classify_station(&station);
            debug!("build: {:?}: station {} -> {}", path, station, region);
            rows.push(StationRow {
                arrondissement: station.arrondissement(),
                region,
                station,
                groups: r.groups,
                votes: r.votes,
            });
        }

        info!(
            "build: {:?}: {} stations, {} candidates",
            path,
            rows.len(),
            normalized.vote_columns.len()
        );
        Ok(VoteMatrix {
            meta,
            id_column: normalized.id_column,
            group_columns: normalized.group_columns,
            candidates: normalized.vote_columns,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geography::RegionGroup;
    use crate::normalize::Cell;

    fn table(rows: &[(&str, f64, Option<f64>, f64)]) -> RawTable {
        let mut t = RawTable::new(
            ["id_bvote", "num_circ", "hidalgo", "dati", "nb_nuls"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for (id, circ, a, b) in rows.iter() {
            t.push_row(vec![
                Cell::Text(id.to_string()),
                Cell::Number(*circ),
                a.map(Cell::Number).unwrap_or(Cell::Empty),
                Cell::Number(*b),
                Cell::Number(4.0),
            ]);
        }
        t
    }

    #[test]
    fn builds_partitioned_matrices() {
        let t = table(&[("7-1", 2.0, Some(100.0), 200.0), ("7-2", 2.0, None, 50.0)]);
        let m = VoteMatrixBuilder::new(ElectionType::Municipal)
            .policy(NormalizationPolicy {
                group_columns: vec!["num_circ".to_string()],
                ..NormalizationPolicy::for_election(ElectionType::Municipal)
            })
            .build("municipale/2020-02/Ardt_07.xlsx", &t)
            .unwrap();
        assert_eq!(m.qualified_name(), "municipale/2020-02/vote_matrix_Ardt_07");
        assert_eq!(m.label(), "2020_2eme_Ardt_07");
        assert_eq!(m.candidates, vec!["hidalgo", "dati"]);
        assert_eq!(m.rows[1].votes, vec![0.0, 50.0]);
        assert_eq!(m.rows[0].arrondissement, Some(7));
        assert_eq!(m.rows[0].region, RegionGroup::SudOuest);
    }

    #[test]
    fn no_missing_cells_survive() {
        let t = table(&[
            ("1-1", 1.0, None, 1.0),
            ("1-2", 1.0, Some(3.0), 2.0),
            ("99-1", 1.0, None, 3.0),
        ]);
        let m = VoteMatrixBuilder::new(ElectionType::Presidential)
            .build("presidentielle-2017-1.csv", &t)
            .unwrap();
        for r in m.rows.iter() {
            assert_eq!(r.votes.len(), m.candidates.len());
            assert!(r.votes.iter().all(|v| v.is_finite() && *v >= 0.0));
        }
        assert_eq!(m.rows[0].votes[0], 0.0);
        assert_eq!(m.rows[2].region, RegionGroup::Autre);
    }

    #[test]
    fn duplicate_stations_are_rejected() {
        let t = table(&[("1-1", 1.0, Some(1.0), 1.0), ("01-01", 1.0, Some(2.0), 2.0)]);
        let res = VoteMatrixBuilder::new(ElectionType::Presidential)
            .build("presidentielle-2017-1.csv", &t);
        assert!(matches!(res, Err(AnalysisError::Schema { .. })));
    }

    #[test]
    fn bad_paths_do_not_produce_matrices() {
        let t = table(&[("1-1", 1.0, Some(1.0), 1.0)]);
        let res = VoteMatrixBuilder::new(ElectionType::Legislative).build("legislative.xlsx", &t);
        assert!(matches!(res, Err(AnalysisError::MetadataParse { .. })));
    }

    #[test]
    fn rebuilding_is_identical() {
        let t = table(&[("3-1", 1.0, Some(7.0), 8.0), ("3-2", 1.0, None, 9.0)]);
        let b = VoteMatrixBuilder::new(ElectionType::Regional);
        let first = b.build("regionale-2021-1.xlsx", &t).unwrap();
        let second = b.build("regionale-2021-1.xlsx", &t).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.station_ids(),
            vec![StationId::new("3-1").unwrap(), StationId::new("3-2").unwrap()]
        );
    }
}
