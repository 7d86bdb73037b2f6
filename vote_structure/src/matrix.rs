use nalgebra::DMatrix;
use std::collections::{HashMap, HashSet};

use crate::artifacts::ArtifactKey;
use crate::config::*;
use crate::geography::RegionGroup;

#[derive(PartialEq, Debug, Clone)]
pub struct StationRow {
    pub station: StationId,
    pub groups: Vec<String>,
    pub arrondissement: Option<u32>,
    pub region: RegionGroup,
    pub votes: Vec<f64>,
}

/// The canonical station x candidate table of one election unit.
///
/// Invariants: station identifiers are unique, every vote count is finite and
/// non-negative, every row has one count per candidate. Row order follows the input.
#[derive(PartialEq, Debug, Clone)]
pub struct VoteMatrix {
    pub meta: ElectionMeta,
    pub id_column: String,
    pub group_columns: Vec<String>,
    pub candidates: Vec<String>,
    pub rows: Vec<StationRow>,
}

impl VoteMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `2022_1er`, or `2022_1er_Circ_03` for partitioned elections.
    pub fn label(&self) -> String {
        let base = format!("{}_{}", self.meta.year, self.meta.round.label());
        match self.meta.sub_unit {
            Some(su) => format!("{}_{}", base, su.code()),
            None => base,
        }
    }

    /// `vote_matrix_2022_1er`, or `vote_matrix_Circ_03` inside its round directory.
    pub fn base_name(&self) -> String {
        matrix_key(&self.meta).name
    }

    pub fn artifact_key(&self) -> ArtifactKey {
        matrix_key(&self.meta)
    }

    /// The unique name of this unit within a batch, for example
    /// `legislative/2022-01/vote_matrix_Circ_03`.
    pub fn qualified_name(&self) -> String {
        self.artifact_key().qualified_name()
    }

    pub fn station_ids(&self) -> Vec<StationId> {
        self.rows.iter().map(|r| r.station.clone()).collect()
    }

    /// Rows are stations, columns are candidates. Administrative columns are not part of it.
    pub fn numeric_block(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.rows.len(), self.candidates.len(), |i, j| {
            self.rows[i].votes[j]
        })
    }

    /// The numeric block restricted to the given stations, in the given order.
    /// Returns None if one of them is absent.
    pub fn restricted_block(&self, stations: &[StationId]) -> Option<DMatrix<f64>> {
        let index: HashMap<&StationId, usize> = self
            .rows
            .iter()
            .enumerate()
            .map(|(idx, r)| (&r.station, idx))
            .collect();
        let positions: Option<Vec<usize>> = stations.iter().map(|s| index.get(s).cloned()).collect();
        let positions = positions?;
        Some(DMatrix::from_fn(
            positions.len(),
            self.candidates.len(),
            |i, j| self.rows[positions[i]].votes[j],
        ))
    }
}

/// Where the matrix built from an input with this metadata is stored. Its
/// qualified name identifies the matrix within a batch.
pub fn matrix_key(meta: &ElectionMeta) -> ArtifactKey {
    let mut segments = vec![meta.election_type.tag().to_string()];
    let name = match meta.sub_unit {
        Some(su) => {
            segments.push(meta.period());
            format!("vote_matrix_{}", su.code())
        }
        None => format!("vote_matrix_{}_{}", meta.year, meta.round.label()),
    };
    ArtifactKey { segments, name }
}

/// The stations present in both lists, in the order of the first one.
pub fn common_stations(first: &[StationId], second: &[StationId]) -> Vec<StationId> {
    let others: HashSet<&StationId> = second.iter().collect();
    first
        .iter()
        .filter(|s| others.contains(s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<StationId> {
        v.iter().filter_map(|s| StationId::new(s)).collect()
    }

    #[test]
    fn keys_follow_the_partitioning() {
        let meta = ElectionMeta {
            election_type: ElectionType::Legislative,
            year: 2022,
            round: Round::Second,
            sub_unit: Some(SubUnit::Constituency(3)),
        };
        assert_eq!(
            matrix_key(&meta).qualified_name(),
            "legislative/2022-02/vote_matrix_Circ_03"
        );
        let meta = ElectionMeta {
            election_type: ElectionType::European,
            year: 2019,
            round: Round::First,
            sub_unit: None,
        };
        assert_eq!(
            matrix_key(&meta).qualified_name(),
            "europeenne/vote_matrix_2019_1er"
        );
    }

    #[test]
    fn intersection_keeps_shared_stations_only() {
        let a = ids(&["1-1", "1-2", "2-1"]);
        let b = ids(&["1-2", "2-1", "3-1"]);
        assert_eq!(common_stations(&a, &b), ids(&["1-2", "2-1"]));
        assert_eq!(common_stations(&b, &a), ids(&["1-2", "2-1"]));
        assert!(common_stations(&a, &ids(&["9-9"])).is_empty());
    }
}
