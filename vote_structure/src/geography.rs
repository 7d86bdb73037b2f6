use std::fmt::Display;

use crate::config::StationId;

/// Coarse geographic grouping of the Paris arrondissements.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum RegionGroup {
    NordEst,
    SudOuest,
    Centre,
    SudEst,
    NordOuest,
    Nord,
    /// Anything outside of the partition, including unparseable identifiers.
    Autre,
}

/// The arrondissements of each named group. Every arrondissement from 1 to 20
/// appears exactly once.
pub const REGION_PARTITION: [(RegionGroup, &[u32]); 6] = [
    (RegionGroup::Centre, &[1, 2, 3, 4]),
    (RegionGroup::SudOuest, &[5, 6, 7, 14, 15]),
    (RegionGroup::SudEst, &[12, 13]),
    (RegionGroup::NordOuest, &[8, 16, 17]),
    (RegionGroup::Nord, &[9, 10, 18]),
    (RegionGroup::NordEst, &[11, 19, 20]),
];

impl RegionGroup {
    pub fn label(&self) -> &'static str {
        match self {
            RegionGroup::NordEst => "Nord-Est",
            RegionGroup::SudOuest => "Sud-Ouest",
            RegionGroup::Centre => "Centre",
            RegionGroup::SudEst => "Sud-Est",
            RegionGroup::NordOuest => "Nord-Ouest",
            RegionGroup::Nord => "Nord",
            RegionGroup::Autre => "Autre",
        }
    }
}

impl Display for RegionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub fn classify_arrondissement(arrondissement: u32) -> RegionGroup {
    REGION_PARTITION
        .iter()
        .find(|(_, members)| members.contains(&arrondissement))
        .map(|(group, _)| *group)
        .unwrap_or(RegionGroup::Autre)
}

pub fn classify_station(station: &StationId) -> RegionGroup {
    station
        .arrondissement()
        .map(classify_arrondissement)
        .unwrap_or(RegionGroup::Autre)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn partition_covers_paris_exactly_once() {
        let mut seen: HashSet<u32> = HashSet::new();
        for (group, members) in REGION_PARTITION.iter() {
            assert_ne!(*group, RegionGroup::Autre);
            for m in members.iter() {
                assert!(seen.insert(*m), "arrondissement {} appears twice", m);
            }
        }
        assert_eq!(seen, (1..=20).collect::<HashSet<u32>>());

        let named: HashSet<RegionGroup> = (1..=20).map(classify_arrondissement).collect();
        assert_eq!(named.len(), 6);
        assert!(!named.contains(&RegionGroup::Autre));
    }

    #[test]
    fn outside_paris_is_autre() {
        for a in [0, 21, 75, 999] {
            assert_eq!(classify_arrondissement(a), RegionGroup::Autre);
        }
        let odd = StationId::new("bureau-centralisateur").unwrap();
        assert_eq!(classify_station(&odd), RegionGroup::Autre);
    }

    #[test]
    fn stations_follow_their_arrondissement() {
        let s = StationId::new("18-3").unwrap();
        assert_eq!(classify_station(&s), RegionGroup::Nord);
        let s = StationId::new("01-12").unwrap();
        assert_eq!(classify_station(&s), RegionGroup::Centre);
        assert_eq!(RegionGroup::NordEst.to_string(), "Nord-Est");
    }
}
