// Election metadata encoded in the paths of the input files.

use log::debug;
use regex::{Captures, Regex};
use snafu::prelude::*;
use std::path::Path;

use crate::config::*;

/// The naming conventions through which an input file declares its election.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum FileNameGrammar {
    /// `<type>-<year>-<round><suffix>`, for example `presidentielle-2022-1er_tour.xlsx`
    YearRound,
    /// `<type>-<year>`: a single round election.
    YearOnly,
    /// `<year>-0<round>/<...><prefix>_<NN><...>`: the round lives in the enclosing
    /// directory and the file holds one constituency or district.
    RoundDirectory { sub_unit_prefix: &'static str },
}

impl FileNameGrammar {
    pub fn for_election(election_type: ElectionType) -> FileNameGrammar {
        match election_type {
            ElectionType::Presidential | ElectionType::Regional => FileNameGrammar::YearRound,
            ElectionType::European => FileNameGrammar::YearOnly,
            ElectionType::Legislative => FileNameGrammar::RoundDirectory {
                sub_unit_prefix: "Circ",
            },
            ElectionType::Municipal => FileNameGrammar::RoundDirectory {
                sub_unit_prefix: "Ardt",
            },
        }
    }

    pub fn parse(&self, path: &str, election_type: ElectionType) -> Option<ElectionMeta> {
        let p = Path::new(path);
        let stem = p.file_stem()?.to_str()?;
        match self {
            FileNameGrammar::YearRound => {
                let pattern = format!(r"^{}s?-(\d{{4}})-([12])", regex::escape(election_type.tag()));
                let caps = captures(pattern.as_str(), stem)?;
                Some(ElectionMeta {
                    election_type,
                    year: capture_int(&caps, 1)?,
                    round: Round::from_number(capture_int(&caps, 2)?)?,
                    sub_unit: None,
                })
            }
            FileNameGrammar::YearOnly => {
                let pattern = format!(r"^{}s?-(\d{{4}})(?:\D|$)", regex::escape(election_type.tag()));
                let caps = captures(pattern.as_str(), stem)?;
                Some(ElectionMeta {
                    election_type,
                    year: capture_int(&caps, 1)?,
                    round: Round::First,
                    sub_unit: None,
                })
            }
            FileNameGrammar::RoundDirectory { sub_unit_prefix } => {
                let dir = p.parent()?.file_name()?.to_str()?;
                let period = captures(r"^(\d{4})-0([12])$", dir)?;
                let unit_pattern = format!(r"(?i){}_(\d+)", sub_unit_prefix);
                let unit = captures(unit_pattern.as_str(), stem)?;
                let number: u32 = capture_int(&unit, 1)?;
                let sub_unit = match election_type {
                    ElectionType::Municipal => SubUnit::District(number),
                    _ => SubUnit::Constituency(number),
                };
                Some(ElectionMeta {
                    election_type,
                    year: capture_int(&period, 1)?,
                    round: Round::from_number(capture_int(&period, 2)?)?,
                    sub_unit: Some(sub_unit),
                })
            }
        }
    }
}

/// Derives the election metadata of one input file.
///
/// A file that does not follow the grammar of its election type must be skipped.
pub fn parse_election_meta(path: &str, election_type: ElectionType) -> AnalysisResult<ElectionMeta> {
    let grammar = FileNameGrammar::for_election(election_type);
    let meta = grammar
        .parse(path, election_type)
        .context(MetadataParseSnafu { path })?;
    debug!("parse_election_meta: {:?} -> {:?}", path, meta);
    Ok(meta)
}

fn captures<'a>(pattern: &str, text: &'a str) -> Option<Captures<'a>> {
    Regex::new(pattern).ok()?.captures(text)
}

fn capture_int<T: std::str::FromStr>(caps: &Captures, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse::<T>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presidential_and_regional_names() {
        let m = parse_election_meta(
            "data/presidentielle/presidentielle-2022-1er_tour.xlsx",
            ElectionType::Presidential,
        )
        .unwrap();
        assert_eq!(m.year, 2022);
        assert_eq!(m.round, Round::First);
        assert_eq!(m.round.ordinal(), "1st");
        assert_eq!(m.sub_unit, None);

        let m = parse_election_meta("regionale-2021-2.csv", ElectionType::Regional).unwrap();
        assert_eq!(m.year, 2021);
        assert_eq!(m.round, Round::Second);
        assert_eq!(m.election_type, ElectionType::Regional);
    }

    #[test]
    fn european_names_have_a_single_round() {
        let m = parse_election_meta("europeenne-2019.xlsx", ElectionType::European).unwrap();
        assert_eq!(m.year, 2019);
        assert_eq!(m.round, Round::First);
        let m = parse_election_meta("europeenne-2024_paris.csv", ElectionType::European).unwrap();
        assert_eq!(m.year, 2024);
        let m = parse_election_meta("europeennes-2014.csv", ElectionType::European).unwrap();
        assert_eq!(m.year, 2014);
    }

    #[test]
    fn round_directories() {
        let m = parse_election_meta(
            "legislative/2022-02/resultats_Circ_07.xlsx",
            ElectionType::Legislative,
        )
        .unwrap();
        assert_eq!(m.year, 2022);
        assert_eq!(m.round, Round::Second);
        assert_eq!(m.sub_unit, Some(SubUnit::Constituency(7)));

        let m = parse_election_meta(
            "municipale/2020-01/Ardt_18.csv",
            ElectionType::Municipal,
        )
        .unwrap();
        assert_eq!(m.sub_unit, Some(SubUnit::District(18)));
        assert_eq!(m.sub_unit.unwrap().code(), "Ardt_18");
    }

    #[test]
    fn malformed_names_are_rejected() {
        let cases = [
            ("presidentielle-22-1.xlsx", ElectionType::Presidential),
            ("presidentielle-2022-3.xlsx", ElectionType::Presidential),
            ("europeenne.xlsx", ElectionType::European),
            ("legislative/2022/Circ_07.xlsx", ElectionType::Legislative),
            ("legislative/2022-01/resultats.xlsx", ElectionType::Legislative),
            ("municipale/2020-01/Circ_03.csv", ElectionType::Municipal),
            ("europeenne-2019-1.xlsx", ElectionType::Presidential),
            ("presidentielle-2022-1.xlsx", ElectionType::Regional),
            ("presidentielle-2019.xlsx", ElectionType::European),
        ];
        for (path, t) in cases {
            match parse_election_meta(path, t) {
                Err(AnalysisError::MetadataParse { path: p }) => assert_eq!(p, path),
                x => panic!("expected a metadata error for {}, got {:?}", path, x),
            }
        }
    }
}
