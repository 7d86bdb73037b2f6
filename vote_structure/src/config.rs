// ********* Election metadata ***********

use snafu::Snafu;
use std::fmt::Display;

/// The five families of elections covered by the harmonization.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum ElectionType {
    Presidential,
    Legislative,
    Regional,
    European,
    Municipal,
}

impl ElectionType {
    pub const ALL: [ElectionType; 5] = [
        ElectionType::Presidential,
        ElectionType::Legislative,
        ElectionType::Regional,
        ElectionType::European,
        ElectionType::Municipal,
    ];

    /// The tag used in file names and in output directories.
    pub fn tag(&self) -> &'static str {
        match self {
            ElectionType::Presidential => "presidentielle",
            ElectionType::Legislative => "legislative",
            ElectionType::Regional => "regionale",
            ElectionType::European => "europeenne",
            ElectionType::Municipal => "municipale",
        }
    }

    /// Accepts the tags, their plural forms and the english names.
    pub fn from_tag(s: &str) -> Option<ElectionType> {
        let lowered = s.trim().to_lowercase();
        let singular = lowered.strip_suffix('s').unwrap_or(lowered.as_str());
        ElectionType::ALL.iter().cloned().find(|t| {
            t.tag() == singular || format!("{:?}", t).to_lowercase() == lowered
        })
    }
}

impl Display for ElectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Round {
    First,
    Second,
}

impl Round {
    pub fn from_number(n: u32) -> Option<Round> {
        match n {
            1 => Some(Round::First),
            2 => Some(Round::Second),
            _ => None,
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            Round::First => 1,
            Round::Second => 2,
        }
    }

    /// Label used in artifact names.
    pub fn label(&self) -> &'static str {
        match self {
            Round::First => "1er",
            Round::Second => "2eme",
        }
    }

    pub fn ordinal(&self) -> &'static str {
        match self {
            Round::First => "1st",
            Round::Second => "2nd",
        }
    }
}

/// The sub-unit held by a single legislative or municipal input.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum SubUnit {
    Constituency(u32),
    District(u32),
}

impl SubUnit {
    /// `Circ_03` or `Ardt_12`
    pub fn code(&self) -> String {
        match self {
            SubUnit::Constituency(n) => format!("Circ_{:02}", n),
            SubUnit::District(n) => format!("Ardt_{:02}", n),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ElectionMeta {
    pub election_type: ElectionType,
    pub year: u16,
    pub round: Round,
    pub sub_unit: Option<SubUnit>,
}

impl ElectionMeta {
    /// The round directory, for example `2022-01`.
    pub fn period(&self) -> String {
        format!("{}-{:02}", self.year, self.round.number())
    }
}

// ********* Stations **********

/// Canonical polling station identifier, `<arrondissement>-<sequence>`.
///
/// Invariant: never empty.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct StationId(String);

impl StationId {
    /// Canonicalizes a raw identifier. Purely numeric components lose their
    /// leading zeros (`018-03` becomes `18-3`), anything else is only trimmed.
    pub fn new(raw: &str) -> Option<StationId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let parts: Vec<&str> = trimmed.split('-').collect();
        let numeric: Option<Vec<u64>> = parts
            .iter()
            .map(|p| {
                if !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) {
                    p.parse::<u64>().ok()
                } else {
                    None
                }
            })
            .collect();
        match numeric {
            Some(nums) if nums.len() == 2 => Some(StationId(format!("{}-{}", nums[0], nums[1]))),
            _ => Some(StationId(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The leading integer component, if there is one.
    pub fn arrondissement(&self) -> Option<u32> {
        let head: String = self.0.chars().take_while(|c| c.is_ascii_digit()).collect();
        if head.is_empty() {
            return None;
        }
        match self.0[head.len()..].chars().next() {
            None | Some('-') => head.parse::<u32>().ok(),
            Some(_) => None,
        }
    }
}

impl Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ********* Configuration **********

/// How a raw table of one election type is reduced to identifiers, grouping
/// keys and vote counts. Column names are compared after harmonization.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NormalizationPolicy {
    pub id_column: String,
    pub group_columns: Vec<String>,
    /// Columns starting with one of these prefixes are never vote counts.
    pub excluded_prefixes: Vec<String>,
    pub excluded_columns: Vec<String>,
}

impl NormalizationPolicy {
    pub fn for_election(election_type: ElectionType) -> NormalizationPolicy {
        fn to_strings(v: &[&str]) -> Vec<String> {
            v.iter().map(|s| s.to_string()).collect()
        }
        // Vote-status counters are named inconsistently across sources: they go in every case.
        let status_columns = [
            "blancs",
            "nuls",
            "exprimes",
            "abstentions",
            "votants",
            "inscrits",
        ];
        let (group_columns, excluded_prefixes, mut excluded_columns) = match election_type {
            ElectionType::Presidential | ElectionType::Legislative => (
                to_strings(&["num_circ"]),
                to_strings(&["nb_", "num_", "geo_"]),
                to_strings(&status_columns),
            ),
            ElectionType::Regional | ElectionType::European => (
                to_strings(&["num_circ"]),
                to_strings(&["nb_", "num_", "geo_", "st_"]),
                to_strings(&status_columns),
            ),
            ElectionType::Municipal => (
                to_strings(&["num_arrond"]),
                to_strings(&["nb_", "num_", "geo_", "st_"]),
                to_strings(&status_columns),
            ),
        };
        if !matches!(
            election_type,
            ElectionType::Presidential | ElectionType::Legislative
        ) {
            excluded_columns.push("objectid".to_string());
        }
        NormalizationPolicy {
            id_column: "id_bvote".to_string(),
            group_columns,
            excluded_prefixes,
            excluded_columns,
        }
    }
}

/// The constants of the structural analysis.
#[derive(PartialEq, Debug, Clone)]
pub struct AnalysisSettings {
    /// Number of groups the Ward dendrogram is cut into.
    pub cluster_count: usize,
    /// Leading components used by the clustering and the shift analysis.
    pub retained_components: usize,
    pub min_rows: usize,
    pub min_columns: usize,
    /// Divide each centered column by its standard deviation before the decomposition.
    pub scale_columns: bool,
}

impl AnalysisSettings {
    pub const DEFAULT: AnalysisSettings = AnalysisSettings {
        cluster_count: 4,
        retained_components: 2,
        min_rows: 3,
        min_columns: 2,
        scale_columns: true,
    };
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings::DEFAULT
    }
}

// ********* Errors **********

/// Errors that stop the processing of one unit (a file, a matrix or a pair of matrices).
///
/// None of them is fatal to a batch: the unit is reported as skipped.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AnalysisError {
    #[snafu(display("Could not read the election metadata from path {path}"))]
    MetadataParse { path: String },

    #[snafu(display("Schema error in {path}: {reason}"))]
    Schema { path: String, reason: String },

    #[snafu(display("Not enough data ({rows} rows, {columns} columns): {reason}"))]
    InsufficientData {
        rows: usize,
        columns: usize,
        reason: String,
    },

    #[snafu(display("Degenerate canonical correlation: {reason}"))]
    DegenerateCca { reason: String },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
