use crate::study::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "studyName")]
    pub study_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    #[serde(rename = "electionType")]
    pub election_type: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// xlsx, csv or auto (from the extension of the file).
    pub provider: Option<String>,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
    #[serde(rename = "csvDelimiter")]
    pub csv_delimiter: Option<String>,
}

impl FileSource {
    pub fn election_type(&self) -> StudyResult<ElectionType> {
        parse_election_type(&self.election_type)
    }

    pub fn provider(&self) -> StudyResult<Provider> {
        match self.provider.as_deref().unwrap_or("auto") {
            "xlsx" | "excel" => Ok(Provider::Excel),
            "csv" => Ok(Provider::Csv),
            "auto" => {
                let ext = Path::new(&self.file_path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase());
                match ext.as_deref() {
                    Some("csv") | Some("txt") => Ok(Provider::Csv),
                    _ => Ok(Provider::Excel),
                }
            }
            x => UnknownProviderSnafu {
                provider: x.to_string(),
            }
            .fail(),
        }
    }

    pub fn csv_delimiter(&self) -> StudyResult<u8> {
        match self.csv_delimiter.as_deref() {
            None => Ok(b','),
            Some("\\t") | Some("tab") => Ok(b'\t'),
            Some(s) if s.len() == 1 => Ok(s.as_bytes()[0]),
            Some(s) => whatever!("csvDelimiter must be a single character, got {:?}", s),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    Excel,
    Csv,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisConfig {
    #[serde(rename = "clusterCount")]
    pub cluster_count: Option<usize>,
    #[serde(rename = "retainedComponents")]
    pub retained_components: Option<usize>,
    #[serde(rename = "minRows")]
    pub min_rows: Option<usize>,
    #[serde(rename = "minColumns")]
    pub min_columns: Option<usize>,
    #[serde(rename = "scaleColumns")]
    pub scale_columns: Option<bool>,
    #[serde(rename = "alignSigns")]
    pub align_signs: Option<bool>,
    #[serde(rename = "sortShifts")]
    pub sort_shifts: Option<bool>,
}

impl AnalysisConfig {
    pub fn settings(&self) -> StudyResult<AnalysisSettings> {
        let d = AnalysisSettings::DEFAULT;
        let res = AnalysisSettings {
            cluster_count: self.cluster_count.unwrap_or(d.cluster_count),
            retained_components: self.retained_components.unwrap_or(d.retained_components),
            min_rows: self.min_rows.unwrap_or(d.min_rows),
            min_columns: self.min_columns.unwrap_or(d.min_columns),
            scale_columns: self.scale_columns.unwrap_or(d.scale_columns),
        };
        if res.cluster_count == 0 {
            whatever!("clusterCount must be at least 1");
        }
        if res.retained_components == 0 {
            whatever!("retainedComponents must be at least 1");
        }
        Ok(res)
    }

    pub fn shift_options(&self) -> ShiftOptions {
        ShiftOptions {
            align_signs: self.align_signs.unwrap_or(ShiftOptions::DEFAULT.align_signs),
        }
    }
}

/// Replaces parts of the default normalization policy of an election type.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(rename = "electionType")]
    pub election_type: String,
    #[serde(rename = "idColumn")]
    pub id_column: Option<String>,
    #[serde(rename = "groupColumns")]
    pub group_columns: Option<Vec<String>>,
    #[serde(rename = "excludedPrefixes")]
    pub excluded_prefixes: Option<Vec<String>>,
    #[serde(rename = "excludedColumns")]
    pub excluded_columns: Option<Vec<String>>,
}

impl PolicyConfig {
    pub fn policy(&self) -> StudyResult<(ElectionType, NormalizationPolicy)> {
        let et = parse_election_type(&self.election_type)?;
        let d = NormalizationPolicy::for_election(et);
        let policy = NormalizationPolicy {
            id_column: self.id_column.clone().unwrap_or(d.id_column),
            group_columns: self.group_columns.clone().unwrap_or(d.group_columns),
            excluded_prefixes: self.excluded_prefixes.clone().unwrap_or(d.excluded_prefixes),
            excluded_columns: self.excluded_columns.clone().unwrap_or(d.excluded_columns),
        };
        Ok((et, policy))
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub earlier: String,
    pub later: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub sources: Vec<FileSource>,
    pub analysis: Option<AnalysisConfig>,
    pub policies: Option<Vec<PolicyConfig>>,
    #[serde(rename = "shiftPairs")]
    pub shift_pairs: Option<Vec<PairConfig>>,
    #[serde(rename = "ccaPairs")]
    pub cca_pairs: Option<Vec<PairConfig>>,
}

pub fn parse_election_type(tag: &str) -> StudyResult<ElectionType> {
    ElectionType::from_tag(tag).context(UnknownElectionTypeSnafu {
        tag: tag.to_string(),
    })
}

pub fn read_study_config(path: &str) -> StudyResult<StudyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: StudyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_summary(path: &str) -> StudyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
