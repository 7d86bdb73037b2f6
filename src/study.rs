pub mod config_reader;
pub mod io_artifacts;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;

use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use vote_structure::batch::SkippedUnit;
use vote_structure::identifiers::parse_election_meta;
use vote_structure::matrix::matrix_key;
use vote_structure::shift::ShiftOptions;
use vote_structure::*;

use crate::args::Args;
use crate::study::config_reader::*;
use crate::study::io_artifacts::CsvDirectoryWriter;
use crate::study::io_common::{resolve_path, simplify_file_name};
use crate::study::io_csv::read_csv_table;
use crate::study::io_excel::read_excel_table;

#[derive(Debug, Snafu)]
pub enum StudyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("The workbook {path} has no data"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error reading file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing artifact {name}"))]
    WritingArtifact {
        source: std::io::Error,
        name: String,
    },
    #[snafu(display("Error writing CSV artifact {name}"))]
    WritingCsv { source: csv::Error, name: String },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown election type {tag:?}"))]
    UnknownElectionType { tag: String },
    #[snafu(display("Unknown provider {provider:?}"))]
    UnknownProvider { provider: String },
    #[snafu(display("{name} does not name any matrix of the study"))]
    UnknownMatrix { name: String },
    #[snafu(display("{source}"))]
    Analysis { source: AnalysisError },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type StudyResult<T> = Result<T, StudyError>;

fn fmt_score(x: f64) -> String {
    format!("{:.6}", x)
}

fn build_summary_js(study_name: &str, report: &BatchReport) -> JSValue {
    let matrices: Vec<JSValue> = report
        .matrices
        .iter()
        .map(|m| {
            json!({
                "name": m.qualified_name(),
                "stations": m.len(),
                "candidates": m.candidates,
            })
        })
        .collect();

    let mut analyses: Vec<JSValue> = Vec::new();
    for a in report.analyses.iter() {
        let mut composition: Vec<JSValue> = Vec::new();
        if let Some(m) = report.matrix(&a.name) {
            for groups in a.clusters.region_composition(m) {
                let mut js: JSMap<String, JSValue> = JSMap::new();
                for (region, count) in groups {
                    js.insert(region.to_string(), json!(count));
                }
                composition.push(JSValue::Object(js));
            }
        }
        let variance: Vec<String> = a
            .pca
            .explained_variance
            .iter()
            .map(|v| fmt_score(*v))
            .collect();
        analyses.push(json!({
            "name": a.name,
            "explainedVariance": variance,
            "clusterSizes": a.clusters.sizes(),
            "regionComposition": composition,
        }));
    }

    let shifts: Vec<JSValue> = report
        .shifts
        .iter()
        .map(|s| {
            let largest = s.shifts.iter().map(|v| v.magnitude).fold(0.0_f64, f64::max);
            json!({
                "earlier": s.pair.earlier,
                "later": s.pair.later,
                "stations": s.shifts.len(),
                "largestMagnitude": fmt_score(largest),
            })
        })
        .collect();

    let ccas: Vec<JSValue> = report
        .ccas
        .iter()
        .map(|c| {
            let correlations: Vec<String> =
                c.result.correlations().iter().map(|r| fmt_score(*r)).collect();
            json!({
                "earlier": c.pair.earlier,
                "later": c.pair.later,
                "stations": c.result.stations.len(),
                "correlations": correlations,
            })
        })
        .collect();

    let skipped: Vec<JSValue> = report
        .skipped
        .iter()
        .map(|s| json!({"unit": s.unit, "reason": s.reason}))
        .collect();

    json!({
        "config": { "study": study_name },
        "matrices": matrices,
        "analyses": analyses,
        "shifts": shifts,
        "cca": ccas,
        "skipped": skipped,
    })
}

// The study file, or a study of the single --input file.
fn load_study(args: &Args) -> StudyResult<(StudyConfig, PathBuf)> {
    let (mut config, mut root) = match &args.config {
        Some(config_path) => {
            let config = read_study_config(config_path)?;
            let root = Path::new(config_path.as_str())
                .parent()
                .context(MissingParentDirSnafu {})?
                .to_path_buf();
            (config, root)
        }
        None => (
            StudyConfig {
                output_settings: OutputSettings {
                    study_name: String::new(),
                    output_directory: None,
                },
                sources: Vec::new(),
                analysis: None,
                policies: None,
                shift_pairs: None,
                cca_pairs: None,
            },
            PathBuf::new(),
        ),
    };

    if let Some(input) = &args.input {
        let tag = match &args.election_type {
            Some(t) => t.clone(),
            None => whatever!("--election-type is required with --input"),
        };
        let election_type = parse_election_type(&tag)?;
        parse_election_meta(input, election_type).context(AnalysisSnafu {})?;
        if config.output_settings.study_name.is_empty() {
            config.output_settings.study_name = simplify_file_name(input);
        }
        config.sources = vec![FileSource {
            election_type: tag,
            file_path: input.clone(),
            provider: None,
            worksheet_name: args.excel_worksheet_name.clone(),
            csv_delimiter: None,
        }];
        config.shift_pairs = None;
        config.cca_pairs = None;
        root = PathBuf::new();
    }

    if config.sources.is_empty() {
        whatever!("The study has no source");
    }
    Ok((config, root))
}

// The qualified names of the matrices the sources should produce.
fn expected_matrix_names(config: &StudyConfig) -> HashSet<String> {
    config
        .sources
        .iter()
        .filter_map(|s| {
            let election_type = s.election_type().ok()?;
            let meta = parse_election_meta(&s.file_path, election_type).ok()?;
            Some(matrix_key(&meta).qualified_name())
        })
        .collect()
}

fn pair_requests(
    pairs: Option<&[PairConfig]>,
    known: &HashSet<String>,
) -> StudyResult<Vec<PairRequest>> {
    let mut res: Vec<PairRequest> = Vec::new();
    for p in pairs.unwrap_or(&[]) {
        for name in [&p.earlier, &p.later] {
            ensure!(
                known.contains(name.as_str()),
                UnknownMatrixSnafu { name: name.clone() }
            );
        }
        res.push(PairRequest {
            earlier: p.earlier.clone(),
            later: p.later.clone(),
        });
    }
    Ok(res)
}

fn build_plan(config: &StudyConfig) -> StudyResult<BatchPlan> {
    let analysis = config.analysis.clone().unwrap_or_default();
    let mut policies: HashMap<ElectionType, NormalizationPolicy> = HashMap::new();
    for p in config.policies.iter().flatten() {
        let (election_type, policy) = p.policy()?;
        debug!("build_plan: policy for {}: {:?}", election_type, policy);
        policies.insert(election_type, policy);
    }
    let known = expected_matrix_names(config);
    Ok(BatchPlan {
        policies,
        settings: analysis.settings()?,
        shift_pairs: pair_requests(config.shift_pairs.as_deref(), &known)?,
        cca_pairs: pair_requests(config.cca_pairs.as_deref(), &known)?,
        shift_options: analysis.shift_options(),
        sort_shifts: analysis.sort_shifts.unwrap_or(false),
    })
}

// A source that cannot be read is skipped like any other failing unit.
fn read_sources(
    config: &StudyConfig,
    root: &Path,
) -> StudyResult<(Vec<RawInput>, Vec<SkippedUnit>)> {
    let mut inputs: Vec<RawInput> = Vec::new();
    let mut skipped: Vec<SkippedUnit> = Vec::new();
    for source in config.sources.iter() {
        let election_type = source.election_type()?;
        let provider = source.provider()?;
        let delimiter = source.csv_delimiter()?;
        let path = resolve_path(root, &source.file_path);
        info!("Attempting to read file {:?}", path);
        let table = match provider {
            Provider::Excel => read_excel_table(&path, source.worksheet_name.as_deref()),
            Provider::Csv => read_csv_table(&path, delimiter),
        };
        match table {
            Ok(table) => inputs.push(RawInput {
                path,
                election_type,
                table,
            }),
            Err(e) => {
                warn!("read_sources: skipping {}: {}", path, e);
                skipped.push(SkippedUnit {
                    unit: path,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok((inputs, skipped))
}

pub fn run_study(args: &Args) -> StudyResult<JSValue> {
    let (config, root) = load_study(args)?;
    info!("config: {:?}", config);
    let plan = build_plan(&config)?;

    let (inputs, mut skipped) = read_sources(&config, &root)?;
    let mut report = run_batch(&inputs, &plan);
    skipped.append(&mut report.skipped);
    report.skipped = skipped;

    let output_directory: Option<String> = args.output_dir.clone().or_else(|| {
        config
            .output_settings
            .output_directory
            .as_ref()
            .map(|d| resolve_path(&root, d))
    });
    if let Some(dir) = output_directory {
        let mut writer = CsvDirectoryWriter::new(Path::new(&dir));
        let count = write_report(&report, &mut writer)?;
        info!("run_study: {} artifacts written under {}", count, dir);
    }

    let result_js = build_summary_js(&config.output_settings.study_name, &report);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(path) => fs::write(path, &pretty_js_stats).context(WritingSummarySnafu { path })?,
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between computed summary and reference summary")
        }
    }

    Ok(result_js)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snafu::ErrorCompat;

    fn study_dir(name: &str) -> PathBuf {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = std::env::temp_dir().join(format!(
            "voteatlas-study-{}-{}",
            std::process::id(),
            name
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("presidentielle")).unwrap();
        fs::write(
            dir.join("presidentielle").join("presidentielle-2022-1.csv"),
            "ID_BVOTE;Num Circ;Macron;Le Pen;Mélenchon;Nb Exprimés\n\
             1-1;1;120;30;15;165\n\
             1-2;1;80;60;22;162\n\
             2-1;1;10;200;5;215\n\
             5-3;5;55;70;40;165\n\
             12-4;9;90;20;60;170\n",
        )
        .unwrap();
        fs::write(
            dir.join("presidentielle").join("presidentielle-2017-2.csv"),
            "ID_BVOTE;Num Circ;Macron;Le Pen;Mélenchon;Nb Exprimés\n\
             01-01;1;100;40;10;150\n\
             1-2;1;70;65;30;165\n\
             2-1;1;20;180;9;209\n\
             5-3;5;60;60;35;155\n\
             13-1;10;40;40;41;121\n",
        )
        .unwrap();
        fs::write(
            dir.join("presidentielle").join("notes.csv"),
            "ID_BVOTE;Macron\n1-1;3\n",
        )
        .unwrap();
        dir
    }

    fn write_config(dir: &Path, later: &str) -> String {
        let config = json!({
            "outputSettings": { "studyName": "paris", "outputDirectory": "out" },
            "sources": [
                { "electionType": "presidentielle", "filePath": "presidentielle/presidentielle-2022-1.csv", "csvDelimiter": ";" },
                { "electionType": "presidentielle", "filePath": "presidentielle/presidentielle-2017-2.csv", "csvDelimiter": ";" },
                { "electionType": "presidentielle", "filePath": "presidentielle/notes.csv", "csvDelimiter": ";" }
            ],
            "analysis": { "sortShifts": true },
            "shiftPairs": [
                { "earlier": "presidentielle/vote_matrix_2017_2eme", "later": later }
            ],
            "ccaPairs": [
                { "earlier": "presidentielle/vote_matrix_2017_2eme", "later": later }
            ]
        });
        let path = dir.join("study.json");
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        path.display().to_string()
    }

    fn report_error(e: &StudyError) {
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(e) {
            eprintln!("trace: {}", bt);
        }
    }

    #[test]
    fn runs_a_study_end_to_end() {
        let dir = study_dir("end-to-end");
        let config = write_config(&dir, "presidentielle/vote_matrix_2022_1er");
        let args = Args {
            config: Some(config),
            out: Some(dir.join("summary.json").display().to_string()),
            ..Args::default()
        };
        let js = match run_study(&args) {
            Ok(js) => js,
            Err(e) => {
                report_error(&e);
                panic!("the study failed");
            }
        };
        assert_eq!(js["config"]["study"], "paris");
        let matrices = js["matrices"].as_array().unwrap();
        assert_eq!(matrices.len(), 2);
        assert_eq!(matrices[0]["name"], "presidentielle/vote_matrix_2022_1er");
        assert_eq!(
            matrices[0]["candidates"],
            json!(["macron", "le_pen", "melenchon"])
        );
        assert_eq!(js["analyses"].as_array().unwrap().len(), 2);
        assert_eq!(js["shifts"][0]["stations"], 4);
        assert_eq!(js["cca"][0]["stations"], 4);
        let skipped = js["skipped"].as_array().unwrap();
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0]["unit"].as_str().unwrap().ends_with("notes.csv"));

        let out = dir.join("out");
        assert!(out.join("presidentielle").join("vote_matrix_2022_1er.csv").exists());
        assert!(out
            .join("presidentielle")
            .join("analysis")
            .join("vote_matrix_2017_2eme_clusters.csv")
            .exists());
        assert!(out
            .join("cca")
            .join("cca_presidentielle_2017_2eme_vs_presidentielle_2022_1er_summary.csv")
            .exists());
        assert!(dir.join("summary.json").exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn compares_with_a_reference() {
        let dir = study_dir("reference");
        let config = write_config(&dir, "presidentielle/vote_matrix_2022_1er");
        let reference = dir.join("reference.json").display().to_string();
        let args = Args {
            config: Some(config.clone()),
            out: Some(reference.clone()),
            output_dir: Some(dir.join("out").display().to_string()),
            ..Args::default()
        };
        run_study(&args).unwrap();

        let check = Args {
            config: Some(config.clone()),
            reference: Some(reference.clone()),
            out: Some(dir.join("second.json").display().to_string()),
            ..Args::default()
        };
        assert!(run_study(&check).is_ok());

        fs::write(&reference, "{\"config\": {\"study\": \"lyon\"}}").unwrap();
        assert!(matches!(
            run_study(&check),
            Err(StudyError::Whatever { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn pairs_must_name_known_matrices() {
        let dir = study_dir("unknown-pair");
        let config = write_config(&dir, "presidentielle/vote_matrix_2022_2eme");
        let args = Args {
            config: Some(config),
            ..Args::default()
        };
        assert!(matches!(
            run_study(&args),
            Err(StudyError::UnknownMatrix { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn single_inputs_need_an_election_type() {
        let args = Args {
            input: Some("presidentielle-2022-1.csv".to_string()),
            ..Args::default()
        };
        assert!(run_study(&args).is_err());
        let args = Args {
            input: Some("presidentielle.csv".to_string()),
            election_type: Some("presidentielle".to_string()),
            ..Args::default()
        };
        assert!(matches!(
            run_study(&args),
            Err(StudyError::Analysis { .. })
        ));
    }
}
