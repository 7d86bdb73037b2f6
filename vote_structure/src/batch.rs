// Partial-success processing of a set of raw inputs.
//
// Every input is built and analyzed on its own. A failure only removes the unit
// concerned (and the pairs that depend on it) from the report.

use log::{info, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::artifacts::{
    cca_artifacts, cluster_artifact, matrix_artifact, pca_artifacts, shift_artifact,
    ArtifactWriter,
};
use crate::builder::VoteMatrixBuilder;
use crate::cca::{run_cca, CcaResult};
use crate::clustering::{cluster_stations, ClusterAssignment};
use crate::config::*;
use crate::matrix::VoteMatrix;
use crate::normalize::RawTable;
use crate::pca::{run_pca, PcaResult};
use crate::shift::{compute_shifts, sort_by_magnitude, ShiftOptions, ShiftVector};

/// One table handed over by the caller, with the path it was read from.
#[derive(PartialEq, Debug, Clone)]
pub struct RawInput {
    pub path: String,
    pub election_type: ElectionType,
    pub table: RawTable,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SkippedUnit {
    /// A path, a matrix qualified name or a pair of them.
    pub unit: String,
    pub reason: String,
}

/// Two matrices named by their qualified name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PairRequest {
    pub earlier: String,
    pub later: String,
}

impl PairRequest {
    pub fn unit_name(&self) -> String {
        format!("{} vs {}", self.earlier, self.later)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    /// Overrides of the default policy of an election type.
    pub policies: HashMap<ElectionType, NormalizationPolicy>,
    pub settings: AnalysisSettings,
    pub shift_pairs: Vec<PairRequest>,
    pub cca_pairs: Vec<PairRequest>,
    pub shift_options: ShiftOptions,
    /// Largest displacements first in the shift outputs.
    pub sort_shifts: bool,
}

#[derive(PartialEq, Debug, Clone)]
pub struct MatrixAnalysis {
    pub name: String,
    pub pca: PcaResult,
    pub clusters: ClusterAssignment,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ShiftOutcome {
    pub pair: PairRequest,
    pub shifts: Vec<ShiftVector>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CcaOutcome {
    pub pair: PairRequest,
    pub result: CcaResult,
}

/// Everything a batch produced. The finished sets may be strict subsets of the
/// inputs; `skipped` says which units are missing and why.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct BatchReport {
    pub matrices: Vec<VoteMatrix>,
    pub analyses: Vec<MatrixAnalysis>,
    pub shifts: Vec<ShiftOutcome>,
    pub ccas: Vec<CcaOutcome>,
    pub skipped: Vec<SkippedUnit>,
}

impl BatchReport {
    pub fn matrix(&self, name: &str) -> Option<&VoteMatrix> {
        self.matrices.iter().find(|m| m.qualified_name() == name)
    }

    pub fn analysis(&self, name: &str) -> Option<&MatrixAnalysis> {
        self.analyses.iter().find(|a| a.name == name)
    }
}

fn skip(unit: String, reason: String) -> SkippedUnit {
    warn!("skipping {}: {}", unit, reason);
    SkippedUnit { unit, reason }
}

/// Builds one matrix per input, in parallel. Results keep the input order.
///
/// Two inputs that map to the same qualified name cannot both be kept: the first
/// one wins.
pub fn build_matrices(
    inputs: &[RawInput],
    policies: &HashMap<ElectionType, NormalizationPolicy>,
) -> (Vec<VoteMatrix>, Vec<SkippedUnit>) {
    let built: Vec<(String, AnalysisResult<VoteMatrix>)> = inputs
        .par_iter()
        .map(|input| {
            let builder = VoteMatrixBuilder::new(input.election_type);
            let builder = match policies.get(&input.election_type) {
                Some(p) => builder.policy(p.clone()),
                None => builder,
            };
            (input.path.clone(), builder.build(&input.path, &input.table))
        })
        .collect();

    let mut names: HashSet<String> = HashSet::new();
    let mut matrices: Vec<VoteMatrix> = Vec::new();
    let mut skipped: Vec<SkippedUnit> = Vec::new();
    for (path, res) in built {
        match res {
            Ok(m) => {
                let name = m.qualified_name();
                if names.insert(name.clone()) {
                    matrices.push(m);
                } else {
                    skipped.push(skip(path, format!("{} was already built", name)));
                }
            }
            Err(e) => skipped.push(skip(path, e.to_string())),
        }
    }
    info!(
        "build_matrices: {} matrices, {} inputs skipped",
        matrices.len(),
        skipped.len()
    );
    (matrices, skipped)
}

/// PCA then clustering of every matrix, in parallel.
pub fn analyze_matrices(
    matrices: &[VoteMatrix],
    settings: &AnalysisSettings,
) -> (Vec<MatrixAnalysis>, Vec<SkippedUnit>) {
    let results: Vec<(String, AnalysisResult<PcaResult>)> = matrices
        .par_iter()
        .map(|m| (m.qualified_name(), run_pca(m, settings)))
        .collect();

    let mut analyses: Vec<MatrixAnalysis> = Vec::new();
    let mut skipped: Vec<SkippedUnit> = Vec::new();
    for (name, res) in results {
        match res {
            Ok(pca) => {
                let clusters = cluster_stations(&pca, settings);
                analyses.push(MatrixAnalysis {
                    name,
                    pca,
                    clusters,
                });
            }
            Err(e) => skipped.push(skip(name, e.to_string())),
        }
    }
    (analyses, skipped)
}

pub fn run_shift_pairs(
    matrices: &[VoteMatrix],
    analyses: &[MatrixAnalysis],
    pairs: &[PairRequest],
    options: &ShiftOptions,
    sort: bool,
) -> (Vec<ShiftOutcome>, Vec<SkippedUnit>) {
    let types: HashMap<String, ElectionType> = matrices
        .iter()
        .map(|m| (m.qualified_name(), m.meta.election_type))
        .collect();
    let by_name: HashMap<&str, &MatrixAnalysis> =
        analyses.iter().map(|a| (a.name.as_str(), a)).collect();

    let mut outcomes: Vec<ShiftOutcome> = Vec::new();
    let mut skipped: Vec<SkippedUnit> = Vec::new();
    for pair in pairs.iter() {
        let (earlier, later) = match (
            by_name.get(pair.earlier.as_str()),
            by_name.get(pair.later.as_str()),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                skipped.push(skip(
                    pair.unit_name(),
                    "one of the matrices has no principal components".to_string(),
                ));
                continue;
            }
        };
        if types.get(&pair.earlier) != types.get(&pair.later) {
            skipped.push(skip(
                pair.unit_name(),
                "shifts compare two elections of the same type".to_string(),
            ));
            continue;
        }
        let mut shifts = compute_shifts(&earlier.pca, &later.pca, options);
        if sort {
            sort_by_magnitude(&mut shifts);
        }
        outcomes.push(ShiftOutcome {
            pair: pair.clone(),
            shifts,
        });
    }
    (outcomes, skipped)
}

pub fn run_cca_pairs(
    matrices: &[VoteMatrix],
    pairs: &[PairRequest],
) -> (Vec<CcaOutcome>, Vec<SkippedUnit>) {
    let by_name: HashMap<String, &VoteMatrix> =
        matrices.iter().map(|m| (m.qualified_name(), m)).collect();

    let results: Vec<(&PairRequest, Result<CcaResult, String>)> = pairs
        .par_iter()
        .map(|pair| {
            let res = match (by_name.get(&pair.earlier), by_name.get(&pair.later)) {
                (Some(x), Some(y)) => run_cca(x, y).map_err(|e| e.to_string()),
                _ => Err("one of the matrices was not built".to_string()),
            };
            (pair, res)
        })
        .collect();

    let mut outcomes: Vec<CcaOutcome> = Vec::new();
    let mut skipped: Vec<SkippedUnit> = Vec::new();
    for (pair, res) in results {
        match res {
            Ok(result) => outcomes.push(CcaOutcome {
                pair: pair.clone(),
                result,
            }),
            Err(reason) => skipped.push(skip(pair.unit_name(), reason)),
        }
    }
    (outcomes, skipped)
}

/// The whole pipeline: matrices, per-matrix analyses, then the requested pairs.
pub fn run_batch(inputs: &[RawInput], plan: &BatchPlan) -> BatchReport {
    info!("run_batch: {} inputs", inputs.len());
    let (matrices, mut skipped) = build_matrices(inputs, &plan.policies);
    let (analyses, analysis_skips) = analyze_matrices(&matrices, &plan.settings);
    skipped.extend(analysis_skips);
    let (shifts, shift_skips) = run_shift_pairs(
        &matrices,
        &analyses,
        &plan.shift_pairs,
        &plan.shift_options,
        plan.sort_shifts,
    );
    skipped.extend(shift_skips);
    let (ccas, cca_skips) = run_cca_pairs(&matrices, &plan.cca_pairs);
    skipped.extend(cca_skips);
    info!(
        "run_batch: {} matrices, {} analyses, {} shifts, {} cca, {} skipped",
        matrices.len(),
        analyses.len(),
        shifts.len(),
        ccas.len(),
        skipped.len()
    );
    BatchReport {
        matrices,
        analyses,
        shifts,
        ccas,
        skipped,
    }
}

/// Hands every artifact of the report to the writer. Returns how many were written.
pub fn write_report<W: ArtifactWriter>(
    report: &BatchReport,
    writer: &mut W,
) -> Result<usize, W::Error> {
    let mut count = 0;
    for m in report.matrices.iter() {
        writer.write(&matrix_artifact(m))?;
        count += 1;
    }
    for a in report.analyses.iter() {
        if let Some(m) = report.matrix(&a.name) {
            for artifact in pca_artifacts(m, &a.pca).iter() {
                writer.write(artifact)?;
                count += 1;
            }
            writer.write(&cluster_artifact(m, &a.clusters))?;
            count += 1;
        }
    }
    for s in report.shifts.iter() {
        if let (Some(a), Some(b)) = (report.matrix(&s.pair.earlier), report.matrix(&s.pair.later)) {
            writer.write(&shift_artifact(a, b, &s.shifts))?;
            count += 1;
        }
    }
    for c in report.ccas.iter() {
        if let (Some(x), Some(y)) = (report.matrix(&c.pair.earlier), report.matrix(&c.pair.later)) {
            for artifact in cca_artifacts(x, y, &c.result).iter() {
                writer.write(artifact)?;
                count += 1;
            }
        }
    }
    Ok(count)
}
