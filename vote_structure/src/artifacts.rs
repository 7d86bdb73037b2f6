// Named result tables. The pipeline never decides where they are stored: a
// writer is handed in by the caller.

use std::convert::Infallible;

use crate::cca::CcaResult;
use crate::clustering::ClusterAssignment;
use crate::matrix::VoteMatrix;
use crate::normalize::format_number;
use crate::pca::PcaResult;
use crate::shift::ShiftVector;

/// Where an artifact belongs: nested groups, then a base name (no extension).
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct ArtifactKey {
    pub segments: Vec<String>,
    pub name: String,
}

impl ArtifactKey {
    pub fn qualified_name(&self) -> String {
        let mut parts = self.segments.clone();
        parts.push(self.name.clone());
        parts.join("/")
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ArtifactTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Artifact {
    pub key: ArtifactKey,
    pub table: ArtifactTable,
}

pub trait ArtifactWriter {
    type Error;

    fn write(&mut self, artifact: &Artifact) -> Result<(), Self::Error>;
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    pub artifacts: Vec<Artifact>,
}

impl MemoryWriter {
    pub fn get(&self, qualified_name: &str) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|a| a.key.qualified_name() == qualified_name)
    }
}

impl ArtifactWriter for MemoryWriter {
    type Error = Infallible;

    fn write(&mut self, artifact: &Artifact) -> Result<(), Infallible> {
        self.artifacts.push(artifact.clone());
        Ok(())
    }
}

fn score(v: f64) -> String {
    format!("{:.6}", v)
}

fn analysis_key(matrix: &VoteMatrix, suffix: &str) -> ArtifactKey {
    let mut segments = vec![
        matrix.meta.election_type.tag().to_string(),
        "analysis".to_string(),
    ];
    if matrix.meta.sub_unit.is_some() {
        segments.push(matrix.meta.period());
    }
    ArtifactKey {
        segments,
        name: format!("{}_{}", matrix.base_name(), suffix),
    }
}

// `presidentielle_2017_1er`
fn pair_label(matrix: &VoteMatrix) -> String {
    format!("{}_{}", matrix.meta.election_type.tag(), matrix.label())
}

fn component_header(first: &str, n: usize) -> Vec<String> {
    let mut header = vec![first.to_string()];
    header.extend((1..=n).map(|c| format!("dim_{}", c)));
    header
}

/// The canonical matrix: identifier, grouping keys, arrondissement, region group, then candidates.
pub fn matrix_artifact(matrix: &VoteMatrix) -> Artifact {
    let mut header = vec![matrix.id_column.clone()];
    header.extend(matrix.group_columns.iter().cloned());
    header.push("arrondissement".to_string());
    header.push("region_group".to_string());
    header.extend(matrix.candidates.iter().cloned());

    let rows = matrix
        .rows
        .iter()
        .map(|r| {
            let mut row = vec![r.station.to_string()];
            row.extend(r.groups.iter().cloned());
            row.push(r.arrondissement.map(|a| a.to_string()).unwrap_or_default());
            row.push(r.region.to_string());
            row.extend(r.votes.iter().map(|v| format_number(*v)));
            row
        })
        .collect();
    Artifact {
        key: matrix.artifact_key(),
        table: ArtifactTable { header, rows },
    }
}

/// Variance report, station coordinates and candidate contributions.
pub fn pca_artifacts(matrix: &VoteMatrix, pca: &PcaResult) -> Vec<Artifact> {
    let k = pca.num_components();
    let variance = ArtifactTable {
        header: vec![
            "component".to_string(),
            "eigenvalue".to_string(),
            "explained_variance".to_string(),
            "cumulative_variance".to_string(),
        ],
        rows: pca
            .explained_variance
            .iter()
            .enumerate()
            .scan(0.0, |cumulative, (c, ratio)| {
                *cumulative += ratio;
                Some(vec![
                    format!("dim_{}", c + 1),
                    score(pca.eigenvalues[c]),
                    score(*ratio),
                    score(*cumulative),
                ])
            })
            .collect(),
    };
    let coordinates = ArtifactTable {
        header: component_header("id_bvote", k),
        rows: pca
            .stations
            .iter()
            .zip(pca.coordinates.iter())
            .map(|(s, coords)| {
                let mut row = vec![s.to_string()];
                row.extend(coords.iter().map(|v| score(*v)));
                row
            })
            .collect(),
    };
    let contributions = ArtifactTable {
        header: component_header("candidate", k),
        rows: pca
            .variables
            .iter()
            .zip(pca.contributions.iter())
            .map(|(name, contribs)| {
                let mut row = vec![name.clone()];
                row.extend(contribs.iter().map(|v| score(*v)));
                row
            })
            .collect(),
    };
    vec![
        Artifact {
            key: analysis_key(matrix, "variance"),
            table: variance,
        },
        Artifact {
            key: analysis_key(matrix, "coordinates"),
            table: coordinates,
        },
        Artifact {
            key: analysis_key(matrix, "contributions"),
            table: contributions,
        },
    ]
}

pub fn cluster_artifact(matrix: &VoteMatrix, clusters: &ClusterAssignment) -> Artifact {
    let regions: std::collections::HashMap<_, _> = matrix
        .rows
        .iter()
        .map(|r| (&r.station, r.region))
        .collect();
    let rows = clusters
        .stations
        .iter()
        .zip(clusters.labels.iter())
        .map(|(s, l)| {
            vec![
                s.to_string(),
                l.to_string(),
                regions
                    .get(s)
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    Artifact {
        key: analysis_key(matrix, "clusters"),
        table: ArtifactTable {
            header: vec![
                "id_bvote".to_string(),
                "cluster".to_string(),
                "region_group".to_string(),
            ],
            rows,
        },
    }
}

pub fn shift_artifact(earlier: &VoteMatrix, later: &VoteMatrix, shifts: &[ShiftVector]) -> Artifact {
    let rows = shifts
        .iter()
        .map(|s| {
            vec![
                s.station.to_string(),
                score(s.delta_1),
                score(s.delta_2),
                score(s.magnitude),
            ]
        })
        .collect();
    Artifact {
        key: ArtifactKey {
            segments: vec![
                earlier.meta.election_type.tag().to_string(),
                "analysis".to_string(),
                "shift".to_string(),
            ],
            name: format!("shift_{}_vs_{}", pair_label(earlier), pair_label(later)),
        },
        table: ArtifactTable {
            header: vec![
                "id_bvote".to_string(),
                "delta_dim_1".to_string(),
                "delta_dim_2".to_string(),
                "magnitude".to_string(),
            ],
            rows,
        },
    }
}

/// One table of paired scores per axis, named after its correlation, plus a summary
/// of the correlations and structure loadings.
pub fn cca_artifacts(x: &VoteMatrix, y: &VoteMatrix, cca: &CcaResult) -> Vec<Artifact> {
    let base = format!("cca_{}_vs_{}", pair_label(x), pair_label(y));
    let segments = vec!["cca".to_string()];
    let mut res: Vec<Artifact> = Vec::with_capacity(cca.pairs.len() + 1);
    for p in cca.pairs.iter() {
        let rows = cca
            .stations
            .iter()
            .enumerate()
            .map(|(i, s)| vec![s.to_string(), score(p.x_scores[i]), score(p.y_scores[i])])
            .collect();
        res.push(Artifact {
            key: ArtifactKey {
                segments: segments.clone(),
                name: format!("{}_{}", base, p.tag()),
            },
            table: ArtifactTable {
                header: vec![
                    "id_bvote".to_string(),
                    "x_score".to_string(),
                    "y_score".to_string(),
                ],
                rows,
            },
        });
    }

    let mut summary_rows: Vec<Vec<String>> = Vec::new();
    for p in cca.pairs.iter() {
        summary_rows.push(vec![
            p.axis.to_string(),
            "correlation".to_string(),
            String::new(),
            score(p.correlation),
        ]);
        for (side, structure) in [("x", &p.x_structure), ("y", &p.y_structure)] {
            for (name, r) in structure.iter() {
                summary_rows.push(vec![
                    p.axis.to_string(),
                    format!("{}_structure", side),
                    name.clone(),
                    score(*r),
                ]);
            }
        }
    }
    res.push(Artifact {
        key: ArtifactKey {
            segments,
            name: format!("{}_summary", base),
        },
        table: ArtifactTable {
            header: vec![
                "axis".to_string(),
                "kind".to_string(),
                "variable".to_string(),
                "value".to_string(),
            ],
            rows: summary_rows,
        },
    });
    res
}
