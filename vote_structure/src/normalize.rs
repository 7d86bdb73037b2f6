// Reduction of heterogeneous raw tables to identifiers, grouping keys and vote counts.

use log::{debug, warn};
use snafu::prelude::*;
use std::collections::HashSet;

use crate::config::*;

/// One cell of a raw input table, as handed over by the readers.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    /// True for empty cells, blank strings, `NA`/`NaN` markers and non finite numbers.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(f) => !f.is_finite(),
            Cell::Text(s) => {
                let t = s.trim();
                t.is_empty() || t.eq_ignore_ascii_case("na") || t.eq_ignore_ascii_case("nan")
            }
        }
    }

    /// The numeric value of the cell. Text holding a number counts, with either
    /// decimal separator and with blank thousands separators.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(f) if f.is_finite() => Some(*f),
            Cell::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| if c == ',' { '.' } else { c })
                    .collect();
                cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
            }
            _ => None,
        }
    }

    /// The textual content, numbers rendered without a useless fractional part.
    pub fn render(&self) -> String {
        match self {
            Cell::Number(f) => format_number(*f),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// Deterministic rendering: integral values never carry a `.0`.
pub fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// A table as read from storage: a header and rows of cells.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> RawTable {
        RawTable {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Short rows are padded with empty cells.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Empty)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct NormalizedRow {
    pub id: String,
    pub groups: Vec<String>,
    /// Invariant: finite, non-negative.
    pub votes: Vec<f64>,
}

/// The output of the normalization: identifier and grouping keys first, then
/// the vote count block.
#[derive(PartialEq, Debug, Clone)]
pub struct NormalizedTable {
    pub id_column: String,
    pub group_columns: Vec<String>,
    pub vote_columns: Vec<String>,
    pub rows: Vec<NormalizedRow>,
}

impl NormalizedTable {
    pub fn to_raw(&self) -> RawTable {
        let mut columns = vec![self.id_column.clone()];
        columns.extend(self.group_columns.iter().cloned());
        columns.extend(self.vote_columns.iter().cloned());
        let mut table = RawTable::new(columns);
        for r in self.rows.iter() {
            let mut cells = vec![Cell::Text(r.id.clone())];
            cells.extend(r.groups.iter().map(|g| Cell::Text(g.clone())));
            cells.extend(r.votes.iter().map(|v| Cell::Number(*v)));
            table.push_row(cells);
        }
        table
    }
}

/// Harmonizes a column name to lower snake case: camelCase is split, french
/// diacritics are folded and any other character becomes a single `_`.
pub fn harmonize_column_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev: Option<char> = None;
    for c in name.trim().chars() {
        if c.is_uppercase()
            && prev
                .map(|p| p.is_lowercase() || p.is_ascii_digit())
                .unwrap_or(false)
        {
            out.push('_');
        }
        for l in c.to_lowercase() {
            let folded = fold_diacritic(l);
            if folded.is_ascii_alphanumeric() {
                out.push(folded);
            } else {
                out.push('_');
            }
        }
        prev = Some(c);
    }
    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed.trim_matches('_').to_string()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ä' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' => 'i',
        'ô' | 'ö' | 'ó' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ç' => 'c',
        'ÿ' => 'y',
        'ñ' => 'n',
        x => x,
    }
}

/// Harmonizes a whole header. Collisions get a numeric suffix, in order.
pub fn harmonize_columns(columns: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut res: Vec<String> = Vec::with_capacity(columns.len());
    for (idx, c) in columns.iter().enumerate() {
        let base = match harmonize_column_name(c) {
            s if s.is_empty() => format!("column_{}", idx + 1),
            s => s,
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while seen.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        res.push(name);
    }
    res
}

fn is_excluded(name: &str, policy: &NormalizationPolicy) -> bool {
    policy
        .excluded_prefixes
        .iter()
        .any(|p| name.starts_with(harmonize_prefix(p).as_str()))
        || policy
            .excluded_columns
            .iter()
            .any(|c| harmonize_column_name(c) == name)
}

// Prefixes keep their trailing separator: `nb_` must not match `nbre`.
fn harmonize_prefix(prefix: &str) -> String {
    let h = harmonize_column_name(prefix);
    if prefix.trim_end().ends_with(|c: char| !c.is_alphanumeric()) {
        format!("{}_", h)
    } else {
        h
    }
}

/// Normalizes one raw table according to the policy of its election type.
///
/// Only numeric columns survive, minus the administrative ones (identifiers,
/// vote-status counters, geometry). Missing counts become zero. Rows without an
/// identifier are dropped.
pub fn normalize(
    table: &RawTable,
    policy: &NormalizationPolicy,
    path: &str,
) -> AnalysisResult<NormalizedTable> {
    let columns = harmonize_columns(&table.columns);
    debug!("normalize: {:?}: harmonized columns {:?}", path, columns);

    let find = |name: &str| -> AnalysisResult<usize> {
        let target = harmonize_column_name(name);
        columns
            .iter()
            .position(|c| *c == target)
            .context(SchemaSnafu {
                path,
                reason: format!("missing column {}", target),
            })
    };

    let id_idx = find(policy.id_column.as_str())?;
    let mut group_idxs: Vec<usize> = Vec::new();
    for g in policy.group_columns.iter() {
        group_idxs.push(find(g.as_str())?);
    }

    let kept_rows: Vec<usize> = (0..table.rows.len())
        .filter(|r| {
            let missing = table.cell(*r, id_idx).is_missing();
            if missing {
                warn!("normalize: {:?}: dropping row {} without identifier", path, r + 1);
            }
            !missing
        })
        .collect();

    let mut vote_idxs: Vec<usize> = Vec::new();
    for (idx, name) in columns.iter().enumerate() {
        if idx == id_idx || group_idxs.contains(&idx) {
            continue;
        }
        if is_excluded(name, policy) {
            debug!("normalize: {:?}: excluding administrative column {}", path, name);
            continue;
        }
        let present: Vec<&Cell> = kept_rows
            .iter()
            .map(|r| table.cell(*r, idx))
            .filter(|c| !c.is_missing())
            .collect();
        if present.is_empty() {
            debug!("normalize: {:?}: dropping empty column {}", path, name);
            continue;
        }
        let values: Option<Vec<f64>> = present.iter().map(|c| c.as_number()).collect();
        match values {
            None => {
                debug!("normalize: {:?}: dropping non numeric column {}", path, name);
            }
            Some(vs) if vs.iter().any(|v| *v < 0.0) => {
                warn!(
                    "normalize: {:?}: dropping column {} with negative values",
                    path, name
                );
            }
            Some(_) => vote_idxs.push(idx),
        }
    }

    let rows: Vec<NormalizedRow> = kept_rows
        .iter()
        .map(|r| NormalizedRow {
            id: table.cell(*r, id_idx).render(),
            groups: group_idxs
                .iter()
                .map(|g| table.cell(*r, *g).render())
                .collect(),
            votes: vote_idxs
                .iter()
                .map(|v| table.cell(*r, *v).as_number().unwrap_or(0.0))
                .collect(),
        })
        .collect();

    Ok(NormalizedTable {
        id_column: columns[id_idx].clone(),
        group_columns: group_idxs.iter().map(|g| columns[*g].clone()).collect(),
        vote_columns: vote_idxs.iter().map(|v| columns[*v].clone()).collect(),
        rows,
    })
}
