use std::path::{Path, PathBuf};

use vote_structure::Cell;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Paths of the sources are relative to the directory of the study file.
pub fn resolve_path(root: &Path, file_path: &str) -> String {
    let p = Path::new(file_path);
    if p.is_absolute() {
        return file_path.to_string();
    }
    let full: PathBuf = root.join(p);
    full.display().to_string()
}

/// A cell read as text: empty, a number (a decimal comma is accepted) or text.
pub fn text_cell(s: &str) -> Cell {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    let text = Cell::Text(trimmed.to_string());
    match text.as_number() {
        Some(f) => Cell::Number(f),
        None => text,
    }
}
