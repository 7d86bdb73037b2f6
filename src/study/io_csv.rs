// Primitives for reading CSV files.

use std::io::Read;

use crate::study::{io_common::text_cell, *};

pub fn read_csv_table(path: &str, delimiter: u8) -> StudyResult<RawTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let table = read_records(rdr, path)?;
    info!(
        "read_csv_table: {}: {} rows",
        simplify_file_name(path),
        table.rows.len()
    );
    Ok(table)
}

/// The first record is the header. Short lines are padded with empty cells and
/// long lines are truncated to the header.
pub fn read_records<R: Read>(rdr: csv::Reader<R>, path: &str) -> StudyResult<RawTable> {
    let mut records = rdr.into_records();
    let header = match records.next() {
        Some(h) => h.context(CsvLineParseSnafu { path, lineno: 1_usize })?,
        None => whatever!("The CSV file {} is empty", path),
    };
    let columns: Vec<String> = header.iter().map(|s| s.trim().to_string()).collect();
    debug!("read_records: header: {:?}", columns);
    let width = columns.len();

    let mut table = RawTable::new(columns);
    for (idx, line_r) in records.enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        if line.iter().all(|s| s.trim().is_empty()) {
            continue;
        }
        if line.len() > width {
            warn!(
                "read_records: {}: line {} has {} fields, {} expected",
                path,
                lineno,
                line.len(),
                width
            );
        }
        let mut cells: Vec<Cell> = line.iter().take(width).map(text_cell).collect();
        cells.resize(width, Cell::Empty);
        table.push_row(cells);
    }
    Ok(table)
}
