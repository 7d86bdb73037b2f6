// Spreadsheets (xlsx, xls, ods) through calamine.

use calamine::{open_workbook_auto, DataType, Reader};

use crate::study::*;

/// The first row of the worksheet is the header. Rows with no value at all are dropped.
pub fn read_excel_table(path: &str, worksheet_name: Option<&str>) -> StudyResult<RawTable> {
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook = open_workbook_auto(path).context(OpeningExcelSnafu { path })?;

    let wrange = match worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu { path })?;
    let columns: Vec<String> = header.iter().map(|c| read_cell(c).render()).collect();
    debug!("read_excel_table: header: {:?}", columns);

    let mut table = RawTable::new(columns);
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(read_cell).collect();
        if cells.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        table.push_row(cells);
    }
    info!(
        "read_excel_table: {}: {} rows",
        simplify_file_name(path),
        table.rows.len()
    );
    Ok(table)
}

pub fn read_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Float(f) => Cell::Number(*f),
        DataType::String(s) if s.trim().is_empty() => Cell::Empty,
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        DataType::Empty => Cell::Empty,
        other => {
            debug!("read_cell: unsupported cell {:?}", other);
            Cell::Empty
        }
    }
}
