// Reading the survey out of an Excel export.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::warn;

use crate::survey::{io_common::simplify_file_name, *};

/// Reads a worksheet as a table. The first row holds the question text.
///
/// Without a worksheet name, the first worksheet of the workbook is used.
pub fn read_excel_table(path: &str, worksheet: Option<&str>) -> SurveyResult<Table> {
    let wrange = get_range(path, worksheet)?;

    let mut iter = wrange.rows();
    let header_cells = iter.next().context(EmptySourceSnafu { path })?;
    let header: Vec<String> = header_cells.iter().map(header_name).collect();
    debug!("read_excel_table: header: {:?}", header);

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx, row) in iter.enumerate() {
        debug!("read_excel_table: idx: {:?} row: {:?}", idx, row);
        rows.push(row.iter().map(cell_to_value).collect());
    }
    info!(
        "read_excel_table: {} rows read from {}",
        rows.len(),
        simplify_file_name(path)
    );
    Ok(Table::new(header, rows))
}

fn get_range(path: &str, worksheet: Option<&str>) -> SurveyResult<calamine::Range<DataType>> {
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        path, worksheet
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptySourceSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}

/// The way Google Forms writes the response timestamps, such as `9/15/2021 10:22:33`.
pub const FORMS_DATETIME_FORMAT: &str = "%-m/%-d/%Y %-H:%M:%S";

/// Converts a cell. Dates come out as text in the format of the Forms
/// timestamps, so that a downloaded workbook and the live sheet agree.
pub fn cell_to_value(cell: &DataType) -> Value {
    match cell {
        DataType::Empty => Value::Empty,
        DataType::String(s) => Value::from_text(s),
        DataType::Int(i) => Value::Int(*i),
        DataType::Float(f) => Value::Float(*f),
        DataType::Bool(b) => Value::Bool(*b),
        DataType::DateTime(f) => match cell.as_datetime() {
            Some(dt) => Value::Text(dt.format(FORMS_DATETIME_FORMAT).to_string()),
            None => Value::Float(*f),
        },
        other => {
            warn!("cell_to_value: could not understand cell {:?}", other);
            Value::Empty
        }
    }
}

fn header_name(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        other => cell_to_value(other).to_string(),
    }
}
