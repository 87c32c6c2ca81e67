// Primitives for reading and writing CSV files.

use std::path::Path;

use crate::survey::{io_common::simplify_file_name, *};

/// Reads a csv export of the responses. The first line holds the question text.
pub fn read_csv_table(path: &str) -> SurveyResult<Table> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header: Vec<String> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { lineno: 1_usize })?
            .iter()
            .map(|s| s.to_string())
            .collect(),
        None => return EmptySourceSnafu { path }.fail(),
    };
    debug!("read_csv_table: header: {:?}", header);

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        debug!("read_csv_table: lineno: {:?} row: {:?}", lineno, line);
        rows.push(line.iter().map(Value::from_text).collect());
    }
    info!(
        "read_csv_table: {} rows read from {}",
        rows.len(),
        simplify_file_name(path)
    );
    Ok(Table::new(header, rows))
}

/// Writes the table with its column names as the first line.
pub fn write_table_csv(table: &Table, path: &Path) -> SurveyResult<()> {
    let path_s = path.display().to_string();
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path: &path_s })?;
    wtr.write_record(table.columns())
        .context(CsvWriteSnafu { path: &path_s })?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))
            .context(CsvWriteSnafu { path: &path_s })?;
    }
    wtr.flush().context(WritingOutputSnafu { path: path_s })
}
