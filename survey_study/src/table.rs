use std::collections::HashSet;

use log::{debug, warn};
use serde::Serialize;

use crate::config::{StudyErrors, Value};
use crate::mapping::rename_header;

/// A rectangular block of cells with named columns.
///
/// All the rows have exactly as many cells as there are columns.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Builds a table, squaring ragged input.
    ///
    /// Short rows are padded with empty cells. Blank header cells, and cells
    /// beyond the end of the header, get an `Unnamed: <index>` column name.
    /// A repeated header gets a `.1`, `.2`, ... suffix, so that every column
    /// keeps its own name.
    pub fn new(header: Vec<String>, rows: Vec<Vec<Value>>) -> Table {
        let width = rows.iter().map(|r| r.len()).fold(header.len(), usize::max);
        if width > header.len() {
            warn!(
                "Table::new: some rows have {} cells but the header only has {} columns",
                width,
                header.len()
            );
        }
        let mut columns: Vec<String> = Vec::with_capacity(width);
        for idx in 0..width {
            match header.get(idx) {
                Some(h) if !h.trim().is_empty() => columns.push(h.clone()),
                _ => columns.push(format!("Unnamed: {}", idx)),
            }
        }
        let columns = dedup_columns(columns);
        let rows: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Value::Empty);
                r
            })
            .collect();
        debug!(
            "Table::new: {} columns, {} rows",
            columns.len(),
            rows.len()
        );
        Table { columns, rows }
    }

    /// Builds a table out of rows of text, the first one being the header.
    pub fn from_string_rows(values: &[Vec<String>]) -> Result<Table, StudyErrors> {
        let (header, data) = values.split_first().ok_or(StudyErrors::MissingHeader)?;
        let rows: Vec<Vec<Value>> = data
            .iter()
            .map(|r| r.iter().map(|s| Value::from_text(s)).collect())
            .collect();
        Ok(Table::new(header.clone(), rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All the cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// The same table, with the question headers replaced by their canonical names.
    pub fn renamed(&self) -> Table {
        Table {
            columns: self.columns.iter().map(|c| rename_header(c)).collect(),
            rows: self.rows.clone(),
        }
    }
}

fn dedup_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(columns.len());
    let mut res: Vec<String> = Vec::with_capacity(columns.len());
    for c in columns {
        let mut name = c.clone();
        let mut k = 0;
        while seen.contains(&name) {
            k += 1;
            name = format!("{}.{}", c, k);
        }
        if k > 0 {
            warn!("Table::new: repeated column {:?} renamed to {:?}", c, name);
        }
        seen.insert(name.clone());
        res.push(name);
    }
    res
}
