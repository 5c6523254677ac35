//! Tabular file readers.
//!
//! Every supported format is flattened into a [`Table`]: a header row and
//! data rows of trimmed strings keyed by normalized column name. Typed
//! parsing happens later, per row, so one bad cell only costs its row.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use tracing::debug;

use crate::error::{Error, Result};

/// One data row, keyed by normalized column name.
pub type Row = BTreeMap<String, String>;

/// A header row plus data rows read from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Where the rows came from, for messages.
    pub source: String,
    /// Normalized column names in file order.
    pub columns: Vec<String>,
    /// Data rows.
    pub rows: Vec<Row>,
    /// 1-based data row number of each entry in `rows`, counted before
    /// blank rows were dropped (the header row is not counted).
    pub row_numbers: Vec<usize>,
}

/// Normalize a column header: trimmed, lowercased, spaces as underscores.
#[must_use]
pub fn normalize_column(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

impl Table {
    /// Build a table from a header row and raw cell rows.
    ///
    /// Short rows are padded with empty cells; rows with nothing but blank
    /// cells are dropped.
    #[must_use]
    pub fn from_cells(source: impl Into<String>, header: &[String], cells: Vec<Vec<String>>) -> Self {
        let columns: Vec<String> = header.iter().map(|h| normalize_column(h)).collect();
        let (row_numbers, rows) = cells
            .into_iter()
            .enumerate()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|(n, cells)| {
                let row = columns
                    .iter()
                    .enumerate()
                    .filter(|(_, column)| !column.is_empty())
                    .map(|(i, column)| {
                        let value = cells.get(i).map_or("", |c| c.trim());
                        (column.clone(), value.to_string())
                    })
                    .collect();
                (n + 1, row)
            })
            .unzip();
        Self {
            source: source.into(),
            columns,
            rows,
            row_numbers,
        }
    }

    /// Data rows paired with their row number in the source file.
    pub fn numbered_rows(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.row_numbers.iter().copied().zip(&self.rows)
    }

    /// Read a CSV stream with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Csv`] if the stream is not valid CSV.
    pub fn from_csv_reader<R: Read>(reader: R, source: impl Into<String>) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let header: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();
        let mut cells = Vec::new();
        for record in csv.records() {
            cells.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self::from_cells(source, &header, cells))
    }

    /// Read a JSON array of objects.
    ///
    /// Columns are the union of object keys in first-seen order. Numbers
    /// and booleans become their text form; `null` becomes an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and [`Error::Validation`]
    /// if the document is not an array of objects.
    pub fn from_json_str(json: &str, source: impl Into<String>) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Array(items) = value else {
            return Err(Error::validation("import", "expected a JSON array of objects"));
        };

        let mut header: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(items.len());
        for item in items {
            let serde_json::Value::Object(map) = item else {
                return Err(Error::validation("import", "expected a JSON array of objects"));
            };
            for key in map.keys() {
                if !header.contains(key) {
                    header.push(key.clone());
                }
            }
            objects.push(map);
        }

        let cells = objects
            .iter()
            .map(|map| {
                header
                    .iter()
                    .map(|key| map.get(key).map(json_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        Ok(Self::from_cells(source, &header, cells))
    }

    /// Whether the table has a column with this (normalized) name.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        let wanted = normalize_column(column);
        self.columns.iter().any(|c| c == &wanted)
    }

    /// All non-blank values of one column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] if the column does not exist.
    pub fn column_values(&self, column: &str) -> Result<Vec<String>> {
        let wanted = normalize_column(column);
        if !self.has_column(&wanted) {
            return Err(Error::MissingColumn {
                column: column.to_string(),
                source_name: self.source.clone(),
            });
        }
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.get(&wanted))
            .filter(|value| !value.is_empty())
            .cloned()
            .collect())
    }
}

/// Read a table from a file, choosing the reader by extension.
///
/// Spreadsheets read `sheet` when given, otherwise the first sheet.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for unknown extensions,
/// [`Error::SheetNotFound`] for a missing sheet, and the reader's own error
/// when the file cannot be parsed.
pub fn read_table(path: &Path, sheet: Option<&str>) -> Result<Table> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let source = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let table = match extension.as_str() {
        "csv" => Table::from_csv_reader(std::fs::File::open(path)?, source)?,
        "json" => Table::from_json_str(&std::fs::read_to_string(path)?, source)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path, sheet, source)?,
        _ => {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    debug!(
        source = %table.source,
        rows = table.rows.len(),
        columns = table.columns.len(),
        "Read table"
    );
    Ok(table)
}

fn read_workbook(path: &Path, sheet: Option<&str>, source: String) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| Error::SheetNotFound {
                sheet: wanted.to_string(),
                path: path.to_path_buf(),
            })?,
        None => names.first().cloned().ok_or_else(|| Error::SheetNotFound {
            sheet: "(first sheet)".to_string(),
            path: path.to_path_buf(),
        })?,
    };

    let range = workbook.worksheet_range(&name)?;
    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(cell_text).collect())
        .unwrap_or_default();
    let cells = rows.map(|cells| cells.iter().map(cell_text).collect()).collect();

    Ok(Table::from_cells(format!("{source} [{name}]"), &header, cells))
}

/// Text form of a spreadsheet cell.
///
/// Whole floats lose their `.0` so numeric phone numbers and counts read
/// back as typed; date cells become `YYYY-MM-DD`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map_or_else(|| cell.to_string(), |d| d.format("%Y-%m-%d").to_string()),
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u.to_string()
            } else if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                n.as_f64().map_or_else(|| n.to_string(), float_text)
            }
        }
        other => other.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
