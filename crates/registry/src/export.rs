//! Export of registry tables to CSV, Excel and JSON.
//!
//! Column names match the stored field names, so an exported file can be
//! imported again with the matching row kind.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::records::{Caregiver, Child, Registry};

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// One CSV file per table.
    #[default]
    Csv,
    /// One `.xlsx` workbook with a sheet per table.
    Xlsx,
    /// A single JSON document with both tables.
    Json,
}

/// Sheet holding caregiver rows in workbook exports.
pub const CAREGIVERS_SHEET: &str = "caregivers";

/// Sheet holding child rows in workbook exports.
pub const CHILDREN_SHEET: &str = "children";

/// Which tables to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportTables {
    /// Caregivers and children.
    #[default]
    All,
    /// Caregivers only.
    Caregivers,
    /// Children only.
    Children,
}

impl ExportTables {
    fn caregivers(self) -> bool {
        matches!(self, Self::All | Self::Caregivers)
    }

    fn children(self) -> bool {
        matches!(self, Self::All | Self::Children)
    }
}

#[derive(Serialize)]
struct JsonExport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    caregivers: Option<&'a [Caregiver]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<&'a [Child]>,
}

/// Write rows as CSV with a header row.
///
/// # Errors
///
/// Returns [`Error::Csv`] if writing fails.
pub fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Add a sheet named `name` holding `rows` under the same header as
/// [`write_csv`].
///
/// Every cell is written as text so phone and account numbers keep their
/// leading zeros; empty values are left as blank cells.
///
/// # Errors
///
/// Returns [`Error::Xlsx`] for an invalid sheet name or a failed write.
pub fn add_sheet<T: Serialize>(workbook: &mut Workbook, name: &str, rows: &[T]) -> Result<()> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, rows)?;
    let mut records = csv::Reader::from_reader(buffer.as_slice());

    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    // serializing no rows yields no header either
    if rows.is_empty() {
        return Ok(());
    }
    for (col, header) in records.headers()?.iter().enumerate() {
        sheet.write_string_with_format(0, cell_col(col)?, header, &bold)?;
    }
    for (i, record) in records.records().enumerate() {
        let row = u32::try_from(i + 1)
            .map_err(|_| Error::internal(format!("sheet '{name}' has too many rows")))?;
        for (col, value) in record?.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(row, cell_col(col)?, value)?;
            }
        }
    }
    Ok(())
}

fn cell_col(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| Error::internal("too many columns for a worksheet"))
}

/// Write the selected tables to an `.xlsx` workbook at `path`.
///
/// Caregivers go to the [`CAREGIVERS_SHEET`] sheet and children to
/// [`CHILDREN_SHEET`], so the file can be imported again sheet by sheet.
///
/// # Errors
///
/// Returns [`Error::Xlsx`] if the workbook cannot be built or saved.
pub fn write_xlsx(path: &Path, registry: &Registry, tables: ExportTables) -> Result<()> {
    let mut workbook = Workbook::new();
    if tables.caregivers() {
        add_sheet(&mut workbook, CAREGIVERS_SHEET, &registry.caregivers)?;
    }
    if tables.children() {
        add_sheet(&mut workbook, CHILDREN_SHEET, &registry.children)?;
    }
    workbook.save(path)?;
    Ok(())
}

/// Write the selected tables as one pretty-printed JSON object.
///
/// # Errors
///
/// Returns [`Error::Json`] if writing fails.
pub fn write_json<W: Write>(writer: W, registry: &Registry, tables: ExportTables) -> Result<()> {
    let export = JsonExport {
        caregivers: tables.caregivers().then_some(registry.caregivers.as_slice()),
        children: tables.children().then_some(registry.children.as_slice()),
    };
    serde_json::to_writer_pretty(writer, &export)?;
    Ok(())
}

/// Export the selected tables into `dir`.
///
/// CSV exports write `caregivers.csv` and `children.csv`, Excel exports
/// write `registry.xlsx` and JSON exports write `registry.json`. Existing files are overwritten. Returns the files
/// written.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or a file cannot be
/// written.
pub fn export_to_dir(
    dir: &Path,
    registry: &Registry,
    format: ExportFormat,
    tables: ExportTables,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    match format {
        ExportFormat::Csv => {
            if tables.caregivers() {
                let path = dir.join("caregivers.csv");
                write_csv(File::create(&path)?, &registry.caregivers)?;
                written.push(path);
            }
            if tables.children() {
                let path = dir.join("children.csv");
                write_csv(File::create(&path)?, &registry.children)?;
                written.push(path);
            }
        }
        ExportFormat::Xlsx => {
            let path = dir.join("registry.xlsx");
            write_xlsx(&path, registry, tables)?;
            written.push(path);
        }
        ExportFormat::Json => {
            let path = dir.join("registry.json");
            let mut file = File::create(&path)?;
            write_json(&mut file, registry, tables)?;
            file.write_all(b"\n")?;
            written.push(path);
        }
    }

    info!(
        files = written.len(),
        caregivers = registry.caregivers.len(),
        children = registry.children.len(),
        "Exported registry to {}",
        dir.display()
    );
    Ok(written)
}
