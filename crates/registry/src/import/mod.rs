//! Import of caregiver and child rows from CSV, spreadsheet and JSON files.
//!
//! The caller says what kind of rows a file holds; columns are never sniffed
//! to guess. Rows are applied one at a time through the reconciliation
//! engine. A row that cannot be parsed, fails validation, or names an
//! unknown caregiver is skipped and listed in the [`ImportReport`]; it never
//! aborts the rest of the file.

mod rows;
mod table;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

pub use rows::{caregiver_input, caregiver_link, child_input};
pub use table::{normalize_column, read_table, Row, Table};

use crate::error::{Error, Result};
use crate::identity::CaregiverKey;
use crate::reconcile;
use crate::records::Registry;
use crate::validation::Validator;

/// What the rows of an imported file describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    /// One caregiver per row.
    Caregiver,
    /// One child per row, linked to an existing caregiver.
    Child,
}

/// A row left out of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based data row number in the source file (the header row is not
    /// counted, blank rows are).
    pub row: usize,
    /// Why the row was skipped.
    pub reason: String,
}

/// Outcome of [`import_table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Where the rows came from.
    pub source: String,
    /// The row kind the file was read as.
    pub kind: RowKind,
    /// Number of data rows read.
    pub rows_read: usize,
    /// Rows written to the registry.
    pub imported: usize,
    /// Rows left out.
    pub skipped: Vec<SkippedRow>,
}

/// Apply every row of `table` to `registry`.
///
/// Caregiver rows replace the caregiver row under their derived key but keep
/// any children already filed there. Child rows resolve their caregiver by
/// `caregiver_key` when that column holds a known key, otherwise by exact
/// caregiver name, and replace any child with the same name under that
/// caregiver.
#[must_use]
pub fn import_table(
    registry: &Registry,
    table: &Table,
    kind: RowKind,
    validator: &Validator,
    now: DateTime<Utc>,
) -> (Registry, ImportReport) {
    let mut current = registry.clone();
    let mut report = ImportReport {
        source: table.source.clone(),
        kind,
        rows_read: table.rows.len(),
        imported: 0,
        skipped: Vec::new(),
    };

    for (number, row) in table.numbered_rows() {
        let applied = match kind {
            RowKind::Caregiver => apply_caregiver_row(&current, row, validator, now),
            RowKind::Child => apply_child_row(&current, row, validator, now),
        };
        match applied {
            Ok(next) => {
                current = next;
                report.imported += 1;
            }
            Err(e) => {
                warn!(source = %table.source, row = number, "Skipping row: {e}");
                report.skipped.push(SkippedRow {
                    row: number,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        source = %report.source,
        imported = report.imported,
        skipped = report.skipped.len(),
        "Imported rows"
    );
    (current, report)
}

fn apply_caregiver_row(
    registry: &Registry,
    row: &Row,
    validator: &Validator,
    now: DateTime<Utc>,
) -> Result<Registry> {
    let input = caregiver_input(row)?;
    validator.check_caregiver(&input)?;
    let (next, _) = reconcile::update_caregiver(registry, None, input, now)?;
    Ok(next)
}

fn apply_child_row(
    registry: &Registry,
    row: &Row,
    validator: &Validator,
    now: DateTime<Utc>,
) -> Result<Registry> {
    let input = child_input(row)?;
    validator.check_child(&input)?;

    let key = resolve_caregiver(registry, row)?;
    let (next, _) = reconcile::upsert_child(registry, &key, input, now)?;
    Ok(next)
}

fn resolve_caregiver(registry: &Registry, row: &Row) -> Result<CaregiverKey> {
    let (raw_key, name) = caregiver_link(row);

    let by_key = raw_key
        .and_then(|raw| raw.parse::<CaregiverKey>().ok())
        .filter(|key| registry.caregiver(key).is_some());
    if let Some(key) = by_key {
        return Ok(key);
    }

    if name.is_empty() {
        return Err(Error::validation(
            "caregiver_name",
            "row has no caregiver key or caregiver name",
        ));
    }
    registry
        .caregiver_by_name(&name)
        .map(|c| c.key.clone())
        .ok_or_else(|| Error::caregiver_not_found(&name))
}

/// Read the names in one column of a table, for the unverified names list.
///
/// # Errors
///
/// Returns [`Error::MissingColumn`] if the column does not exist.
pub fn names_from_table(table: &Table, column: &str) -> Result<Vec<String>> {
    table.column_values(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Submission;
    use crate::records::{CaregiverInput, ChildInput};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap()
    }

    fn csv(text: &str) -> Table {
        Table::from_csv_reader(text.as_bytes(), "test.csv").unwrap()
    }

    fn with_jane() -> Registry {
        let (registry, _) = reconcile::upsert_caregiver(
            &Registry::default(),
            Submission::new(
                CaregiverInput::new("Jane Doe", "0803-111-2222"),
                vec![ChildInput::named("Tom")],
            ),
            now(),
        )
        .unwrap();
        registry
    }

    #[test]
    fn test_caregiver_import_keeps_existing_children() {
        let table = csv(
            "caregiver_name,phone_number,bank\n\
             Jane Doe,0803-111-2222,First Bank\n\
             Bayo Okafor,+234 801 234 5678,\n",
        );
        let (registry, report) =
            import_table(&with_jane(), &table, RowKind::Caregiver, &Validator::new(), now());

        assert_eq!(report.imported, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(registry.caregivers.len(), 2);
        assert_eq!(registry.children.len(), 1);
        let jane = registry.caregiver_by_name("Jane Doe").unwrap();
        assert_eq!(jane.bank, "First Bank");
    }

    #[test]
    fn test_caregiver_rows_without_names_are_skipped() {
        let table = csv("caregiver_name,phone_number\n,0803\nAmaka,\n");
        let (registry, report) =
            import_table(&Registry::default(), &table, RowKind::Caregiver, &Validator::new(), now());

        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 1);
        assert_eq!(registry.caregivers[0].key.as_str(), "9bff8688c892");
    }

    #[test]
    fn test_child_import_resolves_by_name_and_key() {
        let table = csv(
            "caregiver_key,caregiver_name,child_name,child_age,child_phone_number\n\
             ,Jane Doe,Ada,5.0,\n\
             a00da052508c,Someone Else,Tom,9,0701\n",
        );
        let (registry, report) =
            import_table(&with_jane(), &table, RowKind::Child, &Validator::new(), now());

        assert_eq!(report.imported, 2);
        assert_eq!(registry.children.len(), 2);

        let ada = registry.children.iter().find(|c| c.name == "Ada").unwrap();
        assert_eq!(ada.age, Some(5));
        assert_eq!(ada.phone_number, "");
        let tom = registry.children.iter().find(|c| c.name == "Tom").unwrap();
        assert_eq!(tom.age, Some(9));
        assert_eq!(tom.caregiver_name, "Jane Doe");
    }

    #[test]
    fn test_child_import_reports_unknown_caregiver() {
        let table = csv(
            "caregiver_name,child_name\n\
             Nobody,Kemi\n\
             Jane Doe,\n\
             Jane Doe,Ada\n",
        );
        let (registry, report) =
            import_table(&with_jane(), &table, RowKind::Child, &Validator::new(), now());

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.imported, 1);
        let rows: Vec<usize> = report.skipped.iter().map(|s| s.row).collect();
        assert_eq!(rows, vec![1, 2]);
        assert!(report.skipped[0].reason.contains("Nobody"));
        assert_eq!(registry.children.len(), 2);
    }

    #[test]
    fn test_skipped_rows_count_blank_lines_before_them() {
        let table = csv(
            "caregiver_name,child_name\n\
             ,\n\
             Jane Doe,Ada\n\
             Nobody,Kemi\n",
        );
        let (_, report) =
            import_table(&with_jane(), &table, RowKind::Child, &Validator::new(), now());

        assert_eq!(report.rows_read, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 3);
    }

    #[test]
    fn test_bad_cell_skips_only_its_row() {
        let table = csv("caregiver_name,child_name,child_age\nJane Doe,Ada,old\nJane Doe,Kemi,3\n");
        let (registry, report) =
            import_table(&with_jane(), &table, RowKind::Child, &Validator::new(), now());

        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped[0].row, 1);
        assert!(report.skipped[0].reason.contains("child_age"));
        assert_eq!(registry.children.len(), 2);
    }

    #[test]
    fn test_names_from_table() {
        let table = csv("Name\nAmaka\namaka \nBayo\n");
        assert_eq!(names_from_table(&table, "name").unwrap().len(), 3);
        assert!(names_from_table(&table, "full_name").is_err());
    }
}
