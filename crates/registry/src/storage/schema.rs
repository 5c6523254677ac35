//! `SQLite` schema definitions for the registry.
//!
//! These statements create the base (version 1) layout. Columns and tables
//! added later live in [`super::migrations`], so an old database and a fresh
//! one end up with the same shape.

/// SQL statement to create the caregivers table.
pub const CREATE_CAREGIVERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS caregivers (
    caregiver_key TEXT PRIMARY KEY,
    caregiver_name TEXT NOT NULL,
    gender TEXT NOT NULL DEFAULT '',
    profession TEXT NOT NULL DEFAULT '',
    date_of_birth TEXT,
    age INTEGER,
    phone_number TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    zonal_leader TEXT NOT NULL DEFAULT '',
    number_of_kids INTEGER,
    last_updated TEXT NOT NULL
)
";

/// SQL statement to create the children table.
///
/// `id` only preserves insertion order; children are identified by
/// caregiver key and name.
pub const CREATE_CHILDREN_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS children (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    caregiver_key TEXT NOT NULL,
    caregiver_name TEXT NOT NULL DEFAULT '',
    child_name TEXT NOT NULL,
    child_gender TEXT NOT NULL DEFAULT '',
    child_phone_number TEXT NOT NULL DEFAULT '',
    child_age INTEGER,
    child_date_of_birth TEXT,
    child_education_level TEXT,
    child_profession TEXT NOT NULL DEFAULT '',
    last_updated TEXT NOT NULL
)
";

/// SQL statement to index children by caregiver key.
pub const CREATE_CHILDREN_KEY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_children_caregiver_key ON children(caregiver_key)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// SQL statement to create the unverified names table (version 4).
pub const CREATE_UNVERIFIED_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS unverified_names (
    unverified_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    upload_date TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    verified_date TEXT,
    verified_by TEXT
)
";

/// All base schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_CAREGIVERS_TABLE,
    CREATE_CHILDREN_TABLE,
    CREATE_CHILDREN_KEY_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_children_reference_caregiver_key() {
        assert!(CREATE_CHILDREN_TABLE.contains("caregiver_key TEXT NOT NULL"));
        assert!(CREATE_CHILDREN_TABLE.contains("child_name TEXT NOT NULL"));
    }

    #[test]
    fn test_later_columns_are_not_in_base_schema() {
        assert!(!CREATE_CAREGIVERS_TABLE.contains("bank"));
        assert!(!CREATE_CHILDREN_TABLE.contains("child_school_name"));
        assert!(!SCHEMA_STATEMENTS.contains(&CREATE_UNVERIFIED_TABLE));
    }
}
