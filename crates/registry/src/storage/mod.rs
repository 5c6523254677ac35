//! Storage layer for the registry.
//!
//! The registry is persisted in `SQLite` as whole snapshots: callers load the
//! complete caregiver and children tables, run a reconciliation operation on
//! the in-memory copy, and write the result back in a single transaction.
//!
//! There is no cross-process locking. Two sessions that load, edit and save
//! at the same time race, and the last one to save wins.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::CaregiverKey;
use crate::records::fields::parse_optional;
use crate::records::{Caregiver, Child, Gender, Registry};
use crate::verification::{UnverifiedName, VerificationStatus};

/// Prefix of backup file names.
const BACKUP_PREFIX: &str = "registry_";

/// Metadata key holding the time of the last snapshot write.
const LAST_SAVED_KEY: &str = "last_saved";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage engine for the registry tables.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a registry database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// then brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }

    /// Load the caregiver and children tables.
    ///
    /// Rows come back in the order they were saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_registry(&self) -> Result<Registry> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT caregiver_key, caregiver_name, gender, profession, date_of_birth, age,
                   phone_number, address, zonal_leader, bank, account_number,
                   number_of_kids, last_updated
            FROM caregivers ORDER BY rowid
            ",
        )?;
        let caregivers = stmt
            .query_map([], Self::row_to_caregiver)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            r"
            SELECT caregiver_key, caregiver_name, child_name, child_gender,
                   child_phone_number, child_age, child_date_of_birth,
                   child_education_level, child_school_name, child_class_level,
                   child_profession, last_updated
            FROM children ORDER BY id
            ",
        )?;
        let children = stmt
            .query_map([], Self::row_to_child)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            caregivers = caregivers.len(),
            children = children.len(),
            "Loaded registry"
        );
        Ok(Registry::new(caregivers, children))
    }

    /// Replace both tables with `registry` in one transaction.
    ///
    /// If any row fails to write, the previous snapshot is left intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_registry(&mut self, registry: &Registry) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM children", [])?;
        tx.execute("DELETE FROM caregivers", [])?;

        {
            let mut insert = tx.prepare(
                r"
                INSERT INTO caregivers (
                    caregiver_key, caregiver_name, gender, profession, date_of_birth, age,
                    phone_number, address, zonal_leader, bank, account_number,
                    number_of_kids, last_updated
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ",
            )?;
            for c in &registry.caregivers {
                insert.execute(params![
                    c.key.as_str(),
                    c.name,
                    c.gender.as_str(),
                    c.profession,
                    c.date_of_birth.map(|d| d.format(DATE_FORMAT).to_string()),
                    c.age,
                    c.phone_number,
                    c.address,
                    c.zonal_leader,
                    c.bank,
                    c.account_number,
                    c.number_of_kids,
                    c.last_updated.to_rfc3339(),
                ])?;
            }

            let mut insert = tx.prepare(
                r"
                INSERT INTO children (
                    caregiver_key, caregiver_name, child_name, child_gender,
                    child_phone_number, child_age, child_date_of_birth,
                    child_education_level, child_school_name, child_class_level,
                    child_profession, last_updated
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ",
            )?;
            for c in &registry.children {
                insert.execute(params![
                    c.caregiver_key.as_str(),
                    c.caregiver_name,
                    c.name,
                    c.gender.as_str(),
                    c.phone_number,
                    c.age,
                    c.date_of_birth.map(|d| d.format(DATE_FORMAT).to_string()),
                    c.education_level.map(|e| e.as_str()),
                    c.school_name,
                    c.class_level.map(|l| l.as_str()),
                    c.profession,
                    c.last_updated.to_rfc3339(),
                ])?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            (LAST_SAVED_KEY, Utc::now().to_rfc3339()),
        )?;
        tx.commit()?;

        info!(
            caregivers = registry.caregivers.len(),
            children = registry.children.len(),
            "Saved registry"
        );
        Ok(())
    }

    /// Load the unverified names table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_unverified(&self) -> Result<Vec<UnverifiedName>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT unverified_id, name, status, upload_date, notes, verified_date, verified_by
            FROM unverified_names ORDER BY rowid
            ",
        )?;
        let records = stmt
            .query_map([], Self::row_to_unverified)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Replace the unverified names table in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_unverified(&mut self, records: &[UnverifiedName]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM unverified_names", [])?;
        {
            let mut insert = tx.prepare(
                r"
                INSERT INTO unverified_names (
                    unverified_id, name, status, upload_date, notes, verified_date, verified_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )?;
            for r in records {
                insert.execute(params![
                    r.unverified_id,
                    r.name,
                    r.status.as_str(),
                    r.upload_date.to_rfc3339(),
                    r.notes,
                    r.verified_date.map(|d| d.to_rfc3339()),
                    r.verified_by,
                ])?;
            }
        }
        tx.commit()?;

        info!(records = records.len(), "Saved unverified names");
        Ok(())
    }

    /// Write a consistent copy of the database into `dir`.
    ///
    /// The file is named `registry_YYYYMMDD_HHMMSS_mmm.db` after `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryCreate`] if `dir` cannot be created and
    /// [`Error::Backup`] if the copy fails.
    pub fn backup_to(&self, dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;

        let target = dir.join(format!(
            "{BACKUP_PREFIX}{}.db",
            now.format("%Y%m%d_%H%M%S_%3f")
        ));
        self.conn
            .execute("VACUUM INTO ?1", [target.to_string_lossy()])
            .map_err(|e| Error::Backup {
                path: target.clone(),
                message: e.to_string(),
            })?;

        info!("Backed up database to {}", target.display());
        Ok(target)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n)
        };

        let last_saved: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [LAST_SAVED_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let db_size_bytes = if self.is_in_memory() {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            caregivers: count("caregivers")?,
            children: count("children")?,
            unverified_names: count("unverified_names")?,
            schema_version: migrations::get_schema_version(&self.conn)?,
            last_saved: last_saved
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            db_size_bytes,
        })
    }

    fn row_to_caregiver(row: &Row) -> rusqlite::Result<Caregiver> {
        let gender: String = row.get(2)?;
        Ok(Caregiver {
            key: CaregiverKey::from_stored(row.get::<_, String>(0)?),
            name: row.get(1)?,
            gender: parse_gender(&gender),
            profession: row.get(3)?,
            date_of_birth: parse_date(row.get(4)?),
            age: parse_count(row.get(5)?),
            phone_number: row.get(6)?,
            address: row.get(7)?,
            zonal_leader: row.get(8)?,
            bank: row.get(9)?,
            account_number: row.get(10)?,
            number_of_kids: parse_count(row.get(11)?),
            last_updated: parse_timestamp(&row.get::<_, String>(12)?),
        })
    }

    fn row_to_child(row: &Row) -> rusqlite::Result<Child> {
        let gender: String = row.get(3)?;
        let education: Option<String> = row.get(7)?;
        let class: Option<String> = row.get(9)?;
        Ok(Child {
            caregiver_key: CaregiverKey::from_stored(row.get::<_, String>(0)?),
            caregiver_name: row.get(1)?,
            name: row.get(2)?,
            gender: parse_gender(&gender),
            phone_number: row.get(4)?,
            age: parse_count(row.get(5)?),
            date_of_birth: parse_date(row.get(6)?),
            education_level: parse_label(education.as_deref()),
            school_name: row.get(8)?,
            class_level: parse_label(class.as_deref()),
            profession: row.get(10)?,
            last_updated: parse_timestamp(&row.get::<_, String>(11)?),
        })
    }

    fn row_to_unverified(row: &Row) -> rusqlite::Result<UnverifiedName> {
        let status: String = row.get(2)?;
        let verified_date: Option<String> = row.get(5)?;
        Ok(UnverifiedName {
            unverified_id: row.get(0)?,
            name: row.get(1)?,
            status: status.parse().unwrap_or_else(|_| {
                warn!("Unknown verification status: {status}, defaulting to pending");
                VerificationStatus::Pending
            }),
            upload_date: parse_timestamp(&row.get::<_, String>(3)?),
            notes: row.get(4)?,
            verified_date: verified_date.as_deref().map(parse_timestamp),
            verified_by: row.get(6)?,
        })
    }
}

/// Delete the oldest backups in `dir`, keeping the newest `keep`.
///
/// `keep == 0` keeps everything. Only files named like backups are touched.
/// Returns the number of files removed.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or a file cannot be
/// removed.
pub fn prune_backups(dir: &Path, keep: usize) -> Result<usize> {
    if keep == 0 || !dir.exists() {
        return Ok(0);
    }

    let mut backups: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(".db"))
        })
        .collect();
    if backups.len() <= keep {
        return Ok(0);
    }

    // timestamped names sort chronologically
    backups.sort();
    let excess = backups.len() - keep;
    for path in &backups[..excess] {
        std::fs::remove_file(path)?;
        debug!("Removed old backup {}", path.display());
    }
    Ok(excess)
}

fn parse_gender(raw: &str) -> Gender {
    raw.parse().unwrap_or_else(|_| {
        warn!("Unknown gender: {raw}, storing as unspecified");
        Gender::Unspecified
    })
}

fn parse_label<T>(raw: Option<&str>) -> Option<T>
where
    T: FromStr<Err = Error>,
{
    let raw = raw?;
    parse_optional(raw).unwrap_or_else(|e| {
        warn!("{e}, ignoring");
        None
    })
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| warn!("Unreadable date: {raw}, ignoring"))
        .ok()
}

fn parse_count(raw: Option<i64>) -> Option<u32> {
    raw.and_then(|n| u32::try_from(n).ok())
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| {
            warn!("Unreadable timestamp: {raw}, using current time");
            Utc::now()
        },
        |dt| dt.with_timezone(&Utc),
    )
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of caregiver rows.
    pub caregivers: i64,
    /// Number of child rows.
    pub children: i64,
    /// Number of unverified names.
    pub unverified_names: i64,
    /// Schema version of the database.
    pub schema_version: i32,
    /// When the registry snapshot was last written.
    pub last_saved: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
