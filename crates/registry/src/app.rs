//! Application service tying storage, validation and the engine together.
//!
//! Every mutating call follows the same shape: load the current snapshot,
//! run a pure engine function, back up the database if the change is
//! destructive, and save the result. If the engine or the backup fails
//! nothing is written.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{self, ExportFormat, ExportTables};
use crate::identity::CaregiverKey;
use crate::import::{self, ImportReport, RowKind};
use crate::query::{self, CaregiverFilter, ChildFilter};
use crate::reconcile::{self, DeleteReport, EditReport, Submission, UpsertReport};
use crate::records::{Caregiver, CaregiverPatch, Child, Registry};
use crate::storage::{self, Storage, StorageStats};
use crate::summary::Summary;
use crate::validation::Validator;
use crate::verification::{
    self, BulkOutcome, Decision, NameFilter, NameStats, UnverifiedName,
};

/// Outcome of uploading names from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NamesUpload {
    /// Names read from the column.
    pub read: usize,
    /// New pending records created.
    pub added: usize,
}

/// Outcome of the child phone backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Children whose phone was filled in.
    pub updated: usize,
    /// Backup taken before the change, if any.
    pub backup: Option<PathBuf>,
}

/// The registry application.
#[derive(Debug)]
pub struct App {
    config: Config,
    storage: Storage,
    validator: Validator,
}

impl App {
    /// Open the database named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the database
    /// cannot be opened or migrated.
    pub fn open(config: Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        Self::with_storage(config, storage)
    }

    /// Build an app around an already opened storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured phone pattern is invalid.
    pub fn with_storage(config: Config, storage: Storage) -> Result<Self> {
        let validator = config.validator()?;
        Ok(Self {
            config,
            storage,
            validator,
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current registry snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn registry(&self) -> Result<Registry> {
        self.storage.load_registry()
    }

    // === Caregivers ===

    /// Validate and save a caregiver with their full set of children.
    ///
    /// Children left out of the submission are deleted. When the save
    /// replaces any stored child rows the database is backed up first.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad submission, or a storage error.
    pub fn save_submission(&mut self, submission: Submission) -> Result<UpsertReport> {
        self.validator
            .check_submission(&submission.caregiver, &submission.children)?;

        let registry = self.storage.load_registry()?;
        let (registry, report) = reconcile::upsert_caregiver(&registry, submission, Utc::now())?;
        // stored children under either the old or the new key get replaced
        if report.children_removed > 0 {
            self.backup_if_enabled()?;
        }
        self.storage.save_registry(&registry)?;

        info!(
            key = %report.key,
            children = report.children_saved,
            removed = report.children_removed,
            "Saved caregiver"
        );
        Ok(report)
    }

    /// Apply a partial edit to one caregiver, keeping their children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaregiverNotFound`] for an unknown key, a validation
    /// error for the edited fields, or a storage error.
    pub fn edit_caregiver(&mut self, key: &CaregiverKey, patch: CaregiverPatch) -> Result<EditReport> {
        let registry = self.storage.load_registry()?;
        let row = registry
            .caregiver(key)
            .ok_or_else(|| Error::caregiver_not_found(key))?;

        let input = patch.apply(row);
        self.validator.check_caregiver(&input)?;

        let (registry, report) =
            reconcile::update_caregiver(&registry, Some(key), input, Utc::now())?;
        self.storage.save_registry(&registry)?;

        info!(key = %report.key, moved = report.children_moved, "Edited caregiver");
        Ok(report)
    }

    /// Delete a caregiver and every child filed under them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaregiverNotFound`] if nothing references the key, or
    /// a storage or backup error.
    pub fn delete_caregiver(&mut self, key: &CaregiverKey) -> Result<DeleteReport> {
        let registry = self.storage.load_registry()?;
        let (registry, report) = reconcile::delete_caregiver(&registry, key)?;

        self.backup_if_enabled()?;
        self.storage.save_registry(&registry)?;

        info!(key = %key, children = report.children_removed, "Deleted caregiver");
        Ok(report)
    }

    /// A caregiver and their children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaregiverNotFound`] for an unknown key.
    pub fn caregiver(&self, key: &CaregiverKey) -> Result<(Caregiver, Vec<Child>)> {
        let registry = self.storage.load_registry()?;
        let caregiver = registry
            .caregiver(key)
            .cloned()
            .ok_or_else(|| Error::caregiver_not_found(key))?;
        let children = registry.children_of(key).cloned().collect();
        Ok((caregiver, children))
    }

    /// Caregivers passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn caregivers(&self, filter: &CaregiverFilter) -> Result<Vec<Caregiver>> {
        let registry = self.storage.load_registry()?;
        Ok(filter.apply(&registry.caregivers).cloned().collect())
    }

    /// Children passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn children(&self, filter: &ChildFilter) -> Result<Vec<Child>> {
        let registry = self.storage.load_registry()?;
        Ok(filter.apply(&registry.children).cloned().collect())
    }

    // === Import / export / maintenance ===

    /// Import caregiver or child rows from a file.
    ///
    /// `sheet` falls back to the configured default sheet. Nothing is written
    /// when no row was imported.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the result cannot be
    /// saved. Bad rows are reported, not raised.
    pub fn import_file(&mut self, path: &Path, kind: RowKind, sheet: Option<&str>) -> Result<ImportReport> {
        let sheet = sheet.or(self.config.import.default_sheet.as_deref());
        let table = import::read_table(path, sheet)?;

        let registry = self.storage.load_registry()?;
        let (registry, report) =
            import::import_table(&registry, &table, kind, &self.validator, Utc::now());

        if report.imported > 0 {
            self.backup_if_enabled()?;
            self.storage.save_registry(&registry)?;
        }
        Ok(report)
    }

    /// Fill blank child phones from their caregiver.
    ///
    /// # Errors
    ///
    /// Returns a storage or backup error.
    pub fn backfill_child_phones(&mut self) -> Result<BackfillReport> {
        let registry = self.storage.load_registry()?;
        let (children, updated) =
            reconcile::backfill_child_phones(&registry.caregivers, registry.children);

        let mut backup = None;
        if updated > 0 {
            backup = self.backup_if_enabled()?;
            self.storage
                .save_registry(&Registry::new(registry.caregivers, children))?;
        }
        info!(updated, "Backfilled child phone numbers");
        Ok(BackfillReport { updated, backup })
    }

    /// Write a backup now, then prune old ones.
    ///
    /// # Errors
    ///
    /// Returns a backup error.
    pub fn backup(&self) -> Result<PathBuf> {
        let dir = self.config.backup_dir();
        let path = self.storage.backup_to(&dir, Utc::now())?;
        let pruned = storage::prune_backups(&dir, self.config.storage.max_backups)?;
        if pruned > 0 {
            debug!(pruned, "Pruned old backups");
        }
        Ok(path)
    }

    fn backup_if_enabled(&self) -> Result<Option<PathBuf>> {
        if self.config.storage.backup_before_write {
            self.backup().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Export the filtered registry into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read or a file cannot be
    /// written.
    pub fn export(
        &self,
        dir: &Path,
        format: ExportFormat,
        tables: ExportTables,
        caregivers: &CaregiverFilter,
        children: &ChildFilter,
    ) -> Result<Vec<PathBuf>> {
        let registry = self.storage.load_registry()?;
        let filtered = query::filter_registry(&registry, caregivers, children);
        export::export_to_dir(dir, &filtered, format, tables)
    }

    /// Summary statistics over the whole registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn summary(&self) -> Result<Summary> {
        let registry = self.storage.load_registry()?;
        let names = self.storage.load_unverified()?;
        Ok(Summary::compute(&registry, verification::stats(&names)))
    }

    /// Database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn status(&self) -> Result<StorageStats> {
        self.storage.stats()
    }

    // === Unverified names ===

    /// Unverified names passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn names(&self, filter: &NameFilter) -> Result<Vec<UnverifiedName>> {
        Ok(self
            .storage
            .load_unverified()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    /// Upload names from one column of a file as pending records.
    ///
    /// `column` falls back to the configured name column. Each new record is
    /// noted with the file it came from.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the column is missing, or
    /// the result cannot be saved.
    pub fn upload_names(&mut self, path: &Path, column: Option<&str>, sheet: Option<&str>) -> Result<NamesUpload> {
        let column = column.unwrap_or(&self.config.import.name_column);
        let sheet = sheet.or(self.config.import.default_sheet.as_deref());
        let table = import::read_table(path, sheet)?;
        let names = import::names_from_table(&table, column)?;

        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let added = self.add_names(&names, &verification::upload_note(&file_name))?;

        Ok(NamesUpload {
            read: names.len(),
            added,
        })
    }

    /// Add names as pending records, skipping ones already on the list.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn add_names<S: AsRef<str>>(&mut self, names: &[S], notes: &str) -> Result<usize> {
        let records = self.storage.load_unverified()?;
        let (records, added) = verification::bulk_add(&records, names, notes, Utc::now());
        if added > 0 {
            self.storage.save_unverified(&records)?;
        }
        info!(added, "Added unverified names");
        Ok(added)
    }

    /// Verify or reject one pending name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnverifiedNotFound`] for an unknown id and
    /// [`Error::InvalidTransition`] if the name was already decided.
    pub fn decide_name(&mut self, id: &str, decision: Decision) -> Result<UnverifiedName> {
        let records = self.storage.load_unverified()?;
        let records = verification::decide(
            &records,
            id,
            decision,
            &self.config.verification.verifier_label,
            Utc::now(),
        )?;
        self.storage.save_unverified(&records)?;

        info!(id, action = decision.verb(), "Decided unverified name");
        find_name(&records, id).cloned()
    }

    /// Verify or reject every pending name passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn decide_matching(&mut self, filter: &NameFilter, decision: Decision) -> Result<BulkOutcome> {
        let records = self.storage.load_unverified()?;
        let (records, outcome) = verification::bulk_decide(
            &records,
            filter,
            decision,
            &self.config.verification.bulk_verifier_label,
            Utc::now(),
        );
        if outcome.updated > 0 {
            self.storage.save_unverified(&records)?;
        }
        info!(
            updated = outcome.updated,
            skipped = outcome.skipped,
            action = decision.verb(),
            "Bulk decision on unverified names"
        );
        Ok(outcome)
    }

    /// Delete every name passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns a storage or backup error.
    pub fn delete_names(&mut self, filter: &NameFilter) -> Result<usize> {
        let records = self.storage.load_unverified()?;
        let (records, removed) = verification::delete_matching(&records, filter);
        if removed > 0 {
            self.backup_if_enabled()?;
            self.storage.save_unverified(&records)?;
        }
        info!(removed, "Deleted unverified names");
        Ok(removed)
    }

    /// Replace the notes on one name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnverifiedNotFound`] for an unknown id.
    pub fn set_name_notes(&mut self, id: &str, notes: &str) -> Result<()> {
        let records = self.storage.load_unverified()?;
        let records = verification::set_notes(&records, id, notes)?;
        self.storage.save_unverified(&records)
    }

    /// Counts of unverified names by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn name_stats(&self) -> Result<NameStats> {
        Ok(verification::stats(&self.storage.load_unverified()?))
    }

    /// Register a verified name as a new caregiver with no children.
    ///
    /// The name record itself is left as it is.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is not verified or a caregiver
    /// with the same identity already exists.
    pub fn promote_name(&mut self, id: &str, phone: &str) -> Result<EditReport> {
        let records = self.storage.load_unverified()?;
        let record = find_name(&records, id)?;
        let mut input = record.caregiver_seed().ok_or_else(|| {
            Error::validation(
                "status",
                format!("'{}' is {}; only verified names can be promoted", record.name, record.status),
            )
        })?;
        input.phone = phone.to_string();
        self.validator.check_caregiver(&input)?;

        let registry = self.storage.load_registry()?;
        if registry.caregiver(&input.key()).is_some() {
            return Err(Error::validation(
                "caregiver_name",
                format!("'{}' is already registered", input.name.trim()),
            ));
        }
        let (registry, report) = reconcile::update_caregiver(&registry, None, input, Utc::now())?;
        self.storage.save_registry(&registry)?;

        info!(id, key = %report.key, "Promoted verified name to caregiver");
        Ok(report)
    }
}

fn find_name<'a>(records: &'a [UnverifiedName], id: &str) -> Result<&'a UnverifiedName> {
    records
        .iter()
        .find(|r| r.unverified_id == id)
        .ok_or_else(|| Error::UnverifiedNotFound { id: id.to_string() })
}
