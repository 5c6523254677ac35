//! Error types for the caregiver registry.
//!
//! Every fallible operation in the library returns [`Result`], so callers can
//! tell a rejected submission apart from a storage failure and decide whether
//! to retry, fix the input, or abort.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for registry operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to write a backup copy of the database.
    #[error("failed to back up database to {path}: {message}")]
    Backup {
        /// Destination of the backup.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Validation Errors ===
    /// A submission was rejected before reaching the reconciliation engine.
    #[error("{field}: {message}")]
    Validation {
        /// The field (or row group) that failed validation.
        field: String,
        /// User-facing description of the problem.
        message: String,
    },

    /// A value could not be parsed into a registry field.
    #[error("invalid {field} value '{value}'")]
    InvalidValue {
        /// Name of the field being parsed.
        field: &'static str,
        /// The offending input.
        value: String,
    },

    /// A caregiver key was not 12 lowercase hex characters.
    #[error("invalid caregiver key '{0}': expected 12 lowercase hex characters")]
    InvalidKey(String),

    // === Record Errors ===
    /// No caregiver exists under the given key.
    #[error("caregiver not found: {key}")]
    CaregiverNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// No unverified name exists with the given id.
    #[error("unverified name not found: {id}")]
    UnverifiedNotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A status transition was requested on a record that already left `pending`.
    #[error("cannot {action} '{id}': record is already {status}")]
    InvalidTransition {
        /// The unverified name id.
        id: String,
        /// The requested action (`verify` or `reject`).
        action: &'static str,
        /// The record's current status.
        status: String,
    },

    // === Import / Export Errors ===
    /// The file extension is not one the importer understands.
    #[error("unsupported file format: {path}")]
    UnsupportedFormat {
        /// Path of the rejected file.
        path: PathBuf,
    },

    /// A required column is missing from an imported table.
    #[error("column '{column}' not found in {source_name}")]
    MissingColumn {
        /// The column that was expected.
        column: String,
        /// The file or sheet being read.
        source_name: String,
    },

    /// The requested worksheet does not exist in the workbook.
    #[error("sheet '{sheet}' not found in {path}")]
    SheetNotFound {
        /// The sheet that was requested.
        sheet: String,
        /// Path of the workbook.
        path: PathBuf,
    },

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading a spreadsheet workbook failed.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Writing a spreadsheet workbook failed.
    #[error("workbook write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error for a field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an error for an unknown caregiver key.
    #[must_use]
    pub fn caregiver_not_found(key: impl std::fmt::Display) -> Self {
        Self::CaregiverNotFound {
            key: key.to_string(),
        }
    }

    /// Check if this error is a rejected submission.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::InvalidValue { .. } | Self::InvalidKey(_)
        )
    }

    /// Check if this error came from the persistence layer.
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
                | Self::Backup { .. }
        )
    }

    /// Check if this error is a lookup miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CaregiverNotFound { .. } | Self::UnverifiedNotFound { .. }
        )
    }
}
