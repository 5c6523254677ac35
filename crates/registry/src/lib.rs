//! `caregiver_registry` - A registry of caregivers and their children
//!
//! Caregivers are identified by a key derived from their name and phone
//! number. The [`reconcile`] engine keeps the caregiver and children tables
//! consistent through saves, edits, deletes, imports and migrations; every
//! engine operation is a pure function from one [`Registry`] snapshot to the
//! next, and [`App`] wraps them with loading, backups and saving.
//!
//! A separate [`verification`] workflow tracks names awaiting approval.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod identity;
pub mod import;
pub mod logging;
pub mod query;
pub mod reconcile;
pub mod records;
pub mod storage;
pub mod summary;
pub mod validation;
pub mod verification;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
pub use identity::{derive_key, CaregiverKey};
pub use logging::init_logging;
pub use records::{Caregiver, CaregiverInput, Child, ChildInput, Registry};
pub use storage::{Storage, StorageStats};
pub use verification::{UnverifiedName, VerificationStatus};
