//! Unverified names and their approval workflow.
//!
//! Names arrive in bulk (typically a spreadsheet column) as `pending` and are
//! then verified or rejected, one at a time or in bulk. Both decisions are
//! terminal. Nothing here touches the caregiver table: promoting a verified
//! name into a caregiver is an explicit, separate step.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::KEY_LEN;
use crate::records::CaregiverInput;

/// Status of an unverified name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Awaiting a decision.
    #[default]
    Pending,
    /// Confirmed as a real caregiver.
    Verified,
    /// Dismissed.
    Rejected,
}

impl VerificationStatus {
    /// All statuses, in workflow order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Verified, Self::Rejected];

    /// Lowercase label used in storage and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    /// Whether no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            _ => Err(Error::InvalidValue {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// A decision on a pending name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Move to [`VerificationStatus::Verified`].
    Verify,
    /// Move to [`VerificationStatus::Rejected`].
    Reject,
}

impl Decision {
    const fn target(self) -> VerificationStatus {
        match self {
            Self::Verify => VerificationStatus::Verified,
            Self::Reject => VerificationStatus::Rejected,
        }
    }

    /// The verb used in messages, `verify` or `reject`.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Reject => "reject",
        }
    }
}

/// A name awaiting (or past) verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnverifiedName {
    /// Short id derived from the name and upload time.
    pub unverified_id: String,
    /// The name as uploaded (trimmed).
    pub name: String,
    /// Current status.
    pub status: VerificationStatus,
    /// When the name was uploaded.
    pub upload_date: DateTime<Utc>,
    /// Free-text notes.
    pub notes: String,
    /// When the name was verified or rejected.
    pub verified_date: Option<DateTime<Utc>>,
    /// Who (or what) made the decision.
    pub verified_by: Option<String>,
}

impl UnverifiedName {
    /// Create a pending record for `name`.
    #[must_use]
    pub fn new(name: &str, notes: impl Into<String>, now: DateTime<Utc>) -> Self {
        let name = name.trim().to_string();
        Self {
            unverified_id: unverified_id(&name, now),
            name,
            status: VerificationStatus::Pending,
            upload_date: now,
            notes: notes.into(),
            verified_date: None,
            verified_by: None,
        }
    }

    /// A caregiver input carrying this name, for verified records only.
    #[must_use]
    pub fn caregiver_seed(&self) -> Option<CaregiverInput> {
        (self.status == VerificationStatus::Verified)
            .then(|| CaregiverInput::new(self.name.clone(), String::new()))
    }

    fn decide(&mut self, decision: Decision, verifier: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidTransition {
                id: self.unverified_id.clone(),
                action: decision.verb(),
                status: self.status.to_string(),
            });
        }
        self.status = decision.target();
        self.verified_date = Some(now);
        self.verified_by = Some(verifier.to_string());
        Ok(())
    }
}

fn unverified_id(name: &str, now: DateTime<Utc>) -> String {
    let raw = format!("{}|{}", name.trim().to_lowercase(), now.to_rfc3339());
    let mut id = hex::encode(Sha1::digest(raw.as_bytes()));
    id.truncate(KEY_LEN);
    id
}

/// Default note for names uploaded from a file.
#[must_use]
pub fn upload_note(file_name: &str) -> String {
    format!("Uploaded from {file_name}")
}

/// Selects unverified names by id, status and name substring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    /// Only these ids; empty means any.
    pub ids: Vec<String>,
    /// Only records with this status.
    pub status: Option<VerificationStatus>,
    /// Only records whose name contains this text (case-insensitive).
    pub search: Option<String>,
}

impl NameFilter {
    /// A filter on status only.
    #[must_use]
    pub fn status(status: VerificationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A filter on ids only.
    #[must_use]
    pub fn ids(ids: Vec<String>) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    /// Whether the filter selects every record.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.ids.is_empty()
            && self.status.is_none()
            && self.search.as_deref().map_or(true, |s| s.trim().is_empty())
    }

    /// Whether a record passes the filter.
    #[must_use]
    pub fn matches(&self, record: &UnverifiedName) -> bool {
        let status_ok = self.status.map_or(true, |s| record.status == s);
        let search_ok = self.search.as_deref().map(str::trim).map_or(true, |needle| {
            needle.is_empty() || record.name.to_lowercase().contains(&needle.to_lowercase())
        });
        let id_ok = self.ids.is_empty() || self.ids.contains(&record.unverified_id);
        id_ok && status_ok && search_ok
    }
}

/// Counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NameStats {
    /// All records.
    pub total: usize,
    /// Pending records.
    pub pending: usize,
    /// Verified records.
    pub verified: usize,
    /// Rejected records.
    pub rejected: usize,
}

/// Outcome of [`bulk_decide`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// Records that changed status.
    pub updated: usize,
    /// Matching records that were already terminal.
    pub skipped: usize,
}

/// Add pending records for every new name in `candidates`.
///
/// Candidates are trimmed and blank ones skipped. A candidate is a duplicate
/// if its lowercase form matches any existing record, whatever that record's
/// status, or an earlier candidate in the same batch. Returns the new
/// collection and the number of records added.
#[must_use]
pub fn bulk_add<S: AsRef<str>>(
    existing: &[UnverifiedName],
    candidates: &[S],
    notes: &str,
    now: DateTime<Utc>,
) -> (Vec<UnverifiedName>, usize) {
    let mut seen: HashSet<String> = existing.iter().map(|r| r.name.trim().to_lowercase()).collect();
    let mut records = existing.to_vec();

    let before = records.len();
    for candidate in candidates {
        let name = candidate.as_ref().trim();
        if name.is_empty() || !seen.insert(name.to_lowercase()) {
            continue;
        }
        records.push(UnverifiedName::new(name, notes, now));
    }
    let added = records.len() - before;

    debug!(added, skipped = candidates.len() - added, "Added unverified names");
    (records, added)
}

/// Apply a decision to a single record.
///
/// # Errors
///
/// Returns [`Error::UnverifiedNotFound`] for an unknown id and
/// [`Error::InvalidTransition`] if the record is already verified or rejected.
pub fn decide(
    records: &[UnverifiedName],
    id: &str,
    decision: Decision,
    verifier: &str,
    now: DateTime<Utc>,
) -> Result<Vec<UnverifiedName>> {
    let mut records = records.to_vec();
    let record = find_mut(&mut records, id)?;
    record.decide(decision, verifier, now)?;
    Ok(records)
}

/// Verify a single pending record.
///
/// # Errors
///
/// See [`decide`].
pub fn verify(
    records: &[UnverifiedName],
    id: &str,
    verifier: &str,
    now: DateTime<Utc>,
) -> Result<Vec<UnverifiedName>> {
    decide(records, id, Decision::Verify, verifier, now)
}

/// Reject a single pending record.
///
/// # Errors
///
/// See [`decide`].
pub fn reject(
    records: &[UnverifiedName],
    id: &str,
    verifier: &str,
    now: DateTime<Utc>,
) -> Result<Vec<UnverifiedName>> {
    decide(records, id, Decision::Reject, verifier, now)
}

/// Apply a decision to every pending record matching `filter`.
///
/// Matching records that are already terminal are left alone and counted as
/// skipped.
#[must_use]
pub fn bulk_decide(
    records: &[UnverifiedName],
    filter: &NameFilter,
    decision: Decision,
    verifier: &str,
    now: DateTime<Utc>,
) -> (Vec<UnverifiedName>, BulkOutcome) {
    let mut outcome = BulkOutcome::default();
    let records = records
        .iter()
        .cloned()
        .map(|mut record| {
            if filter.matches(&record) {
                if record.decide(decision, verifier, now).is_ok() {
                    outcome.updated += 1;
                } else {
                    outcome.skipped += 1;
                }
            }
            record
        })
        .collect();
    (records, outcome)
}

/// Remove every record matching `filter`. Returns the remaining records and
/// the number removed.
#[must_use]
pub fn delete_matching(records: &[UnverifiedName], filter: &NameFilter) -> (Vec<UnverifiedName>, usize) {
    let kept: Vec<UnverifiedName> = records.iter().filter(|r| !filter.matches(r)).cloned().collect();
    let removed = records.len() - kept.len();
    (kept, removed)
}

/// Replace the notes on one record. Allowed in any status.
///
/// # Errors
///
/// Returns [`Error::UnverifiedNotFound`] for an unknown id.
pub fn set_notes(records: &[UnverifiedName], id: &str, notes: &str) -> Result<Vec<UnverifiedName>> {
    let mut records = records.to_vec();
    find_mut(&mut records, id)?.notes = notes.trim().to_string();
    Ok(records)
}

/// Count records per status.
#[must_use]
pub fn stats(records: &[UnverifiedName]) -> NameStats {
    records.iter().fold(
        NameStats {
            total: records.len(),
            ..NameStats::default()
        },
        |mut stats, record| {
            match record.status {
                VerificationStatus::Pending => stats.pending += 1,
                VerificationStatus::Verified => stats.verified += 1,
                VerificationStatus::Rejected => stats.rejected += 1,
            }
            stats
        },
    )
}

fn find_mut<'a>(records: &'a mut [UnverifiedName], id: &str) -> Result<&'a mut UnverifiedName> {
    let id = id.trim();
    records
        .iter_mut()
        .find(|r| r.unverified_id == id)
        .ok_or_else(|| Error::UnverifiedNotFound { id: id.to_string() })
}
