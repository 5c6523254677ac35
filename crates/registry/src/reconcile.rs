//! Reconciliation engine.
//!
//! Keeps the children collection consistent with creates, edits, deletes and
//! re-keys of caregivers. Every operation borrows the current [`Registry`]
//! and returns a new one together with a report, so a failed operation
//! leaves the caller's collections exactly as they were. Nothing here does
//! I/O; persisting the result is the caller's job.
//!
//! Upserts are full replacements, never field-level merges. In particular,
//! [`upsert_caregiver`] with an empty child list deletes every child filed
//! under that caregiver.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::CaregiverKey;
use crate::records::{Caregiver, CaregiverInput, Child, ChildInput, Registry};

/// A caregiver together with the complete set of their children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    /// Key the caregiver is currently stored under, when editing.
    pub current_key: Option<CaregiverKey>,
    /// Caregiver fields.
    pub caregiver: CaregiverInput,
    /// Every child of this caregiver. Omitted children are deleted.
    pub children: Vec<ChildInput>,
}

impl Submission {
    /// A new-caregiver submission.
    #[must_use]
    pub fn new(caregiver: CaregiverInput, children: Vec<ChildInput>) -> Self {
        Self {
            current_key: None,
            caregiver,
            children,
        }
    }

    /// Mark this submission as an edit of the caregiver stored under `key`.
    #[must_use]
    pub fn editing(mut self, key: CaregiverKey) -> Self {
        self.current_key = Some(key);
        self
    }
}

/// Outcome of [`upsert_caregiver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    /// Key the caregiver is now stored under.
    pub key: CaregiverKey,
    /// Previous key, if the edit changed the caregiver's identity.
    pub previous_key: Option<CaregiverKey>,
    /// Whether an existing caregiver row was replaced.
    pub replaced_existing: bool,
    /// Number of child rows written.
    pub children_saved: usize,
    /// Number of previously stored child rows removed.
    pub children_removed: usize,
    /// Number of saved children whose phone was copied from the caregiver.
    pub phones_filled: usize,
}

/// Outcome of [`update_caregiver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditReport {
    /// Key the caregiver is now stored under.
    pub key: CaregiverKey,
    /// Previous key, if the edit changed the caregiver's identity.
    pub previous_key: Option<CaregiverKey>,
    /// Whether an existing caregiver row was replaced.
    pub replaced_existing: bool,
    /// Number of children moved from the previous key to the new one.
    pub children_moved: usize,
}

/// Outcome of [`delete_caregiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    /// Whether a caregiver row was removed.
    pub caregiver_removed: bool,
    /// Number of child rows removed.
    pub children_removed: usize,
}

/// Outcome of [`upsert_child`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChildUpsert {
    /// Whether a child with the same name was replaced.
    pub replaced: bool,
}

/// Save a caregiver and the full set of their children.
///
/// The caregiver row under the derived key is replaced, then every child
/// under that key is replaced by the submitted rows. Child rows with a blank
/// name are dropped; a blank child phone is filled with the caregiver's phone
/// at this moment (later caregiver edits do not follow it).
///
/// When the submission carries a `current_key` that differs from the derived
/// key, the caregiver and children under the old key are removed too, so no
/// children are left behind under a key nobody owns.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a blank caregiver name and
/// [`Error::CaregiverNotFound`] if `current_key` is not in the registry.
pub fn upsert_caregiver(
    registry: &Registry,
    submission: Submission,
    now: DateTime<Utc>,
) -> Result<(Registry, UpsertReport)> {
    let Submission {
        current_key,
        caregiver,
        children,
    } = submission;

    if caregiver.name.trim().is_empty() {
        return Err(Error::validation(
            "caregiver_name",
            "Caregiver Name is required.",
        ));
    }
    if let Some(old) = &current_key {
        if registry.caregiver(old).is_none() {
            return Err(Error::caregiver_not_found(old));
        }
    }

    let key = caregiver.key();
    let previous_key = current_key.filter(|old| old != &key);
    let owned = |k: &CaregiverKey| k == &key || previous_key.as_ref() == Some(k);

    let replaced_existing = registry.caregivers.iter().any(|c| owned(&c.key));
    let row = caregiver.into_caregiver(key.clone(), now);

    let mut phones_filled = 0;
    let new_children: Vec<Child> = children
        .into_iter()
        .filter(|child| !child.trimmed_name().is_empty())
        .map(|input| {
            let mut child = input.into_child(key.clone(), &row.name, now);
            if child.has_blank_phone() && !row.phone_number.is_empty() {
                child.phone_number.clone_from(&row.phone_number);
                phones_filled += 1;
            }
            child
        })
        .collect();

    let children_removed = registry
        .children
        .iter()
        .filter(|c| owned(&c.caregiver_key))
        .count();
    let children_saved = new_children.len();

    let mut caregivers: Vec<Caregiver> = registry
        .caregivers
        .iter()
        .filter(|c| !owned(&c.key))
        .cloned()
        .collect();
    caregivers.push(row);

    let mut all_children: Vec<Child> = registry
        .children
        .iter()
        .filter(|c| !owned(&c.caregiver_key))
        .cloned()
        .collect();
    all_children.extend(new_children);

    debug!(
        key = %key,
        previous_key = ?previous_key.as_ref().map(CaregiverKey::as_str),
        children_saved,
        children_removed,
        "Upserted caregiver"
    );

    Ok((
        Registry::new(caregivers, all_children),
        UpsertReport {
            key,
            previous_key,
            replaced_existing,
            children_saved,
            children_removed,
            phones_filled,
        },
    ))
}

/// Replace a caregiver row without resubmitting their children.
///
/// With `current_key` set, this is an edit of an existing caregiver: if the
/// new name or phone yields a different key, the children under the old key
/// move to the new key. Moved children get the new caregiver name but keep
/// their own phone numbers. Without `current_key`, children already filed
/// under the derived key are kept as they are.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a blank caregiver name and
/// [`Error::CaregiverNotFound`] if `current_key` is not in the registry.
pub fn update_caregiver(
    registry: &Registry,
    current_key: Option<&CaregiverKey>,
    input: CaregiverInput,
    now: DateTime<Utc>,
) -> Result<(Registry, EditReport)> {
    if input.name.trim().is_empty() {
        return Err(Error::validation(
            "caregiver_name",
            "Caregiver Name is required.",
        ));
    }
    if let Some(old) = current_key {
        if registry.caregiver(old).is_none() {
            return Err(Error::caregiver_not_found(old));
        }
    }

    let key = input.key();
    let previous_key = current_key.filter(|old| *old != &key).cloned();
    let owned = |k: &CaregiverKey| k == &key || previous_key.as_ref() == Some(k);

    let replaced_existing = registry.caregivers.iter().any(|c| owned(&c.key));
    let row = input.into_caregiver(key.clone(), now);

    let mut caregivers: Vec<Caregiver> = registry
        .caregivers
        .iter()
        .filter(|c| !owned(&c.key))
        .cloned()
        .collect();

    let mut children_moved = 0;
    let children: Vec<Child> = registry
        .children
        .iter()
        .cloned()
        .map(|mut child| {
            if !owned(&child.caregiver_key) {
                return child;
            }
            if child.caregiver_key != key {
                child.caregiver_key = key.clone();
                child.last_updated = now;
                children_moved += 1;
            }
            if child.caregiver_name != row.name {
                child.caregiver_name.clone_from(&row.name);
                child.last_updated = now;
            }
            child
        })
        .collect();
    caregivers.push(row);

    debug!(key = %key, children_moved, "Updated caregiver");

    Ok((
        Registry::new(caregivers, children),
        EditReport {
            key,
            previous_key,
            replaced_existing,
            children_moved,
        },
    ))
}

/// Delete a caregiver and every child filed under their key.
///
/// Both removals land in the same returned snapshot. Orphaned children under
/// a key with no caregiver row are removed as well.
///
/// # Errors
///
/// Returns [`Error::CaregiverNotFound`] if nothing references `key`.
pub fn delete_caregiver(registry: &Registry, key: &CaregiverKey) -> Result<(Registry, DeleteReport)> {
    let caregivers: Vec<Caregiver> = registry
        .caregivers
        .iter()
        .filter(|c| &c.key != key)
        .cloned()
        .collect();
    let children: Vec<Child> = registry
        .children
        .iter()
        .filter(|c| &c.caregiver_key != key)
        .cloned()
        .collect();

    let report = DeleteReport {
        caregiver_removed: caregivers.len() < registry.caregivers.len(),
        children_removed: registry.children.len() - children.len(),
    };
    if !report.caregiver_removed && report.children_removed == 0 {
        return Err(Error::caregiver_not_found(key));
    }

    debug!(key = %key, children_removed = report.children_removed, "Deleted caregiver");
    Ok((Registry::new(caregivers, children), report))
}

/// Insert or replace one child of an existing caregiver.
///
/// The child is matched by caregiver key and trimmed name. Unlike
/// [`upsert_caregiver`], a blank phone stays blank; run
/// [`backfill_child_phones`] to fill it.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a blank child name and
/// [`Error::CaregiverNotFound`] if no caregiver has `key`.
pub fn upsert_child(
    registry: &Registry,
    key: &CaregiverKey,
    input: ChildInput,
    now: DateTime<Utc>,
) -> Result<(Registry, ChildUpsert)> {
    if input.trimmed_name().is_empty() {
        return Err(Error::validation("child_name", "Child name is required."));
    }
    let caregiver = registry
        .caregiver(key)
        .ok_or_else(|| Error::caregiver_not_found(key))?;

    let child = input.into_child(key.clone(), &caregiver.name, now);
    let mut children: Vec<Child> = registry
        .children
        .iter()
        .filter(|c| !(&c.caregiver_key == key && c.name == child.name))
        .cloned()
        .collect();
    let replaced = children.len() < registry.children.len();
    children.push(child);

    Ok((
        Registry::new(registry.caregivers.clone(), children),
        ChildUpsert { replaced },
    ))
}

/// Copy caregiver phone numbers into children that have none.
///
/// Returns the updated children and how many rows changed. Children whose
/// caregiver is missing or has a blank phone are left alone, so running this
/// twice changes nothing the second time.
#[must_use]
pub fn backfill_child_phones(caregivers: &[Caregiver], children: Vec<Child>) -> (Vec<Child>, usize) {
    let phones: HashMap<&CaregiverKey, &str> = caregivers
        .iter()
        .map(|c| (&c.key, c.phone_number.trim()))
        .filter(|(_, phone)| !phone.is_empty())
        .collect();

    let mut updated = 0;
    let children = children
        .into_iter()
        .map(|mut child| {
            if child.has_blank_phone() {
                if let Some(phone) = phones.get(&child.caregiver_key) {
                    child.phone_number = (*phone).to_string();
                    updated += 1;
                }
            }
            child
        })
        .collect();

    debug!(updated, "Backfilled child phone numbers");
    (children, updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, hour, 0, 0).unwrap()
    }

    fn jane() -> CaregiverInput {
        CaregiverInput::new("Jane Doe", "0803-111-2222")
    }

    fn child(name: &str, phone: &str) -> ChildInput {
        ChildInput {
            name: name.to_string(),
            phone: phone.to_string(),
            ..ChildInput::default()
        }
    }

    fn saved(children: Vec<ChildInput>) -> Registry {
        let (registry, _) =
            upsert_caregiver(&Registry::default(), Submission::new(jane(), children), t(9)).unwrap();
        registry
    }

    #[test]
    fn test_upsert_new_caregiver() {
        let (registry, report) = upsert_caregiver(
            &Registry::default(),
            Submission::new(jane(), vec![child("Tom", ""), child("Ada", "0701")]),
            t(9),
        )
        .unwrap();

        assert_eq!(report.key.as_str(), "a00da052508c");
        assert!(!report.replaced_existing);
        assert_eq!(report.children_saved, 2);
        assert_eq!(report.phones_filled, 1);
        assert_eq!(registry.caregivers.len(), 1);
        assert_eq!(registry.caregivers[0].last_updated, t(9));

        let tom = registry.children.iter().find(|c| c.name == "Tom").unwrap();
        assert_eq!(tom.phone_number, "0803-111-2222");
        assert_eq!(tom.caregiver_name, "Jane Doe");
        let ada = registry.children.iter().find(|c| c.name == "Ada").unwrap();
        assert_eq!(ada.phone_number, "0701");
    }

    #[test]
    fn test_upsert_drops_blank_child_names() {
        let registry = saved(vec![child("  ", "0701"), ChildInput::default(), child("Tom", "")]);
        assert_eq!(registry.children.len(), 1);
    }

    #[test]
    fn test_upsert_is_full_replacement() {
        let registry = saved(vec![child("Tom", "")]);

        let mut again = jane();
        again.profession = "Trader".to_string();
        let (registry, report) =
            upsert_caregiver(&registry, Submission::new(again, vec![child("Ada", "")]), t(10))
                .unwrap();

        assert!(report.replaced_existing);
        assert_eq!(report.children_removed, 1);
        assert_eq!(registry.caregivers.len(), 1);
        assert_eq!(registry.caregivers[0].profession, "Trader");
        assert_eq!(registry.children.len(), 1);
        assert_eq!(registry.children[0].name, "Ada");
    }

    #[test]
    fn test_upsert_with_empty_children_deletes_them() {
        let registry = saved(vec![child("Tom", ""), child("Ada", "")]);
        let key = jane().key();

        let (registry, report) =
            upsert_caregiver(&registry, Submission::new(jane(), vec![]), t(10)).unwrap();

        assert_eq!(report.children_removed, 2);
        assert_eq!(registry.children_of(&key).count(), 0);
        assert!(registry.caregiver(&key).is_some());
    }

    #[test]
    fn test_upsert_leaves_other_caregivers_alone() {
        let registry = saved(vec![child("Tom", "")]);
        let (registry, _) = upsert_caregiver(
            &registry,
            Submission::new(CaregiverInput::new("Bayo", "0802"), vec![child("Kemi", "")]),
            t(10),
        )
        .unwrap();

        assert_eq!(registry.caregivers.len(), 2);
        assert_eq!(registry.children.len(), 2);
    }

    #[test]
    fn test_upsert_rekey_moves_children() {
        let registry = saved(vec![child("Tom", ""), child("Ada", "")]);
        let old_key = jane().key();

        let edited = CaregiverInput::new("Jane Doe", "0803-999-0000");
        let submission = Submission::new(edited, vec![child("Tom", ""), child("Ada", "")])
            .editing(old_key.clone());
        let (registry, report) = upsert_caregiver(&registry, submission, t(10)).unwrap();

        assert_eq!(report.previous_key, Some(old_key.clone()));
        assert!(registry.caregiver(&old_key).is_none());
        assert_eq!(registry.children_of(&old_key).count(), 0);
        assert_eq!(registry.children_of(&report.key).count(), 2);
        assert_eq!(registry.caregivers.len(), 1);
    }

    #[test]
    fn test_upsert_failure_leaves_input_untouched() {
        let registry = saved(vec![child("Tom", "")]);
        let before = registry.clone();

        let result = upsert_caregiver(
            &registry,
            Submission::new(CaregiverInput::new("", "0803"), vec![]),
            t(10),
        );
        assert!(result.unwrap_err().is_validation_error());

        let missing = Submission::new(jane(), vec![]).editing("ffffffffffff".parse().unwrap());
        assert!(upsert_caregiver(&registry, missing, t(10)).unwrap_err().is_not_found());
        assert_eq!(registry, before);
    }

    #[test]
    fn test_phone_change_scenario() {
        // Tom was filed without a phone, e.g. by a child import.
        let registry = saved(vec![]);
        let old_key = jane().key();
        let (registry, _) = upsert_child(&registry, &old_key, child("Tom", ""), t(9)).unwrap();
        assert_eq!(registry.children[0].phone_number, "");

        let edited = CaregiverInput::new("Jane Doe", "0803-999-0000");
        let (registry, report) =
            update_caregiver(&registry, Some(&old_key), edited, t(10)).unwrap();
        let new_key = report.key.clone();

        assert_ne!(new_key, old_key);
        assert_eq!(report.children_moved, 1);
        assert!(registry.caregiver(&old_key).is_none());
        assert!(registry.caregiver(&new_key).is_some());
        assert_eq!(registry.children_of(&old_key).count(), 0);
        let tom = registry.children_of(&new_key).next().unwrap();
        assert_eq!(tom.name, "Tom");
        assert_eq!(tom.phone_number, "");

        let (children, updated) = backfill_child_phones(&registry.caregivers, registry.children);
        assert_eq!(updated, 1);
        assert_eq!(children[0].phone_number, "0803-999-0000");
    }

    #[test]
    fn test_update_without_key_change_keeps_children() {
        let registry = saved(vec![child("Tom", "")]);
        let key = jane().key();

        let mut edited = jane();
        edited.name = "jane DOE".to_string();
        edited.address = "12 Allen Avenue".to_string();
        let (registry, report) = update_caregiver(&registry, Some(&key), edited, t(10)).unwrap();

        assert_eq!(report.key, key);
        assert_eq!(report.previous_key, None);
        assert_eq!(report.children_moved, 0);
        assert_eq!(registry.caregivers[0].address, "12 Allen Avenue");
        assert_eq!(registry.children[0].caregiver_name, "jane DOE");
    }

    #[test]
    fn test_update_without_current_key_keeps_existing_children() {
        let registry = saved(vec![child("Tom", "")]);
        let mut imported = jane();
        imported.bank = "First Bank".to_string();

        let (registry, report) = update_caregiver(&registry, None, imported, t(10)).unwrap();
        assert!(report.replaced_existing);
        assert_eq!(registry.caregivers.len(), 1);
        assert_eq!(registry.caregivers[0].bank, "First Bank");
        assert_eq!(registry.children.len(), 1);
    }

    #[test]
    fn test_delete_removes_caregiver_and_children() {
        let registry = saved(vec![child("Tom", ""), child("Ada", "")]);
        let (registry, _) = upsert_caregiver(
            &registry,
            Submission::new(CaregiverInput::new("Bayo", "0802"), vec![child("Kemi", "")]),
            t(10),
        )
        .unwrap();
        let key = jane().key();

        let (registry, report) = delete_caregiver(&registry, &key).unwrap();
        assert!(report.caregiver_removed);
        assert_eq!(report.children_removed, 2);
        assert!(registry.caregivers.iter().all(|c| c.key != key));
        assert!(registry.children.iter().all(|c| c.caregiver_key != key));
        assert_eq!(registry.children.len(), 1);
    }

    #[test]
    fn test_delete_unknown_key() {
        let err = delete_caregiver(&Registry::default(), &jane().key()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_upsert_child_replaces_by_name() {
        let registry = saved(vec![child("Tom", "")]);
        let key = jane().key();

        let older = ChildInput {
            age: Some(6),
            ..child(" Tom ", "")
        };
        let (registry, outcome) = upsert_child(&registry, &key, older, t(10)).unwrap();
        assert!(outcome.replaced);
        assert_eq!(registry.children.len(), 1);
        assert_eq!(registry.children[0].age, Some(6));

        let (registry, outcome) = upsert_child(&registry, &key, child("Ada", ""), t(10)).unwrap();
        assert!(!outcome.replaced);
        assert_eq!(registry.children.len(), 2);
    }

    #[test]
    fn test_upsert_child_requires_caregiver() {
        let err = upsert_child(
            &Registry::default(),
            &jane().key(),
            child("Tom", ""),
            t(9),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_backfill_is_idempotent() {
        let registry = saved(vec![]);
        let key = jane().key();
        let (registry, _) = upsert_child(&registry, &key, child("Tom", ""), t(9)).unwrap();
        let (registry, _) = upsert_child(&registry, &key, child("Ada", "0701"), t(9)).unwrap();

        let (children, first) = backfill_child_phones(&registry.caregivers, registry.children);
        assert_eq!(first, 1);
        let snapshot = children.clone();

        let (children, second) = backfill_child_phones(&registry.caregivers, children);
        assert_eq!(second, 0);
        assert_eq!(children, snapshot);
    }

    #[test]
    fn test_backfill_skips_blank_caregiver_phone_and_orphans() {
        let now = t(9);
        let no_phone = CaregiverInput::new("Bayo", "");
        let key = no_phone.key();
        let caregivers = vec![no_phone.into_caregiver(key.clone(), now)];
        let children = vec![
            child("Kemi", "").into_child(key, "Bayo", now),
            child("Lost", "").into_child(jane().key(), "Jane Doe", now),
        ];

        let (children, updated) = backfill_child_phones(&caregivers, children);
        assert_eq!(updated, 0);
        assert!(children.iter().all(Child::has_blank_phone));
    }
}
