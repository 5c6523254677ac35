//! Strongly typed registry records.
//!
//! Rows in storage, in exports and in the reconciliation engine all use these
//! types; nothing downstream checks for column presence.

mod caregiver;
mod child;
pub mod fields;

use serde::{Deserialize, Serialize};

pub use caregiver::{Caregiver, CaregiverInput, CaregiverPatch};
pub use child::{Child, ChildInput};
pub use fields::{ClassLevel, EducationLevel, Gender};

use crate::identity::CaregiverKey;

/// The caregiver and children collections, handled as one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Caregiver rows, at most one per key.
    pub caregivers: Vec<Caregiver>,
    /// Child rows, each referencing a caregiver key.
    pub children: Vec<Child>,
}

impl Registry {
    /// Create a registry from two collections.
    #[must_use]
    pub fn new(caregivers: Vec<Caregiver>, children: Vec<Child>) -> Self {
        Self {
            caregivers,
            children,
        }
    }

    /// Find a caregiver by key.
    #[must_use]
    pub fn caregiver(&self, key: &CaregiverKey) -> Option<&Caregiver> {
        self.caregivers.iter().find(|c| &c.key == key)
    }

    /// All children filed under a key.
    pub fn children_of<'a>(&'a self, key: &'a CaregiverKey) -> impl Iterator<Item = &'a Child> + 'a {
        self.children.iter().filter(move |c| &c.caregiver_key == key)
    }

    /// Find the first caregiver with exactly this (trimmed) name.
    #[must_use]
    pub fn caregiver_by_name(&self, name: &str) -> Option<&Caregiver> {
        let name = name.trim();
        self.caregivers.iter().find(|c| c.name == name)
    }

    /// Children whose caregiver key has no caregiver row.
    pub fn orphaned_children(&self) -> impl Iterator<Item = &Child> {
        self.children
            .iter()
            .filter(|child| self.caregiver(&child.caregiver_key).is_none())
    }

    /// Whether both collections are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caregivers.is_empty() && self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_lookups() {
        let now = Utc::now();
        let jane = CaregiverInput::new("Jane Doe", "0803");
        let key = jane.key();
        let registry = Registry::new(
            vec![jane.into_caregiver(key.clone(), now)],
            vec![
                ChildInput::named("Tom").into_child(key.clone(), "Jane Doe", now),
                ChildInput::named("Ada").into_child(
                    CaregiverKey::derive("Gone", "1"),
                    "Gone",
                    now,
                ),
            ],
        );

        assert!(registry.caregiver(&key).is_some());
        assert_eq!(registry.caregiver_by_name(" Jane Doe ").unwrap().key, key);
        assert_eq!(registry.children_of(&key).count(), 1);
        assert_eq!(registry.orphaned_children().count(), 1);
        assert!(!registry.is_empty());
        assert!(Registry::default().is_empty());
    }
}
