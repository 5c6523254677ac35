//! Caregiver rows and the inputs that produce them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{age_on, Gender};
use crate::identity::CaregiverKey;

/// A caregiver row as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caregiver {
    /// Identity key derived from name and phone.
    #[serde(rename = "caregiver_key")]
    pub key: CaregiverKey,
    /// Full name.
    #[serde(rename = "caregiver_name")]
    pub name: String,
    /// Gender.
    pub gender: Gender,
    /// Profession.
    pub profession: String,
    /// Date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Age in years, entered or derived from the date of birth.
    pub age: Option<u32>,
    /// Phone number as entered.
    pub phone_number: String,
    /// Postal address.
    pub address: String,
    /// Zonal leader responsible for this caregiver.
    pub zonal_leader: String,
    /// Bank name.
    pub bank: String,
    /// Bank account number.
    pub account_number: String,
    /// Declared number of children, independent of linked child rows.
    pub number_of_kids: Option<u32>,
    /// When this row was last written.
    pub last_updated: DateTime<Utc>,
}

/// Caregiver fields as submitted by a form, file, or command line.
///
/// Field aliases accept the stored column names so exported rows can be fed
/// straight back in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaregiverInput {
    /// Full name (required).
    #[serde(alias = "caregiver_name")]
    pub name: String,
    /// Gender.
    pub gender: Gender,
    /// Profession.
    pub profession: String,
    /// Date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Age in years.
    pub age: Option<u32>,
    /// Phone number.
    #[serde(alias = "phone_number")]
    pub phone: String,
    /// Postal address.
    pub address: String,
    /// Zonal leader.
    pub zonal_leader: String,
    /// Bank name.
    pub bank: String,
    /// Bank account number.
    pub account_number: String,
    /// Declared number of children.
    pub number_of_kids: Option<u32>,
}

impl CaregiverInput {
    /// Create an input with just a name and phone.
    #[must_use]
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            ..Self::default()
        }
    }

    /// The identity key this input will be stored under.
    #[must_use]
    pub fn key(&self) -> CaregiverKey {
        CaregiverKey::derive(&self.name, &self.phone)
    }

    /// Build the stored row for this input.
    ///
    /// Text fields are trimmed. A missing age is derived from the date of
    /// birth when one is given.
    #[must_use]
    pub fn into_caregiver(self, key: CaregiverKey, now: DateTime<Utc>) -> Caregiver {
        let age = self
            .age
            .or_else(|| self.date_of_birth.map(|dob| age_on(dob, now.date_naive())));
        Caregiver {
            key,
            name: self.name.trim().to_string(),
            gender: self.gender,
            profession: self.profession.trim().to_string(),
            date_of_birth: self.date_of_birth,
            age,
            phone_number: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            zonal_leader: self.zonal_leader.trim().to_string(),
            bank: self.bank.trim().to_string(),
            account_number: self.account_number.trim().to_string(),
            number_of_kids: self.number_of_kids,
            last_updated: now,
        }
    }
}

impl From<&Caregiver> for CaregiverInput {
    fn from(row: &Caregiver) -> Self {
        Self {
            name: row.name.clone(),
            gender: row.gender,
            profession: row.profession.clone(),
            date_of_birth: row.date_of_birth,
            age: row.age,
            phone: row.phone_number.clone(),
            address: row.address.clone(),
            zonal_leader: row.zonal_leader.clone(),
            bank: row.bank.clone(),
            account_number: row.account_number.clone(),
            number_of_kids: row.number_of_kids,
        }
    }
}

/// A partial edit of an existing caregiver.
///
/// `None` leaves a field as it is. Changing `name` or `phone` changes the
/// caregiver's identity key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaregiverPatch {
    /// New name.
    pub name: Option<String>,
    /// New gender.
    pub gender: Option<Gender>,
    /// New profession.
    pub profession: Option<String>,
    /// New date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// New age.
    pub age: Option<u32>,
    /// New phone number.
    pub phone: Option<String>,
    /// New address.
    pub address: Option<String>,
    /// New zonal leader.
    pub zonal_leader: Option<String>,
    /// New bank name.
    pub bank: Option<String>,
    /// New account number.
    pub account_number: Option<String>,
    /// New declared number of children.
    pub number_of_kids: Option<u32>,
}

impl CaregiverPatch {
    /// Apply the patch on top of an existing row.
    #[must_use]
    pub fn apply(self, row: &Caregiver) -> CaregiverInput {
        let mut input = CaregiverInput::from(row);
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(gender) = self.gender {
            input.gender = gender;
        }
        if let Some(profession) = self.profession {
            input.profession = profession;
        }
        if let Some(dob) = self.date_of_birth {
            input.date_of_birth = Some(dob);
            // a new date of birth re-derives the age unless one is given
            input.age = self.age;
        } else if self.age.is_some() {
            input.age = self.age;
        }
        if let Some(phone) = self.phone {
            input.phone = phone;
        }
        if let Some(address) = self.address {
            input.address = address;
        }
        if let Some(zonal_leader) = self.zonal_leader {
            input.zonal_leader = zonal_leader;
        }
        if let Some(bank) = self.bank {
            input.bank = bank;
        }
        if let Some(account_number) = self.account_number {
            input.account_number = account_number;
        }
        if self.number_of_kids.is_some() {
            input.number_of_kids = self.number_of_kids;
        }
        input
    }

    /// Whether the patch changes anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_into_caregiver_trims_and_derives_age() {
        let mut input = CaregiverInput::new("  Jane Doe ", " 0803-111-2222 ");
        input.date_of_birth = NaiveDate::from_ymd_opt(1990, 1, 1);
        let key = input.key();
        let row = input.into_caregiver(key.clone(), now());

        assert_eq!(row.key, key);
        assert_eq!(row.name, "Jane Doe");
        assert_eq!(row.phone_number, "0803-111-2222");
        assert_eq!(row.age, Some(36));
        assert_eq!(row.last_updated, now());
    }

    #[test]
    fn test_entered_age_wins_over_date_of_birth() {
        let mut input = CaregiverInput::new("Jane", "1");
        input.date_of_birth = NaiveDate::from_ymd_opt(1990, 1, 1);
        input.age = Some(40);
        let row = input.into_caregiver(CaregiverKey::derive("Jane", "1"), now());
        assert_eq!(row.age, Some(40));
    }

    #[test]
    fn test_input_accepts_column_names() {
        let json = r#"{"caregiver_name": "Jane Doe", "phone_number": "0803", "gender": "female"}"#;
        let input: CaregiverInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.name, "Jane Doe");
        assert_eq!(input.phone, "0803");
        assert_eq!(input.gender, Gender::Female);
    }

    #[test]
    fn test_row_serializes_with_column_names() {
        let row = CaregiverInput::new("Jane Doe", "0803").into_caregiver(
            CaregiverKey::derive("Jane Doe", "0803"),
            now(),
        );
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("caregiver_key").is_some());
        assert!(value.get("caregiver_name").is_some());
        assert!(value.get("phone_number").is_some());
    }

    #[test]
    fn test_patch_apply() {
        let row = CaregiverInput::new("Jane Doe", "0803-111-2222").into_caregiver(
            CaregiverKey::derive("Jane Doe", "0803-111-2222"),
            now(),
        );
        let patch = CaregiverPatch {
            phone: Some("0803-999-0000".to_string()),
            zonal_leader: Some("Mrs Bello".to_string()),
            ..CaregiverPatch::default()
        };
        assert!(!patch.is_empty());

        let input = patch.apply(&row);
        assert_eq!(input.name, "Jane Doe");
        assert_eq!(input.phone, "0803-999-0000");
        assert_eq!(input.zonal_leader, "Mrs Bello");
        assert_ne!(input.key(), row.key);
    }

    #[test]
    fn test_empty_patch() {
        assert!(CaregiverPatch::default().is_empty());
    }
}
