//! Child rows and the inputs that produce them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{age_on, ClassLevel, EducationLevel, Gender};
use crate::identity::CaregiverKey;

/// A child row as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    /// Key of the caregiver this child belongs to.
    pub caregiver_key: CaregiverKey,
    /// Copy of the caregiver's name, for display.
    pub caregiver_name: String,
    /// The child's name (never empty).
    #[serde(rename = "child_name")]
    pub name: String,
    /// Gender.
    #[serde(rename = "child_gender")]
    pub gender: Gender,
    /// Phone number; filled from the caregiver when left blank on save.
    #[serde(rename = "child_phone_number")]
    pub phone_number: String,
    /// Age in years.
    #[serde(rename = "child_age")]
    pub age: Option<u32>,
    /// Date of birth.
    #[serde(rename = "child_date_of_birth")]
    pub date_of_birth: Option<NaiveDate>,
    /// Education level.
    #[serde(rename = "child_education_level")]
    pub education_level: Option<EducationLevel>,
    /// School name.
    #[serde(rename = "child_school_name")]
    pub school_name: String,
    /// Current class or level.
    #[serde(rename = "child_class_level")]
    pub class_level: Option<ClassLevel>,
    /// Profession, if working.
    #[serde(rename = "child_profession")]
    pub profession: String,
    /// When this row was last written.
    pub last_updated: DateTime<Utc>,
}

impl Child {
    /// Whether the phone number is missing.
    #[must_use]
    pub fn has_blank_phone(&self) -> bool {
        self.phone_number.trim().is_empty()
    }
}

/// Child fields as submitted alongside a caregiver or in an import row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildInput {
    /// The child's name.
    #[serde(alias = "child_name")]
    pub name: String,
    /// Gender.
    #[serde(alias = "child_gender")]
    pub gender: Gender,
    /// Phone number; blank means "use the caregiver's".
    #[serde(alias = "child_phone_number")]
    pub phone: String,
    /// Age in years.
    #[serde(alias = "child_age")]
    pub age: Option<u32>,
    /// Date of birth.
    #[serde(alias = "child_date_of_birth")]
    pub date_of_birth: Option<NaiveDate>,
    /// Education level.
    #[serde(alias = "child_education_level")]
    pub education_level: Option<EducationLevel>,
    /// School name.
    #[serde(alias = "child_school_name")]
    pub school_name: String,
    /// Current class or level.
    #[serde(alias = "child_class_level")]
    pub class_level: Option<ClassLevel>,
    /// Profession.
    #[serde(alias = "child_profession")]
    pub profession: String,
}

impl ChildInput {
    /// Create an input with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The trimmed name.
    #[must_use]
    pub fn trimmed_name(&self) -> &str {
        self.name.trim()
    }

    /// Whether every field is empty, i.e. an untouched template row.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.trimmed_name().is_empty() && !self.has_details()
    }

    /// Whether any field other than the name carries a value.
    #[must_use]
    pub fn has_details(&self) -> bool {
        self.gender != Gender::Unspecified
            || !self.phone.trim().is_empty()
            || self.age.is_some()
            || self.date_of_birth.is_some()
            || self.education_level.is_some()
            || !self.school_name.trim().is_empty()
            || self.class_level.is_some()
            || !self.profession.trim().is_empty()
    }

    /// Build the stored row under the given caregiver.
    ///
    /// The phone is stored as given (trimmed); phone fallback is the
    /// reconciliation engine's job.
    #[must_use]
    pub fn into_child(
        self,
        caregiver_key: CaregiverKey,
        caregiver_name: &str,
        now: DateTime<Utc>,
    ) -> Child {
        let age = self
            .age
            .or_else(|| self.date_of_birth.map(|dob| age_on(dob, now.date_naive())));
        Child {
            caregiver_key,
            caregiver_name: caregiver_name.trim().to_string(),
            name: self.name.trim().to_string(),
            gender: self.gender,
            phone_number: self.phone.trim().to_string(),
            age,
            date_of_birth: self.date_of_birth,
            education_level: self.education_level,
            school_name: self.school_name.trim().to_string(),
            class_level: self.class_level,
            profession: self.profession.trim().to_string(),
            last_updated: now,
        }
    }
}

impl From<&Child> for ChildInput {
    fn from(row: &Child) -> Self {
        Self {
            name: row.name.clone(),
            gender: row.gender,
            phone: row.phone_number.clone(),
            age: row.age,
            date_of_birth: row.date_of_birth,
            education_level: row.education_level,
            school_name: row.school_name.clone(),
            class_level: row.class_level,
            profession: row.profession.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_blank_template_row() {
        assert!(ChildInput::default().is_blank());
        assert!(!ChildInput::named("Tom").is_blank());

        let nameless = ChildInput {
            age: Some(4),
            ..ChildInput::default()
        };
        assert!(!nameless.is_blank());
        assert!(nameless.has_details());
    }

    #[test]
    fn test_into_child() {
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap();
        let key = CaregiverKey::derive("Jane Doe", "0803");
        let input = ChildInput {
            name: " Tom ".to_string(),
            education_level: Some(EducationLevel::Primary),
            date_of_birth: NaiveDate::from_ymd_opt(2021, 3, 1),
            ..ChildInput::default()
        };
        let child = input.into_child(key.clone(), " Jane Doe ", now);

        assert_eq!(child.caregiver_key, key);
        assert_eq!(child.caregiver_name, "Jane Doe");
        assert_eq!(child.name, "Tom");
        assert_eq!(child.age, Some(5));
        assert!(child.has_blank_phone());
    }

    #[test]
    fn test_child_serializes_with_column_names() {
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap();
        let child = ChildInput::named("Tom").into_child(
            CaregiverKey::derive("Jane", "1"),
            "Jane",
            now,
        );
        let value = serde_json::to_value(&child).unwrap();
        assert_eq!(value["child_name"], "Tom");
        assert_eq!(value["child_gender"], "");
        assert!(value["child_education_level"].is_null());
    }

    #[test]
    fn test_input_accepts_column_names() {
        let json = r#"{"child_name": "Tom", "child_age": 5, "child_class_level": "Primary 1"}"#;
        let input: ChildInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.name, "Tom");
        assert_eq!(input.age, Some(5));
        assert_eq!(input.class_level, Some(ClassLevel::Primary1));
    }
}
