//! Submission validation.
//!
//! Submissions are checked here before they reach the reconciliation engine.
//! A rejected submission produces a user-facing [`Error::Validation`] and no
//! mutation happens.

use regex::Regex;

use crate::error::{Error, Result};
use crate::records::{CaregiverInput, ChildInput};

/// Maximum accepted age, in years.
pub const MAX_AGE: u32 = 120;

/// Validates caregiver submissions.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    phone_pattern: Option<Regex>,
}

impl Validator {
    /// A validator that accepts any phone number.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A validator that requires non-blank phone numbers to match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the pattern is not a valid regex.
    pub fn with_phone_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::ConfigValidation {
            message: format!("invalid phone_pattern '{pattern}': {e}"),
        })?;
        Ok(Self {
            phone_pattern: Some(regex),
        })
    }

    /// Validate a caregiver and the child rows submitted with it.
    ///
    /// Child rows are numbered from 1 in error messages. Completely blank
    /// child rows are allowed; the engine drops them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first failing check.
    pub fn check_submission(&self, caregiver: &CaregiverInput, children: &[ChildInput]) -> Result<()> {
        self.check_caregiver(caregiver)?;

        let missing_names: Vec<String> = children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.trimmed_name().is_empty() && child.has_details())
            .map(|(i, _)| format!("Row {}", i + 1))
            .collect();
        if !missing_names.is_empty() {
            return Err(Error::validation(
                "children",
                format!("Child name is required in: {}", missing_names.join(", ")),
            ));
        }

        let mut bad_phones = Vec::new();
        for (i, child) in children.iter().enumerate() {
            if !self.phone_ok(&child.phone) {
                let name = if child.trimmed_name().is_empty() {
                    "Unnamed"
                } else {
                    child.trimmed_name()
                };
                bad_phones.push(format!("Row {}: {name}", i + 1));
            }
            if child.age.is_some_and(|age| age > MAX_AGE) {
                return Err(Error::validation(
                    "children",
                    format!("Row {}: age must be at most {MAX_AGE}", i + 1),
                ));
            }
        }
        if !bad_phones.is_empty() {
            return Err(Error::validation(
                "children",
                format!("Invalid phone number format for: {}", bad_phones.join(", ")),
            ));
        }

        Ok(())
    }

    /// Validate a caregiver on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is blank, the age is out of
    /// range, or the phone fails the configured pattern.
    pub fn check_caregiver(&self, caregiver: &CaregiverInput) -> Result<()> {
        if caregiver.name.trim().is_empty() {
            return Err(Error::validation(
                "caregiver_name",
                "Caregiver Name is required.",
            ));
        }
        if caregiver.age.is_some_and(|age| age > MAX_AGE) {
            return Err(Error::validation(
                "age",
                format!("age must be at most {MAX_AGE}"),
            ));
        }
        if !self.phone_ok(&caregiver.phone) {
            return Err(Error::validation(
                "phone_number",
                format!("Invalid phone number format: {}", caregiver.phone.trim()),
            ));
        }
        Ok(())
    }

    /// Validate a single imported child row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is blank or the phone fails
    /// the configured pattern.
    pub fn check_child(&self, child: &ChildInput) -> Result<()> {
        if child.trimmed_name().is_empty() {
            return Err(Error::validation("child_name", "Child name is required."));
        }
        if !self.phone_ok(&child.phone) {
            return Err(Error::validation(
                "child_phone_number",
                format!("Invalid phone number format: {}", child.phone.trim()),
            ));
        }
        Ok(())
    }

    fn phone_ok(&self, phone: &str) -> bool {
        let phone = phone.trim();
        match &self.phone_pattern {
            Some(pattern) if !phone.is_empty() => pattern.is_match(phone),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caregiver_name_required() {
        let err = Validator::new()
            .check_caregiver(&CaregiverInput::new("   ", "0803"))
            .unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("Caregiver Name is required"));
    }

    #[test]
    fn test_any_phone_accepted_by_default() {
        let v = Validator::new();
        assert!(v.check_caregiver(&CaregiverInput::new("Jane", "call me")).is_ok());
    }

    #[test]
    fn test_phone_pattern() {
        let v = Validator::with_phone_pattern(r"^\+?[0-9 \-]{7,15}$").unwrap();
        assert!(v.check_caregiver(&CaregiverInput::new("Jane", "0803-111-2222")).is_ok());
        assert!(v.check_caregiver(&CaregiverInput::new("Jane", "")).is_ok());
        assert!(v.check_caregiver(&CaregiverInput::new("Jane", "abc")).is_err());
    }

    #[test]
    fn test_invalid_phone_pattern() {
        let err = Validator::with_phone_pattern("[unclosed").unwrap_err();
        assert!(err.to_string().contains("phone_pattern"));
    }

    #[test]
    fn test_child_rows_with_details_need_names() {
        let children = vec![
            ChildInput::named("Tom"),
            ChildInput::default(),
            ChildInput {
                age: Some(3),
                ..ChildInput::default()
            },
        ];
        let err = Validator::new()
            .check_submission(&CaregiverInput::new("Jane", "0803"), &children)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "children: Child name is required in: Row 3"
        );
    }

    #[test]
    fn test_blank_child_rows_are_fine() {
        let children = vec![ChildInput::default(), ChildInput::named("Tom")];
        assert!(Validator::new()
            .check_submission(&CaregiverInput::new("Jane", "0803"), &children)
            .is_ok());
    }

    #[test]
    fn test_child_phone_pattern_lists_rows() {
        let v = Validator::with_phone_pattern(r"^[0-9\-]+$").unwrap();
        let children = vec![ChildInput {
            name: "Tom".to_string(),
            phone: "none".to_string(),
            ..ChildInput::default()
        }];
        let err = v
            .check_submission(&CaregiverInput::new("Jane", "0803"), &children)
            .unwrap_err();
        assert!(err.to_string().contains("Row 1: Tom"));
    }

    #[test]
    fn test_age_limit() {
        let mut input = CaregiverInput::new("Jane", "0803");
        input.age = Some(121);
        assert!(Validator::new().check_caregiver(&input).is_err());
    }

    #[test]
    fn test_check_child() {
        let v = Validator::new();
        assert!(v.check_child(&ChildInput::named("Tom")).is_ok());
        assert!(v.check_child(&ChildInput::named(" ")).is_err());
    }
}
