//! Enumerated record fields.
//!
//! Each enum serializes to the label stored in the registry tables and parses
//! case-insensitively from user input and imported files.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every value, in display order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stored label.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> $crate::error::Result<Self> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| $crate::error::Error::InvalidValue {
                        field: $field,
                        value: wanted.to_string(),
                    })
            }
        }
    };
}

pub(crate) use labelled_enum;

labelled_enum! {
    /// Recorded gender. `Unspecified` is stored as an empty string.
    Gender, "gender" {
        /// Not recorded.
        Unspecified => "",
        /// Male.
        Male => "male",
        /// Female.
        Female => "female",
    }
}

impl Default for Gender {
    fn default() -> Self {
        Self::Unspecified
    }
}

labelled_enum! {
    /// Highest education level reached by a child.
    EducationLevel, "education level" {
        /// Pre-primary.
        PrePrimary => "Pre-primary",
        /// Primary.
        Primary => "Primary",
        /// Junior secondary.
        JuniorSecondary => "Junior Secondary",
        /// O'Level.
        OLevel => "O'Level",
        /// Senior secondary.
        SeniorSecondary => "Senior Secondary",
        /// Tertiary.
        Tertiary => "Tertiary",
        /// Vocational.
        Vocational => "Vocational",
        /// Not in school.
        NotInSchool => "Not in School",
        /// Graduate.
        Graduate => "Graduate",
    }
}

impl EducationLevel {
    /// Whether the child is currently enrolled somewhere.
    #[must_use]
    pub fn is_enrolled(self) -> bool {
        self != Self::NotInSchool
    }

    /// Whether this counts as higher education.
    #[must_use]
    pub fn is_higher(self) -> bool {
        matches!(self, Self::Tertiary | Self::Graduate)
    }
}

labelled_enum! {
    /// Current class or level of a child.
    ClassLevel, "class level" {
        /// Primary 1.
        Primary1 => "Primary 1",
        /// Primary 2.
        Primary2 => "Primary 2",
        /// Primary 3.
        Primary3 => "Primary 3",
        /// Primary 4.
        Primary4 => "Primary 4",
        /// Primary 5.
        Primary5 => "Primary 5",
        /// Primary 6.
        Primary6 => "Primary 6",
        /// Junior secondary 1.
        Jss1 => "JSS1",
        /// Junior secondary 2.
        Jss2 => "JSS2",
        /// Junior secondary 3.
        Jss3 => "JSS3",
        /// Senior secondary 1.
        Ss1 => "SS1",
        /// Senior secondary 2.
        Ss2 => "SS2",
        /// Senior secondary 3.
        Ss3 => "SS3",
        /// National diploma, year 1.
        Nd1 => "ND1",
        /// National diploma, year 2.
        Nd2 => "ND2",
        /// Higher national diploma, year 1.
        Hnd1 => "HND1",
        /// Higher national diploma, year 2.
        Hnd2 => "HND2",
        /// University 100 level.
        Level100 => "100 Level",
        /// University 200 level.
        Level200 => "200 Level",
        /// University 300 level.
        Level300 => "300 Level",
        /// University 400 level.
        Level400 => "400 Level",
        /// University 500 level.
        Level500 => "500 Level",
        /// Left school.
        DroppedOut => "Dropped-Out",
        /// Schooling paused.
        TemporaryPause => "Temporary Pause",
        /// Wants to continue schooling.
        WishToFurther => "Wish to Further",
    }
}

/// Parse an optional enum field where a blank value means "not set".
///
/// # Errors
///
/// Returns [`Error::InvalidValue`] if a non-blank value is not a known label.
pub fn parse_optional<T>(raw: &str) -> Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        raw.parse().map(Some)
    }
}

/// Age in whole years on `today` for someone born on `dob`.
///
/// Returns 0 for dates of birth in the future.
#[must_use]
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_labels() {
        assert_eq!(Gender::Unspecified.as_str(), "");
        assert_eq!("MALE".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(" female ".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("".parse::<Gender>().unwrap(), Gender::Unspecified);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn test_education_level_parse_is_case_insensitive() {
        assert_eq!(
            "o'level".parse::<EducationLevel>().unwrap(),
            EducationLevel::OLevel
        );
        assert_eq!(
            "not in school".parse::<EducationLevel>().unwrap(),
            EducationLevel::NotInSchool
        );
        let err = "PhD".parse::<EducationLevel>().unwrap_err();
        assert!(err.to_string().contains("education level"));
    }

    #[test]
    fn test_education_predicates() {
        assert!(EducationLevel::Primary.is_enrolled());
        assert!(!EducationLevel::NotInSchool.is_enrolled());
        assert!(EducationLevel::Graduate.is_higher());
        assert!(!EducationLevel::Vocational.is_higher());
    }

    #[test]
    fn test_class_level_round_trip_labels() {
        for level in ClassLevel::ALL {
            assert_eq!(level.as_str().parse::<ClassLevel>().unwrap(), *level);
        }
        assert_eq!(ClassLevel::ALL.len(), 24);
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(parse_optional::<ClassLevel>("  ").unwrap(), None);
        assert_eq!(
            parse_optional::<ClassLevel>("jss2").unwrap(),
            Some(ClassLevel::Jss2)
        );
        assert!(parse_optional::<ClassLevel>("Year 9").is_err());
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&EducationLevel::JuniorSecondary).unwrap();
        assert_eq!(json, "\"Junior Secondary\"");
        let gender: Gender = serde_json::from_str("\"\"").unwrap();
        assert_eq!(gender, Gender::Unspecified);
    }

    #[test]
    fn test_age_on() {
        let dob = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        let before = NaiveDate::from_ymd_opt(2026, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        assert_eq!(age_on(dob, before), 35);
        assert_eq!(age_on(dob, on), 36);
        assert_eq!(age_on(on, dob), 0);
    }
}
