//! Filtering of caregivers and children for listings and exports.

use regex::{Regex, RegexBuilder};

use crate::records::fields::labelled_enum;
use crate::records::{Caregiver, Child, EducationLevel, Gender, Registry};

labelled_enum! {
    /// Age bracket used to group caregivers.
    CaregiverAgeGroup, "age group" {
        /// Younger than 18.
        Under18 => "Under 18",
        /// 18 to 29.
        From18To29 => "18-29",
        /// 30 to 39.
        From30To39 => "30-39",
        /// 40 to 49.
        From40To49 => "40-49",
        /// 50 to 59.
        From50To59 => "50-59",
        /// 60 and older.
        Over60 => "60+",
        /// No age recorded.
        Unknown => "Unknown",
    }
}

impl CaregiverAgeGroup {
    /// The bracket an age falls into.
    #[must_use]
    pub fn of(age: Option<u32>) -> Self {
        match age {
            None => Self::Unknown,
            Some(0..=17) => Self::Under18,
            Some(18..=29) => Self::From18To29,
            Some(30..=39) => Self::From30To39,
            Some(40..=49) => Self::From40To49,
            Some(50..=59) => Self::From50To59,
            Some(_) => Self::Over60,
        }
    }
}

labelled_enum! {
    /// Age bracket used to group children.
    ChildAgeGroup, "age group" {
        /// Up to 5.
        UpTo5 => "0-5",
        /// 6 to 12.
        From6To12 => "6-12",
        /// 13 to 17.
        From13To17 => "13-17",
        /// 18 to 25.
        From18To25 => "18-25",
        /// 26 and older.
        Over26 => "26+",
        /// No age recorded.
        Unknown => "Unknown",
    }
}

impl ChildAgeGroup {
    /// The bracket an age falls into.
    #[must_use]
    pub fn of(age: Option<u32>) -> Self {
        match age {
            None => Self::Unknown,
            Some(0..=5) => Self::UpTo5,
            Some(6..=12) => Self::From6To12,
            Some(13..=17) => Self::From13To17,
            Some(18..=25) => Self::From18To25,
            Some(_) => Self::Over26,
        }
    }
}

/// A case-insensitive name search.
///
/// The text is used as a regular expression when it compiles as one and
/// matched literally otherwise, so `"o'neil ("` still finds `O'Neil (Snr)`.
#[derive(Debug, Clone)]
pub struct NamePattern(Regex);

impl NamePattern {
    /// Build a pattern from user text. Returns `None` for blank text.
    #[must_use]
    pub fn new(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let regex = RegexBuilder::new(text)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(text))
                    .case_insensitive(true)
                    .build()
            })
            .ok()?;
        Some(Self(regex))
    }

    /// Whether `name` matches.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

fn any_or_contains<T: PartialEq>(wanted: &[T], value: &T) -> bool {
    wanted.is_empty() || wanted.contains(value)
}

fn any_or_text(wanted: &[String], value: &str) -> bool {
    wanted.is_empty() || wanted.iter().any(|w| w.trim().eq_ignore_ascii_case(value.trim()))
}

/// Selects caregivers. Empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct CaregiverFilter {
    /// Caregiver name search.
    pub name: Option<NamePattern>,
    /// Allowed genders.
    pub genders: Vec<Gender>,
    /// Allowed age brackets.
    pub age_groups: Vec<CaregiverAgeGroup>,
    /// Allowed professions (case-insensitive).
    pub professions: Vec<String>,
    /// Allowed zonal leaders (case-insensitive).
    pub zonal_leaders: Vec<String>,
}

impl CaregiverFilter {
    /// Whether a caregiver passes every criterion.
    #[must_use]
    pub fn matches(&self, caregiver: &Caregiver) -> bool {
        self.name.as_ref().map_or(true, |p| p.is_match(&caregiver.name))
            && any_or_contains(&self.genders, &caregiver.gender)
            && any_or_contains(&self.age_groups, &CaregiverAgeGroup::of(caregiver.age))
            && any_or_text(&self.professions, &caregiver.profession)
            && any_or_text(&self.zonal_leaders, &caregiver.zonal_leader)
    }

    /// The caregivers that pass, in order.
    pub fn apply<'a>(&'a self, caregivers: &'a [Caregiver]) -> impl Iterator<Item = &'a Caregiver> + 'a {
        caregivers.iter().filter(move |c| self.matches(c))
    }
}

/// Selects children. Empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct ChildFilter {
    /// Search over the child's or the caregiver's name.
    pub name: Option<NamePattern>,
    /// Allowed genders.
    pub genders: Vec<Gender>,
    /// Allowed age brackets.
    pub age_groups: Vec<ChildAgeGroup>,
    /// Allowed education levels.
    pub education_levels: Vec<EducationLevel>,
    /// Allowed professions (case-insensitive).
    pub professions: Vec<String>,
}

impl ChildFilter {
    /// Whether a child passes every criterion.
    #[must_use]
    pub fn matches(&self, child: &Child) -> bool {
        let education_ok = self.education_levels.is_empty()
            || child
                .education_level
                .is_some_and(|level| self.education_levels.contains(&level));
        self.name
            .as_ref()
            .map_or(true, |p| p.is_match(&child.name) || p.is_match(&child.caregiver_name))
            && any_or_contains(&self.genders, &child.gender)
            && any_or_contains(&self.age_groups, &ChildAgeGroup::of(child.age))
            && education_ok
            && any_or_text(&self.professions, &child.profession)
    }

    /// The children that pass, in order.
    pub fn apply<'a>(&'a self, children: &'a [Child]) -> impl Iterator<Item = &'a Child> + 'a {
        children.iter().filter(move |c| self.matches(c))
    }
}

/// A registry holding only the rows that pass each filter.
///
/// The two filters are applied independently.
#[must_use]
pub fn filter_registry(registry: &Registry, caregivers: &CaregiverFilter, children: &ChildFilter) -> Registry {
    Registry::new(
        caregivers.apply(&registry.caregivers).cloned().collect(),
        children.apply(&registry.children).cloned().collect(),
    )
}
