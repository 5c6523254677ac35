//! Registry summary statistics.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::query::{CaregiverAgeGroup, ChildAgeGroup};
use crate::records::{EducationLevel, Gender, Registry};
use crate::verification::NameStats;

/// Families with at least this many linked children count as large.
pub const LARGE_FAMILY: usize = 5;

/// A labelled count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    /// Group label.
    pub label: String,
    /// Rows in the group.
    pub count: usize,
}

/// Aggregate figures over the whole registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Number of caregivers.
    pub total_caregivers: usize,
    /// Number of children.
    pub total_children: usize,
    /// Caregivers per gender.
    pub caregivers_by_gender: Vec<Count>,
    /// Caregivers per age bracket.
    pub caregivers_by_age_group: Vec<Count>,
    /// Caregivers per zonal leader, largest first.
    pub caregivers_by_zonal_leader: Vec<Count>,
    /// Caregivers per profession, largest first.
    pub caregivers_by_profession: Vec<Count>,
    /// Children per gender.
    pub children_by_gender: Vec<Count>,
    /// Children per age bracket.
    pub children_by_age_group: Vec<Count>,
    /// Children per education level.
    pub children_by_education: Vec<Count>,
    /// Mean caregiver age, over caregivers with an age.
    pub average_caregiver_age: Option<f64>,
    /// Mean child age, over children with an age.
    pub average_child_age: Option<f64>,
    /// Percentage of all children enrolled in some education.
    pub enrollment_rate: Option<f64>,
    /// Percentage of all children in tertiary or graduate education.
    pub higher_education_rate: Option<f64>,
    /// Children with no education level recorded.
    pub missing_education: usize,
    /// Caregivers with no linked children.
    pub families_without_children: usize,
    /// Caregivers with at least [`LARGE_FAMILY`] linked children.
    pub large_families: usize,
    /// Children aged 6 to 18 who are not in school or have no level recorded.
    pub school_age_not_in_school: usize,
    /// Children whose caregiver key has no caregiver row.
    pub orphaned_children: usize,
    /// Unverified name counts.
    pub unverified: NameStats,
}

impl Summary {
    /// Compute the summary.
    #[must_use]
    pub fn compute(registry: &Registry, unverified: NameStats) -> Self {
        let caregivers = &registry.caregivers;
        let children = &registry.children;

        let mut family_sizes: HashMap<&str, usize> = HashMap::new();
        for child in children {
            *family_sizes.entry(child.caregiver_key.as_str()).or_default() += 1;
        }
        let keys: HashSet<&str> = caregivers.iter().map(|c| c.key.as_str()).collect();

        let with_level = |pred: fn(EducationLevel) -> bool| {
            children
                .iter()
                .filter(|c| c.education_level.is_some_and(pred))
                .count()
        };

        Self {
            total_caregivers: caregivers.len(),
            total_children: children.len(),
            caregivers_by_gender: ordered(Gender::ALL, caregivers.iter().map(|c| c.gender), gender_label),
            caregivers_by_age_group: ordered(
                CaregiverAgeGroup::ALL,
                caregivers.iter().map(|c| CaregiverAgeGroup::of(c.age)),
                CaregiverAgeGroup::to_string,
            ),
            caregivers_by_zonal_leader: ranked(caregivers.iter().map(|c| c.zonal_leader.as_str())),
            caregivers_by_profession: ranked(caregivers.iter().map(|c| c.profession.as_str())),
            children_by_gender: ordered(Gender::ALL, children.iter().map(|c| c.gender), gender_label),
            children_by_age_group: ordered(
                ChildAgeGroup::ALL,
                children.iter().map(|c| ChildAgeGroup::of(c.age)),
                ChildAgeGroup::to_string,
            ),
            children_by_education: ordered(
                EducationLevel::ALL,
                children.iter().filter_map(|c| c.education_level),
                EducationLevel::to_string,
            ),
            average_caregiver_age: mean(caregivers.iter().filter_map(|c| c.age)),
            average_child_age: mean(children.iter().filter_map(|c| c.age)),
            enrollment_rate: percent(with_level(EducationLevel::is_enrolled), children.len()),
            higher_education_rate: percent(with_level(EducationLevel::is_higher), children.len()),
            missing_education: children.iter().filter(|c| c.education_level.is_none()).count(),
            families_without_children: caregivers
                .iter()
                .filter(|c| !family_sizes.contains_key(c.key.as_str()))
                .count(),
            large_families: family_sizes
                .iter()
                .filter(|(key, size)| keys.contains(*key) && **size >= LARGE_FAMILY)
                .count(),
            school_age_not_in_school: children
                .iter()
                .filter(|c| c.age.is_some_and(|age| (6..=18).contains(&age)))
                .filter(|c| c.education_level.map_or(true, |level| !level.is_enrolled()))
                .count(),
            orphaned_children: registry.orphaned_children().count(),
            unverified,
        }
    }
}

fn gender_label(gender: &Gender) -> String {
    match gender {
        Gender::Unspecified => "unspecified".to_string(),
        other => other.to_string(),
    }
}

/// Counts in the fixed order of `all`, leaving out empty groups.
fn ordered<T, I, F>(all: &[T], values: I, label: F) -> Vec<Count>
where
    T: PartialEq + Copy,
    I: Iterator<Item = T>,
    F: Fn(&T) -> String,
{
    let values: Vec<T> = values.collect();
    all.iter()
        .map(|group| Count {
            label: label(group),
            count: values.iter().filter(|v| *v == group).count(),
        })
        .filter(|c| c.count > 0)
        .collect()
}

/// Counts of free-text values, largest first; blanks are grouped as "(none)".
fn ranked<'a>(values: impl Iterator<Item = &'a str>) -> Vec<Count> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        let label = match value.trim() {
            "" => "(none)".to_string(),
            v => v.to_string(),
        };
        *counts.entry(label).or_default() += 1;
    }
    let mut counts: Vec<Count> = counts
        .into_iter()
        .map(|(label, count)| Count { label, count })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    counts
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = u32>) -> Option<f64> {
    let (sum, n) = values.fold((0u64, 0u32), |(sum, n), v| (sum + u64::from(v), n + 1));
    (n > 0).then(|| sum as f64 / f64::from(n))
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 * 100.0 / whole as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CaregiverInput, ChildInput};
    use chrono::Utc;

    fn registry() -> Registry {
        let now = Utc::now();
        let mut jane = CaregiverInput::new("Jane Doe", "0803");
        jane.gender = Gender::Female;
        jane.age = Some(36);
        jane.zonal_leader = "Mrs Bello".to_string();
        let jane_key = jane.key();

        let mut bayo = CaregiverInput::new("Bayo", "0802");
        bayo.gender = Gender::Male;
        bayo.age = Some(62);
        bayo.zonal_leader = "Mrs Bello".to_string();

        let mut children = Vec::new();
        for (i, level) in [
            Some(EducationLevel::Primary),
            Some(EducationLevel::Tertiary),
            Some(EducationLevel::NotInSchool),
            None,
            Some(EducationLevel::Primary),
        ]
        .into_iter()
        .enumerate()
        {
            let input = ChildInput {
                name: format!("Child {i}"),
                age: Some(6 + u32::try_from(i).unwrap() * 3),
                education_level: level,
                ..ChildInput::default()
            };
            children.push(input.into_child(jane_key.clone(), "Jane Doe", now));
        }

        let bayo_key = bayo.key();
        Registry::new(
            vec![jane.into_caregiver(jane_key, now), bayo.into_caregiver(bayo_key, now)],
            children,
        )
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::compute(&registry(), NameStats::default());

        assert_eq!(summary.total_caregivers, 2);
        assert_eq!(summary.total_children, 5);
        assert_eq!(summary.families_without_children, 1);
        assert_eq!(summary.large_families, 1);
        assert_eq!(summary.orphaned_children, 0);
        assert_eq!(summary.missing_education, 1);
        assert_eq!(
            summary.caregivers_by_zonal_leader,
            vec![Count {
                label: "Mrs Bello".to_string(),
                count: 2
            }]
        );
        assert_eq!(summary.caregivers_by_age_group.len(), 2);
        assert_eq!(summary.caregivers_by_age_group[0].label, "30-39");
    }

    #[test]
    fn test_rates_and_averages() {
        let summary = Summary::compute(&registry(), NameStats::default());

        // ages 6, 9, 12, 15, 18
        assert_eq!(summary.average_child_age, Some(12.0));
        assert_eq!(summary.average_caregiver_age, Some(49.0));
        assert_eq!(summary.enrollment_rate, Some(60.0));
        assert_eq!(summary.higher_education_rate, Some(20.0));
        // the 12-year-old not in school and the 15-year-old with no level
        assert_eq!(summary.school_age_not_in_school, 2);
    }

    #[test]
    fn test_empty_registry() {
        let summary = Summary::compute(&Registry::default(), NameStats::default());
        assert_eq!(summary.total_caregivers, 0);
        assert!(summary.average_child_age.is_none());
        assert!(summary.enrollment_rate.is_none());
        assert!(summary.children_by_gender.is_empty());
    }

    #[test]
    fn test_ranked_groups_blanks() {
        let counts = ranked(["Trader", "", "Trader", " "].into_iter());
        assert_eq!(counts[0].label, "(none)");
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].label, "Trader");
    }
}
