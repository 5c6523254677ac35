//! Typed parsing of imported rows.

use chrono::NaiveDate;

use super::table::Row;
use crate::error::{Error, Result};
use crate::records::fields::parse_optional;
use crate::records::{CaregiverInput, ChildInput};

/// Date layouts accepted in imported files, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Parse a caregiver row.
///
/// # Errors
///
/// Returns [`Error::InvalidValue`] for an unreadable gender, date or number.
pub fn caregiver_input(row: &Row) -> Result<CaregiverInput> {
    Ok(CaregiverInput {
        name: text(row, &["caregiver_name", "name"]),
        gender: text(row, &["gender"]).parse()?,
        profession: text(row, &["profession"]),
        date_of_birth: date(row, "date_of_birth", &["date_of_birth", "dob"])?,
        age: whole(row, "age", &["age"])?,
        phone: text(row, &["phone_number", "phone"]),
        address: text(row, &["address"]),
        zonal_leader: text(row, &["zonal_leader"]),
        bank: text(row, &["bank"]),
        account_number: text(row, &["account_number"]),
        number_of_kids: whole(row, "number_of_kids", &["number_of_kids"])?,
    })
}

/// Parse a child row.
///
/// Column names with and without the `child_` prefix are accepted.
///
/// # Errors
///
/// Returns [`Error::InvalidValue`] for an unreadable enum, date or number.
pub fn child_input(row: &Row) -> Result<ChildInput> {
    Ok(ChildInput {
        name: text(row, &["child_name", "name"]),
        gender: text(row, &["child_gender", "gender"]).parse()?,
        phone: text(row, &["child_phone_number", "phone_number", "phone"]),
        age: whole(row, "child_age", &["child_age", "age"])?,
        date_of_birth: date(
            row,
            "child_date_of_birth",
            &["child_date_of_birth", "date_of_birth"],
        )?,
        education_level: parse_optional(&text(
            row,
            &["child_education_level", "education_level"],
        ))?,
        school_name: text(row, &["child_school_name", "school_name"]),
        class_level: parse_optional(&text(row, &["child_class_level", "class_level"]))?,
        profession: text(row, &["child_profession", "profession"]),
    })
}

/// The caregiver a child row points at: an optional key and a name.
#[must_use]
pub fn caregiver_link(row: &Row) -> (Option<String>, String) {
    let key = text(row, &["caregiver_key"]);
    let name = text(row, &["caregiver_name"]);
    ((!key.is_empty()).then_some(key), name)
}

/// Value of the first of `columns` present in the row.
fn text(row: &Row, columns: &[&str]) -> String {
    columns
        .iter()
        .find_map(|c| row.get(*c))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// A non-negative whole number; spreadsheets often store `5` as `5.0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(row: &Row, field: &'static str, columns: &[&str]) -> Result<Option<u32>> {
    let raw = text(row, columns);
    if raw.is_empty() {
        return Ok(None);
    }
    let invalid = || Error::InvalidValue {
        field,
        value: raw.clone(),
    };
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(Some(n));
    }
    let f: f64 = raw.parse().map_err(|_| invalid())?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        Ok(Some(f as u32))
    } else {
        Err(invalid())
    }
}

fn date(row: &Row, field: &'static str, columns: &[&str]) -> Result<Option<NaiveDate>> {
    let raw = text(row, columns);
    if raw.is_empty() {
        return Ok(None);
    }
    // drop a time part such as "2020-03-01 00:00:00" or "2020-03-01T00:00:00"
    let day = raw.split(['T', ' ']).next().unwrap_or(&raw);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
        .map(Some)
        .ok_or_else(|| Error::InvalidValue {
            field,
            value: raw.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ClassLevel, EducationLevel, Gender};

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_caregiver_row() {
        let input = caregiver_input(&row(&[
            ("caregiver_name", "Jane Doe"),
            ("phone_number", "0803-111-2222"),
            ("gender", "Female"),
            ("date_of_birth", "1990-05-01 00:00:00"),
            ("age", "36.0"),
            ("number_of_kids", "3"),
        ]))
        .unwrap();

        assert_eq!(input.name, "Jane Doe");
        assert_eq!(input.gender, Gender::Female);
        assert_eq!(input.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 1));
        assert_eq!(input.age, Some(36));
        assert_eq!(input.number_of_kids, Some(3));
        assert_eq!(input.key().as_str(), "a00da052508c");
    }

    #[test]
    fn test_child_row() {
        let input = child_input(&row(&[
            ("child_name", "Tom"),
            ("child_age", "5.0"),
            ("child_date_of_birth", "01/03/2021"),
            ("child_education_level", "primary"),
            ("child_class_level", "Primary 1"),
            ("child_phone_number", ""),
        ]))
        .unwrap();

        assert_eq!(input.name, "Tom");
        assert_eq!(input.age, Some(5));
        assert_eq!(input.date_of_birth, NaiveDate::from_ymd_opt(2021, 3, 1));
        assert_eq!(input.education_level, Some(EducationLevel::Primary));
        assert_eq!(input.class_level, Some(ClassLevel::Primary1));
        assert_eq!(input.phone, "");
    }

    #[test]
    fn test_prefixed_column_wins_even_when_blank() {
        let input = child_input(&row(&[
            ("child_name", "Tom"),
            ("child_phone_number", ""),
            ("phone_number", "0803"),
        ]))
        .unwrap();
        assert_eq!(input.phone, "");
    }

    #[test]
    fn test_bad_values() {
        let err = child_input(&row(&[("child_name", "Tom"), ("child_age", "five")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid child_age value 'five'");

        assert!(child_input(&row(&[("child_age", "-1")])).is_err());
        assert!(child_input(&row(&[("child_age", "4.5")])).is_err());
        assert!(child_input(&row(&[("child_class_level", "Year 9")])).is_err());
        assert!(caregiver_input(&row(&[("date_of_birth", "someday")])).is_err());
        assert!(caregiver_input(&row(&[("gender", "robot")])).is_err());
    }

    #[test]
    fn test_caregiver_link() {
        let (key, name) = caregiver_link(&row(&[
            ("caregiver_key", " a00da052508c "),
            ("caregiver_name", "Jane Doe"),
        ]));
        assert_eq!(key.as_deref(), Some("a00da052508c"));
        assert_eq!(name, "Jane Doe");

        let (key, _) = caregiver_link(&row(&[("caregiver_name", "Jane Doe")]));
        assert!(key.is_none());
    }
}
