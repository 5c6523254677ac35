//! Caregiver identity keys.
//!
//! A caregiver is identified by a short digest of their normalized name and
//! phone number. The same key links a caregiver to their children and detects
//! duplicate caregiver entries. Keys are the first 12 hex characters of the
//! SHA-1 digest of `"{name}|{phone}"`, which is what existing registry data
//! was keyed with, so re-deriving keys reproduces stored ones exactly.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};

use crate::error::{Error, Result};

/// Length of a caregiver key in hex characters.
pub const KEY_LEN: usize = 12;

/// Identity key shared by a caregiver row and its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaregiverKey(String);

impl CaregiverKey {
    /// Derive the key for a caregiver from their name and phone number.
    ///
    /// See [`derive_key`].
    #[must_use]
    pub fn derive(name: &str, phone: &str) -> Self {
        derive_key(name, phone)
    }

    /// Wrap a key read back from storage without re-validating it.
    ///
    /// Legacy rows are trusted as-is; user input goes through [`FromStr`].
    #[must_use]
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaregiverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CaregiverKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let valid = s.len() == KEY_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidKey(s.to_string()))
        }
    }
}

/// Normalize a caregiver name for keying: trimmed and lowercased.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Characters with `Numeric_Type=Digit` that are not decimal digits:
/// superscripts, subscripts, circled and parenthesized digits and a few
/// script-specific digit signs.
const DIGIT_RANGES: &[(char, char)] = &[
    ('\u{00B2}', '\u{00B3}'),
    ('\u{00B9}', '\u{00B9}'),
    ('\u{1369}', '\u{1371}'),
    ('\u{19DA}', '\u{19DA}'),
    ('\u{2070}', '\u{2070}'),
    ('\u{2074}', '\u{2079}'),
    ('\u{2080}', '\u{2089}'),
    ('\u{2460}', '\u{2468}'),
    ('\u{2474}', '\u{247C}'),
    ('\u{2488}', '\u{2490}'),
    ('\u{24EA}', '\u{24EA}'),
    ('\u{24F5}', '\u{24FD}'),
    ('\u{24FF}', '\u{24FF}'),
    ('\u{2776}', '\u{277E}'),
    ('\u{2780}', '\u{2788}'),
    ('\u{278A}', '\u{2792}'),
    ('\u{10A40}', '\u{10A43}'),
    ('\u{10E60}', '\u{10E68}'),
    ('\u{11052}', '\u{1105A}'),
    ('\u{1F100}', '\u{1F10A}'),
];

/// Whether `c` counts as a digit when keying phone numbers.
///
/// This is every decimal digit in any script (`０`, `٣`, `७`) plus the
/// `Numeric_Type=Digit` signs such as `²` and `①`. Stored keys were derived
/// with this rule, so narrowing it to ASCII would re-key those caregivers.
#[must_use]
pub fn is_phone_digit(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_digit();
    }
    c.general_category() == GeneralCategory::DecimalNumber
        || DIGIT_RANGES
            .iter()
            .any(|&(lo, hi)| (lo..=hi).contains(&c))
}

/// Normalize a phone number for keying: digits only.
///
/// Non-ASCII digits are kept as they are, not folded to ASCII.
#[must_use]
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|&c| is_phone_digit(c)).collect()
}

/// Derive the identity key for a caregiver.
///
/// The name is trimmed and lowercased and every non-digit is stripped from
/// the phone. When both normalized parts are empty the key is derived from a
/// random seed instead, so two placeholder caregivers with no name and no
/// phone never collapse into one record.
#[must_use]
pub fn derive_key(name: &str, phone: &str) -> CaregiverKey {
    let raw = format!("{}|{}", normalize_name(name), normalize_phone(phone));
    if raw.trim_matches('|').is_empty() {
        let mut seed = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut seed);
        digest(&seed)
    } else {
        digest(raw.as_bytes())
    }
}

fn digest(bytes: &[u8]) -> CaregiverKey {
    let hash = Sha1::digest(bytes);
    let mut hex = hex::encode(hash);
    hex.truncate(KEY_LEN);
    CaregiverKey(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_key_vectors() {
        assert_eq!(derive_key("Jane Doe", "0803-111-2222").as_str(), "a00da052508c");
        assert_eq!(derive_key("Jane Doe", "0803-999-0000").as_str(), "2363b9fd44aa");
        assert_eq!(derive_key("Amaka", "").as_str(), "9bff8688c892");
        assert_eq!(derive_key("", "0803 111 2222").as_str(), "30f1569d747d");
    }

    #[test]
    fn test_non_ascii_digits_are_kept() {
        assert_eq!(derive_key("Jane Doe", "０８０３-111-2222").as_str(), "0ffe8664718f");
        assert_eq!(derive_key("Jane Doe", "08031112222²").as_str(), "8b780fe1b90d");
        assert_eq!(normalize_phone("٠٨ ①-x½Ⅻ"), "٠٨①");
    }

    #[test]
    fn test_is_phone_digit() {
        assert!(is_phone_digit('7'));
        assert!(is_phone_digit('７'));
        assert!(is_phone_digit('₉'));
        assert!(is_phone_digit('❶'));
        assert!(!is_phone_digit('½'));
        assert!(!is_phone_digit('Ⅻ'));
        assert!(!is_phone_digit('+'));
    }

    #[test]
    fn test_derive_is_pure() {
        let a = derive_key("Bayo Okafor", "+234 801 234 5678");
        let b = derive_key("Bayo Okafor", "+234 801 234 5678");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "c39260fc5fe3");
    }

    #[test]
    fn test_normalization_ignores_case_whitespace_and_punctuation() {
        assert_eq!(
            derive_key("  JANE DOE ", "(0803) 111-2222"),
            derive_key("jane doe", "08031112222")
        );
    }

    #[test]
    fn test_changing_phone_changes_key() {
        assert_ne!(
            derive_key("Jane Doe", "0803-111-2222"),
            derive_key("Jane Doe", "0803-999-0000")
        );
    }

    #[test]
    fn test_blank_identities_do_not_collide() {
        let a = derive_key("", "");
        let b = derive_key("   ", "--");
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), KEY_LEN);
        assert_eq!(b.as_str().len(), KEY_LEN);
    }

    #[test]
    fn test_pipe_only_name_counts_as_blank() {
        assert_ne!(derive_key("|", ""), derive_key("|", ""));
    }

    #[test]
    fn test_key_format() {
        let key = derive_key("Jane Doe", "0803");
        assert_eq!(key.as_str().len(), KEY_LEN);
        assert!(key
            .as_str()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_parse_key() {
        let key: CaregiverKey = "a00da052508c".parse().unwrap();
        assert_eq!(key.to_string(), "a00da052508c");

        assert!("A00DA052508C".parse::<CaregiverKey>().is_err());
        assert!("a00da052508".parse::<CaregiverKey>().is_err());
        assert!("zzzzzzzzzzzz".parse::<CaregiverKey>().is_err());
    }

    #[test]
    fn test_key_serializes_as_plain_string() {
        let key = derive_key("Jane Doe", "0803-111-2222");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"a00da052508c\"");
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+234 (0) 803-111"), "2340803111");
        assert_eq!(normalize_phone("n/a"), "");
    }
}
