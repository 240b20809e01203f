//! Target letters, their phonetic classes, and profile identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PhonemeError;

/// A single lowercase ASCII letter `a..=z`.
///
/// Parsing is case-insensitive; `"M"` and `"m"` are the same letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Letter(u8);

impl Letter {
    pub fn new(c: char) -> Result<Self, PhonemeError> {
        let lower = c.to_ascii_lowercase();
        if lower.is_ascii_lowercase() {
            Ok(Letter(lower as u8))
        } else {
            Err(PhonemeError::InvalidLetter(c.to_string()))
        }
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }

    pub fn class(self) -> PhoneticClass {
        match self.0 {
            b'a' | b'e' | b'i' | b'o' | b'u' => PhoneticClass::Vowel,
            b'm' | b'n' => PhoneticClass::Nasal,
            b'f' | b's' | b'v' | b'z' | b'h' | b'x' => PhoneticClass::Fricative,
            b'l' | b'r' | b'w' | b'y' => PhoneticClass::Liquid,
            _ => PhoneticClass::Plosive,
        }
    }

    /// All 26 letters in alphabetical order.
    pub fn all() -> impl Iterator<Item = Letter> {
        (b'a'..=b'z').map(Letter)
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Letter {
    type Err = PhonemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Letter::new(c),
            _ => Err(PhonemeError::InvalidLetter(s.to_string())),
        }
    }
}

impl TryFrom<String> for Letter {
    type Error = PhonemeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Letter> for String {
    fn from(letter: Letter) -> Self {
        letter.to_string()
    }
}

/// Broad articulation class of a letter's sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhoneticClass {
    Vowel,
    Plosive,
    Nasal,
    Fricative,
    Liquid,
}

impl PhoneticClass {
    pub fn of(letter: Letter) -> Self {
        letter.class()
    }
}

/// Opaque owner of a snapshot. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Result<Self, PhonemeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PhonemeError::InvalidRecord("empty profile id".into()));
        }
        Ok(ProfileId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProfileId {
    type Error = PhonemeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ProfileId::new(s)
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("M".parse::<Letter>().unwrap(), "m".parse::<Letter>().unwrap());
        assert_eq!(" s ".parse::<Letter>().unwrap().as_char(), 's');
    }

    #[test]
    fn parse_rejects_non_letters() {
        for bad in ["", "mm", "1", "é", "?"] {
            assert!(
                matches!(bad.parse::<Letter>(), Err(PhonemeError::InvalidLetter(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn phonetic_classes() {
        let class = |c| Letter::new(c).unwrap().class();
        assert_eq!(class('a'), PhoneticClass::Vowel);
        assert_eq!(class('m'), PhoneticClass::Nasal);
        assert_eq!(class('n'), PhoneticClass::Nasal);
        assert_eq!(class('s'), PhoneticClass::Fricative);
        assert_eq!(class('x'), PhoneticClass::Fricative);
        assert_eq!(class('l'), PhoneticClass::Liquid);
        assert_eq!(class('y'), PhoneticClass::Liquid);
        assert_eq!(class('t'), PhoneticClass::Plosive);
        assert_eq!(class('q'), PhoneticClass::Plosive);
        assert_eq!(Letter::all().count(), 26);
    }

    #[test]
    fn serde_as_string() {
        let m = Letter::new('m').unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"m\"");
        assert_eq!(serde_json::from_str::<Letter>("\"M\"").unwrap(), m);
        assert!(serde_json::from_str::<Letter>("\"mm\"").is_err());
    }

    #[test]
    fn profile_id_not_empty() {
        assert!(ProfileId::new("").is_err());
        assert!(ProfileId::new("  ").is_err());
        assert_eq!(ProfileId::new("kid-1").unwrap().as_str(), "kid-1");
        assert!(serde_json::from_str::<ProfileId>("\"\"").is_err());
    }
}
