//! Dotted numeric versions (`1`, `1.0`, `1.0.0.0`, ...)
//!
//! A [`Version`] is an ordered tuple of non-negative integers. Comparison is
//! lexicographic over the shared prefix; when the prefix ties, the longer
//! version only wins if one of its extra components is non-zero. This makes
//! `1.0.0 == 1.0 == 1` while `1.0.1 > 1.0`.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Separator between version components
const SEPARATOR: char = '.';

/// An immutable dotted numeric version
#[derive(Clone, Debug)]
pub struct Version {
    numbers: Vec<u32>,
}

impl Version {
    /// Parse a version string such as `"1.4.2"`
    ///
    /// Fails with [`Error::MalformedVersion`] if the text is empty or any
    /// component is not a valid non-negative integer.
    pub fn parse(text: &str) -> Result<Self> {
        text.parse()
    }

    /// The version components, most significant first
    pub fn numbers(&self) -> &[u32] {
        &self.numbers
    }

    /// Components with trailing zeros removed (`1.2.0.0` -> `1.2`)
    fn significant(&self) -> &[u32] {
        let len = self
            .numbers
            .iter()
            .rposition(|n| *n != 0)
            .map_or(0, |i| i + 1);
        &self.numbers[..len]
    }
}

impl Default for Version {
    /// The zero version, used when nothing has been installed yet
    fn default() -> Self {
        Self { numbers: vec![0] }
    }
}

impl From<Vec<u32>> for Version {
    fn from(numbers: Vec<u32>) -> Self {
        if numbers.is_empty() {
            return Self::default();
        }
        Self { numbers }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedVersion {
            input: text.to_string(),
            reason: reason.to_string(),
        };

        if text.is_empty() {
            return Err(malformed("version is empty"));
        }

        let numbers = text
            .split(SEPARATOR)
            .map(|part| {
                // u32::from_str accepts a leading '+', which is not a version digit
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed(&format!("'{part}' is not a non-negative integer")));
                }
                part.parse::<u32>()
                    .map_err(|e| malformed(&format!("'{part}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { numbers })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.numbers.iter().zip(other.numbers.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }

        let shared = self.numbers.len().min(other.numbers.len());
        let has_nonzero_tail = |numbers: &[u32]| numbers[shared..].iter().any(|n| *n != 0);

        if has_nonzero_tail(&self.numbers) {
            Ordering::Greater
        } else if has_nonzero_tail(&other.numbers) {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

// Must agree with Eq: versions that differ only by trailing zeros hash alike.
impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for n in &self.numbers {
            if !first {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{n}")?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
