//! Dotted version ordering
//!
//! Manifests and the self-update endpoint publish free-form dotted versions
//! ("1.2", "0.2.0", "2024.10.3") rather than strict semver, so ordering is
//! done segment by segment on integers. The shorter sequence is padded with
//! zeros on the right, which makes `"1.2"` and `"1.2.0"` equal.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A parsed dotted version
///
/// Equality and ordering ignore trailing zero segments. The original text is
/// kept for display and for building mirror URLs.
#[derive(Debug, Clone)]
pub struct VersionOrdinal {
    segments: Vec<u64>,
    raw: String,
}

impl VersionOrdinal {
    /// Parse leniently: a segment that is not an unsigned integer counts as 0
    pub fn parse(input: &str) -> Self {
        let segments = split_segments(input)
            .map(|segment| segment.parse::<u64>().unwrap_or(0))
            .collect();

        Self {
            segments,
            raw: input.trim().to_string(),
        }
    }

    /// Parse strictly, rejecting any segment that is not an unsigned integer
    pub fn parse_strict(input: &str) -> Result<Self> {
        let segments = split_segments(input)
            .map(|segment| {
                segment
                    .parse::<u64>()
                    .map_err(|_| Error::invalid_version(input))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            segments,
            raw: input.trim().to_string(),
        })
    }

    /// Integer segments as parsed, without padding
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// The trimmed source text
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when `self` orders strictly after `other`
    pub fn is_newer_than(&self, other: &VersionOrdinal) -> bool {
        self.cmp(other) == Ordering::Greater
    }
}

fn split_segments(input: &str) -> impl Iterator<Item = &str> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    trimmed.split('.').map(str::trim)
}

impl Ord for VersionOrdinal {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for VersionOrdinal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionOrdinal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionOrdinal {}

impl FromStr for VersionOrdinal {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for VersionOrdinal {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for VersionOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for VersionOrdinal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionOrdinal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
