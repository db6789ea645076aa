//! Occurrence ranges parsed from compact count text.

use crate::error::{EvmatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalized `[min, max]` occurrence range.
///
/// Accepted text forms:
///
/// | text       | min   | max       |
/// |------------|-------|-----------|
/// | `N`        | N     | N         |
/// | `N-M`      | N     | M         |
/// | `>N`       | N + 1 | unbounded |
/// | `<N`       | 0     | N - 1     |
/// | `optional` | 0     | 1         |
/// | `any`      | 0     | unbounded |
///
/// An omitted count means exactly one, see [`CountSpec::default`].
///
/// # Examples
///
/// ```
/// use evmatch_core::CountSpec;
///
/// let spec: CountSpec = "2-4".parse().unwrap();
/// assert_eq!((spec.min(), spec.max()), (2, Some(4)));
///
/// let spec: CountSpec = ">1".parse().unwrap();
/// assert_eq!((spec.min(), spec.max()), (2, None));
///
/// assert!("4-2".parse::<CountSpec>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CountSpec {
    min: u64,
    max: Option<u64>,
}

impl CountSpec {
    /// Exactly `n` occurrences.
    pub const fn exactly(n: u64) -> Self {
        Self { min: n, max: Some(n) }
    }

    /// Between `min` and `max` occurrences, inclusive.
    pub fn range(min: u64, max: u64) -> Result<Self> {
        if min > max {
            return Err(EvmatchError::CountRange {
                min,
                max: i128::from(max),
            });
        }
        Ok(Self {
            min,
            max: Some(max),
        })
    }

    /// At least `min` occurrences.
    pub const fn at_least(min: u64) -> Self {
        Self { min, max: None }
    }

    /// Zero or one occurrence.
    pub const fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Any number of occurrences, including none.
    pub const fn any() -> Self {
        Self { min: 0, max: None }
    }

    /// Lower bound.
    pub fn min(&self) -> u64 {
        self.min
    }

    /// Upper bound, `None` when unbounded.
    pub fn max(&self) -> Option<u64> {
        self.max
    }

    /// Returns true if `count` lies inside the range.
    pub fn contains(&self, count: u64) -> bool {
        count >= self.min && !self.exceeded_by(count)
    }

    /// Returns true if `count` lies above the upper bound.
    pub fn exceeded_by(&self, count: u64) -> bool {
        self.max.is_some_and(|max| count > max)
    }
}

impl Default for CountSpec {
    fn default() -> Self {
        Self::exactly(1)
    }
}

fn parse_bound(text: &str, part: &str) -> Result<u64> {
    part.trim().parse::<u64>().map_err(|e| EvmatchError::InvalidCount {
        text: text.to_string(),
        reason: format!("'{}' is not a non-negative integer: {}", part.trim(), e),
    })
}

impl FromStr for CountSpec {
    type Err = EvmatchError;

    fn from_str(text: &str) -> Result<Self> {
        let trimmed = text.trim();

        if trimmed.eq_ignore_ascii_case("optional") {
            return Ok(Self::optional());
        }
        if trimmed.eq_ignore_ascii_case("any") {
            return Ok(Self::any());
        }

        if let Some(rest) = trimmed.strip_prefix('>') {
            let n = parse_bound(text, rest)?;
            let min = n.checked_add(1).ok_or_else(|| EvmatchError::InvalidCount {
                text: text.to_string(),
                reason: "lower bound overflows".to_string(),
            })?;
            return Ok(Self::at_least(min));
        }

        if let Some(rest) = trimmed.strip_prefix('<') {
            let n = parse_bound(text, rest)?;
            if n == 0 {
                return Err(EvmatchError::CountRange { min: 0, max: -1 });
            }
            return Ok(Self {
                min: 0,
                max: Some(n - 1),
            });
        }

        if let Some((lo, hi)) = trimmed.split_once('-') {
            let min = parse_bound(text, lo)?;
            let max = parse_bound(text, hi)?;
            return Self::range(min, max);
        }

        Ok(Self::exactly(parse_bound(text, trimmed)?))
    }
}

impl fmt::Display for CountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{}-{}", self.min, max),
            None if self.min > 0 => write!(f, ">{}", self.min - 1),
            None => write!(f, "any"),
        }
    }
}

/// Count as it appears in configuration: a bare integer or count text.
///
/// Kept unparsed until the owning condition is built so that a malformed
/// count surfaces as a precise [`EvmatchError`] at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountValue {
    /// Exactly this many.
    Number(u64),
    /// Any of the accepted text forms.
    Text(String),
}

impl CountValue {
    /// Parses the value into a range.
    pub fn to_spec(&self) -> Result<CountSpec> {
        match self {
            Self::Number(n) => Ok(CountSpec::exactly(*n)),
            Self::Text(text) => text.parse(),
        }
    }
}

impl From<CountSpec> for CountValue {
    fn from(spec: CountSpec) -> Self {
        match spec.max {
            Some(max) if max == spec.min => Self::Number(max),
            _ => Self::Text(spec.to_string()),
        }
    }
}
