//! Positive/negative field-regex matching rules.

use crate::error::{EvmatchError, Result};
use crate::event::Event;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Outcome of checking one field regex against one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCheck {
    /// The field is present and its value matches.
    Matched,
    /// The field is present but its value does not match.
    Mismatch,
    /// The field is absent from the event.
    Missing,
}

/// A regex bound to one event field.
///
/// The regex is anchored at the start of the value only: `SIP/` matches
/// `SIP/alice-0001` because trailing characters need not be consumed.
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    field: String,
    source: String,
    regex: Regex,
}

impl FieldMatcher {
    /// Compiles `pattern` for `field`.
    pub fn new(field: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
            EvmatchError::InvalidRegex {
                field: field.to_string(),
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            field: field.to_lowercase(),
            source: pattern.to_string(),
            regex,
        })
    }

    /// Normalized field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Regex source as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Checks the field against `event`.
    pub fn check(&self, event: &Event) -> FieldCheck {
        match event.get(&self.field) {
            None => FieldCheck::Missing,
            Some(value) if self.regex.is_match(value) => FieldCheck::Matched,
            Some(_) => FieldCheck::Mismatch,
        }
    }
}

/// Field-name to matcher mapping with a positive and a negative clause set.
///
/// An event matches when every `match` field is present and matches, and no
/// `nomatch` field is present with a matching value. A pattern without any
/// `match` field never matches.
///
/// # Examples
///
/// ```
/// use evmatch_core::{Event, Pattern};
///
/// let pattern = Pattern::new([("event", "Hangup")], [("cause", "16")]).unwrap();
/// assert!(pattern.matches(&Event::new([("Event", "Hangup"), ("Cause", "17")])));
/// assert!(!pattern.matches(&Event::new([("Event", "Hangup"), ("Cause", "16")])));
/// assert!(pattern.matches(&Event::new([("Event", "Hangup")])));
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    matches: Vec<FieldMatcher>,
    nomatch: Vec<FieldMatcher>,
}

impl Pattern {
    /// Compiles a pattern from positive and negative (field, regex) pairs.
    pub fn new<M, N, K1, V1, K2, V2>(matches: M, nomatch: N) -> Result<Self>
    where
        M: IntoIterator<Item = (K1, V1)>,
        N: IntoIterator<Item = (K2, V2)>,
        K1: AsRef<str>,
        V1: AsRef<str>,
        K2: AsRef<str>,
        V2: AsRef<str>,
    {
        let matches = matches
            .into_iter()
            .map(|(k, v)| FieldMatcher::new(k.as_ref(), v.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let nomatch = nomatch
            .into_iter()
            .map(|(k, v)| FieldMatcher::new(k.as_ref(), v.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { matches, nomatch })
    }

    /// Single regex against [`Event::VALUE_FIELD`].
    pub fn text(regex: &str) -> Result<Self> {
        Self::new([(Event::VALUE_FIELD, regex)], Vec::<(&str, &str)>::new())
    }

    /// Builds a pattern from its configuration clauses.
    pub fn from_clauses(matches: &MatchClause, nomatch: &BTreeMap<String, String>) -> Result<Self> {
        Self::new(matches.fields(), nomatch.iter())
    }

    /// Positive clauses.
    pub fn match_fields(&self) -> &[FieldMatcher] {
        &self.matches
    }

    /// Negative clauses.
    pub fn nomatch_fields(&self) -> &[FieldMatcher] {
        &self.nomatch
    }

    /// Returns true if the pattern has at least one positive field.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Evaluates the pattern against `event`. Pure.
    pub fn matches(&self, event: &Event) -> bool {
        if self.matches.is_empty() {
            return false;
        }

        for m in &self.matches {
            match m.check(event) {
                FieldCheck::Matched => {}
                FieldCheck::Missing => {
                    debug!(field = m.field(), "match field not in event");
                    return false;
                }
                FieldCheck::Mismatch => {
                    debug!(field = m.field(), regex = m.source(), "match field does not match");
                    return false;
                }
            }
        }

        // An absent nomatch field cannot block the match.
        for m in &self.nomatch {
            if m.check(event) == FieldCheck::Matched {
                debug!(field = m.field(), regex = m.source(), "nomatch field matches");
                return false;
            }
        }

        true
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses = self
            .matches
            .iter()
            .map(|m| format!("{}=~/{}/", m.field, m.source))
            .chain(
                self.nomatch
                    .iter()
                    .map(|m| format!("{}!~/{}/", m.field, m.source)),
            )
            .collect::<Vec<_>>();
        write!(f, "{}", clauses.join(", "))
    }
}

/// The `match` clause as written in configuration: either a single regex
/// (applied to [`Event::VALUE_FIELD`]) or a field to regex map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchClause {
    /// Shorthand for `{value: regex}`.
    Text(String),
    /// Field name to regex.
    Fields(BTreeMap<String, String>),
}

impl MatchClause {
    /// Expands the clause into (field, regex) pairs.
    pub fn fields(&self) -> Vec<(&str, &str)> {
        match self {
            Self::Text(regex) => vec![(Event::VALUE_FIELD, regex.as_str())],
            Self::Fields(map) => map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
        }
    }
}

impl Default for MatchClause {
    fn default() -> Self {
        Self::Fields(BTreeMap::new())
    }
}
