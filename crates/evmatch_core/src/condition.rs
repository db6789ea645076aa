//! A pattern coupled with an occurrence range and a running tally.

use crate::count::{CountSpec, CountValue};
use crate::error::{ConditionFailure, EvmatchError, Result};
use crate::event::Event;
use crate::pattern::{MatchClause, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Configuration for one [`Condition`].
///
/// Either a bare regex string (`"hello"` is `{match: "hello"}`) or the full
/// form below. `optional: true` is shorthand for count `<2` and cannot be
/// combined with `count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionConfig {
    /// Single regex against the default `value` field, expected once.
    Shorthand(String),
    /// Full condition description.
    Full(ConditionFields),
}

/// Full form of a condition configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFields {
    /// Optional label used in diagnostics instead of the rendered pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Positive clause: a regex or a field to regex map.
    #[serde(rename = "match", default)]
    pub matches: MatchClause,

    /// Negative clause: field to regex map.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nomatch: BTreeMap<String, String>,

    /// Expected occurrences (default: exactly one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountValue>,

    /// Zero or one occurrence.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl ConditionConfig {
    /// Expands the shorthand into the full form.
    pub fn to_fields(&self) -> ConditionFields {
        match self {
            Self::Shorthand(regex) => ConditionFields {
                matches: MatchClause::Text(regex.clone()),
                ..ConditionFields::default()
            },
            Self::Full(fields) => fields.clone(),
        }
    }

    /// Resolves the occurrence range declared by this configuration.
    pub fn count_spec(&self) -> Result<CountSpec> {
        let fields = match self {
            Self::Shorthand(_) => return Ok(CountSpec::default()),
            Self::Full(fields) => fields,
        };
        match (&fields.count, fields.optional) {
            (Some(_), true) => Err(EvmatchError::ConfigError(
                "'optional' and 'count' are mutually exclusive".to_string(),
            )),
            (None, true) => Ok(CountSpec::optional()),
            (Some(count), false) => count.to_spec(),
            (None, false) => Ok(CountSpec::default()),
        }
    }
}

impl From<&str> for ConditionConfig {
    fn from(regex: &str) -> Self {
        Self::Shorthand(regex.to_string())
    }
}

/// A [`Pattern`] plus a [`CountSpec`] plus a live occurrence tally.
///
/// The tally only moves through [`Condition::record_if_matches`].
#[derive(Debug, Clone)]
pub struct Condition {
    name: Option<String>,
    pattern: Pattern,
    spec: CountSpec,
    count: u64,
}

impl Condition {
    /// Creates a condition with a zero tally.
    pub fn new(pattern: Pattern, spec: CountSpec) -> Self {
        Self {
            name: None,
            pattern,
            spec,
            count: 0,
        }
    }

    /// Builds a condition from configuration, failing on empty patterns,
    /// bad regexes, and malformed counts.
    pub fn from_config(config: &ConditionConfig) -> Result<Self> {
        let spec = config.count_spec()?;
        let fields = config.to_fields();
        let pattern = Pattern::from_clauses(&fields.matches, &fields.nomatch)?;
        if pattern.is_empty() {
            return Err(EvmatchError::EmptyPattern);
        }
        Ok(Self {
            name: fields.name,
            pattern,
            spec,
            count: 0,
        })
    }

    /// Attaches a diagnostic label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Diagnostic label: the configured name, or the rendered pattern.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.pattern.to_string(),
        }
    }

    /// The pattern this condition counts.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The declared occurrence range.
    pub fn spec(&self) -> CountSpec {
        self.spec
    }

    /// Matches recorded so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Evaluates the pattern and, on a match, increments the tally.
    pub fn record_if_matches(&mut self, event: &Event) -> bool {
        if !self.pattern.matches(event) {
            return false;
        }
        self.count += 1;
        debug!(condition = %self.label(), count = self.count, "matched condition");
        true
    }

    /// `count >= min`.
    pub fn satisfies_minimum(&self) -> bool {
        self.count >= self.spec.min()
    }

    /// `count > max`.
    pub fn exceeds_maximum(&self) -> bool {
        self.spec.exceeded_by(self.count)
    }

    /// Structured description of the current expected-vs-actual state.
    pub fn failure(&self) -> ConditionFailure {
        ConditionFailure {
            pattern: self.label(),
            min: self.spec.min(),
            max: self.spec.max(),
            count: self.count,
        }
    }

    /// Human-readable "expected between min and max, got count" message.
    pub fn describe_failure(&self) -> String {
        self.failure().to_string()
    }

    /// Clears the tally.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [count {}, seen {}]", self.label(), self.spec, self.count)
    }
}
