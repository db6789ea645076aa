//! Error types for evmatch_core operations.

use std::fmt;
use thiserror::Error;

/// Snapshot of a condition that did not meet its declared occurrence range.
///
/// Carried by [`EvmatchError::OverMatch`] and [`EvmatchError::UnderMatch`] so
/// a failing test can be diagnosed from the log line alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionFailure {
    /// Rendered pattern of the offending condition.
    pub pattern: String,
    /// Declared minimum number of matches.
    pub min: u64,
    /// Declared maximum number of matches (`None` = unbounded).
    pub max: Option<u64>,
    /// Number of matches actually observed.
    pub count: u64,
}

impl fmt::Display for ConditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(
                f,
                "condition '{}': expected between {} and {} matches but received {}",
                self.pattern, self.min, max, self.count
            ),
            None => write!(
                f,
                "condition '{}': expected at least {} matches but received {}",
                self.pattern, self.min, self.count
            ),
        }
    }
}

fn join_failures(failures: &[ConditionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Core error type for evmatch_core operations.
#[derive(Error, Debug)]
pub enum EvmatchError {
    /// Count text does not follow any accepted grammar.
    #[error("invalid count '{text}': {reason}")]
    InvalidCount {
        /// The text as written in the configuration
        text: String,
        /// What was wrong with it
        reason: String,
    },

    /// Count parsed but its minimum lies above its maximum.
    #[error("invalid count: minimum {min} can't be greater than maximum {max}")]
    CountRange {
        /// Parsed minimum
        min: u64,
        /// Parsed maximum, negative for `<0`
        max: i128,
    },

    /// A field regex failed to compile.
    #[error("invalid regex for field '{field}': '{pattern}': {reason}")]
    InvalidRegex {
        /// Field the regex applies to
        field: String,
        /// Regex source text
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// A pattern was configured without any positive field.
    #[error("pattern has no 'match' fields; at least one is required")]
    EmptyPattern,

    /// A post-condition referenced a pre-condition that is not registered.
    #[error("no pre condition found matching '{0}'")]
    UnresolvedPreCondition(String),

    /// Two pre-conditions were registered under the same name.
    #[error("a pre condition named '{0}' is already registered")]
    DuplicateCondition(String),

    /// An observer referenced a callback that was never registered.
    #[error("unknown observer callback '{0}'")]
    UnknownCallback(String),

    /// Configuration error (parsing, missing or conflicting values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A condition matched more often than its declared maximum.
    #[error("over-match: {0}")]
    OverMatch(ConditionFailure),

    /// One or more conditions never reached their declared minimum.
    #[error("under-match: {}", join_failures(.0))]
    UnderMatch(Vec<ConditionFailure>),

    /// A test condition could not be evaluated.
    #[error("evaluation of '{condition}' failed: {reason}")]
    EvaluationFailed {
        /// Name of the test condition
        condition: String,
        /// Description of the failure
        reason: String,
    },

    /// An event arrived after the stream-end notification.
    #[error("event delivered after the stream ended")]
    StreamEnded,
}

impl EvmatchError {
    /// Returns true for errors raised while building the engine, before any
    /// event flows.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidCount { .. }
                | Self::CountRange { .. }
                | Self::InvalidRegex { .. }
                | Self::EmptyPattern
                | Self::UnresolvedPreCondition(_)
                | Self::DuplicateCondition(_)
                | Self::UnknownCallback(_)
                | Self::ConfigError(_)
        )
    }

    /// Conditions named by a match-count error, empty for other kinds.
    pub fn failures(&self) -> &[ConditionFailure] {
        match self {
            Self::OverMatch(failure) => std::slice::from_ref(failure),
            Self::UnderMatch(failures) => failures,
            _ => &[],
        }
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidCount { .. } | Self::CountRange { .. } => Some(
                "Use 'N', 'N-M', '>N', '<N' or set 'optional: true' for the count.",
            ),
            Self::EmptyPattern => Some("Add at least one field to the condition's 'match' clause."),
            Self::UnresolvedPreCondition(_) => {
                Some("Register the pre condition before the post condition that references it.")
            }
            Self::UnknownCallback(_) => {
                Some("Register the callback in the CallbackRegistry before building observers.")
            }
            Self::StreamEnded => Some("Events must be delivered before the stream-end notification."),
            _ => None,
        }
    }
}

/// Convenience Result type for evmatch_core operations.
pub type Result<T> = std::result::Result<T, EvmatchError>;
