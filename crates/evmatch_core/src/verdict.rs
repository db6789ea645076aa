//! Tri-state test outcome with accumulated failure reasons.

use crate::error::{EvmatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of a test or of a single test condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// Nothing decided yet.
    #[default]
    Inconclusive,
    /// Passed, and nothing has failed since.
    Passed,
    /// Failed. Terminal.
    Failed,
}

impl Status {
    /// Name used in logs and observer filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inconclusive => "Inconclusive",
            Self::Passed => "Passed",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = EvmatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Inconclusive" => Ok(Self::Inconclusive),
            "Passed" => Ok(Self::Passed),
            "Failed" => Ok(Self::Failed),
            other => Err(EvmatchError::ConfigError(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

/// Pass/fail/inconclusive outcome plus the reasons it failed.
///
/// ```
/// use evmatch_core::{Status, Verdict};
///
/// let mut verdict = Verdict::new();
/// verdict.pass_check();
/// assert_eq!(verdict.status(), Status::Passed);
///
/// verdict.fail_check("channel leaked");
/// verdict.pass_check();
/// assert_eq!(verdict.status(), Status::Failed);
/// assert_eq!(verdict.reasons(), ["channel leaked"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    status: Status,
    reasons: Vec<String>,
}

impl Verdict {
    /// A fresh, inconclusive verdict.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Failure reasons in the order they were reported.
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// Moves `Inconclusive` to `Passed`; no-op otherwise.
    pub fn pass_check(&mut self) {
        if self.status == Status::Inconclusive {
            self.status = Status::Passed;
        }
    }

    /// Moves to `Failed` and records `reason` if non-empty.
    pub fn fail_check(&mut self, reason: impl Into<String>) {
        self.status = Status::Failed;
        let reason = reason.into();
        if !reason.is_empty() {
            self.reasons.push(reason);
        }
    }

    /// Returns true once failed.
    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    /// Returns true if passed.
    pub fn is_passed(&self) -> bool {
        self.status == Status::Passed
    }

    /// Folds another verdict into this one: any failure fails this verdict
    /// with the other's reasons, a pass passes it.
    pub fn merge(&mut self, other: &Verdict) {
        match other.status {
            Status::Failed => {
                self.status = Status::Failed;
                self.reasons.extend(other.reasons.iter().cloned());
            }
            Status::Passed => self.pass_check(),
            Status::Inconclusive => {}
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.status)?;
        if self.status == Status::Failed {
            for reason in &self.reasons {
                write!(f, "\n\tReason: {}", reason)?;
            }
        }
        Ok(())
    }
}
