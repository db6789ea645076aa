//! The test object the engine reports into.

use crate::verdict::{Status, Verdict};
use tracing::{error, info};

/// Driver of the test under execution.
///
/// This is the explicit context object threaded through every engine
/// callback; nothing in the engine reaches for a shared global.
pub trait TestObject {
    /// Reports a pass (`true`) or a failure (`false`).
    fn set_passed(&mut self, passed: bool);

    /// Returns false once any failure has been reported.
    fn passed(&self) -> bool;

    /// Requests that the test stop. Terminal.
    fn stop(&mut self);

    /// Reports a failure with a diagnostic reason.
    fn record_failure(&mut self, reason: &str) {
        error!("{}", reason);
        self.set_passed(false);
    }
}

/// A [`TestObject`] that keeps the [`Verdict`] as the surviving artifact.
///
/// `set_passed(true)` maps to [`Verdict::pass_check`] and
/// `set_passed(false)` to [`Verdict::fail_check`], so a failure is never
/// reverted.
#[derive(Debug, Default)]
pub struct TestRun {
    name: String,
    verdict: Verdict,
    stopped: bool,
}

impl TestRun {
    /// Creates a run with an inconclusive verdict.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::new(),
            stopped: false,
        }
    }

    /// Test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verdict so far.
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// Consumes the run, returning its verdict.
    pub fn into_verdict(self) -> Verdict {
        self.verdict
    }

    /// Returns true once [`TestObject::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl TestObject for TestRun {
    fn set_passed(&mut self, passed: bool) {
        if passed {
            self.verdict.pass_check();
        } else {
            self.verdict.fail_check("");
        }
    }

    fn passed(&self) -> bool {
        self.verdict.status() != Status::Failed
    }

    fn stop(&mut self) {
        if !self.stopped {
            info!(test = %self.name, verdict = %self.verdict.status(), "stopping test");
            self.stopped = true;
        }
    }

    fn record_failure(&mut self, reason: &str) {
        error!(test = %self.name, "{}", reason);
        self.verdict.fail_check(reason);
    }
}
