//! A [`ConditionSet`] bound to a test object.
//!
//! This is the boundary where engine errors become verdicts: an over-match
//! fails and stops the test immediately, an under-match fails it at stream
//! end.

use crate::condition_set::{ConditionSet, ConditionSetConfig};
use crate::error::Result;
use crate::event::Event;
use crate::source::{ConnectionId, EventSink};
use crate::test_object::TestObject;
use tracing::{debug, info};

/// Condition set that reports into a [`TestObject`].
#[derive(Debug)]
pub struct MonitoredConditions {
    set: ConditionSet,
    expired: bool,
    finalized: bool,
}

impl MonitoredConditions {
    /// Wraps an existing set.
    pub fn new(set: ConditionSet) -> Self {
        Self {
            set,
            expired: false,
            finalized: false,
        }
    }

    /// Builds the set from configuration. Configuration errors propagate to
    /// the caller before any event flows.
    pub fn from_config(config: &ConditionSetConfig) -> Result<Self> {
        Ok(Self::new(ConditionSet::from_config(config)?))
    }

    /// The wrapped set.
    pub fn conditions(&self) -> &ConditionSet {
        &self.set
    }

    /// Returns true once final reconciliation has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns true once [`MonitoredConditions::expire`] has fired.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Streams one event into the set. An over-match fails the test,
    /// requests a stop, and returns false.
    pub fn check(&mut self, event: &Event, test: &mut dyn TestObject) -> bool {
        if self.expired || self.finalized {
            debug!(%event, "condition set closed, event ignored");
            return false;
        }
        match self.set.check(event) {
            Ok(triggered) => triggered,
            Err(e) => {
                test.record_failure(&e.to_string());
                test.stop();
                false
            }
        }
    }

    /// Final reconciliation. Skipped when the test has already failed or the
    /// run expired; runs at most once.
    pub fn check_final(&mut self, test: &mut dyn TestObject) -> bool {
        if self.expired || self.finalized {
            return false;
        }
        self.finalized = true;
        if !test.passed() {
            debug!("test already failed, final reconciliation skipped");
            return false;
        }
        match self.set.check_final() {
            Ok(passed) => {
                test.set_passed(passed);
                passed
            }
            Err(e) => {
                test.record_failure(&e.to_string());
                false
            }
        }
    }

    /// Wall-clock timeout: fails and stops the test. Any later final
    /// reconciliation is suppressed.
    pub fn expire(&mut self, test: &mut dyn TestObject, reason: &str) {
        if self.expired || self.finalized {
            return;
        }
        info!(reason, "condition monitoring expired");
        self.expired = true;
        test.record_failure(reason);
        test.stop();
    }
}

impl EventSink for MonitoredConditions {
    fn on_event(&mut self, _connection: &ConnectionId, event: &Event, test: &mut dyn TestObject) {
        self.check(event, test);
    }

    fn on_stream_end(&mut self, test: &mut dyn TestObject) {
        self.check_final(test);
    }
}
