//! Snapshot-and-diff test conditions for leak detection.
//!
//! The pre-condition records which resources each instance holds before the
//! test; the post-condition captures again afterwards and fails on anything
//! that appeared or disappeared.

use crate::controller::{ConditionMeta, TestCondition};
use crate::error::Result;
use crate::verdict::Verdict;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Resource identifiers held by each instance of the system under test.
pub type Snapshot = BTreeMap<String, BTreeSet<String>>;

/// Source of resource snapshots, e.g. open file descriptors per instance.
pub trait ResourceProbe {
    fn capture(&mut self) -> Result<Snapshot>;
}

impl<F> ResourceProbe for F
where
    F: FnMut() -> Result<Snapshot>,
{
    fn capture(&mut self) -> Result<Snapshot> {
        self()
    }
}

/// Records the baseline. Always passes: whatever is held before the test
/// is assumed to be needed.
pub struct SnapshotPreCondition {
    meta: ConditionMeta,
    verdict: Verdict,
    probe: Box<dyn ResourceProbe>,
    baseline: Option<Snapshot>,
}

impl SnapshotPreCondition {
    pub fn new(meta: ConditionMeta, probe: impl ResourceProbe + 'static) -> Self {
        Self {
            meta,
            verdict: Verdict::new(),
            probe: Box::new(probe),
            baseline: None,
        }
    }

    /// The captured baseline, once evaluated.
    pub fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_ref()
    }
}

impl TestCondition for SnapshotPreCondition {
    fn meta(&self) -> &ConditionMeta {
        &self.meta
    }

    fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    fn verdict_mut(&mut self) -> &mut Verdict {
        &mut self.verdict
    }

    fn evaluate(&mut self, _related: Option<&dyn TestCondition>) -> Result<()> {
        self.verdict.pass_check();
        let snapshot = self.probe.capture()?;
        for (instance, resources) in &snapshot {
            debug!(condition = %self.meta.name, %instance, count = resources.len(), "baseline captured");
        }
        self.baseline = Some(snapshot);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Re-captures and diffs against the paired [`SnapshotPreCondition`].
pub struct SnapshotPostCondition {
    meta: ConditionMeta,
    verdict: Verdict,
    probe: Box<dyn ResourceProbe>,
    captured: Option<Snapshot>,
}

impl SnapshotPostCondition {
    pub fn new(meta: ConditionMeta, probe: impl ResourceProbe + 'static) -> Self {
        Self {
            meta,
            verdict: Verdict::new(),
            probe: Box::new(probe),
            captured: None,
        }
    }

    pub fn captured(&self) -> Option<&Snapshot> {
        self.captured.as_ref()
    }

    fn diff(&mut self, baseline: &Snapshot, current: &Snapshot) {
        for (instance, before) in baseline {
            let Some(after) = current.get(instance) else {
                self.verdict.fail_check(format!(
                    "instance [{}] in pre-test check not found in post-test check",
                    instance
                ));
                continue;
            };
            for resource in before.difference(after) {
                self.verdict.fail_check(format!(
                    "failed to find [{}] on instance [{}] in post-test check",
                    resource, instance
                ));
            }
            for resource in after.difference(before) {
                self.verdict.fail_check(format!(
                    "failed to find [{}] on instance [{}] in pre-test check",
                    resource, instance
                ));
            }
        }
        for instance in current.keys().filter(|i| !baseline.contains_key(*i)) {
            self.verdict.fail_check(format!(
                "instance [{}] in post-test check not found in pre-test check",
                instance
            ));
        }
        self.verdict.pass_check();
    }
}

impl TestCondition for SnapshotPostCondition {
    fn meta(&self) -> &ConditionMeta {
        &self.meta
    }

    fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    fn verdict_mut(&mut self) -> &mut Verdict {
        &mut self.verdict
    }

    fn evaluate(&mut self, related: Option<&dyn TestCondition>) -> Result<()> {
        let baseline = related
            .and_then(|r| r.as_any().downcast_ref::<SnapshotPreCondition>())
            .and_then(SnapshotPreCondition::baseline);
        let Some(baseline) = baseline else {
            self.verdict.fail_check("no pre-test snapshot provided");
            return Ok(());
        };
        let current = self.probe.capture()?;
        self.diff(baseline, &current);
        self.captured = Some(current);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
