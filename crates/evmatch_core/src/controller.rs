//! Pre- and post-test condition orchestration.
//!
//! Conditions are registered into two phases. The controller evaluates each
//! phase in registration order, skipping conditions whose capability gate is
//! unmet, and notifies observers of every evaluated condition's status. A
//! post-condition may be paired with a pre-condition by name; the pairing is
//! resolved at registration time.

use crate::error::{EvmatchError, Result};
use crate::verdict::{Status, Verdict};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, warn};

fn default_true() -> bool {
    true
}

/// Identity and gating of a [`TestCondition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConditionMeta {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether a pass is expected. Failures of conditions expected to fail
    /// are logged at warn instead of error.
    #[serde(default = "default_true")]
    pub pass_expected: bool,

    /// Capability name to the value it must have for the condition to run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requires: BTreeMap<String, String>,
}

impl ConditionMeta {
    /// Enabled, pass expected, no requirements.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            pass_expected: true,
            requires: BTreeMap::new(),
        }
    }

    /// Adds a capability requirement.
    pub fn requiring(mut self, capability: impl Into<String>, value: impl Into<String>) -> Self {
        self.requires.insert(capability.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn expect_failure(mut self) -> Self {
        self.pass_expected = false;
        self
    }
}

/// Build or runtime options of the system under test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities {
    options: BTreeMap<String, String>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Sets `name` to `"1"`.
    pub fn enable(self, name: impl Into<String>) -> Self {
        self.with(name, "1")
    }

    /// Value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// Returns true if every requirement of `meta` holds.
    pub fn satisfies(&self, meta: &ConditionMeta) -> bool {
        let mut ok = true;
        for (name, expected) in &meta.requires {
            if self.get(name) != Some(expected.as_str()) {
                debug!(
                    capability = %name,
                    expected = %expected,
                    condition = %meta.name,
                    "capability not set to expected value, condition will not be checked"
                );
                ok = false;
            }
        }
        ok
    }
}

/// A check run before or after the test body.
///
/// Implementations record their outcome in their own [`Verdict`] via
/// `pass_check`/`fail_check`. Returning `Err` signals that the check could
/// not be carried out at all; the controller records that as a failure.
pub trait TestCondition {
    fn meta(&self) -> &ConditionMeta;

    fn verdict(&self) -> &Verdict;

    fn verdict_mut(&mut self) -> &mut Verdict;

    /// Runs the check. `related` is the paired pre-condition, if any.
    fn evaluate(&mut self, related: Option<&dyn TestCondition>) -> Result<()>;

    /// Downcasting hook for reading a related condition's captured state.
    fn as_any(&self) -> &dyn Any;

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn status(&self) -> Status {
        self.verdict().status()
    }
}

/// Renders a condition as `test condition [name]: [status]` plus reasons.
pub fn describe_condition(condition: &dyn TestCondition) -> String {
    format!("test condition [{}]: {}", condition.name(), condition.verdict())
}

/// Logs failed and inconclusive conditions. Registered by default.
pub fn log_condition_outcome(condition: &dyn TestCondition) {
    match condition.status() {
        Status::Inconclusive => warn!("{}", describe_condition(condition)),
        Status::Failed if condition.meta().pass_expected => {
            error!("{}", describe_condition(condition))
        }
        Status::Failed => warn!("{}", describe_condition(condition)),
        Status::Passed => {}
    }
}

/// Which statuses an observer is notified of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(Status),
}

impl StatusFilter {
    fn accepts(&self, status: Status) -> bool {
        match self {
            Self::All => true,
            Self::Only(s) => *s == status,
        }
    }
}

/// Callback notified when a condition finishes evaluating.
pub type ConditionObserver = Box<dyn FnMut(&dyn TestCondition)>;

/// Callback invoked when any condition fails.
pub type StopCallback = Box<dyn FnMut()>;

/// Pre- or post-test phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Summary of one evaluated phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Conditions whose `evaluate` ran.
    pub evaluated: usize,
    /// Conditions skipped as disabled or gated.
    pub skipped: usize,
    /// All evaluated verdicts merged.
    pub verdict: Verdict,
}

struct PostEntry {
    condition: Box<dyn TestCondition>,
    related: Option<usize>,
}

/// Registers and evaluates pre-/post-test conditions.
pub struct TestConditionController {
    capabilities: Capabilities,
    pre: Vec<Box<dyn TestCondition>>,
    post: Vec<PostEntry>,
    observers: Vec<(ConditionObserver, StatusFilter)>,
    stop_callback: Option<StopCallback>,
}

impl TestConditionController {
    /// Creates a controller with the default logging observers registered
    /// for `Failed` and `Inconclusive`.
    pub fn new(capabilities: Capabilities) -> Self {
        let mut controller = Self {
            capabilities,
            pre: Vec::new(),
            post: Vec::new(),
            observers: Vec::new(),
            stop_callback: None,
        };
        controller.register_observer(log_condition_outcome, StatusFilter::Only(Status::Failed));
        controller.register_observer(log_condition_outcome, StatusFilter::Only(Status::Inconclusive));
        controller
    }

    /// Sets the callback raised when any condition fails.
    pub fn with_stop_callback<F>(mut self, stop: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.stop_callback = Some(Box::new(stop));
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn pre_conditions(&self) -> impl Iterator<Item = &dyn TestCondition> {
        self.pre.iter().map(|c| c.as_ref())
    }

    pub fn post_conditions(&self) -> impl Iterator<Item = &dyn TestCondition> {
        self.post.iter().map(|e| e.condition.as_ref())
    }

    /// Registers a pre-test condition. Names must be unique among
    /// pre-conditions so post-conditions can refer to them.
    pub fn register_pre(&mut self, condition: Box<dyn TestCondition>) -> Result<()> {
        if self.pre.iter().any(|c| c.name() == condition.name()) {
            return Err(EvmatchError::DuplicateCondition(condition.name().to_string()));
        }
        info!(condition = %condition.name(), "registered pre test condition");
        self.pre.push(condition);
        Ok(())
    }

    /// Registers a post-test condition, optionally paired with an already
    /// registered pre-condition.
    pub fn register_post(&mut self, condition: Box<dyn TestCondition>, pre_name: Option<&str>) -> Result<()> {
        let related = match pre_name.filter(|n| !n.is_empty()) {
            Some(name) => match self.pre.iter().position(|c| c.name() == name) {
                Some(i) => Some(i),
                None => {
                    error!(pre = %name, "no pre condition found matching name");
                    return Err(EvmatchError::UnresolvedPreCondition(name.to_string()));
                }
            },
            None => None,
        };
        info!(condition = %condition.name(), "registered post test condition");
        self.post.push(PostEntry { condition, related });
        Ok(())
    }

    /// Registers an observer notified of conditions whose status passes
    /// `filter`.
    pub fn register_observer<F>(&mut self, observer: F, filter: StatusFilter)
    where
        F: FnMut(&dyn TestCondition) + 'static,
    {
        self.observers.push((Box::new(observer), filter));
    }

    /// Evaluates every pre-condition.
    pub fn evaluate_pre_checks(&mut self) -> PhaseReport {
        debug!("evaluating pre checks");
        let mut report = PhaseReport::default();
        for condition in &mut self.pre {
            if !runnable(&self.capabilities, condition.meta()) {
                report.skipped += 1;
                continue;
            }
            evaluate_one(
                condition.as_mut(),
                None,
                Phase::Pre,
                &mut report,
                &mut self.observers,
                &mut self.stop_callback,
            );
        }
        report
    }

    /// Evaluates every post-condition, handing each its paired pre-condition.
    pub fn evaluate_post_checks(&mut self) -> PhaseReport {
        debug!("evaluating post checks");
        let mut report = PhaseReport::default();
        for entry in &mut self.post {
            if !runnable(&self.capabilities, entry.condition.meta()) {
                report.skipped += 1;
                continue;
            }
            let related = entry.related.map(|i| self.pre[i].as_ref());
            evaluate_one(
                entry.condition.as_mut(),
                related,
                Phase::Post,
                &mut report,
                &mut self.observers,
                &mut self.stop_callback,
            );
        }
        report
    }
}

impl fmt::Debug for TestConditionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestConditionController")
            .field("capabilities", &self.capabilities)
            .field("pre", &self.pre.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field(
                "post",
                &self.post.iter().map(|e| e.condition.name()).collect::<Vec<_>>(),
            )
            .field("observers", &self.observers.len())
            .field("stop_callback", &self.stop_callback.is_some())
            .finish()
    }
}

fn runnable(capabilities: &Capabilities, meta: &ConditionMeta) -> bool {
    if !meta.enabled {
        debug!(condition = %meta.name, "condition disabled, skipping");
        return false;
    }
    capabilities.satisfies(meta)
}

fn evaluate_one(
    condition: &mut dyn TestCondition,
    related: Option<&dyn TestCondition>,
    phase: Phase,
    report: &mut PhaseReport,
    observers: &mut [(ConditionObserver, StatusFilter)],
    stop_callback: &mut Option<StopCallback>,
) {
    debug!(condition = %condition.name(), %phase, "evaluating");
    if let Err(e) = condition.evaluate(related) {
        warn!(condition = %condition.name(), error = %e, "failed to evaluate condition check");
        let reason = EvmatchError::EvaluationFailed {
            condition: condition.name().to_string(),
            reason: e.to_string(),
        };
        condition.verdict_mut().fail_check(reason.to_string());
    }
    report.evaluated += 1;
    report.verdict.merge(condition.verdict());

    let status = condition.status();
    for (observer, filter) in observers.iter_mut() {
        if filter.accepts(status) {
            observer(&*condition);
        }
    }
    if status == Status::Failed {
        if let Some(stop) = stop_callback.as_mut() {
            stop();
        }
    }
}
