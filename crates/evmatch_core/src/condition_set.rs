//! Ordered collections of conditions with a trigger policy.

use crate::condition::{Condition, ConditionConfig};
use crate::error::{EvmatchError, Result};
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Callback raised when a [`ConditionSet`] triggers. Receives the conditions
/// that matched the triggering event, and the event itself.
pub type OnMatch = Box<dyn FnMut(&[&Condition], &Event)>;

/// When [`ConditionSet::check`] reports a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Some condition matched by this event has met its minimum.
    Any,
    /// Every condition in the set has met its minimum.
    All,
    /// Any match at all, minimums ignored.
    FirstMatch,
}

impl TriggerPolicy {
    /// Derives the policy from the two configuration flags. `any` is checked
    /// before `all`, so setting both means `Any`.
    pub fn from_flags(trigger_on_any: bool, trigger_on_all: bool) -> Self {
        if trigger_on_any {
            Self::Any
        } else if trigger_on_all {
            Self::All
        } else {
            Self::FirstMatch
        }
    }
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self::All
    }
}

impl fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "trigger-on-any"),
            Self::All => write!(f, "trigger-on-all"),
            Self::FirstMatch => write!(f, "trigger-on-first-match"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Configuration for a [`ConditionSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSetConfig {
    /// Conditions in evaluation order.
    pub conditions: Vec<ConditionConfig>,

    /// Trigger once any matched condition meets its minimum (default: false).
    #[serde(rename = "trigger-on-any", default)]
    pub trigger_on_any: bool,

    /// Trigger once all conditions meet their minimum (default: true).
    #[serde(rename = "trigger-on-all", default = "default_true")]
    pub trigger_on_all: bool,
}

impl ConditionSetConfig {
    /// Configuration with the default policy.
    pub fn new(conditions: Vec<ConditionConfig>) -> Self {
        Self {
            conditions,
            trigger_on_any: false,
            trigger_on_all: true,
        }
    }

    /// Policy selected by the flags.
    pub fn policy(&self) -> TriggerPolicy {
        TriggerPolicy::from_flags(self.trigger_on_any, self.trigger_on_all)
    }
}

/// Aggregate of conditions evaluated against a stream of events.
///
/// Over-match is reported the moment it happens; under-match only at
/// [`ConditionSet::check_final`], with every unmet condition listed.
///
/// # Examples
///
/// ```
/// use evmatch_core::{ConditionSet, ConditionSetConfig, Event};
///
/// let config = ConditionSetConfig::new(vec!["hello".into()]);
/// let mut set = ConditionSet::from_config(&config).unwrap();
///
/// assert!(set.check(&Event::text("hello")).unwrap());
/// assert!(set.check_final().unwrap());
/// assert!(set.check(&Event::text("hello")).is_err());
/// ```
pub struct ConditionSet {
    conditions: Vec<Condition>,
    policy: TriggerPolicy,
    on_match: Option<OnMatch>,
}

impl ConditionSet {
    /// Creates a set with the given policy and no callback.
    pub fn new(conditions: Vec<Condition>, policy: TriggerPolicy) -> Self {
        Self {
            conditions,
            policy,
            on_match: None,
        }
    }

    /// Builds every condition from configuration. Any configuration error
    /// aborts construction.
    pub fn from_config(config: &ConditionSetConfig) -> Result<Self> {
        let conditions = config
            .conditions
            .iter()
            .map(Condition::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(conditions, config.policy()))
    }

    /// Registers the trigger callback.
    pub fn with_on_match<F>(mut self, on_match: F) -> Self
    where
        F: FnMut(&[&Condition], &Event) + 'static,
    {
        self.on_match = Some(Box::new(on_match));
        self
    }

    /// Conditions in evaluation order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// The trigger policy.
    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    /// Feeds one event through every condition.
    ///
    /// Returns `Ok(true)` (and raises the callback) when the policy is
    /// satisfied by this event. Returns [`EvmatchError::OverMatch`] as soon
    /// as a matched condition goes past its maximum.
    pub fn check(&mut self, event: &Event) -> Result<bool> {
        let mut matched = Vec::new();
        for (i, c) in self.conditions.iter_mut().enumerate() {
            if !c.record_if_matches(event) {
                continue;
            }
            if c.exceeds_maximum() {
                warn!(condition = %c.label(), count = c.count(), "condition exceeded its maximum");
                return Err(EvmatchError::OverMatch(c.failure()));
            }
            matched.push(i);
        }

        if matched.is_empty() {
            return Ok(false);
        }

        let triggered = match self.policy {
            TriggerPolicy::Any => matched
                .iter()
                .any(|&i| self.conditions[i].satisfies_minimum()),
            TriggerPolicy::All => self.conditions.iter().all(Condition::satisfies_minimum),
            TriggerPolicy::FirstMatch => true,
        };
        if !triggered {
            return Ok(false);
        }

        let matched: Vec<&Condition> = matched.iter().map(|&i| &self.conditions[i]).collect();
        debug!(
            policy = %self.policy,
            conditions = ?matched.iter().map(|c| c.label()).collect::<Vec<_>>(),
            "conditions triggered"
        );
        if let Some(on_match) = self.on_match.as_mut() {
            on_match(&matched, event);
        }
        Ok(true)
    }

    /// Final reconciliation: fails with every condition that never reached
    /// its minimum.
    pub fn check_final(&self) -> Result<bool> {
        let unmet: Vec<_> = self
            .conditions
            .iter()
            .filter(|c| !c.satisfies_minimum())
            .map(Condition::failure)
            .collect();
        if !unmet.is_empty() {
            return Err(EvmatchError::UnderMatch(unmet));
        }
        Ok(true)
    }

    /// Clears every tally.
    pub fn reset(&mut self) {
        self.conditions.iter_mut().for_each(Condition::reset);
    }
}

impl fmt::Debug for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionSet")
            .field("conditions", &self.conditions)
            .field("policy", &self.policy)
            .field("on_match", &self.on_match.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
