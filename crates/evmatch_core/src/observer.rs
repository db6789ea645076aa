//! Single-pattern observers bound to one event subscription.
//!
//! An observer subscribes to one event name on a list of connections,
//! counts qualifying events, and judges each of them with an [`Outcome`]
//! strategy. At stream end it checks its count and reports into the test.

use crate::count::{CountSpec, CountValue};
use crate::error::{ConditionFailure, EvmatchError, Result};
use crate::event::Event;
use crate::pattern::{FieldCheck, Pattern};
use crate::source::{ConnectionId, EventSink};
use crate::test_object::TestObject;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// User callback: receives a qualifying event, returns the disposition.
pub type EventCallback = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Hook raised for qualifying events while the observer is passing.
pub type QualifyingHook = Box<dyn FnMut(&Event, &mut dyn TestObject)>;

/// Lifecycle of a [`StreamObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    /// No matching connection seen yet; events are ignored.
    Unregistered,
    /// Subscribed and counting.
    Registered,
    /// Stream ended and the result was reported.
    Finalized,
}

/// Which [`Outcome`] strategy an observer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserverKind {
    /// Every qualifying event must satisfy one requirements clause.
    #[default]
    HeaderMatch,
    /// The Nth qualifying event must satisfy the Nth requirements clause.
    OrderedHeaderMatch,
    /// A registered callback decides.
    Callback,
}

/// Initial disposition of a callback observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartDisposition {
    #[default]
    Pass,
    Fail,
}

/// What to do when the count first reaches its minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserverAction {
    #[default]
    None,
    /// Stop the test.
    Stop,
}

/// A `match`/`nomatch` pair of field to regex maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseConfig {
    #[serde(rename = "match", default)]
    pub matches: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nomatch: BTreeMap<String, String>,
}

/// Requirements as configured: one clause or an ordered list of clauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementsConfig {
    Ordered(Vec<ClauseConfig>),
    Single(ClauseConfig),
}

fn default_id() -> String {
    "0".to_string()
}

/// Configuration for one [`StreamObserver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ObserverConfig {
    /// Diagnostic label (default: the event name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Event name to subscribe to.
    pub event: String,

    /// Additional qualifying clauses.
    #[serde(default)]
    pub conditions: ClauseConfig,

    /// Expected qualifying events (default: any number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountValue>,

    /// Comma-separated connection ids.
    #[serde(default = "default_id")]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: ObserverKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementsConfig>,

    /// Registered callback name, for [`ObserverKind::Callback`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,

    #[serde(default)]
    pub start: StartDisposition,

    #[serde(default)]
    pub action: ObserverAction,

    /// Raise the qualifying hook only when the count reaches its minimum.
    #[serde(default)]
    pub trigger_on_count: bool,
}

impl ObserverConfig {
    /// Minimal header-match configuration for `event`.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            name: None,
            event: event.into(),
            conditions: ClauseConfig::default(),
            count: None,
            id: default_id(),
            kind: ObserverKind::default(),
            requirements: None,
            callback: None,
            start: StartDisposition::default(),
            action: ObserverAction::default(),
            trigger_on_count: false,
        }
    }

    /// Connection ids parsed from the `id` list.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.id
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ConnectionId::new)
            .collect()
    }
}

/// Callbacks addressable by name from configuration.
#[derive(Default, Clone)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, EventCallback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.callbacks.insert(name.into(), Arc::new(callback));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    /// Looks up a callback.
    pub fn get(&self, name: &str) -> Result<EventCallback> {
        self.callbacks
            .get(name)
            .cloned()
            .ok_or_else(|| EvmatchError::UnknownCallback(name.to_string()))
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.callbacks.keys().collect();
        names.sort();
        f.debug_struct("CallbackRegistry").field("callbacks", &names).finish()
    }
}

/// Requirements one qualifying event must satisfy.
///
/// Stricter than a qualifying [`Pattern`]: a field missing from the event
/// fails both `match` and `nomatch` clauses.
#[derive(Debug, Clone)]
pub struct Requirements {
    pattern: Pattern,
}

impl Requirements {
    pub fn from_config(config: &ClauseConfig) -> Result<Self> {
        Ok(Self {
            pattern: Pattern::new(config.matches.iter(), config.nomatch.iter())?,
        })
    }

    /// Checks every clause, logging each failure. Returns false if any failed.
    pub fn check(&self, event: &Event) -> bool {
        let event_name = event.name().unwrap_or_default();
        let mut ok = true;

        for m in self.pattern.match_fields() {
            match m.check(event) {
                FieldCheck::Matched => {
                    debug!(field = m.field(), regex = m.source(), "requirement matches");
                }
                FieldCheck::Mismatch => {
                    warn!(
                        field = m.field(),
                        regex = m.source(),
                        value = event.get(m.field()).unwrap_or_default(),
                        "requirement does not match"
                    );
                    ok = false;
                }
                FieldCheck::Missing => {
                    warn!(field = m.field(), event = event_name, "requirement does not exist in event");
                    ok = false;
                }
            }
        }

        for m in self.pattern.nomatch_fields() {
            match m.check(event) {
                FieldCheck::Mismatch => {
                    debug!(field = m.field(), regex = m.source(), "requirement does not match, as expected");
                }
                FieldCheck::Matched => {
                    warn!(
                        field = m.field(),
                        regex = m.source(),
                        value = event.get(m.field()).unwrap_or_default(),
                        "nomatch requirement matches"
                    );
                    ok = false;
                }
                FieldCheck::Missing => {
                    warn!(field = m.field(), event = event_name, "requirement does not exist in event");
                    ok = false;
                }
            }
        }

        ok
    }
}

/// How a qualifying event affects the observer's disposition.
pub enum Outcome {
    /// Any failed check makes the observer fail.
    HeaderMatch(Requirements),
    /// Events are checked against requirements in arrival order; events past
    /// the end of the list are ignored.
    OrderedHeaderMatch {
        requirements: Vec<Requirements>,
        next: usize,
    },
    /// The callback's return value replaces the disposition.
    Callback { name: String, callback: EventCallback },
}

impl Outcome {
    fn from_config(config: &ObserverConfig, callbacks: &CallbackRegistry) -> Result<Self> {
        match (config.kind, &config.requirements) {
            (ObserverKind::HeaderMatch, None) => {
                Ok(Self::HeaderMatch(Requirements::from_config(&ClauseConfig::default())?))
            }
            (ObserverKind::HeaderMatch, Some(RequirementsConfig::Single(clause))) => {
                Ok(Self::HeaderMatch(Requirements::from_config(clause)?))
            }
            (ObserverKind::HeaderMatch, Some(RequirementsConfig::Ordered(_))) => {
                Err(EvmatchError::ConfigError(format!(
                    "observer '{}': headermatch takes a single requirements clause",
                    config.event
                )))
            }
            (ObserverKind::OrderedHeaderMatch, Some(RequirementsConfig::Ordered(list))) => {
                let requirements = list
                    .iter()
                    .map(Requirements::from_config)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::OrderedHeaderMatch {
                    requirements,
                    next: 0,
                })
            }
            (ObserverKind::OrderedHeaderMatch, _) => Err(EvmatchError::ConfigError(format!(
                "observer '{}': orderedheadermatch needs a list of requirements",
                config.event
            ))),
            (ObserverKind::Callback, _) => {
                let name = config.callback.as_deref().ok_or_else(|| {
                    EvmatchError::ConfigError(format!(
                        "observer '{}': callback type needs a 'callback' name",
                        config.event
                    ))
                })?;
                Ok(Self::Callback {
                    name: name.to_string(),
                    callback: callbacks.get(name)?,
                })
            }
        }
    }

    /// Applies the strategy to one qualifying event.
    fn apply(&mut self, event: &Event, passed: bool) -> bool {
        match self {
            Self::HeaderMatch(requirements) => requirements.check(event) && passed,
            Self::OrderedHeaderMatch { requirements, next } => {
                let Some(current) = requirements.get(*next) else {
                    debug!(%event, "event past the ordered requirements ignored");
                    return passed;
                };
                *next += 1;
                current.check(event) && passed
            }
            Self::Callback { name, callback } => {
                let disposition = callback(event);
                debug!(callback = %name, disposition, "callback evaluated event");
                disposition
            }
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderMatch(r) => f.debug_tuple("HeaderMatch").field(r).finish(),
            Self::OrderedHeaderMatch { requirements, next } => f
                .debug_struct("OrderedHeaderMatch")
                .field("requirements", &requirements.len())
                .field("next", next)
                .finish(),
            Self::Callback { name, .. } => f.debug_struct("Callback").field("name", name).finish(),
        }
    }
}

/// Counts qualifying events of one subscription and judges them.
///
/// # Examples
///
/// ```
/// use evmatch_core::{
///     CallbackRegistry, ConnectionId, Event, ObserverConfig, StreamObserver, TestRun,
/// };
///
/// let config: ObserverConfig = serde_json::from_str(
///     r#"{"event": "Hangup", "count": 1, "requirements": {"match": {"cause": "16"}}}"#,
/// )
/// .unwrap();
/// let mut observer = StreamObserver::from_config(&config, &CallbackRegistry::new()).unwrap();
/// let mut test = TestRun::new("doc");
///
/// observer.register(&ConnectionId::default());
/// observer.handle(
///     &ConnectionId::default(),
///     &Event::new([("Event", "Hangup"), ("Cause", "16")]),
///     &mut test,
/// );
/// observer.finalize(&mut test);
/// assert!(test.verdict().is_passed());
/// ```
pub struct StreamObserver {
    label: String,
    connections: Vec<ConnectionId>,
    pattern: Pattern,
    spec: CountSpec,
    count: u64,
    state: ObserverState,
    registered_on: Option<ConnectionId>,
    outcome: Outcome,
    passed: bool,
    action: ObserverAction,
    trigger_on_count: bool,
    on_qualifying: Option<QualifyingHook>,
}

impl StreamObserver {
    /// Builds an observer, resolving callbacks through `callbacks`.
    pub fn from_config(config: &ObserverConfig, callbacks: &CallbackRegistry) -> Result<Self> {
        if config.event.trim().is_empty() {
            return Err(EvmatchError::ConfigError(
                "observer has no event to subscribe to".to_string(),
            ));
        }
        let connections = config.connection_ids();
        if connections.is_empty() {
            return Err(EvmatchError::ConfigError(format!(
                "observer '{}': empty connection id list",
                config.event
            )));
        }

        let subscription = (
            Event::NAME_FIELD.to_string(),
            format!("{}$", regex::escape(&config.event)),
        );
        let matches = std::iter::once(subscription).chain(
            config
                .conditions
                .matches
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let pattern = Pattern::new(matches, config.conditions.nomatch.iter())?;

        let spec = match &config.count {
            Some(count) => count.to_spec()?,
            None => CountSpec::any(),
        };
        let outcome = Outcome::from_config(config, callbacks)?;
        let passed = match config.kind {
            ObserverKind::Callback => config.start == StartDisposition::Pass,
            _ => true,
        };

        debug!(event = %config.event, kind = ?config.kind, count = %spec, "observer created");
        Ok(Self {
            label: config.name.clone().unwrap_or_else(|| config.event.clone()),
            connections,
            pattern,
            spec,
            count: 0,
            state: ObserverState::Unregistered,
            registered_on: None,
            outcome,
            passed,
            action: config.action,
            trigger_on_count: config.trigger_on_count,
            on_qualifying: None,
        })
    }

    /// Attaches a hook raised for qualifying events while passing. With
    /// `trigger-on-count` it fires only when the count reaches its minimum.
    pub fn with_on_qualifying<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Event, &mut dyn TestObject) + 'static,
    {
        self.on_qualifying = Some(Box::new(hook));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    pub fn state(&self) -> ObserverState {
        self.state
    }

    pub fn spec(&self) -> CountSpec {
        self.spec
    }

    /// Qualifying events seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current disposition from the outcome strategy.
    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Subscribes on `connection` if it is one of ours. Only the first
    /// matching connection registers. Returns true if this call registered.
    pub fn register(&mut self, connection: &ConnectionId) -> bool {
        if self.state != ObserverState::Unregistered || !self.connections.contains(connection) {
            return false;
        }
        debug!(observer = %self.label, %connection, "registering observer");
        self.state = ObserverState::Registered;
        self.registered_on = Some(connection.clone());
        true
    }

    /// The connection the observer subscribed on, once registered.
    pub fn registered_on(&self) -> Option<&ConnectionId> {
        self.registered_on.as_ref()
    }

    /// Handles one delivered event. Only events from the connection the
    /// observer registered on are considered. Returns true if it qualified.
    pub fn handle(&mut self, connection: &ConnectionId, event: &Event, test: &mut dyn TestObject) -> bool {
        if self.state != ObserverState::Registered || self.registered_on.as_ref() != Some(connection) {
            return false;
        }
        if !self.pattern.matches(event) {
            return false;
        }
        self.count += 1;
        self.passed = self.outcome.apply(event, self.passed);
        debug!(observer = %self.label, count = self.count, passed = self.passed, "qualifying event");

        let reached_min = self.count == self.spec.min();
        if self.passed && (!self.trigger_on_count || reached_min) {
            if let Some(hook) = self.on_qualifying.as_mut() {
                hook(event, test);
            }
        }
        // A zero minimum is never "reached"; something else has to stop the test.
        if reached_min && self.action == ObserverAction::Stop {
            info!(observer = %self.label, "minimum count reached, stopping test");
            test.stop();
        }
        true
    }

    /// Validates the count and reports the disposition. Runs once.
    pub fn finalize(&mut self, test: &mut dyn TestObject) {
        if self.state == ObserverState::Finalized {
            return;
        }
        self.state = ObserverState::Finalized;

        if !self.spec.contains(self.count) {
            let failure = ConditionFailure {
                pattern: self.label.clone(),
                min: self.spec.min(),
                max: self.spec.max(),
                count: self.count,
            };
            warn!(observer = %self.label, count = self.count, "event count out of the allowable range");
            test.record_failure(&failure.to_string());
            return;
        }
        if self.passed {
            test.set_passed(true);
        } else {
            test.record_failure(&format!("observer '{}': requirements not met", self.label));
        }
    }
}

impl EventSink for StreamObserver {
    fn on_connect(&mut self, connection: &ConnectionId, _test: &mut dyn TestObject) {
        self.register(connection);
    }

    fn on_event(&mut self, connection: &ConnectionId, event: &Event, test: &mut dyn TestObject) {
        self.handle(connection, event, test);
    }

    fn on_stream_end(&mut self, test: &mut dyn TestObject) {
        self.finalize(test);
    }
}

impl fmt::Debug for StreamObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamObserver")
            .field("label", &self.label)
            .field("connections", &self.connections)
            .field("pattern", &self.pattern.to_string())
            .field("spec", &self.spec)
            .field("count", &self.count)
            .field("state", &self.state)
            .field("registered_on", &self.registered_on)
            .field("outcome", &self.outcome)
            .field("passed", &self.passed)
            .finish()
    }
}

/// A group of observers built from one configuration list.
#[derive(Debug, Default)]
pub struct ObserverModule {
    observers: Vec<StreamObserver>,
}

impl ObserverModule {
    /// Builds every observer; the first configuration error aborts.
    pub fn from_configs(configs: &[ObserverConfig], callbacks: &CallbackRegistry) -> Result<Self> {
        let observers = configs
            .iter()
            .map(|c| StreamObserver::from_config(c, callbacks))
            .collect::<Result<Vec<_>>>()?;
        debug!(count = observers.len(), "observer module initialized");
        Ok(Self { observers })
    }

    pub fn observers(&self) -> &[StreamObserver] {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut [StreamObserver] {
        &mut self.observers
    }

    pub fn push(&mut self, observer: StreamObserver) {
        self.observers.push(observer);
    }
}

impl EventSink for ObserverModule {
    fn on_connect(&mut self, connection: &ConnectionId, test: &mut dyn TestObject) {
        for o in &mut self.observers {
            o.on_connect(connection, test);
        }
    }

    fn on_event(&mut self, connection: &ConnectionId, event: &Event, test: &mut dyn TestObject) {
        for o in &mut self.observers {
            o.on_event(connection, event, test);
        }
    }

    fn on_stream_end(&mut self, test: &mut dyn TestObject) {
        for o in &mut self.observers {
            o.on_stream_end(test);
        }
    }
}
