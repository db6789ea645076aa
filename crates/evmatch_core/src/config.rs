//! Top-level harness configuration.
//!
//! Parsed from TOML or JSON text; locating and reading the text is the
//! caller's job.

use crate::condition_set::ConditionSetConfig;
use crate::controller::Capabilities;
use crate::error::{EvmatchError, Result};
use crate::monitor::MonitoredConditions;
use crate::observer::{CallbackRegistry, ObserverConfig, ObserverModule};
use crate::source::Dispatcher;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Everything one test declares about the events it expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HarnessConfig {
    /// Streaming condition set, checked against every event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionSetConfig>,

    /// Per-subscription observers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observers: Vec<ObserverConfig>,

    /// Options the pre/post conditions are gated on.
    #[serde(default, skip_serializing_if = "is_default")]
    pub capabilities: Capabilities,

    #[serde(default)]
    pub timing: TimingConfig,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Wall-clock limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimingConfig {
    /// Seconds before the test is failed and stopped (default: 30).
    pub reactor_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reactor_timeout_secs: 30,
        }
    }
}

impl TimingConfig {
    /// Returns the reactor timeout as a Duration.
    pub fn reactor_timeout(&self) -> Duration {
        Duration::from_secs(self.reactor_timeout_secs)
    }

    /// Failure reason recorded when the timeout fires.
    pub fn timeout_reason(&self) -> String {
        format!("reactor timed out after {}s", self.reactor_timeout_secs)
    }
}

impl HarnessConfig {
    /// Parses TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| EvmatchError::ConfigError(format!("failed to parse config: {}", e)))
    }

    /// Parses JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| EvmatchError::ConfigError(format!("failed to parse config: {}", e)))
    }

    /// Serializes to TOML text.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EvmatchError::ConfigError(format!("failed to serialize config: {}", e)))
    }

    /// Builds the monitored condition set, if one is configured.
    pub fn build_monitor(&self) -> Result<Option<MonitoredConditions>> {
        self.conditions
            .as_ref()
            .map(MonitoredConditions::from_config)
            .transpose()
    }

    /// Builds every configured observer.
    pub fn build_observers(&self, callbacks: &CallbackRegistry) -> Result<ObserverModule> {
        ObserverModule::from_configs(&self.observers, callbacks)
    }

    /// Builds a dispatcher with the condition set and the observers
    /// attached, in that order. Any configuration error aborts before an
    /// event can flow.
    pub fn build_dispatcher(&self, callbacks: &CallbackRegistry) -> Result<Dispatcher> {
        let mut dispatcher = Dispatcher::new();
        if let Some(monitor) = self.build_monitor()? {
            dispatcher.attach(Box::new(monitor));
        }
        if !self.observers.is_empty() {
            dispatcher.attach(Box::new(self.build_observers(callbacks)?));
        }
        debug!(?dispatcher, "dispatcher built from config");
        Ok(dispatcher)
    }
}
