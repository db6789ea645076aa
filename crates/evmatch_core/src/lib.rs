//! Evmatch Core Library
//!
//! Declarative event matching and verdict aggregation for telephony test
//! harnesses:
//! - Occurrence ranges parsed from compact count text
//! - Positive/negative field-regex patterns
//! - Condition sets with trigger policies and fail-fast over-match
//! - Per-subscription stream observers with pluggable outcomes
//! - Pre/post test conditions with capability gating
//!
//! The engine never talks to a protocol itself. An external event source
//! pushes [`Event`]s through a [`Dispatcher`], and results are reported
//! into a [`TestObject`].
//!
//! # Quick Start
//!
//! ```
//! use evmatch_core::{CallbackRegistry, ConnectionId, Event, HarnessConfig, TestRun};
//!
//! let config = HarnessConfig::from_toml_str(
//!     r#"
//!     [conditions]
//!     conditions = [{ match = "hello", count = "2-4" }]
//!     "#,
//! )
//! .unwrap();
//!
//! let mut dispatcher = config.build_dispatcher(&CallbackRegistry::new()).unwrap();
//! let mut test = TestRun::new("quick-start");
//! let conn = ConnectionId::default();
//!
//! dispatcher.connect(conn.clone(), &mut test).unwrap();
//! for _ in 0..3 {
//!     dispatcher.deliver(&conn, &Event::text("hello"), &mut test).unwrap();
//! }
//! dispatcher.end_stream(&mut test);
//!
//! assert!(test.verdict().is_passed());
//! ```
//!
//! # Counts
//!
//! ```
//! use evmatch_core::CountSpec;
//!
//! let optional: CountSpec = "optional".parse().unwrap();
//! assert_eq!(optional, "<2".parse::<CountSpec>().unwrap());
//! assert!(optional.contains(0) && optional.contains(1) && !optional.contains(2));
//! ```

mod condition;
mod condition_set;
mod config;
mod controller;
mod count;
mod error;
mod event;
mod monitor;
mod observer;
mod pattern;
mod snapshot;
mod source;
mod test_object;
mod verdict;

pub use condition::{Condition, ConditionConfig, ConditionFields};
pub use condition_set::{ConditionSet, ConditionSetConfig, OnMatch, TriggerPolicy};
pub use config::{HarnessConfig, TimingConfig};
pub use controller::{
    describe_condition, log_condition_outcome, Capabilities, ConditionMeta, ConditionObserver,
    Phase, PhaseReport, StatusFilter, StopCallback, TestCondition, TestConditionController,
};
pub use count::{CountSpec, CountValue};
pub use error::{ConditionFailure, EvmatchError, Result};
pub use event::Event;
pub use monitor::MonitoredConditions;
pub use observer::{
    CallbackRegistry, ClauseConfig, EventCallback, ObserverAction, ObserverConfig, ObserverKind,
    ObserverModule, ObserverState, Outcome, QualifyingHook, Requirements, RequirementsConfig,
    StartDisposition, StreamObserver,
};
pub use pattern::{FieldCheck, FieldMatcher, MatchClause, Pattern};
pub use snapshot::{ResourceProbe, Snapshot, SnapshotPostCondition, SnapshotPreCondition};
pub use source::{ConnectionId, Dispatcher, EventSink};
pub use test_object::{TestObject, TestRun};
pub use verdict::{Status, Verdict};
