use super::assertions::Assertion;
use super::clock::MockClock;
use super::scenario::{ConfigSource, ScenarioSetup};
use super::steps::ScenarioStep;
use anyhow::{anyhow, bail, Context, Result};
use evmatch_core::{
    ConditionMeta, ConnectionId, Dispatcher, Event, EvmatchError, HarnessConfig, Phase,
    PhaseReport, Snapshot, SnapshotPostCondition, SnapshotPreCondition, TestConditionController,
    TestObject, TestRun, TimingConfig,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Executes scenarios against a real dispatcher and controller
pub struct ScenarioRunner {
    dispatcher: Dispatcher,
    controller: TestConditionController,
    test: TestRun,
    resources: Rc<RefCell<Snapshot>>,
    stop_requests: Rc<Cell<usize>>,
    clock: MockClock,
    timing: TimingConfig,
    pre_report: Option<PhaseReport>,
    post_report: Option<PhaseReport>,
    current_step: usize,
}

impl ScenarioRunner {
    /// Build everything the setup declares. Configuration errors surface
    /// here, before any event flows.
    pub fn new(setup: ScenarioSetup) -> Result<Self> {
        init_tracing();

        let config = match &setup.config {
            ConfigSource::Empty => HarnessConfig::default(),
            ConfigSource::Toml(text) => HarnessConfig::from_toml_str(text)?,
            ConfigSource::Json(text) => HarnessConfig::from_json_str(text)?,
        };
        let dispatcher = config.build_dispatcher(&setup.callbacks)?;

        let mut capabilities = config.capabilities.clone();
        for (name, value) in &setup.capabilities {
            capabilities = capabilities.with(name.as_str(), value.as_str());
        }

        let stop_requests = Rc::new(Cell::new(0));
        let counter = Rc::clone(&stop_requests);
        let mut controller = TestConditionController::new(capabilities)
            .with_stop_callback(move || counter.set(counter.get() + 1));

        let resources: Rc<RefCell<Snapshot>> = Rc::new(RefCell::new(
            setup
                .resources
                .iter()
                .map(|(instance, held)| (instance.clone(), held.iter().cloned().collect()))
                .collect(),
        ));

        for pair in &setup.snapshot_pairs {
            let mut pre_meta = ConditionMeta::new(pair.name.as_str());
            let mut post_meta = ConditionMeta::new(format!("{}-post", pair.name));
            if let Some(capability) = &pair.requires {
                pre_meta = pre_meta.requiring(capability.as_str(), "1");
                post_meta = post_meta.requiring(capability.as_str(), "1");
            }

            let post = SnapshotPostCondition::new(post_meta, probe(&resources));
            if pair.paired {
                let pre = SnapshotPreCondition::new(pre_meta, probe(&resources));
                controller.register_pre(Box::new(pre))?;
                controller.register_post(Box::new(post), Some(pair.name.as_str()))?;
            } else {
                controller.register_post(Box::new(post), None)?;
            }
        }

        Ok(Self {
            dispatcher,
            controller,
            test: TestRun::new("scenario"),
            resources,
            stop_requests,
            clock: MockClock::new(),
            timing: config.timing,
            pre_report: None,
            post_report: None,
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::Connect { connection } => self.handle_connect(connection),
            ScenarioStep::Deliver { connection, fields } => self.handle_deliver(connection, fields),
            ScenarioStep::DeliverAfterEnd { connection, fields } => {
                self.handle_deliver_after_end(connection, fields)
            }
            ScenarioStep::EndStream => self.handle_end_stream(),

            ScenarioStep::Wait { duration } => self.handle_wait(*duration),

            ScenarioStep::SetResources {
                instance,
                resources,
            } => {
                self.resources
                    .borrow_mut()
                    .insert(instance.clone(), resources.iter().cloned().collect());
                Ok(())
            }
            ScenarioStep::DropInstance { instance } => {
                self.resources.borrow_mut().remove(instance);
                Ok(())
            }
            ScenarioStep::EvaluatePreChecks => {
                let report = self.controller.evaluate_pre_checks();
                self.apply_report(&report);
                self.pre_report = Some(report);
                Ok(())
            }
            ScenarioStep::EvaluatePostChecks => {
                let report = self.controller.evaluate_post_checks();
                self.apply_report(&report);
                self.post_report = Some(report);
                Ok(())
            }

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    // ===== Event source =====

    fn handle_connect(&mut self, connection: &str) -> Result<()> {
        self.dispatcher
            .connect(ConnectionId::new(connection), &mut self.test)?;
        Ok(())
    }

    fn handle_deliver(&mut self, connection: &str, fields: &[(String, String)]) -> Result<()> {
        let event = Event::new(fields.iter().cloned());
        self.dispatcher
            .deliver(&ConnectionId::new(connection), &event, &mut self.test)?;
        Ok(())
    }

    fn handle_deliver_after_end(
        &mut self,
        connection: &str,
        fields: &[(String, String)],
    ) -> Result<()> {
        let event = Event::new(fields.iter().cloned());
        match self
            .dispatcher
            .deliver(&ConnectionId::new(connection), &event, &mut self.test)
        {
            Err(EvmatchError::StreamEnded) => Ok(()),
            Err(e) => Err(anyhow!("Expected StreamEnded, got {}", e)),
            Ok(()) => Err(anyhow!("Event was accepted after the stream ended")),
        }
    }

    fn handle_end_stream(&mut self) -> Result<()> {
        if !self.dispatcher.end_stream(&mut self.test) {
            bail!("Stream had already ended");
        }
        Ok(())
    }

    // ===== Time control =====

    fn handle_wait(&mut self, duration: Duration) -> Result<()> {
        self.clock.advance(duration);
        if self.clock.reached(self.timing.reactor_timeout()) {
            self.dispatcher
                .expire(&mut self.test, &self.timing.timeout_reason());
        }
        Ok(())
    }

    // ===== Pre/post phases =====

    /// Fold a phase verdict into the test the way a harness would.
    fn apply_report(&mut self, report: &PhaseReport) {
        if report.verdict.is_failed() {
            for reason in report.verdict.reasons() {
                self.test.record_failure(reason);
            }
            if report.verdict.reasons().is_empty() {
                self.test.set_passed(false);
            }
        }
        if self.stop_requests.get() > 0 {
            self.test.stop();
        }
    }

    fn report(&self, phase: Phase) -> Result<&PhaseReport> {
        let report = match phase {
            Phase::Pre => self.pre_report.as_ref(),
            Phase::Post => self.post_report.as_ref(),
        };
        report.ok_or_else(|| anyhow!("The {} phase was never evaluated", phase))
    }

    // ===== Assertions =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        let verdict = self.test.verdict();
        match assertion {
            Assertion::VerdictIs(expected) => {
                if verdict.status() != *expected {
                    bail!(
                        "Verdict mismatch: expected {}, got {}\n{}",
                        expected,
                        verdict.status(),
                        verdict
                    );
                }
                Ok(())
            }
            Assertion::ReasonContains(text) => {
                if !verdict.reasons().iter().any(|r| r.contains(text.as_str())) {
                    bail!(
                        "No failure reason contains '{}': {:?}",
                        text,
                        verdict.reasons()
                    );
                }
                Ok(())
            }
            Assertion::ReasonCount(expected) => {
                if verdict.reasons().len() != *expected {
                    bail!(
                        "Reason count mismatch: expected {}, got {:?}",
                        expected,
                        verdict.reasons()
                    );
                }
                Ok(())
            }
            Assertion::Stopped => {
                if !self.test.is_stopped() {
                    bail!("Expected the test to be stopped");
                }
                Ok(())
            }
            Assertion::NotStopped => {
                if self.test.is_stopped() {
                    bail!("Test was stopped unexpectedly: {}", verdict);
                }
                Ok(())
            }
            Assertion::StopRequests(expected) => {
                if self.stop_requests.get() != *expected {
                    bail!(
                        "Stop request count mismatch: expected {}, got {}",
                        expected,
                        self.stop_requests.get()
                    );
                }
                Ok(())
            }
            Assertion::EventsDelivered(expected) => {
                if self.dispatcher.delivered() != *expected {
                    bail!(
                        "Delivered count mismatch: expected {}, got {}",
                        expected,
                        self.dispatcher.delivered()
                    );
                }
                Ok(())
            }
            Assertion::StreamEnded => {
                if !self.dispatcher.is_ended() {
                    bail!("Expected the stream to have ended");
                }
                Ok(())
            }
            Assertion::PhaseCounts {
                phase,
                evaluated,
                skipped,
            } => {
                let report = self.report(*phase)?;
                if report.evaluated != *evaluated || report.skipped != *skipped {
                    bail!(
                        "{} phase counts mismatch: expected {}/{} evaluated/skipped, got {}/{}",
                        phase,
                        evaluated,
                        skipped,
                        report.evaluated,
                        report.skipped
                    );
                }
                Ok(())
            }
            Assertion::PhaseStatus { phase, status } => {
                let report = self.report(*phase)?;
                if report.verdict.status() != *status {
                    bail!(
                        "{} phase status mismatch: expected {}, got {}",
                        phase,
                        status,
                        report.verdict
                    );
                }
                Ok(())
            }
            Assertion::Custom(f) => f(&self.test),
        }
    }
}

fn probe(resources: &Rc<RefCell<Snapshot>>) -> impl FnMut() -> evmatch_core::Result<Snapshot> {
    let resources = Rc::clone(resources);
    move || Ok(resources.borrow().clone())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
