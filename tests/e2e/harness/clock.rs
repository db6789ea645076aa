use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Controllable wall clock for reactor timeout testing.
///
/// Scenarios never sleep; `wait` steps advance this clock and the runner
/// fires the timeout once the configured limit is reached.
#[derive(Clone, Default)]
pub struct MockClock {
    elapsed_secs: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a new mock clock at zero elapsed time
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the scenario started
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs(self.elapsed_secs.load(Ordering::SeqCst))
    }

    /// Advance time by duration
    pub fn advance(&self, duration: Duration) {
        self.elapsed_secs
            .fetch_add(duration.as_secs(), Ordering::SeqCst);
    }

    /// Returns true once `limit` has been reached
    pub fn reached(&self, limit: Duration) -> bool {
        self.elapsed() >= limit
    }
}
