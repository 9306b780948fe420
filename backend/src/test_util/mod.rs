//! Helpers for tests: in-memory runners and ready-made state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use differer_common::RunResult;

use crate::config::Config;
use crate::runner::{Runner, RunnerError};
use crate::AppState;

enum Behavior {
    Respond(RunResult),
    Fail(String),
    Hang,
    Panic,
}

/// In-memory runner with a canned answer.
///
/// Records every payload it is handed so tests can inspect what the
/// dispatcher sent.
pub struct StubRunner {
    name: String,
    behavior: Behavior,
    delay: Option<Duration>,
    received: Mutex<Vec<Bytes>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubRunner {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            name: "stub".to_string(),
            behavior,
            delay: None,
            received: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn returning(result: RunResult) -> Self {
        Self::with_behavior(Behavior::Respond(result))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Fail(message.to_string()))
    }

    /// Never answers. Only cancellation gets a result out of it.
    pub fn hanging() -> Self {
        Self::with_behavior(Behavior::Hang)
    }

    pub fn panicking() -> Self {
        Self::with_behavior(Behavior::Panic)
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn received(&self) -> Vec<Bytes> {
        self.received.lock().unwrap().clone()
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Runner for StubRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, job: Bytes) -> Result<RunResult, RunnerError> {
        self.received.lock().unwrap().push(job);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Respond(result) => Ok(result.clone()),
            Behavior::Fail(message) => Err(RunnerError::Unavailable(message.clone())),
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("stub runner {} panicked", self.name),
        }
    }
}

pub fn test_config() -> Config {
    Config::from_yaml_str("runners: {}\ntimeout: 1s\nlogging:\n  level: debug\n")
        .expect("test config should parse")
}

pub fn create_test_state(runners: Vec<Arc<dyn Runner>>) -> Arc<AppState> {
    Arc::new(AppState::new(&test_config(), runners))
}
