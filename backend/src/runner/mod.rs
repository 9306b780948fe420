//! Runner client abstraction.
//!
//! A runner is a remote evaluator that receives an encoded [`Job`] and
//! answers with an encoded [`RunResult`]. The [`Runner`] trait hides how the
//! call is made so the dispatch engine can be driven by HTTP runners in
//! production and in-memory stubs in tests.
//!
//! [`Job`]: differer_common::Job

mod http;

pub use http::HttpRunner;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use differer_common::{CodecError, RunResult};
use reqwest::{StatusCode, Url};

use crate::config::{Config, ConfigError};

/// Failure of a single runner call.
///
/// These never fail a batch. The dispatch engine records them as an absent
/// outcome for the (address, runner) pair.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("runner returned bad status code: {0}")]
    Status(StatusCode),
    #[error("could not read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("could not decode response: {0}")]
    Decode(#[from] CodecError),
    #[error("runner unavailable: {0}")]
    Unavailable(String),
    #[error("call cancelled")]
    Cancelled,
}

/// A remote evaluator of encoded jobs.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Name used to group this runner's results in the batch output.
    fn name(&self) -> &str;

    /// Evaluate one encoded job.
    ///
    /// `job` is the same buffer for every runner evaluating a given address.
    /// Dropping the returned future abandons the call.
    async fn run(&self, job: Bytes) -> Result<RunResult, RunnerError>;
}

/// Build one [`HttpRunner`] per configured runner, ordered by name.
///
/// All runners share a single connection pool whose per-request timeout is
/// the configured `timeout`.
pub fn from_config(config: &Config) -> Result<Vec<Arc<dyn Runner>>, ConfigError> {
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;

    config
        .runners
        .iter()
        .map(|(name, service)| -> Result<Arc<dyn Runner>, ConfigError> {
            let url = Url::parse(service).map_err(|e| ConfigError::InvalidRunnerUrl {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            Ok(Arc::new(HttpRunner::new(name.clone(), url, client.clone())))
        })
        .collect()
}
