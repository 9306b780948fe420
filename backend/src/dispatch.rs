//! Batch dispatch engine.
//!
//! Fans every address of a batch out to every runner and collects exactly
//! one [`AddressResult`] per (address, runner) pair. Individual runner
//! failures are recorded as absent outputs and never fail the batch; the
//! only batch-level failure is being unable to encode a job.
//!
//! Each pair runs in its own task. A task owns a [`Reporter`] for its pair
//! and publishes through it exactly once: explicitly when the call
//! finishes, or from `Drop` if the task panics or is aborted first. The
//! collector reads until every reporter is gone, so it can neither miss a
//! pair nor wait on one that will never report.

use std::mem;
use std::sync::Arc;

use bytes::Bytes;
use differer_common::{encode_job, CodecError, Job, RunResult};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::runner::{Runner, RunnerError};

/// Outcome of evaluating one address with one runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressResult {
    pub runner: String,
    #[serde(rename = "string")]
    pub input: String,
    /// `None` when the call itself failed.
    #[serde(rename = "outputs")]
    pub output: Option<RunResult>,
}

/// All outcomes of one batch, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutput {
    pub results: Vec<AddressResult>,
}

impl DispatchOutput {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("could not build task for address {address:?}: {source}")]
    Encode {
        address: String,
        #[source]
        source: CodecError,
    },
}

/// Runs batches against a set of runners.
pub struct Dispatcher {
    permits: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            permits: config
                .max_in_flight
                .map(|limit| Arc::new(Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS)))),
        }
    }

    /// A dispatcher that starts every call of a batch at once.
    pub fn unbounded() -> Self {
        Self { permits: None }
    }

    /// Evaluate every address with every runner.
    ///
    /// Returns `len(addresses) * len(runners)` results. Cancelling `cancel`
    /// makes outstanding calls report an absent output; the batch still
    /// waits for every pair to report before returning. No timeout is
    /// imposed here beyond whatever the runners and `cancel` carry.
    #[tracing::instrument(
        name = "dispatch",
        skip_all,
        fields(
            batch_id = %Uuid::new_v4(),
            addresses = addresses.len(),
            runners = runners.len(),
        )
    )]
    pub async fn dispatch(
        &self,
        cancel: &CancellationToken,
        addresses: &[String],
        runners: &[Arc<dyn Runner>],
    ) -> Result<DispatchOutput, DispatchError> {
        let tasks = addresses.len() * runners.len();

        // Encode everything up front so a bad job aborts before any call is made.
        let jobs = addresses
            .iter()
            .map(|address| {
                debug!(address = %address, "Creating job");
                encode_job(&Job::new(address.as_str()))
                    .map(|payload| (address, payload))
                    .map_err(|source| DispatchError::Encode {
                        address: address.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(tasks, "Dispatching batch");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut set = JoinSet::new();

        for (address, payload) in &jobs {
            for runner in runners {
                let reporter = Reporter::new(runner.name(), address, tx.clone());
                set.spawn(run_task(
                    Arc::clone(runner),
                    payload.clone(),
                    cancel.clone(),
                    self.permits.clone(),
                    reporter,
                ));
            }
        }
        drop(tx);

        let mut output = DispatchOutput {
            results: Vec::with_capacity(tasks),
        };
        while let Some(result) = rx.recv().await {
            output.results.push(result);
        }

        // Every reporter is gone; reap the finished tasks.
        while set.join_next().await.is_some() {}

        let failed = output.results.iter().filter(|r| r.output.is_none()).count();
        info!(tasks, failed, "Batch complete");
        debug_assert_eq!(output.len(), tasks);

        Ok(output)
    }
}

async fn run_task(
    runner: Arc<dyn Runner>,
    payload: Bytes,
    cancel: CancellationToken,
    permits: Option<Arc<Semaphore>>,
    reporter: Reporter,
) {
    let call = async {
        let _permit = match permits {
            Some(permits) => match permits.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return Err(RunnerError::Unavailable("dispatcher shut down".to_string())),
            },
            None => None,
        };
        runner.run(payload).await
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RunnerError::Cancelled),
        result = call => result,
    };

    match outcome {
        Ok(result) => {
            if result.is_error() {
                debug!(
                    runner = %reporter.runner,
                    address = %reporter.address,
                    error = %result.error,
                    "Runner reported an error"
                );
            }
            reporter.publish(Some(result));
        }
        Err(e) => {
            warn!(
                runner = %reporter.runner,
                address = %reporter.address,
                error = %e,
                "Error while calling runner"
            );
            reporter.publish(None);
        }
    }
}

/// Publishes the result of one (address, runner) pair exactly once.
struct Reporter {
    runner: String,
    address: String,
    tx: Option<mpsc::UnboundedSender<AddressResult>>,
}

impl Reporter {
    fn new(runner: &str, address: &str, tx: mpsc::UnboundedSender<AddressResult>) -> Self {
        Self {
            runner: runner.to_string(),
            address: address.to_string(),
            tx: Some(tx),
        }
    }

    fn publish(mut self, output: Option<RunResult>) {
        self.send(output);
    }

    fn send(&mut self, output: Option<RunResult>) {
        if let Some(tx) = self.tx.take() {
            let result = AddressResult {
                runner: mem::take(&mut self.runner),
                input: mem::take(&mut self.address),
                output,
            };
            // The collector only goes away if the batch itself was dropped.
            let _ = tx.send(result);
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(
                runner = %self.runner,
                address = %self.address,
                "Task ended without reporting"
            );
            self.send(None);
        }
    }
}
