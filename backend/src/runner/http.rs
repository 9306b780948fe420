//! HTTP-backed runner.

use async_trait::async_trait;
use bytes::Bytes;
use differer_common::{codec, decode_result, RunResult};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};

use super::{Runner, RunnerError};

/// Runner reached by POSTing the encoded job to a fixed service URL.
pub struct HttpRunner {
    name: String,
    service: Url,
    client: Client,
}

impl HttpRunner {
    /// `client` carries the per-call timeout; it is cheap to clone and
    /// usually shared by every runner.
    pub fn new(name: impl Into<String>, service: Url, client: Client) -> Self {
        Self {
            name: name.into(),
            service,
            client,
        }
    }
}

#[async_trait]
impl Runner for HttpRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, job: Bytes) -> Result<RunResult, RunnerError> {
        let response = self
            .client
            .post(self.service.clone())
            .header(CONTENT_TYPE, codec::CONTENT_TYPE)
            .body(job)
            .send()
            .await
            .map_err(RunnerError::Transport)?;

        if response.status() != StatusCode::OK {
            return Err(RunnerError::Status(response.status()));
        }

        let body = response.bytes().await.map_err(RunnerError::Body)?;

        Ok(decode_result(&body)?)
    }
}
