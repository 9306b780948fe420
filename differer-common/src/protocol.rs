//! Protobuf messages exchanged between the gateway and runners.
//!
//! The field tags are the wire contract. Runners written in any language
//! use the same two messages, so tags must never be renumbered.

use serde::{Deserialize, Serialize};

/// A unit of work: one address to be evaluated by a runner.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Job {
    #[prost(string, tag = "1")]
    pub address: String,
}

impl Job {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Result reported by a runner for a single job.
///
/// `error` is set by the runner itself when it could not evaluate the
/// address. The gateway passes it through untouched.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct RunResult {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub id: String,
    #[prost(string, tag = "2")]
    #[serde(default)]
    pub value: String,
    #[prost(string, tag = "3")]
    #[serde(default)]
    pub error: String,
}

impl RunResult {
    /// Successful result with no business error.
    pub fn ok(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            error: String::new(),
        }
    }

    /// Whether the runner reported a business error.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}
