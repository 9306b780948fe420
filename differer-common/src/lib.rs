//! Differer Common Types
//!
//! Wire schema shared by the differer gateway and the runners it calls.

pub mod codec;
pub mod protocol;

pub use codec::{decode_job, decode_result, encode_job, encode_result, CodecError, CONTENT_TYPE};
pub use protocol::{Job, RunResult};
