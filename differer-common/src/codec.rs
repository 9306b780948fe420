//! Protobuf encoding and decoding of [`Job`] and [`RunResult`].

use bytes::{Bytes, BytesMut};
use prost::Message;

use crate::protocol::{Job, RunResult};

/// Content type sent with every encoded payload.
pub const CONTENT_TYPE: &str = "application/protobuf";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("could not encode message: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("could not decode message: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Encode a job for sending to runners.
///
/// The returned buffer is reference counted, so it can be handed to every
/// runner evaluating the same address without copying.
pub fn encode_job(job: &Job) -> Result<Bytes, CodecError> {
    encode(job)
}

pub fn decode_job(buf: &[u8]) -> Result<Job, CodecError> {
    Ok(Job::decode(buf)?)
}

pub fn encode_result(result: &RunResult) -> Result<Bytes, CodecError> {
    encode(result)
}

pub fn decode_result(buf: &[u8]) -> Result<RunResult, CodecError> {
    Ok(RunResult::decode(buf)?)
}

fn encode<M: Message>(message: &M) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(message.encoded_len());
    message.encode(&mut buf)?;
    Ok(buf.freeze())
}
