//! JSON frames exchanged between the count server and its clients.
//!
//! The server only ever says one thing, `{"count": N}`. Anything else in the
//! object is ignored, and a frame with no `count` (or `"count": null`) asks
//! for nothing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

#[derive(Debug, Error)]
#[error("malformed count message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

pub fn decode(payload: &[u8]) -> Result<CountMessage, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

pub fn encode_count(count: usize) -> Result<String, serde_json::Error> {
    let message = CountMessage {
        count: Some(i64::try_from(count).unwrap_or(i64::MAX)),
    };
    serde_json::to_string(&message)
}
