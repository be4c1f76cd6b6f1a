//! Per-block execution context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Height, time and hash of the block being executed.
///
/// Block time never decreases between consecutive blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub height: u64,
    pub time: DateTime<Utc>,
    #[serde(with = "crate::codec::hex_array")]
    pub hash: [u8; 32],
}

impl BlockContext {
    pub fn new(height: u64, time: DateTime<Utc>, hash: [u8; 32]) -> Self {
        Self { height, time, hash }
    }
}
