//! Wire types shared by the node HTTP API and its clients

use crate::context::BlockContext;
use crate::events::Event;
use crate::msg::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TxId = Uuid;

/// Reply to `POST /v1/tx`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTxResponse {
    pub tx_id: TxId,
}

/// Outcome of a submitted command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    /// Queued for the next block
    Pending,
    Committed {
        height: u64,
        response: Response,
        events: Vec<Event>,
    },
    Failed {
        height: u64,
        code: u32,
        error: String,
    },
}

impl TxStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, TxStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub tx_id: TxId,
    #[serde(flatten)]
    pub status: TxStatus,
}

/// Everything emitted while producing one block, streamed on `/v1/events`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEvents {
    pub block: BlockContext,
    pub events: Vec<Event>,
}

/// Error body returned with a non-success status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
}
