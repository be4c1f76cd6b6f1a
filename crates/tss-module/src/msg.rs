//! Inbound commands
//!
//! Authority commands carry the signing `authority`; member commands carry
//! the transaction `sender` and the member `address` it acts for. A sender
//! may act for an address it holds a grant from.

use crate::codec::base64_bytes;
use crate::ledger::{Address, Amount};
use crate::params::Params;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tss_core::de::De;
use tss_core::keygen::{Complaint, Confirm, Round1Info, Round2Info};
use tss_core::primitives::Scalar;
use tss_core::{GroupId, MemberId, SigningId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    CreateGroup {
        authority: Address,
        members: Vec<Address>,
        threshold: u64,
        fee: Amount,
    },
    ReplaceGroup {
        authority: Address,
        current_group_id: GroupId,
        new_group_id: GroupId,
        exec_time: DateTime<Utc>,
    },
    UpdateGroupFee {
        authority: Address,
        group_id: GroupId,
        fee: Amount,
    },
    UpdateParams {
        authority: Address,
        params: Params,
    },
    SubmitDes {
        sender: Address,
        address: Address,
        des: Vec<De>,
    },
    RequestSignature {
        sender: Address,
        group_id: GroupId,
        #[serde(with = "base64_bytes")]
        content: Vec<u8>,
        fee_limit: Amount,
    },
    SubmitDkgRound1 {
        sender: Address,
        address: Address,
        group_id: GroupId,
        round1: Round1Info,
    },
    SubmitDkgRound2 {
        sender: Address,
        address: Address,
        group_id: GroupId,
        round2: Round2Info,
    },
    Complain {
        sender: Address,
        address: Address,
        group_id: GroupId,
        complaints: Vec<Complaint>,
    },
    Confirm {
        sender: Address,
        address: Address,
        group_id: GroupId,
        confirm: Confirm,
    },
    SubmitSignature {
        sender: Address,
        address: Address,
        signing_id: SigningId,
        member_id: MemberId,
        signature: Scalar,
    },
    Activate {
        sender: Address,
        address: Address,
    },
    HealthCheck {
        sender: Address,
        address: Address,
    },
    Grant {
        granter: Address,
        grantee: Address,
    },
    Revoke {
        granter: Address,
        grantee: Address,
    },
}

impl Command {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateGroup { .. } => "create_group",
            Command::ReplaceGroup { .. } => "replace_group",
            Command::UpdateGroupFee { .. } => "update_group_fee",
            Command::UpdateParams { .. } => "update_params",
            Command::SubmitDes { .. } => "submit_des",
            Command::RequestSignature { .. } => "request_signature",
            Command::SubmitDkgRound1 { .. } => "submit_dkg_round1",
            Command::SubmitDkgRound2 { .. } => "submit_dkg_round2",
            Command::Complain { .. } => "complain",
            Command::Confirm { .. } => "confirm",
            Command::SubmitSignature { .. } => "submit_signature",
            Command::Activate { .. } => "activate",
            Command::HealthCheck { .. } => "health_check",
            Command::Grant { .. } => "grant",
            Command::Revoke { .. } => "revoke",
        }
    }
}

/// Command result payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Empty,
    GroupCreated { group_id: GroupId },
    ReplacementScheduled { replacement_id: u64 },
    SigningRequested { signing_id: SigningId },
}
