//! Events emitted by state transitions

use crate::ledger::{Address, Amount};
use crate::types::GroupStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tss_core::keygen::ComplaintVerdict;
use tss_core::primitives::{Point, Signature};
use tss_core::{GroupId, MemberId, SigningId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    GroupCreated {
        group_id: GroupId,
        size: u64,
        threshold: u64,
        fee: Amount,
    },
    Round1Submitted {
        group_id: GroupId,
        member_id: MemberId,
    },
    Round2Submitted {
        group_id: GroupId,
        member_id: MemberId,
    },
    ConfirmSubmitted {
        group_id: GroupId,
        member_id: MemberId,
    },
    ComplaintResolved {
        group_id: GroupId,
        complainant: MemberId,
        respondent: MemberId,
        verdict: ComplaintVerdict,
    },
    RoundAdvanced {
        group_id: GroupId,
        status: GroupStatus,
        expires_at: DateTime<Utc>,
    },
    GroupActivated {
        group_id: GroupId,
        pub_key: Point,
    },
    GroupFallen {
        group_id: GroupId,
        reason: String,
    },
    GroupExpired {
        group_id: GroupId,
    },
    CurrentGroupChanged {
        group_id: GroupId,
    },
    GroupFeeUpdated {
        group_id: GroupId,
        fee: Amount,
    },
    DesSubmitted {
        address: Address,
        count: u64,
    },
    SigningRequested {
        signing_id: SigningId,
        group_id: GroupId,
        assigned_members: Vec<MemberId>,
        fee: Amount,
    },
    PartialSignatureSubmitted {
        signing_id: SigningId,
        member_id: MemberId,
    },
    SigningSuccess {
        signing_id: SigningId,
        signature: Signature,
    },
    SigningExpired {
        signing_id: SigningId,
    },
    SigningFallen {
        signing_id: SigningId,
        missing: Vec<MemberId>,
    },
    ReplacementScheduled {
        replacement_id: u64,
        current_group_id: GroupId,
        new_group_id: GroupId,
        exec_time: DateTime<Utc>,
    },
    ReplacementSuccess {
        replacement_id: u64,
        current_group_id: GroupId,
        new_group_id: GroupId,
    },
    ReplacementFallen {
        replacement_id: u64,
        new_group_id: GroupId,
    },
    MemberActivated {
        address: Address,
    },
    MemberHealthCheck {
        address: Address,
    },
    MemberDeactivated {
        address: Address,
    },
    MemberJailed {
        address: Address,
    },
    RewardsDistributed {
        group_id: GroupId,
        amount_per_member: Amount,
        recipients: Vec<Address>,
    },
    GrantUpdated {
        granter: Address,
        grantee: Address,
        granted: bool,
    },
    ParamsUpdated,
    /// An end-block phase failed and its writes were rolled back
    EndBlockPhaseFailed {
        phase: String,
        code: u32,
        error: String,
    },
}
