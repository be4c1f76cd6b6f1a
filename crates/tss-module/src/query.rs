//! Read-only queries

use crate::ledger::{Address, Amount};
use crate::params::Params;
use crate::types::{
    Group, MemberStatus, MemberView, PartialSignatureRecord, Replacement, Round3Record, Signing,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tss_core::keygen::{Round1Info, Round2Info};
use tss_core::{GroupId, MemberId, SigningId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    Group { group_id: GroupId },
    Members { group_id: GroupId },
    DeCount { address: Address },
    ReplacementQueue { before: DateTime<Utc> },
    Replacement { replacement_id: u64 },
    CurrentGroup,
    Signing { signing_id: SigningId },
    MemberStatus { address: Address },
    IsGrantee { granter: Address, grantee: Address },
    Params,
    Balance { address: Address },
}

/// Group with its members and DKG round data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResult {
    pub group: Group,
    pub members: Vec<MemberView>,
    pub round1s: Vec<Round1Info>,
    pub round2s: Vec<Round2Info>,
    pub round3s: Vec<(MemberId, Round3Record)>,
}

/// Signing with the partial signatures received so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningResult {
    pub signing: Signing,
    pub partial_signatures: Vec<PartialSignatureRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryResponse {
    Group(Box<GroupResult>),
    Members(Vec<MemberView>),
    DeCount(u64),
    Replacements(Vec<Replacement>),
    Replacement(Replacement),
    CurrentGroup(Option<GroupId>),
    Signing(Box<SigningResult>),
    MemberStatus(Option<MemberStatus>),
    IsGrantee(bool),
    Params(Params),
    Balance(Amount),
}
