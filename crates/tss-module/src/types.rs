//! Persistent records

use crate::ledger::{Address, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tss_core::keygen::{Complaint, ComplaintVerdict, Confirm};
use tss_core::primitives::{Point, Scalar, Signature};
use tss_core::sign::Commitment;
use tss_core::{DkgContext, GroupId, GroupShape, MemberId, SigningId};

/// Group status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    Round1,
    Round2,
    Round3,
    Active,
    Fallen,
    Expired,
}

impl GroupStatus {
    /// Still running key generation
    pub fn is_dkg(&self) -> bool {
        matches!(self, GroupStatus::Round1 | GroupStatus::Round2 | GroupStatus::Round3)
    }
}

/// Group record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub size: u64,
    pub threshold: u64,
    /// Set once DKG completes
    pub pub_key: Option<Point>,
    pub status: GroupStatus,
    /// Fee per assigned member per signature
    pub fee: Amount,
    /// Most recent replacement scheduled against this group, 0 if none
    pub latest_replacement_id: u64,
    #[serde(with = "crate::codec::hex_array")]
    pub dkg_context: DkgContext,
    pub round_expires_at: DateTime<Utc>,
    pub created_height: u64,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn shape(&self) -> GroupShape {
        GroupShape {
            size: self.size,
            threshold: self.threshold,
        }
    }
}

/// Member of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub group_id: GroupId,
    pub address: Address,
    /// Public key share, set once the member confirms
    pub pub_key: Option<Point>,
    pub is_malicious: bool,
}

/// Member joined with its address status, as returned by queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    #[serde(flatten)]
    pub member: Member,
    pub is_active: bool,
    pub de_count: u64,
}

/// Circular DE buffer indices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeQueue {
    pub head: u64,
    pub tail: u64,
}

/// What a member submitted in round 3
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round3Record {
    Confirmed(Confirm),
    Complained(Vec<ResolvedComplaint>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedComplaint {
    pub complaint: Complaint,
    pub verdict: ComplaintVerdict,
}

/// Replacement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplacementStatus {
    Waiting,
    Success,
    Fallen,
}

/// Scheduled group succession
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub id: u64,
    pub current_group_id: GroupId,
    pub new_group_id: GroupId,
    pub exec_time: DateTime<Utc>,
    pub status: ReplacementStatus,
}

/// Signing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningStatus {
    /// Members assigned, no partial signature yet
    Assigning,
    /// At least one partial signature received
    Waiting,
    Success,
    Fallen,
    Expired,
}

impl SigningStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, SigningStatus::Assigning | SigningStatus::Waiting)
    }
}

/// Member frozen into a signing at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedMember {
    pub member_id: MemberId,
    pub address: Address,
    /// Public key share `Y_i`
    pub pub_key: Point,
    pub pub_d: Point,
    pub pub_e: Point,
    pub binding_factor: Scalar,
    /// `R_i = D_i + lo_i * E_i`
    pub pub_nonce: Point,
}

/// Signing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signing {
    pub id: SigningId,
    pub group_id: GroupId,
    pub group_pub_key: Point,
    #[serde(with = "crate::codec::base64_bytes")]
    pub content: Vec<u8>,
    /// Fee per assigned member
    pub fee: Amount,
    pub fee_payer: Address,
    pub assigned_members: Vec<AssignedMember>,
    pub group_pub_nonce: Point,
    pub signature: Option<Signature>,
    pub status: SigningStatus,
    pub created_height: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Signing {
    pub fn assigned(&self, member_id: MemberId) -> Option<&AssignedMember> {
        self.assigned_members.iter().find(|m| m.member_id == member_id)
    }

    pub fn assigned_member_ids(&self) -> Vec<MemberId> {
        self.assigned_members.iter().map(|m| m.member_id).collect()
    }

    /// Frozen `(member_id, D, E)` commitments in assignment order
    pub fn commitments(&self) -> Vec<Commitment> {
        self.assigned_members
            .iter()
            .map(|m| Commitment {
                member_id: m.member_id,
                pub_d: m.pub_d,
                pub_e: m.pub_e,
            })
            .collect()
    }

    /// Escrowed amount: fee times the number of assigned members
    pub fn total_fee(&self) -> Amount {
        self.fee * self.assigned_members.len() as Amount
    }
}

/// Stored partial signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignatureRecord {
    pub member_id: MemberId,
    pub signature: Scalar,
}

/// Liveness status of a member address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStatus {
    pub address: Address,
    pub is_active: bool,
    pub is_jailed: bool,
    /// When `is_active` last changed
    pub since: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}
