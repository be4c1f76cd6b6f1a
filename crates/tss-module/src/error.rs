//! Module error types

use crate::ledger::{Address, Amount};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tss_core::{GroupId, MemberId, SigningId};
use tss_store::StoreError;

/// Result type alias for module operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by commands and queries.
///
/// A failed command leaves no trace in state: its staged writes and
/// transfers are discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Invalid signer: expected {expected}, got {got}")]
    InvalidSigner { expected: Address, got: Address },

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Group is not active: {0}")]
    GroupIsNotActive(GroupId),

    #[error("Not enough fee: limit {limit}, required {required}")]
    NotEnoughFee { limit: Amount, required: Amount },

    #[error("DE queue full for {0}")]
    DEQueueFull(Address),

    #[error("DE not found for {0}")]
    DENotFound(Address),

    #[error("Invalid threshold: t={threshold} n={size}")]
    InvalidThreshold { threshold: u64, size: u64 },

    #[error("Invalid group size {size}, maximum {max}")]
    InvalidGroupSize { size: u64, max: u64 },

    #[error("Duplicate member address: {0}")]
    DuplicateMember(Address),

    #[error("Member {member_id} not found in group {group_id}")]
    MemberNotFound { group_id: GroupId, member_id: MemberId },

    #[error("{sender} is not authorized to act for {address}")]
    MemberNotAuthorized { sender: Address, address: Address },

    #[error("Member {member_id} already submitted {what}")]
    AlreadySubmitted { member_id: MemberId, what: &'static str },

    #[error("Invalid status: expected {expected}, got {actual}")]
    InvalidStatus { expected: String, actual: String },

    #[error("Invalid DKG data: {0}")]
    InvalidDkgData(String),

    #[error("Insufficient members: need {needed}, {available} available")]
    InsufficientMembers { needed: u64, available: u64 },

    #[error("Signing not found: {0}")]
    SigningNotFound(SigningId),

    #[error("Member {member_id} is not assigned to signing {signing_id}")]
    MemberNotAssigned { signing_id: SigningId, member_id: MemberId },

    #[error("Invalid partial signature: {0}")]
    InvalidPartialSignature(String),

    #[error("Invalid signing content: {0}")]
    InvalidContent(String),

    #[error("Replacement not found: {0}")]
    ReplacementNotFound(u64),

    #[error("Invalid replacement: {0}")]
    InvalidReplacement(String),

    #[error("Member already active: {0}")]
    AlreadyActive(Address),

    #[error("Too soon to activate {address}, penalty ends at {until}")]
    TooSoonToActivate { address: Address, until: DateTime<Utc> },

    #[error("Member is inactive: {0}")]
    InactiveMember(Address),

    #[error("Insufficient funds in {account}: need {needed}, have {available}")]
    InsufficientFunds {
        account: Address,
        needed: Amount,
        available: Amount,
    },

    #[error("Balance of {account} would overflow crediting {amount}")]
    BalanceOverflow { account: Address, amount: Amount },

    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Grant not found: {granter} -> {grantee}")]
    GrantNotFound { granter: Address, grantee: Address },

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Core(#[from] tss_core::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidSigner { .. } => 1,
            Error::GroupNotFound(_) => 2,
            Error::GroupIsNotActive(_) => 3,
            Error::NotEnoughFee { .. } => 4,
            Error::DEQueueFull(_) => 5,
            Error::DENotFound(_) => 6,
            Error::InvalidThreshold { .. } => 7,
            Error::InvalidGroupSize { .. } => 8,
            Error::DuplicateMember(_) => 9,
            Error::MemberNotFound { .. } => 10,
            Error::MemberNotAuthorized { .. } => 11,
            Error::AlreadySubmitted { .. } => 12,
            Error::InvalidStatus { .. } => 13,
            Error::InvalidDkgData(_) => 14,
            Error::InsufficientMembers { .. } => 15,
            Error::SigningNotFound(_) => 16,
            Error::MemberNotAssigned { .. } => 17,
            Error::InvalidPartialSignature(_) => 18,
            Error::InvalidContent(_) => 19,
            Error::ReplacementNotFound(_) => 20,
            Error::InvalidReplacement(_) => 21,
            Error::AlreadyActive(_) => 22,
            Error::TooSoonToActivate { .. } => 23,
            Error::InactiveMember(_) => 24,
            Error::InsufficientFunds { .. } => 25,
            Error::InvalidGrant(_) => 26,
            Error::GrantNotFound { .. } => 27,
            Error::InvalidParams(_) => 28,
            Error::BalanceOverflow { .. } => 29,
            Error::Core(tss_core::Error::InvalidLength { .. }) => 101,
            Error::Core(tss_core::Error::ParseError(_)) => 102,
            Error::Core(_) => 100,
            Error::Store(_) => 200,
        }
    }

    pub(crate) fn invalid_status(expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        Error::InvalidStatus {
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_for_core_parse_errors() {
        let len = Error::from(tss_core::Error::InvalidLength {
            expected: 33,
            actual: 32,
        });
        let parse = Error::from(tss_core::Error::ParseError("bad".into()));
        assert_eq!(len.code(), 101);
        assert_eq!(parse.code(), 102);
        assert_eq!(Error::GroupNotFound(1).code(), 2);
        assert_eq!(len.to_string(), "Invalid length: expected 33 bytes, got 32");
    }
}
