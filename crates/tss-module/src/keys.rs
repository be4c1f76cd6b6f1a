//! Store key layout
//!
//! One prefix byte per record type. Integers are big-endian and timestamps
//! are sign-flipped big-endian nanoseconds, so byte order equals logical
//! order and queues can be drained with a plain range scan.

use crate::ledger::Address;
use chrono::{DateTime, Utc};
use tss_core::{GroupId, MemberId, SigningId};

pub const PARAMS_KEY: &[u8] = &[0x00];

pub const GROUP_COUNT_KEY: &[u8] = &[0x01, 0x00];
pub const SIGNING_COUNT_KEY: &[u8] = &[0x01, 0x01];
pub const REPLACEMENT_COUNT_KEY: &[u8] = &[0x01, 0x02];
pub const CURRENT_GROUP_KEY: &[u8] = &[0x01, 0x03];

pub const GROUP_PREFIX: u8 = 0x02;
pub const MEMBER_PREFIX: u8 = 0x03;
pub const DE_QUEUE_PREFIX: u8 = 0x04;
pub const DE_PREFIX: u8 = 0x05;
pub const ROUND1_PREFIX: u8 = 0x06;
pub const ROUND2_PREFIX: u8 = 0x07;
pub const ROUND3_PREFIX: u8 = 0x08;
pub const DKG_EXPIRY_QUEUE_PREFIX: u8 = 0x09;
pub const REPLACEMENT_PREFIX: u8 = 0x0a;
pub const REPLACEMENT_QUEUE_PREFIX: u8 = 0x0b;
pub const SIGNING_PREFIX: u8 = 0x0c;
pub const PARTIAL_SIGNATURE_PREFIX: u8 = 0x0d;
pub const SIGNING_EXPIRY_QUEUE_PREFIX: u8 = 0x0e;
pub const STATUS_PREFIX: u8 = 0x0f;
pub const GRANT_PREFIX: u8 = 0x10;

/// Width of an encoded timestamp
pub const TIME_LENGTH: usize = 8;

/// Order-preserving timestamp encoding
pub fn time_bytes(time: &DateTime<Utc>) -> [u8; TIME_LENGTH] {
    let nanos = time.timestamp_nanos_opt().unwrap_or(if time.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    });
    ((nanos as u64) ^ (1 << 63)).to_be_bytes()
}

fn with_id(prefix: u8, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn with_two_ids(prefix: u8, a: u64, b: u64) -> Vec<u8> {
    let mut key = with_id(prefix, a);
    key.extend_from_slice(&b.to_be_bytes());
    key
}

/// Addresses are length-prefixed so one address is never a prefix of another
fn with_address(prefix: u8, address: &Address) -> Vec<u8> {
    let bytes = address.as_str().as_bytes();
    let mut key = Vec::with_capacity(2 + bytes.len());
    key.push(prefix);
    key.push(bytes.len().min(u8::MAX as usize) as u8);
    key.extend_from_slice(bytes);
    key
}

fn time_queue(prefix: u8, time: &DateTime<Utc>, id: u64) -> Vec<u8> {
    let mut key = vec![prefix];
    key.extend_from_slice(&time_bytes(time));
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// First key past every queue entry with time `<= time`
pub fn time_queue_end(prefix: u8, time: &DateTime<Utc>) -> Vec<u8> {
    time_queue(prefix, time, u64::MAX)
        .into_iter()
        .chain(std::iter::once(0))
        .collect()
}

/// Id stored in the trailing 8 bytes of a key
pub fn trailing_id(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    key[start..].try_into().ok().map(u64::from_be_bytes)
}

pub fn group_key(group_id: GroupId) -> Vec<u8> {
    with_id(GROUP_PREFIX, group_id)
}

pub fn members_prefix(group_id: GroupId) -> Vec<u8> {
    with_id(MEMBER_PREFIX, group_id)
}

pub fn member_key(group_id: GroupId, member_id: MemberId) -> Vec<u8> {
    with_two_ids(MEMBER_PREFIX, group_id, member_id)
}

pub fn de_queue_key(address: &Address) -> Vec<u8> {
    with_address(DE_QUEUE_PREFIX, address)
}

pub fn de_key(address: &Address, index: u64) -> Vec<u8> {
    let mut key = with_address(DE_PREFIX, address);
    key.extend_from_slice(&index.to_be_bytes());
    key
}

pub fn round1_prefix(group_id: GroupId) -> Vec<u8> {
    with_id(ROUND1_PREFIX, group_id)
}

pub fn round1_key(group_id: GroupId, member_id: MemberId) -> Vec<u8> {
    with_two_ids(ROUND1_PREFIX, group_id, member_id)
}

pub fn round2_prefix(group_id: GroupId) -> Vec<u8> {
    with_id(ROUND2_PREFIX, group_id)
}

pub fn round2_key(group_id: GroupId, member_id: MemberId) -> Vec<u8> {
    with_two_ids(ROUND2_PREFIX, group_id, member_id)
}

pub fn round3_prefix(group_id: GroupId) -> Vec<u8> {
    with_id(ROUND3_PREFIX, group_id)
}

pub fn round3_key(group_id: GroupId, member_id: MemberId) -> Vec<u8> {
    with_two_ids(ROUND3_PREFIX, group_id, member_id)
}

pub fn dkg_expiry_key(deadline: &DateTime<Utc>, group_id: GroupId) -> Vec<u8> {
    time_queue(DKG_EXPIRY_QUEUE_PREFIX, deadline, group_id)
}

pub fn replacement_key(id: u64) -> Vec<u8> {
    with_id(REPLACEMENT_PREFIX, id)
}

pub fn replacement_queue_key(exec_time: &DateTime<Utc>, id: u64) -> Vec<u8> {
    time_queue(REPLACEMENT_QUEUE_PREFIX, exec_time, id)
}

pub fn signing_key(signing_id: SigningId) -> Vec<u8> {
    with_id(SIGNING_PREFIX, signing_id)
}

pub fn partial_signatures_prefix(signing_id: SigningId) -> Vec<u8> {
    with_id(PARTIAL_SIGNATURE_PREFIX, signing_id)
}

pub fn partial_signature_key(signing_id: SigningId, member_id: MemberId) -> Vec<u8> {
    with_two_ids(PARTIAL_SIGNATURE_PREFIX, signing_id, member_id)
}

pub fn signing_expiry_key(expires_at: &DateTime<Utc>, signing_id: SigningId) -> Vec<u8> {
    time_queue(SIGNING_EXPIRY_QUEUE_PREFIX, expires_at, signing_id)
}

pub fn status_key(address: &Address) -> Vec<u8> {
    with_address(STATUS_PREFIX, address)
}

pub fn grant_key(granter: &Address, grantee: &Address) -> Vec<u8> {
    let mut key = with_address(GRANT_PREFIX, granter);
    key.extend_from_slice(grantee.as_str().as_bytes());
    key
}
