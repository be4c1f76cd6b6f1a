//! Signing message types

use crate::primitives::{Point, Scalar, POINT_LENGTH};
use crate::{MemberId, SigningId};
use serde::{Deserialize, Serialize};

/// Nonce commitment of one assigned member: its polled `{D, E}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub member_id: MemberId,
    pub pub_d: Point,
    pub pub_e: Point,
}

impl Commitment {
    /// Encoded width: member ID plus two compressed points
    pub const ENCODED_LENGTH: usize = 8 + 2 * POINT_LENGTH;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LENGTH);
        out.extend_from_slice(&self.member_id.to_be_bytes());
        out.extend_from_slice(&self.pub_d.to_bytes());
        out.extend_from_slice(&self.pub_e.to_bytes());
        out
    }
}

/// Partial signature `z_i` from one assigned member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignature {
    pub signing_id: SigningId,
    pub member_id: MemberId,
    pub z: Scalar,
}
