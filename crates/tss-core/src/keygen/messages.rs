//! DKG message types

use crate::primitives::{Point, Scalar, Signature};
use crate::MemberId;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Round 1: polynomial commitments and one-time key, with proofs of knowledge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round1Info {
    /// Sender member ID
    pub member_id: MemberId,
    /// `C_k = a_k * G` for every coefficient, `threshold` entries
    pub coefficient_commits: Vec<Point>,
    /// One-time public key used for share encryption
    pub one_time_pub_key: Point,
    /// Proof of knowledge of `a_0`
    pub a0_signature: Signature,
    /// Proof of knowledge of the one-time private key
    pub one_time_signature: Signature,
}

/// Round 2: encrypted shares `f_i(j) + H(KeySym(i, j))` ordered by recipient,
/// skipping the sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round2Info {
    pub member_id: MemberId,
    pub encrypted_secret_shares: Vec<Scalar>,
}

/// Round 3 success message: signature under the derived public key share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirm {
    pub member_id: MemberId,
    pub own_pub_key_sig: Signature,
}

/// DLEQ proof that `key_sym` was derived from the complainant's one-time key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintSignature {
    pub a1: Point,
    pub a2: Point,
    pub z: Scalar,
}

/// Round 3 failure message: accuses `respondent` of sending a bad share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    pub complainant: MemberId,
    pub respondent: MemberId,
    pub key_sym: Point,
    pub signature: ComplaintSignature,
}

/// What a member submits in round 3
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Round3Message {
    Confirm(Confirm),
    Complaints(Vec<Complaint>),
}

/// Outcome of re-checking a complaint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplaintVerdict {
    /// The respondent's share does not match its commitments
    RespondentMalicious,
    /// Bad proof or a share that checks out
    ComplainantMalicious,
}

/// Round 1 secrets kept by the member until round 3
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Round1Secrets {
    pub coefficients: Vec<Scalar>,
    pub one_time_private_key: Scalar,
}
