//! Threshold Schnorr signing math
//!
//! Every assigned member `i` holds a polled DE `{d_i, e_i}` and its key share
//! `s_i`. With binding factor `lo_i` and Lagrange coefficient `lambda_i`:
//!
//! - `R_i = D_i + lo_i * E_i`, `R = sum R_i`
//! - `c = H("signing_challenge", R, PK, content)`
//! - `z_i = d_i + lo_i * e_i + c * lambda_i * s_i`
//! - the final signature `(R, sum z_i)` verifies as a plain Schnorr signature

use super::{Commitment, PartialSignature};
use crate::de::DePrivate;
use crate::primitives::{hash_to_scalar, schnorr, Point, Scalar, Signature};
use crate::{Error, MemberId, MemberShare, Result, SigningId};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

const TAG_BINDING_FACTOR: &str = "signing_lo";
const TAG_CHALLENGE: &str = "signing_challenge";

/// Concatenation of every assigned member's `(member_id, D, E)`
pub fn encode_commitments(commitments: &[Commitment]) -> Vec<u8> {
    commitments.iter().flat_map(Commitment::to_bytes).collect()
}

/// `lo_i = H("signing_lo", signing_id, member_id, content, commitments)`
pub fn compute_binding_factor(
    signing_id: SigningId,
    member_id: MemberId,
    content: &[u8],
    commitments: &[Commitment],
) -> Scalar {
    hash_to_scalar(
        TAG_BINDING_FACTOR,
        &[
            &signing_id.to_be_bytes(),
            &member_id.to_be_bytes(),
            content,
            &encode_commitments(commitments),
        ],
    )
}

/// `R_i = D_i + lo_i * E_i`
pub fn compute_own_pub_nonce(pub_d: &Point, pub_e: &Point, binding_factor: &Scalar) -> Point {
    *pub_d + *pub_e * *binding_factor
}

/// `k_i = d_i + lo_i * e_i`
pub fn compute_own_priv_nonce(de: &DePrivate, binding_factor: &Scalar) -> Scalar {
    de.d + *binding_factor * de.e
}

/// `R = sum R_i`
pub fn compute_group_pub_nonce(own_pub_nonces: &[Point]) -> Point {
    own_pub_nonces.iter().sum()
}

/// Lagrange coefficient of `member_id` at `x = 0` over `member_ids`
pub fn compute_lagrange_coefficient(member_id: MemberId, member_ids: &[MemberId]) -> Result<Scalar> {
    let mut seen = BTreeSet::new();
    for id in member_ids {
        if *id == 0 || !seen.insert(*id) {
            return Err(Error::InvalidMemberId(*id));
        }
    }
    if !seen.contains(&member_id) {
        return Err(Error::InvalidMemberId(member_id));
    }

    let x_i = Scalar::from_u64(member_id);
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for id in member_ids.iter().filter(|id| **id != member_id) {
        let x_j = Scalar::from_u64(*id);
        numerator = numerator * x_j;
        denominator = denominator * (x_j - x_i);
    }

    denominator
        .invert()
        .map(|inv| numerator * inv)
        .ok_or_else(|| Error::Crypto("zero Lagrange denominator".into()))
}

/// `c = H("signing_challenge", R, PK, content)`
pub fn compute_challenge(group_pub_nonce: &Point, group_pub_key: &Point, content: &[u8]) -> Scalar {
    schnorr::challenge(TAG_CHALLENGE, group_pub_nonce, group_pub_key, &[content])
}

/// `z_i = k_i + c * lambda_i * s_i`
pub fn sign_partial(
    private_key: &Scalar,
    own_priv_nonce: &Scalar,
    lagrange: &Scalar,
    challenge: &Scalar,
) -> Scalar {
    *own_priv_nonce + *challenge * *lagrange * *private_key
}

/// Check `z_i * G == R_i + c * lambda_i * Y_i`
pub fn verify_partial(
    z: &Scalar,
    own_pub_nonce: &Point,
    lagrange: &Scalar,
    challenge: &Scalar,
    pub_key_share: &Point,
) -> Result<()> {
    if Point::mul_base(z) != *own_pub_nonce + *pub_key_share * (*challenge * *lagrange) {
        return Err(Error::VerificationFailed(
            "partial signature does not match nonce and key share".into(),
        ));
    }
    Ok(())
}

/// `(R, sum z_i)`
pub fn combine_partial_signatures(group_pub_nonce: &Point, partials: &[Scalar]) -> Signature {
    Signature::new(*group_pub_nonce, partials.iter().sum())
}

/// Verify a combined signature against the group key
pub fn verify_signature(group_pub_key: &Point, content: &[u8], signature: &Signature) -> Result<()> {
    schnorr::verify(TAG_CHALLENGE, group_pub_key, signature, &[content])
}

/// Member-side helper: derive everything from the frozen commitments and
/// produce this member's partial signature
#[instrument(skip(share, de, content, commitments), fields(member_id = share.member_id))]
pub fn create_partial_signature(
    share: &MemberShare,
    de: &DePrivate,
    signing_id: SigningId,
    content: &[u8],
    commitments: &[Commitment],
) -> Result<PartialSignature> {
    let own = commitments
        .iter()
        .find(|c| c.member_id == share.member_id)
        .ok_or(Error::InvalidMemberId(share.member_id))?;
    if de.public().pub_d != own.pub_d || de.public().pub_e != own.pub_e {
        return Err(Error::InvalidRoundData(
            "private DE does not match the assigned commitment".into(),
        ));
    }

    let member_ids: Vec<MemberId> = commitments.iter().map(|c| c.member_id).collect();
    let own_pub_nonces: Vec<Point> = commitments
        .iter()
        .map(|c| {
            let lo = compute_binding_factor(signing_id, c.member_id, content, commitments);
            compute_own_pub_nonce(&c.pub_d, &c.pub_e, &lo)
        })
        .collect();
    let group_pub_nonce = compute_group_pub_nonce(&own_pub_nonces);

    let lo = compute_binding_factor(signing_id, share.member_id, content, commitments);
    let lagrange = compute_lagrange_coefficient(share.member_id, &member_ids)?;
    let challenge = compute_challenge(&group_pub_nonce, &share.group_pub_key, content);
    let z = sign_partial(
        &share.private_key,
        &compute_own_priv_nonce(de, &lo),
        &lagrange,
        &challenge,
    );

    debug!(signing_id, "created partial signature");
    Ok(PartialSignature {
        signing_id,
        member_id: share.member_id,
        z,
    })
}
