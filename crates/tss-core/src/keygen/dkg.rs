//! DKG math: commitments, share encryption, confirmations and complaints
//!
//! Functions here are shared by members (producing messages) and by the
//! module (verifying them), so both sides derive identical bytes.

use super::{
    Complaint, ComplaintSignature, ComplaintVerdict, Confirm, Round1Info, Round1Secrets,
    Round2Info,
};
use crate::primitives::{
    compute_key_sym, compute_nonce_sym, derive_nonce, hash_to_scalar, keccak256, schnorr,
    solve_point_polynomial, solve_scalar_polynomial, Point, Scalar,
};
use crate::{DkgContext, Error, GroupId, GroupShape, MemberId, Result};
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, instrument};

const TAG_ROUND1_A0: &str = "round1_a0";
const TAG_ROUND1_ONE_TIME: &str = "round1_one_time";
const TAG_ROUND3_CONFIRM: &str = "round3_confirm";
const TAG_ROUND3_COMPLAIN: &str = "round3_complain";
const TAG_SHARE_ENCRYPTION: &str = "share_encryption";

/// Context hash binding every proof to one group's DKG instance
pub fn dkg_context(group_id: GroupId, shape: GroupShape, block_hash: &[u8]) -> DkgContext {
    keccak256(&[
        &group_id.to_be_bytes(),
        &shape.size.to_be_bytes(),
        &shape.threshold.to_be_bytes(),
        block_hash,
    ])
}

/// Position of `recipient`'s share inside `sender`'s round-2 list
pub fn share_index(sender: MemberId, recipient: MemberId) -> Result<usize> {
    if recipient == 0 || recipient == sender {
        return Err(Error::InvalidMemberId(recipient));
    }
    let index = if recipient < sender { recipient - 1 } else { recipient - 2 };
    Ok(index as usize)
}

fn encryption_pad(key_sym: &Point) -> Scalar {
    hash_to_scalar(TAG_SHARE_ENCRYPTION, &[&key_sym.to_bytes()])
}

/// `share + H(KeySym)`
pub fn encrypt_share(share: &Scalar, key_sym: &Point) -> Scalar {
    *share + encryption_pad(key_sym)
}

/// Inverse of [`encrypt_share`]
pub fn decrypt_share(encrypted: &Scalar, key_sym: &Point) -> Scalar {
    *encrypted - encryption_pad(key_sym)
}

/// Check `share * G == sum_k C_k * j^k`
pub fn verify_share(share: &Scalar, commits: &[Point], recipient: MemberId) -> bool {
    Point::mul_base(share) == solve_point_polynomial(commits, &Scalar::from_u64(recipient))
}

/// Group public key: sum of every member's `C_0`
pub fn compute_group_pub_key(round1s: &[Round1Info]) -> Result<Point> {
    round1s
        .iter()
        .map(|info| {
            info.coefficient_commits
                .first()
                .copied()
                .ok_or_else(|| Error::InvalidRoundData("empty coefficient commits".into()))
        })
        .sum()
}

/// Public key share of `member_id`: `Y_j = sum_i f_i(j) * G`
pub fn compute_own_pub_key(round1s: &[Round1Info], member_id: MemberId) -> Point {
    let x = Scalar::from_u64(member_id);
    round1s
        .iter()
        .map(|info| solve_point_polynomial(&info.coefficient_commits, &x))
        .sum()
}

fn member_bytes(member_id: MemberId) -> [u8; 8] {
    member_id.to_be_bytes()
}

/// Sample a degree `t-1` polynomial and a one-time key, with both proofs
#[instrument(skip(context, rng))]
pub fn generate_round1<R: RngCore + CryptoRng>(
    context: &DkgContext,
    member_id: MemberId,
    threshold: u64,
    rng: &mut R,
) -> Result<(Round1Secrets, Round1Info)> {
    if threshold == 0 {
        return Err(Error::InvalidThreshold { threshold, size: 0 });
    }
    let coefficients: Vec<Scalar> = (0..threshold).map(|_| Scalar::random(rng)).collect();
    let coefficient_commits = coefficients.iter().map(Point::mul_base).collect();
    let one_time_private_key = Scalar::random(rng);
    let one_time_pub_key = Point::mul_base(&one_time_private_key);

    let id = member_bytes(member_id);
    let data: [&[u8]; 2] = [context, &id];

    let a0 = &coefficients[0];
    let nonce = derive_nonce(a0, &data, rng)?;
    let a0_signature = schnorr::sign(TAG_ROUND1_A0, a0, &nonce, &data)?;

    let nonce = derive_nonce(&one_time_private_key, &data, rng)?;
    let one_time_signature =
        schnorr::sign(TAG_ROUND1_ONE_TIME, &one_time_private_key, &nonce, &data)?;

    debug!(member_id, "generated round 1 info");

    let info = Round1Info {
        member_id,
        coefficient_commits,
        one_time_pub_key,
        a0_signature,
        one_time_signature,
    };
    let secrets = Round1Secrets {
        coefficients,
        one_time_private_key,
    };
    Ok((secrets, info))
}

/// Check the shape of a round-1 submission and both proofs of knowledge
pub fn verify_round1(context: &DkgContext, threshold: u64, info: &Round1Info) -> Result<()> {
    if info.coefficient_commits.len() as u64 != threshold {
        return Err(Error::InvalidRoundData(format!(
            "expected {threshold} coefficient commits, got {}",
            info.coefficient_commits.len()
        )));
    }
    if info.coefficient_commits.iter().any(Point::is_identity) {
        return Err(Error::InvalidRoundData("identity coefficient commit".into()));
    }

    let id = member_bytes(info.member_id);
    let data: [&[u8]; 2] = [context, &id];
    schnorr::verify(
        TAG_ROUND1_A0,
        &info.coefficient_commits[0],
        &info.a0_signature,
        &data,
    )?;
    schnorr::verify(
        TAG_ROUND1_ONE_TIME,
        &info.one_time_pub_key,
        &info.one_time_signature,
        &data,
    )
}

/// Look up every member's round-1 info, requiring exactly `1..=size`
pub fn index_round1s<'a>(shape: GroupShape, round1s: &'a [Round1Info]) -> Result<Vec<&'a Round1Info>> {
    let mut ordered: Vec<&Round1Info> = round1s.iter().collect();
    ordered.sort_by_key(|info| info.member_id);
    if ordered.len() as u64 != shape.size {
        return Err(Error::InvalidRoundData(format!(
            "expected {} round 1 infos, got {}",
            shape.size,
            ordered.len()
        )));
    }
    for (expected, info) in shape.member_ids().zip(&ordered) {
        if info.member_id != expected {
            return Err(Error::InvalidMemberId(info.member_id));
        }
    }
    Ok(ordered)
}

/// Encrypt `f_i(j)` for every other member `j`, ordered by `j`
#[instrument(skip(secrets, round1s))]
pub fn generate_round2(
    secrets: &Round1Secrets,
    member_id: MemberId,
    shape: GroupShape,
    round1s: &[Round1Info],
) -> Result<Round2Info> {
    let ordered = index_round1s(shape, round1s)?;
    let encrypted_secret_shares = ordered
        .iter()
        .filter(|info| info.member_id != member_id)
        .map(|info| {
            let share =
                solve_scalar_polynomial(&secrets.coefficients, &Scalar::from_u64(info.member_id));
            let key_sym = compute_key_sym(&secrets.one_time_private_key, &info.one_time_pub_key);
            encrypt_share(&share, &key_sym)
        })
        .collect();

    Ok(Round2Info {
        member_id,
        encrypted_secret_shares,
    })
}

/// Check the shape of a round-2 submission
pub fn verify_round2(shape: GroupShape, info: &Round2Info) -> Result<()> {
    if !shape.contains(info.member_id) {
        return Err(Error::InvalidMemberId(info.member_id));
    }
    let expected = (shape.size - 1) as usize;
    if info.encrypted_secret_shares.len() != expected {
        return Err(Error::InvalidRoundData(format!(
            "expected {expected} encrypted shares, got {}",
            info.encrypted_secret_shares.len()
        )));
    }
    Ok(())
}

/// Signature over the member's public key share, proving the share was derived
pub fn sign_confirm<R: RngCore + CryptoRng>(
    context: &DkgContext,
    member_id: MemberId,
    private_key: &Scalar,
    rng: &mut R,
) -> Result<Confirm> {
    let id = member_bytes(member_id);
    let data: [&[u8]; 2] = [context, &id];
    let nonce = derive_nonce(private_key, &data, rng)?;
    Ok(Confirm {
        member_id,
        own_pub_key_sig: schnorr::sign(TAG_ROUND3_CONFIRM, private_key, &nonce, &data)?,
    })
}

pub fn verify_confirm(context: &DkgContext, own_pub_key: &Point, confirm: &Confirm) -> Result<()> {
    let id = member_bytes(confirm.member_id);
    schnorr::verify(
        TAG_ROUND3_CONFIRM,
        own_pub_key,
        &confirm.own_pub_key_sig,
        &[context, &id],
    )
}

fn complaint_challenge(
    context: &DkgContext,
    complainant_pub: &Point,
    respondent_pub: &Point,
    key_sym: &Point,
    a1: &Point,
    a2: &Point,
) -> Scalar {
    hash_to_scalar(
        TAG_ROUND3_COMPLAIN,
        &[
            context,
            &complainant_pub.to_bytes(),
            &respondent_pub.to_bytes(),
            &key_sym.to_bytes(),
            &a1.to_bytes(),
            &a2.to_bytes(),
        ],
    )
}

/// Build a complaint against `respondent`, revealing `KeySym` with a DLEQ proof
pub fn sign_complaint<R: RngCore + CryptoRng>(
    context: &DkgContext,
    complainant: MemberId,
    one_time_private_key: &Scalar,
    respondent: &Round1Info,
    rng: &mut R,
) -> Result<Complaint> {
    let complainant_pub = Point::mul_base(one_time_private_key);
    let key_sym = compute_key_sym(one_time_private_key, &respondent.one_time_pub_key);

    let key_sym_bytes = key_sym.to_bytes();
    let k = derive_nonce(one_time_private_key, &[context, &key_sym_bytes], rng)?;
    let a1 = Point::mul_base(&k);
    let a2 = compute_nonce_sym(&k, &respondent.one_time_pub_key);
    let c = complaint_challenge(
        context,
        &complainant_pub,
        &respondent.one_time_pub_key,
        &key_sym,
        &a1,
        &a2,
    );

    Ok(Complaint {
        complainant,
        respondent: respondent.member_id,
        key_sym,
        signature: ComplaintSignature {
            a1,
            a2,
            z: k + c * *one_time_private_key,
        },
    })
}

/// Verify the DLEQ proof: `z*G == a1 + c*PK_i` and `z*PK_j == a2 + c*KeySym`
pub fn verify_complaint(
    context: &DkgContext,
    complainant: &Round1Info,
    respondent: &Round1Info,
    complaint: &Complaint,
) -> Result<()> {
    let proof = &complaint.signature;
    let c = complaint_challenge(
        context,
        &complainant.one_time_pub_key,
        &respondent.one_time_pub_key,
        &complaint.key_sym,
        &proof.a1,
        &proof.a2,
    );

    if Point::mul_base(&proof.z) != proof.a1 + complainant.one_time_pub_key * c {
        return Err(Error::VerificationFailed("complaint proof: first equation".into()));
    }
    if compute_nonce_sym(&proof.z, &respondent.one_time_pub_key)
        != proof.a2 + complaint.key_sym * c
    {
        return Err(Error::VerificationFailed("complaint proof: second equation".into()));
    }
    Ok(())
}

/// Decide who misbehaved: an invalid proof or a share that checks out blames
/// the complainant, a share inconsistent with its commitments blames the
/// respondent
pub fn resolve_complaint(
    context: &DkgContext,
    complainant: &Round1Info,
    respondent: &Round1Info,
    respondent_round2: &Round2Info,
    complaint: &Complaint,
) -> ComplaintVerdict {
    if verify_complaint(context, complainant, respondent, complaint).is_err() {
        return ComplaintVerdict::ComplainantMalicious;
    }
    let Ok(index) = share_index(complaint.respondent, complaint.complainant) else {
        return ComplaintVerdict::ComplainantMalicious;
    };
    let Some(encrypted) = respondent_round2.encrypted_secret_shares.get(index) else {
        return ComplaintVerdict::RespondentMalicious;
    };

    let share = decrypt_share(encrypted, &complaint.key_sym);
    if verify_share(&share, &respondent.coefficient_commits, complaint.complainant) {
        ComplaintVerdict::ComplainantMalicious
    } else {
        ComplaintVerdict::RespondentMalicious
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn context() -> DkgContext {
        dkg_context(1, GroupShape::new(3, 2).unwrap(), &[7u8; 32])
    }

    #[test]
    fn test_share_index() {
        assert_eq!(share_index(2, 1).unwrap(), 0);
        assert_eq!(share_index(2, 3).unwrap(), 1);
        assert_eq!(share_index(1, 2).unwrap(), 0);
        assert_eq!(share_index(3, 2).unwrap(), 1);
        assert!(share_index(2, 2).is_err());
        assert!(share_index(2, 0).is_err());
    }

    #[test]
    fn test_share_encryption_roundtrip() {
        let share = Scalar::from_u64(123_456);
        let key_sym = Point::mul_base(&Scalar::from_u64(9));
        let encrypted = encrypt_share(&share, &key_sym);
        assert_ne!(encrypted, share);
        assert_eq!(decrypt_share(&encrypted, &key_sym), share);
    }

    #[test]
    fn test_round1_proofs() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let ctx = context();
        let (_, info) = generate_round1(&ctx, 1, 2, &mut rng).unwrap();
        assert!(verify_round1(&ctx, 2, &info).is_ok());

        // bound to the context
        let other = dkg_context(2, GroupShape::new(3, 2).unwrap(), &[7u8; 32]);
        assert!(verify_round1(&other, 2, &info).is_err());

        // bound to the member id
        let mut moved = info.clone();
        moved.member_id = 2;
        assert!(verify_round1(&ctx, 2, &moved).is_err());

        // wrong commit count
        assert!(matches!(
            verify_round1(&ctx, 3, &info),
            Err(Error::InvalidRoundData(_))
        ));
    }

    #[test]
    fn test_complaint_proof_and_verdict() {
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let shape = GroupShape::new(2, 2).unwrap();
        let ctx = dkg_context(5, shape, &[1u8; 32]);
        let (s1, r1_1) = generate_round1(&ctx, 1, 2, &mut rng).unwrap();
        let (s2, r1_2) = generate_round1(&ctx, 2, 2, &mut rng).unwrap();
        let round1s = vec![r1_1.clone(), r1_2.clone()];

        let honest = generate_round2(&s2, 2, shape, &round1s).unwrap();
        let complaint =
            sign_complaint(&ctx, 1, &s1.one_time_private_key, &r1_2, &mut rng).unwrap();
        assert!(verify_complaint(&ctx, &r1_1, &r1_2, &complaint).is_ok());

        // member 2 was honest, so the complainant is blamed
        assert_eq!(
            resolve_complaint(&ctx, &r1_1, &r1_2, &honest, &complaint),
            ComplaintVerdict::ComplainantMalicious
        );

        // a tampered share blames the respondent
        let mut bad = honest.clone();
        bad.encrypted_secret_shares[0] = bad.encrypted_secret_shares[0] + Scalar::ONE;
        assert_eq!(
            resolve_complaint(&ctx, &r1_1, &r1_2, &bad, &complaint),
            ComplaintVerdict::RespondentMalicious
        );

        // a forged key sym fails the proof
        let mut forged = complaint.clone();
        forged.key_sym = Point::GENERATOR;
        assert!(verify_complaint(&ctx, &r1_1, &r1_2, &forged).is_err());
        assert_eq!(
            resolve_complaint(&ctx, &r1_1, &r1_2, &bad, &forged),
            ComplaintVerdict::ComplainantMalicious
        );
    }

    #[test]
    fn test_index_round1s_requires_every_member() {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let ctx = context();
        let shape = GroupShape::new(3, 2).unwrap();
        let infos: Vec<Round1Info> = [3u64, 1]
            .iter()
            .map(|id| generate_round1(&ctx, *id, 2, &mut rng).unwrap().1)
            .collect();
        assert!(index_round1s(shape, &infos).is_err());

        let shape = GroupShape::new(2, 2).unwrap();
        assert!(matches!(
            index_round1s(shape, &infos),
            Err(Error::InvalidMemberId(3))
        ));
    }
}
