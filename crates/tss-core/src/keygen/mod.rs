//! Distributed Key Generation (DKG)
//!
//! Three rounds, driven by the module's group status:
//! 1. broadcast polynomial commitments and a one-time key ([`Round1Info`])
//! 2. send every other member its share, encrypted under `KeySym` ([`Round2Info`])
//! 3. decrypt and check the shares, then [`Confirm`] or file a [`Complaint`]

mod dkg;
mod messages;

pub use dkg::*;
pub use messages::*;

use crate::{DkgContext, GroupId, GroupShape, MemberId, MemberShare, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Member-side DKG state, persisted between rounds
#[derive(Clone, Serialize, Deserialize)]
pub struct DkgSession {
    pub group_id: GroupId,
    pub member_id: MemberId,
    pub shape: GroupShape,
    pub context: DkgContext,
    secrets: Option<Round1Secrets>,
}

impl DkgSession {
    /// Create a new DKG session
    pub fn new(group_id: GroupId, member_id: MemberId, shape: GroupShape, context: DkgContext) -> Result<Self> {
        if !shape.contains(member_id) {
            return Err(crate::Error::InvalidMemberId(member_id));
        }
        Ok(Self {
            group_id,
            member_id,
            shape,
            context,
            secrets: None,
        })
    }

    /// Check if round 1 has been generated
    pub fn has_secrets(&self) -> bool {
        self.secrets.is_some()
    }

    fn secrets(&self) -> Result<&Round1Secrets> {
        self.secrets
            .as_ref()
            .ok_or_else(|| crate::Error::InvalidRoundData("round 1 has not been generated".into()))
    }

    /// Round 1: sample the polynomial and one-time key
    pub fn round1<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<Round1Info> {
        let (secrets, info) =
            generate_round1(&self.context, self.member_id, self.shape.threshold, rng)?;
        self.secrets = Some(secrets);
        Ok(info)
    }

    /// Round 2: encrypted shares for every other member
    pub fn round2(&self, round1s: &[Round1Info]) -> Result<Round2Info> {
        generate_round2(self.secrets()?, self.member_id, self.shape, round1s)
    }

    /// Round 3: decrypt and check received shares.
    ///
    /// Returns the member's key share with a [`Confirm`] when every share is
    /// consistent, otherwise one complaint per inconsistent sender.
    #[instrument(skip_all, fields(group_id = self.group_id, member_id = self.member_id))]
    pub fn round3<R: RngCore + CryptoRng>(
        &self,
        round1s: &[Round1Info],
        round2s: &[Round2Info],
        rng: &mut R,
    ) -> Result<(Option<MemberShare>, Round3Message)> {
        let secrets = self.secrets()?;
        let ordered = index_round1s(self.shape, round1s)?;
        let me = crate::primitives::Scalar::from_u64(self.member_id);

        let mut private_key =
            crate::primitives::solve_scalar_polynomial(&secrets.coefficients, &me);
        let mut complaints = Vec::new();

        for sender in ordered.iter().filter(|info| info.member_id != self.member_id) {
            let round2 = round2s
                .iter()
                .find(|r| r.member_id == sender.member_id)
                .ok_or(crate::Error::InvalidMemberId(sender.member_id))?;
            let index = share_index(sender.member_id, self.member_id)?;
            let encrypted = round2.encrypted_secret_shares.get(index).ok_or_else(|| {
                crate::Error::InvalidRoundData(format!(
                    "member {} sent too few shares",
                    sender.member_id
                ))
            })?;

            let key_sym = crate::primitives::compute_key_sym(
                &secrets.one_time_private_key,
                &sender.one_time_pub_key,
            );
            let share = decrypt_share(encrypted, &key_sym);
            if verify_share(&share, &sender.coefficient_commits, self.member_id) {
                private_key = private_key + share;
            } else {
                warn!(respondent = sender.member_id, "received inconsistent share");
                complaints.push(sign_complaint(
                    &self.context,
                    self.member_id,
                    &secrets.one_time_private_key,
                    sender,
                    rng,
                )?);
            }
        }

        if !complaints.is_empty() {
            return Ok((None, Round3Message::Complaints(complaints)));
        }

        let group_pub_key = compute_group_pub_key(round1s)?;
        let share = MemberShare {
            group_id: self.group_id,
            member_id: self.member_id,
            public_key: crate::primitives::Point::mul_base(&private_key),
            private_key,
            group_pub_key,
        };
        let confirm = sign_confirm(&self.context, self.member_id, &share.private_key, rng)?;

        info!(group_pub_key = %group_pub_key, "DKG share derived");
        Ok((Some(share), Round3Message::Confirm(confirm)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Point, Scalar};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn run_rounds_1_2(
        shape: GroupShape,
        rng: &mut ChaCha20Rng,
    ) -> (Vec<DkgSession>, Vec<Round1Info>, Vec<Round2Info>) {
        let ctx = dkg_context(1, shape, &[3u8; 32]);
        let mut sessions: Vec<DkgSession> = shape
            .member_ids()
            .map(|id| DkgSession::new(1, id, shape, ctx).unwrap())
            .collect();
        let round1s: Vec<Round1Info> = sessions
            .iter_mut()
            .map(|s| s.round1(rng).unwrap())
            .collect();
        for info in &round1s {
            verify_round1(&ctx, shape.threshold, info).unwrap();
        }
        let round2s: Vec<Round2Info> = sessions
            .iter()
            .map(|s| s.round2(&round1s).unwrap())
            .collect();
        for info in &round2s {
            verify_round2(shape, info).unwrap();
        }
        (sessions, round1s, round2s)
    }

    #[test]
    fn test_full_dkg() {
        let mut rng = ChaCha20Rng::seed_from_u64(30);
        let shape = GroupShape::new(4, 3).unwrap();
        let (sessions, round1s, round2s) = run_rounds_1_2(shape, &mut rng);

        let mut shares = Vec::new();
        for session in &sessions {
            let (share, msg) = session.round3(&round1s, &round2s, &mut rng).unwrap();
            let share = share.unwrap();
            let Round3Message::Confirm(confirm) = msg else {
                panic!("expected confirm");
            };
            let own_pub = compute_own_pub_key(&round1s, session.member_id);
            assert_eq!(own_pub, share.public_key);
            assert!(verify_confirm(&session.context, &own_pub, &confirm).is_ok());
            shares.push(share);
        }

        // any 3 shares interpolate the group secret
        let group_pub_key = compute_group_pub_key(&round1s).unwrap();
        let ids = [1u64, 2, 4];
        let secret: Scalar = ids
            .iter()
            .map(|id| {
                let lambda = crate::sign::compute_lagrange_coefficient(*id, &ids).unwrap();
                lambda * shares[(*id - 1) as usize].private_key
            })
            .sum();
        assert_eq!(Point::mul_base(&secret), group_pub_key);
    }

    #[test]
    fn test_bad_share_produces_complaint() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let shape = GroupShape::new(3, 2).unwrap();
        let (sessions, round1s, mut round2s) = run_rounds_1_2(shape, &mut rng);

        // member 3 corrupts the share it sends to member 1
        let index = share_index(3, 1).unwrap();
        round2s[2].encrypted_secret_shares[index] =
            round2s[2].encrypted_secret_shares[index] + Scalar::ONE;

        let (share, msg) = sessions[0].round3(&round1s, &round2s, &mut rng).unwrap();
        assert!(share.is_none());
        let Round3Message::Complaints(complaints) = msg else {
            panic!("expected complaints");
        };
        assert_eq!(complaints.len(), 1);
        assert_eq!(complaints[0].respondent, 3);
        assert_eq!(
            resolve_complaint(
                &sessions[0].context,
                &round1s[0],
                &round1s[2],
                &round2s[2],
                &complaints[0]
            ),
            ComplaintVerdict::RespondentMalicious
        );

        // member 2 is unaffected
        let (share, _) = sessions[1].round3(&round1s, &round2s, &mut rng).unwrap();
        assert!(share.is_some());
    }

    #[test]
    fn test_round2_before_round1_fails() {
        let shape = GroupShape::new(2, 1).unwrap();
        let session = DkgSession::new(1, 1, shape, [0u8; 32]).unwrap();
        assert!(!session.has_secrets());
        assert!(session.round2(&[]).is_err());
        assert!(DkgSession::new(1, 3, shape, [0u8; 32]).is_err());
    }
}
