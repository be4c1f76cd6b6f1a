//! Signing orchestrator
//!
//! A request freezes `threshold` members and their polled DEs, escrows the
//! fee and waits for one partial signature per assigned member. The group
//! signature is combined as soon as the last partial arrives; requests still
//! pending at `expires_at` are closed by end-block processing.

use super::{Ctx, Keeper};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::keys;
use crate::ledger::{Address, Amount};
use crate::query::SigningResult;
use crate::types::{AssignedMember, GroupStatus, Member, PartialSignatureRecord, Signing, SigningStatus};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};
use tss_core::primitives::{keccak256, Point, Scalar};
use tss_core::sign::{
    combine_partial_signatures, compute_binding_factor, compute_challenge, compute_group_pub_nonce,
    compute_lagrange_coefficient, compute_own_pub_nonce, verify_partial, verify_signature,
    Commitment,
};
use tss_core::{GroupId, MemberId, SigningId};
use tss_store::{decode, KvStore, KvStoreExt};

impl Keeper {
    pub fn get_signing(&self, store: &dyn KvStore, signing_id: SigningId) -> Result<Option<Signing>> {
        Ok(store.get_json(&keys::signing_key(signing_id))?)
    }

    pub fn must_get_signing(&self, store: &dyn KvStore, signing_id: SigningId) -> Result<Signing> {
        self.get_signing(store, signing_id)?
            .ok_or(Error::SigningNotFound(signing_id))
    }

    fn set_signing(&self, ctx: &mut Ctx<'_>, signing: &Signing) -> Result<()> {
        ctx.store.set_json(keys::signing_key(signing.id), signing)?;
        Ok(())
    }

    /// Partial signatures ordered by member ID
    pub fn get_partial_signatures(
        &self,
        store: &dyn KvStore,
        signing_id: SigningId,
    ) -> Result<Vec<PartialSignatureRecord>> {
        store
            .prefix(&keys::partial_signatures_prefix(signing_id))
            .map(|(_, value)| decode(&value).map_err(Error::from))
            .collect()
    }

    pub fn signing_result(&self, store: &dyn KvStore, signing_id: SigningId) -> Result<SigningResult> {
        Ok(SigningResult {
            signing: self.must_get_signing(store, signing_id)?,
            partial_signatures: self.get_partial_signatures(store, signing_id)?,
        })
    }

    /// Members able to sign right now: active, not malicious and holding a DE
    fn signing_candidates(&self, store: &dyn KvStore, group_id: GroupId) -> Result<Vec<Member>> {
        let mut eligible = Vec::new();
        for member in self.get_members(store, group_id)? {
            if member.is_malicious || member.pub_key.is_none() {
                continue;
            }
            if self.is_active(store, &member.address)? {
                eligible.push(member);
            }
        }
        self.filter_members_with_de(store, eligible)
    }

    /// Pick the `threshold` lowest-ranked candidates, returned by member ID
    fn select_members(
        &self,
        block_hash: &[u8; 32],
        signing_id: SigningId,
        mut candidates: Vec<Member>,
        threshold: u64,
    ) -> Vec<Member> {
        candidates.sort_by_cached_key(|member| {
            keccak256(&[
                block_hash,
                &signing_id.to_be_bytes(),
                &member.id.to_be_bytes(),
            ])
        });
        candidates.truncate(threshold as usize);
        candidates.sort_by_key(|member| member.id);
        candidates
    }

    #[instrument(skip(self, ctx, content), fields(content_len = content.len()))]
    pub(crate) fn request_signature(
        &self,
        ctx: &mut Ctx<'_>,
        group_id: GroupId,
        content: Vec<u8>,
        fee_limit: Amount,
        payer: &Address,
    ) -> Result<SigningId> {
        let group = self.must_get_group(&*ctx.store, group_id)?;
        let group_pub_key = match (group.status, group.pub_key) {
            (GroupStatus::Active, Some(pub_key)) => pub_key,
            _ => return Err(Error::GroupIsNotActive(group_id)),
        };
        if content.is_empty() {
            return Err(Error::InvalidContent("empty content".into()));
        }

        let required = group
            .fee
            .checked_mul(group.threshold)
            .ok_or(Error::NotEnoughFee {
                limit: fee_limit,
                required: Amount::MAX,
            })?;
        if fee_limit < required {
            return Err(Error::NotEnoughFee {
                limit: fee_limit,
                required,
            });
        }

        let candidates = self.signing_candidates(&*ctx.store, group_id)?;
        if (candidates.len() as u64) < group.threshold {
            return Err(Error::InsufficientMembers {
                needed: group.threshold,
                available: candidates.len() as u64,
            });
        }

        let signing_id = self.next_id(ctx, keys::SIGNING_COUNT_KEY)?;
        let selected = self.select_members(&ctx.block.hash, signing_id, candidates, group.threshold);
        let (selected, pub_ds, pub_es) = self.handle_assigned_members_poll_de(ctx, &selected)?;

        let commitments: Vec<Commitment> = selected
            .iter()
            .zip(pub_ds.iter().zip(&pub_es))
            .map(|(member, (pub_d, pub_e))| Commitment {
                member_id: member.id,
                pub_d: *pub_d,
                pub_e: *pub_e,
            })
            .collect();

        let mut assigned_members = Vec::with_capacity(selected.len());
        for (member, commitment) in selected.into_iter().zip(&commitments) {
            let pub_key = member
                .pub_key
                .ok_or_else(|| Error::InvalidDkgData(format!("member {} has no key share", member.id)))?;
            let binding_factor = compute_binding_factor(signing_id, member.id, &content, &commitments);
            assigned_members.push(AssignedMember {
                member_id: member.id,
                address: member.address,
                pub_key,
                pub_d: commitment.pub_d,
                pub_e: commitment.pub_e,
                pub_nonce: compute_own_pub_nonce(&commitment.pub_d, &commitment.pub_e, &binding_factor),
                binding_factor,
            });
        }
        let own_nonces: Vec<Point> = assigned_members.iter().map(|m| m.pub_nonce).collect();

        ctx.ledger.transfer(payer, &Address::escrow(), required)?;

        let params = self.params(&*ctx.store)?;
        let signing = Signing {
            id: signing_id,
            group_id,
            group_pub_key,
            content,
            fee: group.fee,
            fee_payer: payer.clone(),
            assigned_members,
            group_pub_nonce: compute_group_pub_nonce(&own_nonces),
            signature: None,
            status: SigningStatus::Assigning,
            created_height: ctx.block.height,
            created_at: ctx.block.time,
            expires_at: ctx.block.time + params.signing_period(),
        };
        self.set_signing(ctx, &signing)?;
        ctx.store
            .set(keys::signing_expiry_key(&signing.expires_at, signing_id), Vec::new());

        info!(signing_id, group_id, fee = required, "signing requested");
        ctx.emit(Event::SigningRequested {
            signing_id,
            group_id,
            assigned_members: signing.assigned_member_ids(),
            fee: required,
        });
        Ok(signing_id)
    }

    #[instrument(skip(self, ctx, signature))]
    pub(crate) fn submit_signature(
        &self,
        ctx: &mut Ctx<'_>,
        signing_id: SigningId,
        member_id: MemberId,
        address: &Address,
        signature: Scalar,
    ) -> Result<()> {
        let mut signing = self.must_get_signing(&*ctx.store, signing_id)?;
        if !signing.status.is_pending() {
            return Err(Error::invalid_status(SigningStatus::Waiting, signing.status));
        }
        let assigned = signing
            .assigned(member_id)
            .ok_or(Error::MemberNotAssigned {
                signing_id,
                member_id,
            })?;
        if assigned.address != *address {
            return Err(Error::MemberNotAuthorized {
                sender: address.clone(),
                address: assigned.address.clone(),
            });
        }

        let key = keys::partial_signature_key(signing_id, member_id);
        if ctx.store.has(&key) {
            return Err(Error::AlreadySubmitted {
                member_id,
                what: "partial signature",
            });
        }

        let lagrange = compute_lagrange_coefficient(member_id, &signing.assigned_member_ids())?;
        let challenge = compute_challenge(&signing.group_pub_nonce, &signing.group_pub_key, &signing.content);
        verify_partial(&signature, &assigned.pub_nonce, &lagrange, &challenge, &assigned.pub_key)
            .map_err(|e| Error::InvalidPartialSignature(e.to_string()))?;

        ctx.store.set_json(
            key,
            &PartialSignatureRecord {
                member_id,
                signature,
            },
        )?;
        ctx.emit(Event::PartialSignatureSubmitted {
            signing_id,
            member_id,
        });

        let partials = self.get_partial_signatures(&*ctx.store, signing_id)?;
        if partials.len() < signing.assigned_members.len() {
            signing.status = SigningStatus::Waiting;
            return self.set_signing(ctx, &signing);
        }

        let zs: Vec<Scalar> = partials.iter().map(|p| p.signature).collect();
        let combined = combine_partial_signatures(&signing.group_pub_nonce, &zs);
        verify_signature(&signing.group_pub_key, &signing.content, &combined)
            .map_err(|e| Error::InvalidPartialSignature(e.to_string()))?;

        for member in &signing.assigned_members {
            ctx.ledger
                .transfer(&Address::escrow(), &member.address, signing.fee)?;
        }
        signing.signature = Some(combined);
        signing.status = SigningStatus::Success;
        self.set_signing(ctx, &signing)?;
        ctx.store
            .delete(&keys::signing_expiry_key(&signing.expires_at, signing_id));

        info!(signing_id, "signing completed");
        ctx.emit(Event::SigningSuccess {
            signing_id,
            signature: combined,
        });
        Ok(())
    }

    /// Close pending signings past their deadline: pay the members that
    /// signed, refund the rest and deactivate the members that did not
    pub(crate) fn handle_expired_signings(&self, ctx: &mut Ctx<'_>) -> Result<()> {
        let start = [keys::SIGNING_EXPIRY_QUEUE_PREFIX];
        let end = keys::time_queue_end(keys::SIGNING_EXPIRY_QUEUE_PREFIX, &ctx.block.time);
        let due: Vec<Vec<u8>> = ctx
            .store
            .range(Some(&start[..]), Some(&end[..]))
            .map(|(key, _)| key)
            .collect();

        for key in due {
            ctx.store.delete(&key);
            let Some(signing_id) = keys::trailing_id(&key) else {
                continue;
            };
            let mut signing = self.must_get_signing(&*ctx.store, signing_id)?;
            if !signing.status.is_pending() {
                continue;
            }

            let signed: BTreeSet<MemberId> = self
                .get_partial_signatures(&*ctx.store, signing_id)?
                .into_iter()
                .map(|p| p.member_id)
                .collect();
            let mut paid: Amount = 0;
            let mut missing = Vec::new();
            for member in &signing.assigned_members {
                if signed.contains(&member.member_id) {
                    ctx.ledger
                        .transfer(&Address::escrow(), &member.address, signing.fee)?;
                    paid += signing.fee;
                } else {
                    missing.push(member.member_id);
                    self.deactivate(ctx, &member.address)?;
                }
            }
            let refund = signing.total_fee() - paid;
            ctx.ledger
                .transfer(&Address::escrow(), &signing.fee_payer, refund)?;

            if signed.is_empty() {
                signing.status = SigningStatus::Expired;
                warn!(signing_id, "signing expired");
                ctx.emit(Event::SigningExpired { signing_id });
            } else {
                signing.status = SigningStatus::Fallen;
                warn!(signing_id, ?missing, "signing fallen");
                ctx.emit(Event::SigningFallen {
                    signing_id,
                    missing,
                });
            }
            self.set_signing(ctx, &signing)?;
        }
        Ok(())
    }
}
