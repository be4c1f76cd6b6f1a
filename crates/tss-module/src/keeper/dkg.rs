//! DKG round bookkeeping
//!
//! Each round accepts exactly one submission per member and advances once
//! all `size` members have submitted. Round 3 submissions are either a
//! confirmation or complaints; the group goes ACTIVE only when nobody turned
//! out malicious.

use super::{Ctx, Keeper};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::keys;
use crate::ledger::Address;
use crate::types::{Group, GroupStatus, ResolvedComplaint, Round3Record};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};
use tss_core::keygen::{
    compute_group_pub_key, compute_own_pub_key, resolve_complaint, verify_confirm,
    verify_round1, verify_round2, Complaint, ComplaintVerdict, Confirm, Round1Info, Round2Info,
};
use tss_core::{GroupId, MemberId};
use tss_store::{decode, KvStore, KvStoreExt};

impl Keeper {
    pub fn get_round1s(&self, store: &dyn KvStore, group_id: GroupId) -> Result<Vec<Round1Info>> {
        decode_all(store, &keys::round1_prefix(group_id))
    }

    pub fn get_round2s(&self, store: &dyn KvStore, group_id: GroupId) -> Result<Vec<Round2Info>> {
        decode_all(store, &keys::round2_prefix(group_id))
    }

    pub fn get_round3s(&self, store: &dyn KvStore, group_id: GroupId) -> Result<Vec<(MemberId, Round3Record)>> {
        store
            .prefix(&keys::round3_prefix(group_id))
            .map(|(key, value)| {
                let member_id = keys::trailing_id(&key)
                    .ok_or_else(|| Error::InvalidDkgData("malformed round 3 key".into()))?;
                Ok((member_id, decode(&value)?))
            })
            .collect()
    }

    fn count_prefix(&self, store: &dyn KvStore, prefix: &[u8]) -> u64 {
        store.prefix(prefix).count() as u64
    }

    /// Queue the current round deadline; stale entries are skipped on expiry
    pub(crate) fn schedule_dkg_expiry(&self, ctx: &mut Ctx<'_>, group: &Group) -> Result<()> {
        ctx.store.set(
            keys::dkg_expiry_key(&group.round_expires_at, group.id),
            Vec::new(),
        );
        Ok(())
    }

    /// Load a group in the expected DKG round and the sender's member record
    fn dkg_precheck(
        &self,
        store: &dyn KvStore,
        group_id: GroupId,
        member_id: MemberId,
        address: &Address,
        expected: GroupStatus,
    ) -> Result<Group> {
        let group = self.must_get_group(store, group_id)?;
        if group.status != expected {
            return Err(Error::invalid_status(expected, group.status));
        }
        self.member_with_address(store, group_id, member_id, address)?;
        Ok(group)
    }

    fn advance_round(&self, ctx: &mut Ctx<'_>, group: &mut Group, status: GroupStatus) -> Result<()> {
        let params = self.params(&*ctx.store)?;
        group.status = status;
        group.round_expires_at = ctx.block.time + params.round_period();
        self.set_group(ctx, group)?;
        self.schedule_dkg_expiry(ctx, group)?;

        info!(group_id = group.id, ?status, "DKG round advanced");
        ctx.emit(Event::RoundAdvanced {
            group_id: group.id,
            status,
            expires_at: group.round_expires_at,
        });
        Ok(())
    }

    #[instrument(skip(self, ctx, round1), fields(member_id = round1.member_id))]
    pub(crate) fn submit_round1(
        &self,
        ctx: &mut Ctx<'_>,
        group_id: GroupId,
        address: &Address,
        round1: Round1Info,
    ) -> Result<()> {
        let member_id = round1.member_id;
        let mut group =
            self.dkg_precheck(&*ctx.store, group_id, member_id, address, GroupStatus::Round1)?;

        let key = keys::round1_key(group_id, member_id);
        if ctx.store.has(&key) {
            return Err(Error::AlreadySubmitted {
                member_id,
                what: "round 1",
            });
        }
        verify_round1(&group.dkg_context, group.threshold, &round1)
            .map_err(|e| Error::InvalidDkgData(e.to_string()))?;
        ctx.store.set_json(key, &round1)?;
        ctx.emit(Event::Round1Submitted { group_id, member_id });

        if self.count_prefix(&*ctx.store, &keys::round1_prefix(group_id)) == group.size {
            self.advance_round(ctx, &mut group, GroupStatus::Round2)?;
        }
        Ok(())
    }

    #[instrument(skip(self, ctx, round2), fields(member_id = round2.member_id))]
    pub(crate) fn submit_round2(
        &self,
        ctx: &mut Ctx<'_>,
        group_id: GroupId,
        address: &Address,
        round2: Round2Info,
    ) -> Result<()> {
        let member_id = round2.member_id;
        let mut group =
            self.dkg_precheck(&*ctx.store, group_id, member_id, address, GroupStatus::Round2)?;

        let key = keys::round2_key(group_id, member_id);
        if ctx.store.has(&key) {
            return Err(Error::AlreadySubmitted {
                member_id,
                what: "round 2",
            });
        }
        verify_round2(group.shape(), &round2).map_err(|e| Error::InvalidDkgData(e.to_string()))?;
        ctx.store.set_json(key, &round2)?;
        ctx.emit(Event::Round2Submitted { group_id, member_id });

        if self.count_prefix(&*ctx.store, &keys::round2_prefix(group_id)) == group.size {
            self.advance_round(ctx, &mut group, GroupStatus::Round3)?;
        }
        Ok(())
    }

    fn check_round3_open(&self, store: &dyn KvStore, group_id: GroupId, member_id: MemberId) -> Result<()> {
        if store.has(&keys::round3_key(group_id, member_id)) {
            return Err(Error::AlreadySubmitted {
                member_id,
                what: "round 3",
            });
        }
        Ok(())
    }

    #[instrument(skip(self, ctx, confirm), fields(member_id = confirm.member_id))]
    pub(crate) fn confirm(
        &self,
        ctx: &mut Ctx<'_>,
        group_id: GroupId,
        address: &Address,
        confirm: Confirm,
    ) -> Result<()> {
        let member_id = confirm.member_id;
        let group =
            self.dkg_precheck(&*ctx.store, group_id, member_id, address, GroupStatus::Round3)?;
        self.check_round3_open(&*ctx.store, group_id, member_id)?;

        let round1s = self.get_round1s(&*ctx.store, group_id)?;
        let own_pub_key = compute_own_pub_key(&round1s, member_id);
        verify_confirm(&group.dkg_context, &own_pub_key, &confirm)
            .map_err(|e| Error::InvalidDkgData(e.to_string()))?;

        let mut member = self.get_member(&*ctx.store, group_id, member_id)?;
        member.pub_key = Some(own_pub_key);
        self.set_member(ctx, &member)?;
        ctx.store.set_json(
            keys::round3_key(group_id, member_id),
            &Round3Record::Confirmed(confirm),
        )?;
        ctx.emit(Event::ConfirmSubmitted { group_id, member_id });

        self.try_finalize_dkg(ctx, group)
    }

    /// Resolve every complaint now; the verdicts decide who is malicious
    #[instrument(skip(self, ctx, complaints))]
    pub(crate) fn complain(
        &self,
        ctx: &mut Ctx<'_>,
        group_id: GroupId,
        address: &Address,
        complaints: Vec<Complaint>,
    ) -> Result<()> {
        let complainant = complaints
            .first()
            .map(|c| c.complainant)
            .ok_or_else(|| Error::InvalidDkgData("no complaints".into()))?;
        let group =
            self.dkg_precheck(&*ctx.store, group_id, complainant, address, GroupStatus::Round3)?;
        self.check_round3_open(&*ctx.store, group_id, complainant)?;

        let mut respondents = BTreeSet::new();
        for complaint in &complaints {
            if complaint.complainant != complainant {
                return Err(Error::InvalidDkgData("mixed complainants".into()));
            }
            if complaint.respondent == complainant || !group.shape().contains(complaint.respondent) {
                return Err(Error::InvalidDkgData(format!(
                    "invalid respondent {}",
                    complaint.respondent
                )));
            }
            if !respondents.insert(complaint.respondent) {
                return Err(Error::InvalidDkgData(format!(
                    "duplicate respondent {}",
                    complaint.respondent
                )));
            }
        }

        let round1s = self.get_round1s(&*ctx.store, group_id)?;
        let round2s = self.get_round2s(&*ctx.store, group_id)?;
        let find_round1 = |id: MemberId| {
            round1s
                .iter()
                .find(|r| r.member_id == id)
                .ok_or_else(|| Error::InvalidDkgData(format!("missing round 1 of member {id}")))
        };

        let mut resolved = Vec::with_capacity(complaints.len());
        for complaint in complaints {
            let respondent_round2 = round2s
                .iter()
                .find(|r| r.member_id == complaint.respondent)
                .ok_or_else(|| {
                    Error::InvalidDkgData(format!(
                        "missing round 2 of member {}",
                        complaint.respondent
                    ))
                })?;
            let verdict = resolve_complaint(
                &group.dkg_context,
                find_round1(complaint.complainant)?,
                find_round1(complaint.respondent)?,
                respondent_round2,
                &complaint,
            );

            let accused = match verdict {
                ComplaintVerdict::RespondentMalicious => complaint.respondent,
                ComplaintVerdict::ComplainantMalicious => complaint.complainant,
            };
            let mut member = self.get_member(&*ctx.store, group_id, accused)?;
            member.is_malicious = true;
            self.set_member(ctx, &member)?;

            warn!(
                group_id,
                complainant = complaint.complainant,
                respondent = complaint.respondent,
                ?verdict,
                "complaint resolved"
            );
            ctx.emit(Event::ComplaintResolved {
                group_id,
                complainant: complaint.complainant,
                respondent: complaint.respondent,
                verdict,
            });
            resolved.push(ResolvedComplaint { complaint, verdict });
        }

        ctx.store.set_json(
            keys::round3_key(group_id, complainant),
            &Round3Record::Complained(resolved),
        )?;
        self.try_finalize_dkg(ctx, group)
    }

    /// Once every member has confirmed or complained, activate the group or
    /// mark it FALLEN and jail the malicious members
    fn try_finalize_dkg(&self, ctx: &mut Ctx<'_>, mut group: Group) -> Result<()> {
        if self.count_prefix(&*ctx.store, &keys::round3_prefix(group.id)) < group.size {
            return Ok(());
        }

        let members = self.get_members(&*ctx.store, group.id)?;
        let malicious: Vec<Address> = members
            .iter()
            .filter(|m| m.is_malicious)
            .map(|m| m.address.clone())
            .collect();
        if !malicious.is_empty() {
            for address in &malicious {
                self.jail(ctx, address)?;
            }
            return self.fall_group(ctx, &mut group, "malicious members");
        }

        let round1s = self.get_round1s(&*ctx.store, group.id)?;
        let pub_key = compute_group_pub_key(&round1s)?;
        group.pub_key = Some(pub_key);
        group.status = GroupStatus::Active;
        self.set_group(ctx, &group)?;

        info!(group_id = group.id, %pub_key, "group activated");
        ctx.emit(Event::GroupActivated {
            group_id: group.id,
            pub_key,
        });

        if self.current_group_id(&*ctx.store)?.is_none() {
            self.set_current_group_id(ctx, group.id)?;
        }
        Ok(())
    }

    fn fall_group(&self, ctx: &mut Ctx<'_>, group: &mut Group, reason: &str) -> Result<()> {
        group.status = GroupStatus::Fallen;
        self.set_group(ctx, group)?;
        warn!(group_id = group.id, reason, "group fallen");
        ctx.emit(Event::GroupFallen {
            group_id: group.id,
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Fail every group whose current round deadline has passed. Members
    /// that did not submit the expired round are deactivated.
    pub(crate) fn handle_expired_dkg(&self, ctx: &mut Ctx<'_>) -> Result<()> {
        let prefix = [keys::DKG_EXPIRY_QUEUE_PREFIX];
        let end = keys::time_queue_end(keys::DKG_EXPIRY_QUEUE_PREFIX, &ctx.block.time);
        let due: Vec<Vec<u8>> = ctx
            .store
            .range(Some(&prefix[..]), Some(&end[..]))
            .map(|(key, _)| key)
            .collect();

        for key in due {
            ctx.store.delete(&key);
            let Some(group_id) = keys::trailing_id(&key) else {
                continue;
            };
            let Some(mut group) = self.get_group(&*ctx.store, group_id)? else {
                continue;
            };
            if !group.status.is_dkg() || group.round_expires_at > ctx.block.time {
                continue;
            }

            let round_prefix = match group.status {
                GroupStatus::Round1 => keys::round1_prefix(group_id),
                GroupStatus::Round2 => keys::round2_prefix(group_id),
                _ => keys::round3_prefix(group_id),
            };
            let submitted: BTreeSet<MemberId> = ctx
                .store
                .prefix(&round_prefix)
                .filter_map(|(key, _)| keys::trailing_id(&key))
                .collect();
            for member in self.get_members(&*ctx.store, group_id)? {
                if !submitted.contains(&member.id) {
                    self.deactivate(ctx, &member.address)?;
                }
            }
            self.fall_group(ctx, &mut group, "round expired")?;
        }
        Ok(())
    }
}

fn decode_all<T: serde::de::DeserializeOwned>(store: &dyn KvStore, prefix: &[u8]) -> Result<Vec<T>> {
    store
        .prefix(prefix)
        .map(|(_, value)| decode(&value).map_err(Error::from))
        .collect()
}
