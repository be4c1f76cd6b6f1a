//! Group and member records

use super::{Ctx, Keeper};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::keys;
use crate::ledger::{Address, Amount};
use crate::query::GroupResult;
use crate::types::{Group, GroupStatus, Member, MemberView, Round3Record};
use std::collections::BTreeSet;
use tracing::{info, instrument};
use tss_core::keygen::{dkg_context, Round1Info, Round2Info};
use tss_core::{GroupId, GroupShape, MemberId};
use tss_store::{decode, KvStore, KvStoreExt};

impl Keeper {
    pub fn get_group(&self, store: &dyn KvStore, group_id: GroupId) -> Result<Option<Group>> {
        Ok(store.get_json(&keys::group_key(group_id))?)
    }

    pub fn must_get_group(&self, store: &dyn KvStore, group_id: GroupId) -> Result<Group> {
        self.get_group(store, group_id)?
            .ok_or(Error::GroupNotFound(group_id))
    }

    pub(crate) fn set_group(&self, ctx: &mut Ctx<'_>, group: &Group) -> Result<()> {
        ctx.store.set_json(keys::group_key(group.id), group)?;
        Ok(())
    }

    pub fn get_member(&self, store: &dyn KvStore, group_id: GroupId, member_id: MemberId) -> Result<Member> {
        store
            .get_json(&keys::member_key(group_id, member_id))?
            .ok_or(Error::MemberNotFound { group_id, member_id })
    }

    pub(crate) fn set_member(&self, ctx: &mut Ctx<'_>, member: &Member) -> Result<()> {
        ctx.store
            .set_json(keys::member_key(member.group_id, member.id), member)?;
        Ok(())
    }

    /// Members ordered by ID
    pub fn get_members(&self, store: &dyn KvStore, group_id: GroupId) -> Result<Vec<Member>> {
        store
            .prefix(&keys::members_prefix(group_id))
            .map(|(_, value)| decode(&value).map_err(Error::from))
            .collect()
    }

    /// Check that `address` holds `member_id` in the group
    pub(crate) fn member_with_address(
        &self,
        store: &dyn KvStore,
        group_id: GroupId,
        member_id: MemberId,
        address: &Address,
    ) -> Result<Member> {
        let member = self.get_member(store, group_id, member_id)?;
        if member.address != *address {
            return Err(Error::MemberNotAuthorized {
                sender: address.clone(),
                address: member.address,
            });
        }
        Ok(member)
    }

    /// Create a group and open DKG round 1
    #[instrument(skip(self, ctx, members))]
    pub(crate) fn create_group(
        &self,
        ctx: &mut Ctx<'_>,
        members: Vec<Address>,
        threshold: u64,
        fee: Amount,
    ) -> Result<GroupId> {
        let params = self.params(&*ctx.store)?;
        let size = members.len() as u64;
        if size == 0 || size > params.max_group_size {
            return Err(Error::InvalidGroupSize {
                size,
                max: params.max_group_size,
            });
        }
        let shape = GroupShape::new(size, threshold)
            .map_err(|_| Error::InvalidThreshold { threshold, size })?;

        let mut seen = BTreeSet::new();
        for address in &members {
            if !seen.insert(address) {
                return Err(Error::DuplicateMember(address.clone()));
            }
        }

        let group_id = self.next_id(ctx, keys::GROUP_COUNT_KEY)?;
        let round_expires_at = ctx.block.time + params.round_period();
        let group = Group {
            id: group_id,
            size,
            threshold,
            pub_key: None,
            status: GroupStatus::Round1,
            fee,
            latest_replacement_id: 0,
            dkg_context: dkg_context(group_id, shape, &ctx.block.hash),
            round_expires_at,
            created_height: ctx.block.height,
            created_at: ctx.block.time,
        };
        self.set_group(ctx, &group)?;

        for (member_id, address) in shape.member_ids().zip(members) {
            self.set_member(
                ctx,
                &Member {
                    id: member_id,
                    group_id,
                    address,
                    pub_key: None,
                    is_malicious: false,
                },
            )?;
        }
        self.schedule_dkg_expiry(ctx, &group)?;

        info!(group_id, size, threshold, "group created");
        ctx.emit(Event::GroupCreated {
            group_id,
            size,
            threshold,
            fee,
        });
        Ok(group_id)
    }

    pub(crate) fn update_group_fee(&self, ctx: &mut Ctx<'_>, group_id: GroupId, fee: Amount) -> Result<()> {
        let mut group = self.must_get_group(&*ctx.store, group_id)?;
        group.fee = fee;
        self.set_group(ctx, &group)?;
        ctx.emit(Event::GroupFeeUpdated { group_id, fee });
        Ok(())
    }

    pub fn member_views(&self, store: &dyn KvStore, group_id: GroupId) -> Result<Vec<MemberView>> {
        self.get_members(store, group_id)?
            .into_iter()
            .map(|member| {
                Ok(MemberView {
                    is_active: self.is_active(store, &member.address)?,
                    de_count: self.get_de_count(store, &member.address)?,
                    member,
                })
            })
            .collect()
    }

    pub fn group_result(&self, store: &dyn KvStore, group_id: GroupId) -> Result<GroupResult> {
        let group = self.must_get_group(store, group_id)?;
        let round1s: Vec<Round1Info> = self.get_round1s(store, group_id)?;
        let round2s: Vec<Round2Info> = self.get_round2s(store, group_id)?;
        let round3s: Vec<(MemberId, Round3Record)> = self.get_round3s(store, group_id)?;
        Ok(GroupResult {
            members: self.member_views(store, group_id)?,
            group,
            round1s,
            round2s,
            round3s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{Command, Response};
    use crate::query::{Query, QueryResponse};
    use crate::testutil::{addresses, TestChain};

    fn create(chain: &mut TestChain, members: Vec<Address>, threshold: u64) -> Result<GroupId> {
        let executed = chain.exec(Command::CreateGroup {
            authority: chain.authority(),
            members,
            threshold,
            fee: 10,
        })?;
        match executed.response {
            Response::GroupCreated { group_id } => Ok(group_id),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_create_group() {
        let mut chain = TestChain::new();
        let group_id = create(&mut chain, addresses(3), 2).unwrap();
        assert_eq!(group_id, 1);
        assert_eq!(create(&mut chain, addresses(2), 1).unwrap(), 2);

        let group = chain.group(group_id);
        assert_eq!(group.status, GroupStatus::Round1);
        assert_eq!(group.fee, 10);
        assert!(group.pub_key.is_none());
        assert_eq!(
            group.round_expires_at,
            chain.block.time + chain.params().round_period()
        );

        let QueryResponse::Members(members) = chain.query(Query::Members { group_id }) else {
            panic!("expected members");
        };
        assert_eq!(
            members.iter().map(|m| m.member.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(members[1].member.address, Address::new("member-2"));
    }

    #[test]
    fn test_create_group_validation() {
        let mut chain = TestChain::new();
        assert!(matches!(
            create(&mut chain, addresses(3), 4),
            Err(Error::InvalidThreshold { threshold: 4, size: 3 })
        ));
        assert!(matches!(
            create(&mut chain, addresses(3), 0),
            Err(Error::InvalidThreshold { threshold: 0, size: 3 })
        ));
        assert!(matches!(
            create(&mut chain, vec![], 1),
            Err(Error::InvalidGroupSize { .. })
        ));
        assert!(matches!(
            create(&mut chain, addresses(21), 2),
            Err(Error::InvalidGroupSize { size: 21, max: 20 })
        ));
        let mut dup = addresses(2);
        dup.push(dup[0].clone());
        assert!(matches!(
            create(&mut chain, dup, 2),
            Err(Error::DuplicateMember(_))
        ));

        // rejected creates do not consume IDs
        assert_eq!(create(&mut chain, addresses(1), 1).unwrap(), 1);
    }

    #[test]
    fn test_update_group_fee() {
        let mut chain = TestChain::new();
        let group_id = create(&mut chain, addresses(2), 1).unwrap();

        assert!(matches!(
            chain.exec(Command::UpdateGroupFee {
                authority: Address::new("mallory"),
                group_id,
                fee: 99,
            }),
            Err(Error::InvalidSigner { .. })
        ));
        assert!(matches!(
            chain.exec(Command::UpdateGroupFee {
                authority: chain.authority(),
                group_id: 42,
                fee: 99,
            }),
            Err(Error::GroupNotFound(42))
        ));

        chain
            .exec(Command::UpdateGroupFee {
                authority: chain.authority(),
                group_id,
                fee: 99,
            })
            .unwrap();
        assert_eq!(chain.group(group_id).fee, 99);
    }

    #[test]
    fn test_query_missing_group() {
        let chain = TestChain::new();
        assert!(matches!(
            chain.try_query(Query::Group { group_id: 9 }),
            Err(Error::GroupNotFound(9))
        ));
    }
}
