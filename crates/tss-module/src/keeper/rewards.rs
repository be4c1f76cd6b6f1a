//! Fee collector rewards for the current group

use super::{Ctx, Keeper};
use crate::error::Result;
use crate::events::Event;
use crate::ledger::{Address, Amount};
use tracing::debug;

impl Keeper {
    /// Split `reward_percentage`% of the fee collector balance equally among
    /// the active members of the current group. The remainder of the
    /// division stays in the collector.
    pub(crate) fn distribute_rewards(&self, ctx: &mut Ctx<'_>) -> Result<()> {
        let Some(group_id) = self.current_group_id(&*ctx.store)? else {
            return Ok(());
        };
        let params = self.params(&*ctx.store)?;
        let collector = Address::fee_collector();
        let pool = (u128::from(ctx.ledger.balance(&collector)) * u128::from(params.reward_percentage) / 100) as Amount;
        if pool == 0 {
            return Ok(());
        }

        let mut recipients = Vec::new();
        for member in self.get_members(&*ctx.store, group_id)? {
            if self.is_active(&*ctx.store, &member.address)? {
                recipients.push(member.address);
            }
        }
        if recipients.is_empty() {
            return Ok(());
        }
        let amount_per_member = pool / recipients.len() as Amount;
        if amount_per_member == 0 {
            return Ok(());
        }

        for address in &recipients {
            ctx.ledger.transfer(&collector, address, amount_per_member)?;
        }
        debug!(group_id, amount_per_member, count = recipients.len(), "rewards distributed");
        ctx.emit(Event::RewardsDistributed {
            group_id,
            amount_per_member,
            recipients,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{addresses, TestChain};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_rewards_split_among_active_members() {
        let mut rng = ChaCha20Rng::seed_from_u64(90);
        let mut chain = TestChain::new();
        let members = addresses(3);
        for address in &members {
            chain.activate(address);
        }
        let (group_id, _) = chain.run_dkg(&members, 2, 0, &mut rng);
        chain.jail(&members[2]);
        chain.fund(&Address::fee_collector(), 101);

        let events = chain.end_block();
        // 50% of 101 is 50, split between two active members
        assert!(events.contains(&Event::RewardsDistributed {
            group_id,
            amount_per_member: 25,
            recipients: members[..2].to_vec(),
        }));
        assert_eq!(chain.balance(&members[0]), 25);
        assert_eq!(chain.balance(&members[1]), 25);
        assert_eq!(chain.balance(&members[2]), 0);
        assert_eq!(chain.balance(&Address::fee_collector()), 51);
    }

    #[test]
    fn test_no_rewards_without_current_group() {
        let mut chain = TestChain::new();
        chain.fund(&Address::fee_collector(), 100);
        assert!(chain.end_block().is_empty());
        assert_eq!(chain.balance(&Address::fee_collector()), 100);
    }
}
