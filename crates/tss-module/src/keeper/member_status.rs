//! Member liveness: activation, health checks and penalties

use super::{Ctx, Keeper};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::keys;
use crate::ledger::Address;
use crate::types::MemberStatus;
use tracing::{info, instrument, warn};
use tss_store::{decode, KvStore, KvStoreExt};

impl Keeper {
    pub fn get_status(&self, store: &dyn KvStore, address: &Address) -> Result<Option<MemberStatus>> {
        Ok(store.get_json(&keys::status_key(address))?)
    }

    pub fn is_active(&self, store: &dyn KvStore, address: &Address) -> Result<bool> {
        Ok(self
            .get_status(store, address)?
            .is_some_and(|status| status.is_active))
    }

    fn set_status(&self, ctx: &mut Ctx<'_>, status: &MemberStatus) -> Result<()> {
        ctx.store.set_json(keys::status_key(&status.address), status)?;
        Ok(())
    }

    /// Mark an address active once its penalty period, if any, has elapsed
    #[instrument(skip(self, ctx))]
    pub(crate) fn activate(&self, ctx: &mut Ctx<'_>, address: &Address) -> Result<()> {
        let now = ctx.block.time;
        if let Some(status) = self.get_status(&*ctx.store, address)? {
            if status.is_active {
                return Err(Error::AlreadyActive(address.clone()));
            }
            let params = self.params(&*ctx.store)?;
            let penalty = if status.is_jailed {
                params.jail_penalty_duration()
            } else {
                params.inactive_penalty_duration()
            };
            let until = status.since + penalty;
            if now < until {
                return Err(Error::TooSoonToActivate {
                    address: address.clone(),
                    until,
                });
            }
        }

        self.set_status(
            ctx,
            &MemberStatus {
                address: address.clone(),
                is_active: true,
                is_jailed: false,
                since: now,
                last_active: now,
            },
        )?;
        info!(%address, "member activated");
        ctx.emit(Event::MemberActivated {
            address: address.clone(),
        });
        Ok(())
    }

    pub(crate) fn health_check(&self, ctx: &mut Ctx<'_>, address: &Address) -> Result<()> {
        let mut status = self
            .get_status(&*ctx.store, address)?
            .filter(|status| status.is_active)
            .ok_or_else(|| Error::InactiveMember(address.clone()))?;
        status.last_active = ctx.block.time;
        self.set_status(ctx, &status)?;
        ctx.emit(Event::MemberHealthCheck {
            address: address.clone(),
        });
        Ok(())
    }

    /// No-op for addresses that are not active
    pub(crate) fn deactivate(&self, ctx: &mut Ctx<'_>, address: &Address) -> Result<()> {
        let Some(mut status) = self.get_status(&*ctx.store, address)? else {
            return Ok(());
        };
        if !status.is_active {
            return Ok(());
        }
        status.is_active = false;
        status.since = ctx.block.time;
        self.set_status(ctx, &status)?;

        warn!(%address, "member deactivated");
        ctx.emit(Event::MemberDeactivated {
            address: address.clone(),
        });
        Ok(())
    }

    pub(crate) fn jail(&self, ctx: &mut Ctx<'_>, address: &Address) -> Result<()> {
        let now = ctx.block.time;
        let status = MemberStatus {
            address: address.clone(),
            is_active: false,
            is_jailed: true,
            since: now,
            last_active: self
                .get_status(&*ctx.store, address)?
                .map_or(now, |status| status.last_active),
        };
        self.set_status(ctx, &status)?;

        warn!(%address, "member jailed");
        ctx.emit(Event::MemberJailed {
            address: address.clone(),
        });
        Ok(())
    }

    /// Deactivate active members whose last health check is older than
    /// `active_duration`
    pub(crate) fn handle_inactive_members(&self, ctx: &mut Ctx<'_>) -> Result<()> {
        let params = self.params(&*ctx.store)?;
        let cutoff = ctx.block.time - params.active_duration();
        let stale: Vec<Address> = ctx
            .store
            .prefix(&[keys::STATUS_PREFIX])
            .map(|(_, value)| decode::<MemberStatus>(&value))
            .collect::<tss_store::Result<Vec<_>>>()?
            .into_iter()
            .filter(|status| status.is_active && status.last_active < cutoff)
            .map(|status| status.address)
            .collect();

        for address in &stale {
            self.deactivate(ctx, address)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::Command;
    use crate::query::{Query, QueryResponse};
    use crate::testutil::TestChain;

    fn activate(chain: &mut TestChain, address: &Address) -> Result<()> {
        chain
            .exec(Command::Activate {
                sender: address.clone(),
                address: address.clone(),
            })
            .map(|_| ())
    }

    fn health_check(chain: &mut TestChain, address: &Address) -> Result<()> {
        chain
            .exec(Command::HealthCheck {
                sender: address.clone(),
                address: address.clone(),
            })
            .map(|_| ())
    }

    #[test]
    fn test_activate_and_health_check() {
        let mut chain = TestChain::new();
        let alice = Address::new("alice");

        assert!(matches!(
            health_check(&mut chain, &alice),
            Err(Error::InactiveMember(_))
        ));
        activate(&mut chain, &alice).unwrap();
        assert!(matches!(
            activate(&mut chain, &alice),
            Err(Error::AlreadyActive(_))
        ));

        chain.advance_secs(100);
        health_check(&mut chain, &alice).unwrap();
        let QueryResponse::MemberStatus(Some(status)) =
            chain.query(Query::MemberStatus { address: alice })
        else {
            panic!("expected status");
        };
        assert!(status.is_active);
        assert_eq!(status.last_active, chain.block.time);
    }

    #[test]
    fn test_inactivity_deactivates_and_penalizes() {
        let mut chain = TestChain::new();
        let bob = Address::new("bob");
        activate(&mut chain, &bob).unwrap();

        let params = chain.params();
        chain.advance_secs(params.active_duration);
        chain.end_block();
        assert!(chain.status(&bob).unwrap().is_active);

        chain.advance_secs(1);
        let events = chain.end_block();
        assert!(events.contains(&Event::MemberDeactivated {
            address: bob.clone()
        }));
        assert!(!chain.status(&bob).unwrap().is_active);

        assert!(matches!(
            activate(&mut chain, &bob),
            Err(Error::TooSoonToActivate { .. })
        ));
        chain.advance_secs(params.inactive_penalty_duration);
        activate(&mut chain, &bob).unwrap();
    }

    #[test]
    fn test_jail_uses_longer_penalty() {
        let mut chain = TestChain::new();
        let carol = Address::new("carol");
        activate(&mut chain, &carol).unwrap();
        chain.jail(&carol);

        let status = chain.status(&carol).unwrap();
        assert!(status.is_jailed && !status.is_active);

        let params = chain.params();
        chain.advance_secs(params.inactive_penalty_duration);
        assert!(matches!(
            activate(&mut chain, &carol),
            Err(Error::TooSoonToActivate { .. })
        ));
        chain.advance_secs(params.jail_penalty_duration - params.inactive_penalty_duration);
        activate(&mut chain, &carol).unwrap();
        assert!(!chain.status(&carol).unwrap().is_jailed);
    }
}
