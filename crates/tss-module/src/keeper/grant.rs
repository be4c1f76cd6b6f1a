//! Authorization grants: a grantee may submit member commands for a granter

use super::{Ctx, Keeper};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::keys;
use crate::ledger::Address;
use tss_store::KvStore;

impl Keeper {
    pub fn is_grantee(&self, store: &dyn KvStore, granter: &Address, grantee: &Address) -> bool {
        store.has(&keys::grant_key(granter, grantee))
    }

    /// Accept `sender` acting for `address` when they match or a grant exists
    pub(crate) fn check_grantee(&self, store: &dyn KvStore, address: &Address, sender: &Address) -> Result<()> {
        if address == sender || self.is_grantee(store, address, sender) {
            return Ok(());
        }
        Err(Error::MemberNotAuthorized {
            sender: sender.clone(),
            address: address.clone(),
        })
    }

    pub(crate) fn grant(&self, ctx: &mut Ctx<'_>, granter: &Address, grantee: &Address) -> Result<()> {
        if granter == grantee {
            return Err(Error::InvalidGrant("granter and grantee are the same".into()));
        }
        ctx.store.set(keys::grant_key(granter, grantee), vec![1]);
        ctx.emit(Event::GrantUpdated {
            granter: granter.clone(),
            grantee: grantee.clone(),
            granted: true,
        });
        Ok(())
    }

    pub(crate) fn revoke(&self, ctx: &mut Ctx<'_>, granter: &Address, grantee: &Address) -> Result<()> {
        let key = keys::grant_key(granter, grantee);
        if !ctx.store.has(&key) {
            return Err(Error::GrantNotFound {
                granter: granter.clone(),
                grantee: grantee.clone(),
            });
        }
        ctx.store.delete(&key);
        ctx.emit(Event::GrantUpdated {
            granter: granter.clone(),
            grantee: grantee.clone(),
            granted: false,
        });
        Ok(())
    }
}
