//! Keeper: every state transition of the module
//!
//! All state lives in the store passed to each call; the keeper itself only
//! knows the authority address. Commands run against a [`CacheStore`] and a
//! [`CacheLedger`] that are committed together on success and dropped on
//! failure, so every command is all-or-nothing.

mod de;
mod dkg;
mod end_block;
mod grant;
mod group;
mod member_status;
mod replacement;
mod rewards;
mod signing;

use crate::context::BlockContext;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::keys;
use crate::ledger::{Address, CacheLedger, Ledger};
use crate::msg::{Command, Response};
use crate::params::Params;
use crate::query::{Query, QueryResponse};
use tracing::{debug, info, instrument, warn};
use tss_core::GroupId;
use tss_store::{CacheStore, KvStore, KvStoreExt};

/// Mutable view of state for one command or one end-block pass
pub struct Ctx<'a> {
    pub store: &'a mut dyn KvStore,
    pub ledger: &'a mut dyn Ledger,
    pub block: &'a BlockContext,
    pub events: Vec<Event>,
}

impl<'a> Ctx<'a> {
    pub fn emit(&mut self, event: Event) {
        debug!(?event, "event");
        self.events.push(event);
    }
}

/// Outcome of a committed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    pub response: Response,
    pub events: Vec<Event>,
}

/// TSS module keeper
#[derive(Debug, Clone)]
pub struct Keeper {
    authority: Address,
}

impl Keeper {
    pub fn new(authority: Address) -> Self {
        Self { authority }
    }

    pub fn authority(&self) -> &Address {
        &self.authority
    }

    /// Write initial params
    pub fn init_genesis(&self, store: &mut dyn KvStore, params: &Params) -> Result<()> {
        params.validate()?;
        store.set_json(keys::PARAMS_KEY.to_vec(), params)?;
        info!(?params, "genesis params set");
        Ok(())
    }

    /// Execute one command atomically
    #[instrument(skip_all, fields(command = command.name(), height = block.height))]
    pub fn execute<S, L>(
        &self,
        store: &mut S,
        ledger: &mut L,
        block: &BlockContext,
        command: Command,
    ) -> Result<Executed>
    where
        S: KvStore + ?Sized,
        L: Ledger + ?Sized,
    {
        let mut cache = CacheStore::new(store);
        let mut ledger_cache = CacheLedger::new(ledger);
        let mut ctx = Ctx {
            store: &mut cache,
            ledger: &mut ledger_cache,
            block,
            events: Vec::new(),
        };

        let result = self.dispatch(&mut ctx, command);
        let Ctx { events, .. } = ctx;

        match result {
            Ok(response) => {
                cache.commit();
                ledger_cache.commit();
                debug!(events = events.len(), "command committed");
                Ok(Executed { response, events })
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "command rejected");
                Err(e)
            }
        }
    }

    fn dispatch(&self, ctx: &mut Ctx<'_>, command: Command) -> Result<Response> {
        match command {
            Command::CreateGroup {
                authority,
                members,
                threshold,
                fee,
            } => {
                self.check_authority(&authority)?;
                let group_id = self.create_group(ctx, members, threshold, fee)?;
                Ok(Response::GroupCreated { group_id })
            }
            Command::ReplaceGroup {
                authority,
                current_group_id,
                new_group_id,
                exec_time,
            } => {
                self.check_authority(&authority)?;
                let replacement_id =
                    self.replace_group(ctx, current_group_id, new_group_id, exec_time)?;
                Ok(Response::ReplacementScheduled { replacement_id })
            }
            Command::UpdateGroupFee {
                authority,
                group_id,
                fee,
            } => {
                self.check_authority(&authority)?;
                self.update_group_fee(ctx, group_id, fee)?;
                Ok(Response::Empty)
            }
            Command::UpdateParams { authority, params } => {
                self.check_authority(&authority)?;
                self.update_params(ctx, params)?;
                Ok(Response::Empty)
            }
            Command::SubmitDes {
                sender,
                address,
                des,
            } => {
                self.check_grantee(&*ctx.store, &address, &sender)?;
                self.submit_des(ctx, &address, &des)?;
                Ok(Response::Empty)
            }
            Command::RequestSignature {
                sender,
                group_id,
                content,
                fee_limit,
            } => {
                let signing_id = self.request_signature(ctx, group_id, content, fee_limit, &sender)?;
                Ok(Response::SigningRequested { signing_id })
            }
            Command::SubmitDkgRound1 {
                sender,
                address,
                group_id,
                round1,
            } => {
                self.check_grantee(&*ctx.store, &address, &sender)?;
                self.submit_round1(ctx, group_id, &address, round1)?;
                Ok(Response::Empty)
            }
            Command::SubmitDkgRound2 {
                sender,
                address,
                group_id,
                round2,
            } => {
                self.check_grantee(&*ctx.store, &address, &sender)?;
                self.submit_round2(ctx, group_id, &address, round2)?;
                Ok(Response::Empty)
            }
            Command::Complain {
                sender,
                address,
                group_id,
                complaints,
            } => {
                self.check_grantee(&*ctx.store, &address, &sender)?;
                self.complain(ctx, group_id, &address, complaints)?;
                Ok(Response::Empty)
            }
            Command::Confirm {
                sender,
                address,
                group_id,
                confirm,
            } => {
                self.check_grantee(&*ctx.store, &address, &sender)?;
                self.confirm(ctx, group_id, &address, confirm)?;
                Ok(Response::Empty)
            }
            Command::SubmitSignature {
                sender,
                address,
                signing_id,
                member_id,
                signature,
            } => {
                self.check_grantee(&*ctx.store, &address, &sender)?;
                self.submit_signature(ctx, signing_id, member_id, &address, signature)?;
                Ok(Response::Empty)
            }
            Command::Activate { sender, address } => {
                self.check_grantee(&*ctx.store, &address, &sender)?;
                self.activate(ctx, &address)?;
                Ok(Response::Empty)
            }
            Command::HealthCheck { sender, address } => {
                self.check_grantee(&*ctx.store, &address, &sender)?;
                self.health_check(ctx, &address)?;
                Ok(Response::Empty)
            }
            Command::Grant { granter, grantee } => {
                self.grant(ctx, &granter, &grantee)?;
                Ok(Response::Empty)
            }
            Command::Revoke { granter, grantee } => {
                self.revoke(ctx, &granter, &grantee)?;
                Ok(Response::Empty)
            }
        }
    }

    /// Answer a read-only query
    pub fn query(&self, store: &dyn KvStore, ledger: &dyn Ledger, query: Query) -> Result<QueryResponse> {
        match query {
            Query::Group { group_id } => Ok(QueryResponse::Group(Box::new(
                self.group_result(store, group_id)?,
            ))),
            Query::Members { group_id } => {
                self.must_get_group(store, group_id)?;
                Ok(QueryResponse::Members(self.member_views(store, group_id)?))
            }
            Query::DeCount { address } => Ok(QueryResponse::DeCount(self.get_de_count(store, &address)?)),
            Query::ReplacementQueue { before } => Ok(QueryResponse::Replacements(
                self.pending_replacements(store, &before)?,
            )),
            Query::Replacement { replacement_id } => Ok(QueryResponse::Replacement(
                self.must_get_replacement(store, replacement_id)?,
            )),
            Query::CurrentGroup => Ok(QueryResponse::CurrentGroup(self.current_group_id(store)?)),
            Query::Signing { signing_id } => Ok(QueryResponse::Signing(Box::new(
                self.signing_result(store, signing_id)?,
            ))),
            Query::MemberStatus { address } => {
                Ok(QueryResponse::MemberStatus(self.get_status(store, &address)?))
            }
            Query::IsGrantee { granter, grantee } => {
                Ok(QueryResponse::IsGrantee(self.is_grantee(store, &granter, &grantee)))
            }
            Query::Params => Ok(QueryResponse::Params(self.params(store)?)),
            Query::Balance { address } => Ok(QueryResponse::Balance(ledger.balance(&address))),
        }
    }

    fn check_authority(&self, signer: &Address) -> Result<()> {
        if *signer != self.authority {
            return Err(Error::InvalidSigner {
                expected: self.authority.clone(),
                got: signer.clone(),
            });
        }
        Ok(())
    }

    pub fn params(&self, store: &dyn KvStore) -> Result<Params> {
        Ok(store.get_json(keys::PARAMS_KEY)?.unwrap_or_default())
    }

    fn update_params(&self, ctx: &mut Ctx<'_>, params: Params) -> Result<()> {
        params.validate()?;
        let current = self.params(&*ctx.store)?;
        if params.max_de_size != current.max_de_size {
            return Err(Error::InvalidParams(
                "max DE size cannot change while queues exist".into(),
            ));
        }
        ctx.store.set_json(keys::PARAMS_KEY.to_vec(), &params)?;
        info!(?params, "params updated");
        ctx.emit(crate::events::Event::ParamsUpdated);
        Ok(())
    }

    /// Increment a counter and return the new value
    fn next_id(&self, ctx: &mut Ctx<'_>, key: &[u8]) -> Result<u64> {
        let next = ctx.store.get_json::<u64>(key)?.unwrap_or_default() + 1;
        ctx.store.set_json(key.to_vec(), &next)?;
        Ok(next)
    }

    pub fn current_group_id(&self, store: &dyn KvStore) -> Result<Option<GroupId>> {
        Ok(store.get_json(keys::CURRENT_GROUP_KEY)?)
    }

    fn set_current_group_id(&self, ctx: &mut Ctx<'_>, group_id: GroupId) -> Result<()> {
        ctx.store.set_json(keys::CURRENT_GROUP_KEY.to_vec(), &group_id)?;
        info!(group_id, "current group changed");
        ctx.emit(Event::CurrentGroupChanged { group_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestChain;

    #[test]
    fn test_authority_gated_commands() {
        let mut chain = TestChain::new();
        let err = chain
            .exec(Command::CreateGroup {
                authority: Address::new("mallory"),
                members: vec![Address::new("a")],
                threshold: 1,
                fee: 0,
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSigner { .. }));

        let err = chain
            .exec(Command::UpdateParams {
                authority: Address::new("mallory"),
                params: Params::default(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSigner { .. }));
    }

    #[test]
    fn test_update_params() {
        let mut chain = TestChain::new();
        let mut params = chain.params();
        params.reward_percentage = 10;
        chain
            .exec(Command::UpdateParams {
                authority: chain.authority(),
                params: params.clone(),
            })
            .unwrap();
        assert_eq!(chain.params(), params);

        let mut invalid = params.clone();
        invalid.reward_percentage = 200;
        assert!(matches!(
            chain.exec(Command::UpdateParams {
                authority: chain.authority(),
                params: invalid,
            }),
            Err(Error::InvalidParams(_))
        ));

        let mut resized = params;
        resized.max_de_size += 1;
        assert!(chain
            .exec(Command::UpdateParams {
                authority: chain.authority(),
                params: resized,
            })
            .is_err());
    }

    #[test]
    fn test_failed_command_leaves_no_writes() {
        let mut chain = TestChain::new();
        let before = chain.store.len();
        assert!(chain
            .exec(Command::CreateGroup {
                authority: chain.authority(),
                members: vec![Address::new("a"), Address::new("a")],
                threshold: 1,
                fee: 0,
            })
            .is_err());
        assert_eq!(chain.store.len(), before);
    }
}
