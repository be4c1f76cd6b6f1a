//! Periodic processing run once per block

use super::{Ctx, Keeper};
use crate::context::BlockContext;
use crate::error::Result;
use crate::events::Event;
use crate::ledger::{CacheLedger, Ledger};
use tracing::{debug, error, instrument};
use tss_store::{CacheStore, KvStore};

type Phase = fn(&Keeper, &mut Ctx<'_>) -> Result<()>;

/// Run order of the end-block phases
const PHASES: [(&str, Phase); 5] = [
    ("replacements", Keeper::handle_replacements),
    ("dkg_expiry", Keeper::handle_expired_dkg),
    ("signing_expiry", Keeper::handle_expired_signings),
    ("inactive_members", Keeper::handle_inactive_members),
    ("rewards", Keeper::distribute_rewards),
];

impl Keeper {
    /// Run all periodic processing for a block.
    ///
    /// Each phase stages its writes separately and commits only on success.
    /// A failing phase is rolled back and reported as
    /// [`Event::EndBlockPhaseFailed`]; the remaining phases still run.
    #[instrument(skip_all, fields(height = block.height))]
    pub fn end_block<S, L>(&self, store: &mut S, ledger: &mut L, block: &BlockContext) -> Vec<Event>
    where
        S: KvStore + ?Sized,
        L: Ledger + ?Sized,
    {
        let mut events = Vec::new();
        for (phase, run) in PHASES {
            let mut cache = CacheStore::new(&mut *store);
            let mut ledger_cache = CacheLedger::new(&mut *ledger);
            let mut ctx = Ctx {
                store: &mut cache,
                ledger: &mut ledger_cache,
                block,
                events: Vec::new(),
            };

            let result = run(self, &mut ctx);
            let Ctx {
                events: emitted, ..
            } = ctx;
            match result {
                Ok(()) => {
                    cache.commit();
                    ledger_cache.commit();
                    events.extend(emitted);
                }
                Err(e) => {
                    error!(phase, error = %e, "end block phase failed");
                    events.push(Event::EndBlockPhaseFailed {
                        phase: phase.to_string(),
                        code: e.code(),
                        error: e.to_string(),
                    });
                }
            }
        }
        debug!(events = events.len(), "end block processed");
        events
    }
}

#[cfg(test)]
mod tests {
    use crate::events::Event;
    use crate::keys;
    use crate::testutil::{addresses, TestChain};
    use crate::types::GroupStatus;
    use crate::Error;
    use tss_store::KvStore;

    #[test]
    fn test_failing_phase_does_not_block_the_others() {
        let mut chain = TestChain::new();
        let members = addresses(2);
        let group_id = chain.create_group(&members, 1, 0);

        // queue entry pointing at a replacement that was never stored
        let dangling = keys::replacement_queue_key(&chain.block.time, 99);
        chain.store.set(dangling.clone(), b"{}".to_vec());

        let period = chain.params().round_period;
        chain.advance_secs(period);
        let events = chain.end_block();

        let code = Error::ReplacementNotFound(99).code();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::EndBlockPhaseFailed { phase, code: c, .. } if phase == "replacements" && *c == code
        )));
        // the replacement phase rolled back, its deletion of the entry included
        assert!(chain.store.get(&dangling).is_some());
        // later phases still ran
        assert_eq!(chain.group(group_id).status, GroupStatus::Fallen);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::GroupFallen { group_id: id, .. } if *id == group_id)));
    }
}
