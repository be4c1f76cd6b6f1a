//! Scheduled group replacement

use super::{Ctx, Keeper};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::keys;
use crate::types::{GroupStatus, Replacement, ReplacementStatus};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use tss_core::GroupId;
use tss_store::{KvStore, KvStoreExt};

impl Keeper {
    pub fn get_replacement(&self, store: &dyn KvStore, id: u64) -> Result<Option<Replacement>> {
        Ok(store.get_json(&keys::replacement_key(id))?)
    }

    pub fn must_get_replacement(&self, store: &dyn KvStore, id: u64) -> Result<Replacement> {
        self.get_replacement(store, id)?
            .ok_or(Error::ReplacementNotFound(id))
    }

    fn set_replacement(&self, ctx: &mut Ctx<'_>, replacement: &Replacement) -> Result<()> {
        ctx.store
            .set_json(keys::replacement_key(replacement.id), replacement)?;
        Ok(())
    }

    /// Queue keys of replacements due at or before `time`, in execution order
    fn due_replacement_keys(&self, store: &dyn KvStore, time: &DateTime<Utc>) -> Vec<Vec<u8>> {
        let start = [keys::REPLACEMENT_QUEUE_PREFIX];
        let end = keys::time_queue_end(keys::REPLACEMENT_QUEUE_PREFIX, time);
        store
            .range(Some(&start[..]), Some(&end[..]))
            .map(|(key, _)| key)
            .collect()
    }

    /// Waiting replacements that execute at or before `before`
    pub fn pending_replacements(&self, store: &dyn KvStore, before: &DateTime<Utc>) -> Result<Vec<Replacement>> {
        self.due_replacement_keys(store, before)
            .iter()
            .filter_map(|key| keys::trailing_id(key))
            .map(|id| self.must_get_replacement(store, id))
            .collect()
    }

    #[instrument(skip(self, ctx))]
    pub(crate) fn replace_group(
        &self,
        ctx: &mut Ctx<'_>,
        current_group_id: GroupId,
        new_group_id: GroupId,
        exec_time: DateTime<Utc>,
    ) -> Result<u64> {
        if current_group_id == new_group_id {
            return Err(Error::InvalidReplacement(
                "a group cannot replace itself".into(),
            ));
        }
        let mut current = self.must_get_group(&*ctx.store, current_group_id)?;
        self.must_get_group(&*ctx.store, new_group_id)?;
        if current.status != GroupStatus::Active {
            return Err(Error::GroupIsNotActive(current_group_id));
        }

        let id = self.next_id(ctx, keys::REPLACEMENT_COUNT_KEY)?;
        self.set_replacement(
            ctx,
            &Replacement {
                id,
                current_group_id,
                new_group_id,
                exec_time,
                status: ReplacementStatus::Waiting,
            },
        )?;
        ctx.store
            .set(keys::replacement_queue_key(&exec_time, id), Vec::new());

        current.latest_replacement_id = id;
        self.set_group(ctx, &current)?;

        info!(replacement_id = id, %exec_time, "replacement scheduled");
        ctx.emit(Event::ReplacementScheduled {
            replacement_id: id,
            current_group_id,
            new_group_id,
            exec_time,
        });
        Ok(id)
    }

    /// Apply every due replacement, earliest first
    pub(crate) fn handle_replacements(&self, ctx: &mut Ctx<'_>) -> Result<()> {
        for key in self.due_replacement_keys(&*ctx.store, &ctx.block.time) {
            ctx.store.delete(&key);
            let Some(id) = keys::trailing_id(&key) else {
                continue;
            };
            let mut replacement = self.must_get_replacement(&*ctx.store, id)?;
            if replacement.status != ReplacementStatus::Waiting {
                continue;
            }

            let new_group = self.must_get_group(&*ctx.store, replacement.new_group_id)?;
            if new_group.status != GroupStatus::Active {
                replacement.status = ReplacementStatus::Fallen;
                self.set_replacement(ctx, &replacement)?;
                warn!(replacement_id = id, new_group_id = new_group.id, "replacement fallen");
                ctx.emit(Event::ReplacementFallen {
                    replacement_id: id,
                    new_group_id: new_group.id,
                });
                continue;
            }

            let mut current = self.must_get_group(&*ctx.store, replacement.current_group_id)?;
            if current.status == GroupStatus::Active {
                current.status = GroupStatus::Expired;
                self.set_group(ctx, &current)?;
                ctx.emit(Event::GroupExpired {
                    group_id: current.id,
                });
            }
            self.set_current_group_id(ctx, new_group.id)?;

            replacement.status = ReplacementStatus::Success;
            self.set_replacement(ctx, &replacement)?;
            info!(
                replacement_id = id,
                current_group_id = current.id,
                new_group_id = new_group.id,
                "replacement applied"
            );
            ctx.emit(Event::ReplacementSuccess {
                replacement_id: id,
                current_group_id: current.id,
                new_group_id: new_group.id,
            });
        }
        Ok(())
    }
}
