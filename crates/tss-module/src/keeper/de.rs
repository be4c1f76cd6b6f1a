//! Per-address DE queues
//!
//! A fixed-capacity circular buffer of `max_de_size` slots indexed by
//! `head`/`tail`. The queue is full when advancing `tail` would reach `head`,
//! so at most `max_de_size - 1` entries are stored.

use super::{Ctx, Keeper};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::keys;
use crate::ledger::Address;
use crate::types::{DeQueue, Member};
use tracing::debug;
use tss_core::de::De;
use tss_core::primitives::Point;
use tss_store::{KvStore, KvStoreExt};

impl Keeper {
    pub fn get_de_queue(&self, store: &dyn KvStore, address: &Address) -> Result<DeQueue> {
        Ok(store.get_json(&keys::de_queue_key(address))?.unwrap_or_default())
    }

    fn set_de_queue(&self, ctx: &mut Ctx<'_>, address: &Address, queue: DeQueue) -> Result<()> {
        ctx.store.set_json(keys::de_queue_key(address), &queue)?;
        Ok(())
    }

    /// Occupancy of the queue, correct across wraparound
    pub fn get_de_count(&self, store: &dyn KvStore, address: &Address) -> Result<u64> {
        let queue = self.get_de_queue(store, address)?;
        if queue.head <= queue.tail {
            return Ok(queue.tail - queue.head);
        }
        let max_de_size = self.params(store)?.max_de_size;
        Ok(max_de_size - (queue.head - queue.tail))
    }

    fn next_queue_value(&self, value: u64, max_de_size: u64) -> u64 {
        (value + 1) % max_de_size
    }

    /// Append a batch of DEs; a full queue rejects the whole batch
    pub(crate) fn submit_des(&self, ctx: &mut Ctx<'_>, address: &Address, des: &[De]) -> Result<()> {
        if des.is_empty() {
            return Err(Error::InvalidDkgData("empty DE batch".into()));
        }
        for de in des {
            de.validate()?;
        }

        let max_de_size = self.params(&*ctx.store)?.max_de_size;
        let mut queue = self.get_de_queue(&*ctx.store, address)?;
        for de in des {
            ctx.store.set_json(keys::de_key(address, queue.tail), de)?;
            queue.tail = self.next_queue_value(queue.tail, max_de_size);
            if queue.tail == queue.head {
                return Err(Error::DEQueueFull(address.clone()));
            }
        }
        self.set_de_queue(ctx, address, queue)?;

        debug!(%address, count = des.len(), "DEs submitted");
        ctx.emit(Event::DesSubmitted {
            address: address.clone(),
            count: des.len() as u64,
        });
        Ok(())
    }

    /// Remove and return the DE at the head of the queue
    pub(crate) fn poll_de(&self, ctx: &mut Ctx<'_>, address: &Address) -> Result<De> {
        let mut queue = self.get_de_queue(&*ctx.store, address)?;
        let key = keys::de_key(address, queue.head);
        let de: De = ctx
            .store
            .get_json(&key)?
            .ok_or_else(|| Error::DENotFound(address.clone()))?;
        ctx.store.delete(&key);

        let max_de_size = self.params(&*ctx.store)?.max_de_size;
        queue.head = self.next_queue_value(queue.head, max_de_size);
        self.set_de_queue(ctx, address, queue)?;
        Ok(de)
    }

    /// Members whose address has at least one DE queued
    pub fn filter_members_with_de(&self, store: &dyn KvStore, members: Vec<Member>) -> Result<Vec<Member>> {
        let mut filtered = Vec::with_capacity(members.len());
        for member in members {
            if self.get_de_count(store, &member.address)? > 0 {
                filtered.push(member);
            }
        }
        Ok(filtered)
    }

    /// Poll one DE per member; any failure fails the whole call and the
    /// command's staged writes, including earlier polls, are discarded
    pub(crate) fn handle_assigned_members_poll_de(
        &self,
        ctx: &mut Ctx<'_>,
        members: &[Member],
    ) -> Result<(Vec<Member>, Vec<Point>, Vec<Point>)> {
        let mut pub_ds = Vec::with_capacity(members.len());
        let mut pub_es = Vec::with_capacity(members.len());
        for member in members {
            let de = self.poll_de(ctx, &member.address)?;
            pub_ds.push(de.pub_d);
            pub_es.push(de.pub_e);
        }
        Ok((members.to_vec(), pub_ds, pub_es))
    }
}
