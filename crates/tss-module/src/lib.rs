//! # TSS Module
//!
//! Deterministic state machine for threshold signing groups: group creation
//! and DKG rounds, per-address DE queues, signing requests with fee escrow,
//! scheduled group replacement, member liveness and rewards.
//!
//! All state lives in a [`tss_store::KvStore`] and a [`Ledger`] supplied by
//! the caller. [`Keeper::execute`] applies one [`Command`] atomically and
//! [`Keeper::end_block`] runs the periodic processing of a block.

pub mod codec;
pub mod context;
pub mod error;
pub mod events;
pub mod keeper;
pub mod keys;
pub mod ledger;
pub mod msg;
pub mod params;
pub mod query;
pub mod rpc;
pub mod types;

#[cfg(test)]
mod testutil;

pub use context::BlockContext;
pub use error::{Error, Result};
pub use events::Event;
pub use keeper::{Executed, Keeper};
pub use ledger::{Address, Amount, InMemoryLedger, Ledger};
pub use msg::{Command, Response};
pub use params::Params;
pub use query::{Query, QueryResponse};
