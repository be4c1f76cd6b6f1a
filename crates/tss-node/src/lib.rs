//! TSS Node
//!
//! Runs the TSS module as a single block producer and serves it over HTTP:
//! commands are queued as transactions, executed at the next block, and
//! their results and events are exposed for polling and streaming.

pub mod api;
pub mod error;
pub mod genesis;
pub mod node;

pub use error::{NodeError, Result};
pub use genesis::Genesis;
pub use node::Node;
