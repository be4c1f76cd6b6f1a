//! Block producer
//!
//! One async mutex guards the module state. HTTP handlers enqueue commands
//! or run read-only queries; the block ticker drains the queue in order,
//! runs end-block processing and publishes the emitted events.

use crate::error::Result;
use crate::genesis::Genesis;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument, warn};
use tss_module::rpc::{BlockEvents, TxId, TxResult, TxStatus};
use tss_module::{Address, BlockContext, Command, InMemoryLedger, Keeper, Ledger, Query, QueryResponse};
use tss_store::MemStore;
use uuid::Uuid;

/// Capacity of the event broadcast channel, in blocks
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Chain {
    keeper: Keeper,
    store: MemStore,
    ledger: InMemoryLedger,
    block: BlockContext,
    mempool: Vec<(TxId, Command)>,
}

#[derive(Clone)]
pub struct Node {
    chain: Arc<Mutex<Chain>>,
    /// Tx results keyed by tx id, with the height they were recorded at
    results: Arc<DashMap<TxId, (u64, TxStatus)>>,
    events: broadcast::Sender<BlockEvents>,
}

/// `blake3(prev_hash || height || time || tx ids)`
fn block_hash(prev: &BlockContext, height: u64, time: &DateTime<Utc>, txs: &[(TxId, Command)]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&prev.hash);
    hasher.update(&height.to_be_bytes());
    hasher.update(&time.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    for (id, _) in txs {
        hasher.update(id.as_bytes());
    }
    *hasher.finalize().as_bytes()
}

impl Node {
    pub fn new(authority: Address, genesis: Genesis, genesis_time: DateTime<Utc>) -> Result<Self> {
        let keeper = Keeper::new(authority);
        let mut store = MemStore::new();
        keeper.init_genesis(&mut store, &genesis.params)?;

        let mut ledger = InMemoryLedger::new();
        for (address, amount) in &genesis.balances {
            ledger.set_balance(address, *amount);
        }

        let hash = *blake3::hash(b"tss-genesis").as_bytes();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!(authority = %keeper.authority(), accounts = genesis.balances.len(), "genesis loaded");

        Ok(Self {
            chain: Arc::new(Mutex::new(Chain {
                keeper,
                store,
                ledger,
                block: BlockContext::new(0, genesis_time, hash),
                mempool: Vec::new(),
            })),
            results: Arc::new(DashMap::new()),
            events,
        })
    }

    /// Queue a command for the next block
    pub async fn submit(&self, command: Command) -> TxId {
        let tx_id = Uuid::new_v4();
        let mut chain = self.chain.lock().await;
        debug!(%tx_id, command = command.name(), "tx queued");
        self.results.insert(tx_id, (chain.block.height, TxStatus::Pending));
        chain.mempool.push((tx_id, command));
        tx_id
    }

    pub fn tx_result(&self, tx_id: &TxId) -> Option<TxResult> {
        self.results.get(tx_id).map(|entry| TxResult {
            tx_id: *tx_id,
            status: entry.value().1.clone(),
        })
    }

    pub async fn query(&self, query: Query) -> tss_module::Result<QueryResponse> {
        let chain = self.chain.lock().await;
        chain.keeper.query(&chain.store, &chain.ledger, query)
    }

    pub async fn latest_block(&self) -> BlockContext {
        self.chain.lock().await.block
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlockEvents> {
        self.events.subscribe()
    }

    /// Execute queued commands and end-block processing as the next block.
    /// Block time never goes backwards.
    #[instrument(skip(self))]
    pub async fn produce_block(&self, now: DateTime<Utc>) -> BlockEvents {
        let mut guard = self.chain.lock().await;
        let chain = &mut *guard;

        let txs = std::mem::take(&mut chain.mempool);
        let height = chain.block.height + 1;
        let time = now.max(chain.block.time);
        let block = BlockContext::new(height, time, block_hash(&chain.block, height, &time, &txs));
        chain.block = block;

        let mut events = Vec::new();
        for (tx_id, command) in txs {
            let status = match chain
                .keeper
                .execute(&mut chain.store, &mut chain.ledger, &block, command)
            {
                Ok(executed) => {
                    events.extend(executed.events.iter().cloned());
                    TxStatus::Committed {
                        height,
                        response: executed.response,
                        events: executed.events,
                    }
                }
                Err(e) => TxStatus::Failed {
                    height,
                    code: e.code(),
                    error: e.to_string(),
                },
            };
            self.results.insert(tx_id, (height, status));
        }

        // phase failures arrive as EndBlockPhaseFailed events
        events.extend(
            chain
                .keeper
                .end_block(&mut chain.store, &mut chain.ledger, &block),
        );
        drop(guard);

        if !events.is_empty() {
            info!(height, events = events.len(), "block produced");
        }
        let block_events = BlockEvents { block, events };
        // no subscribers is fine
        let _ = self.events.send(block_events.clone());
        block_events
    }

    /// Forget results recorded before `min_height`
    pub fn prune_results(&self, min_height: u64) {
        let before = self.results.len();
        self.results
            .retain(|_, (height, status)| status.is_pending() || *height >= min_height);
        let pruned = before - self.results.len();
        if pruned > 0 {
            warn!(pruned, min_height, "pruned tx results");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tss_module::{Event, Response};

    fn node() -> Node {
        let mut genesis = Genesis::default();
        genesis.balances.insert(Address::new("payer"), 500);
        Node::new(Address::new("authority"), genesis, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_queued_commands_execute_in_next_block() {
        let node = node();
        let mut events = node.subscribe();

        let ok = node
            .submit(Command::CreateGroup {
                authority: Address::new("authority"),
                members: vec![Address::new("a"), Address::new("b")],
                threshold: 2,
                fee: 1,
            })
            .await;
        let rejected = node
            .submit(Command::CreateGroup {
                authority: Address::new("mallory"),
                members: vec![Address::new("a")],
                threshold: 1,
                fee: 1,
            })
            .await;
        assert!(node.tx_result(&ok).unwrap().status.is_pending());

        let produced = node.produce_block(Utc::now()).await;
        assert_eq!(produced.block.height, 1);

        match node.tx_result(&ok).unwrap().status {
            TxStatus::Committed { height, response, .. } => {
                assert_eq!(height, 1);
                assert_eq!(response, Response::GroupCreated { group_id: 1 });
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert!(matches!(
            node.tx_result(&rejected).unwrap().status,
            TxStatus::Failed { code: 1, .. }
        ));

        let streamed = events.recv().await.unwrap();
        assert_eq!(streamed, produced);
        assert!(streamed
            .events
            .iter()
            .any(|e| matches!(e, Event::GroupCreated { group_id: 1, .. })));

        assert_eq!(
            node.query(Query::Balance {
                address: Address::new("payer")
            })
            .await
            .unwrap(),
            QueryResponse::Balance(500)
        );
    }

    #[tokio::test]
    async fn test_block_time_is_monotonic() {
        let node = node();
        let first = node.produce_block(Utc::now()).await.block;
        let second = node
            .produce_block(first.time - chrono::Duration::seconds(10))
            .await
            .block;
        assert_eq!(second.time, first.time);
        assert_eq!(second.height, 2);
        assert_ne!(second.hash, first.hash);
        assert_eq!(node.latest_block().await, second);
    }

    #[tokio::test]
    async fn test_prune_results() {
        let node = node();
        let old = node
            .submit(Command::Grant {
                granter: Address::new("a"),
                grantee: Address::new("b"),
            })
            .await;
        node.produce_block(Utc::now()).await;
        let queued = node
            .submit(Command::Grant {
                granter: Address::new("c"),
                grantee: Address::new("d"),
            })
            .await;

        node.prune_results(2);
        assert!(node.tx_result(&old).is_none());
        assert!(node.tx_result(&queued).is_some());
    }
}
