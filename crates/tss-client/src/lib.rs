//! TSS Node Client
//!
//! Client library for the node API: submit commands, wait for their
//! results, run queries and subscribe to block events.

use futures_util::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, instrument, warn};
use tss_module::rpc::{BlockEvents, ErrorResponse, SubmitTxResponse, TxId, TxResult, TxStatus};
use tss_module::{BlockContext, Command, Query, QueryResponse, Response};

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Node returned {status}: {message}")]
    Node { status: u16, message: String },

    #[error("Query rejected ({code}): {error}")]
    Query { code: u32, error: String },

    #[error("Tx {tx_id} failed ({code}): {error}")]
    TxFailed { tx_id: TxId, code: u32, error: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// HTTP client for a TSS node
#[derive(Clone)]
pub struct NodeClient {
    client: Client,
    url: String,
    timeout: Duration,
    poll_interval: Duration,
    max_attempts: usize,
}

impl NodeClient {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(200),
            max_attempts: 150,
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how often and how many times [`NodeClient::wait_tx`] polls
    pub fn with_polling(mut self, interval: Duration, max_attempts: usize) -> Self {
        self.poll_interval = interval;
        self.max_attempts = max_attempts;
        self
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.url, path))
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.url, path))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        decode(response).await
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        self.get("/health").await
    }

    /// Queue a command, returning its tx id
    #[instrument(skip(self, command), fields(command = command.name()))]
    pub async fn submit(&self, command: &Command) -> Result<TxId> {
        let SubmitTxResponse { tx_id } = self.post("/v1/tx", command).await?;
        debug!(%tx_id, "tx submitted");
        Ok(tx_id)
    }

    pub async fn tx(&self, tx_id: &TxId) -> Result<TxResult> {
        self.get(&format!("/v1/tx/{tx_id}")).await
    }

    /// Poll until the tx leaves the queue. A rejected command is an error.
    pub async fn wait_tx(&self, tx_id: &TxId) -> Result<(Response, Vec<tss_module::Event>)> {
        for _ in 0..self.max_attempts {
            match self.tx(tx_id).await?.status {
                TxStatus::Pending => tokio::time::sleep(self.poll_interval).await,
                TxStatus::Committed {
                    response, events, ..
                } => return Ok((response, events)),
                TxStatus::Failed { code, error, .. } => {
                    return Err(ClientError::TxFailed {
                        tx_id: *tx_id,
                        code,
                        error,
                    })
                }
            }
        }
        Err(ClientError::Timeout(format!("waiting for tx {tx_id}")))
    }

    /// Submit a command and wait for its committed response
    pub async fn execute(&self, command: &Command) -> Result<Response> {
        let tx_id = self.submit(command).await?;
        let (response, _) = self.wait_tx(&tx_id).await?;
        Ok(response)
    }

    pub async fn query(&self, query: &Query) -> Result<QueryResponse> {
        self.post("/v1/query", query).await
    }

    pub async fn latest_block(&self) -> Result<BlockContext> {
        self.get("/v1/block").await
    }

    /// Stream of block events from `/v1/events`
    pub async fn subscribe_events(&self) -> Result<impl Stream<Item = Result<BlockEvents>>> {
        let ws_url = format!(
            "{}/v1/events",
            self.url
                .replacen("https://", "wss://", 1)
                .replacen("http://", "ws://", 1)
        );
        let (socket, _) = tokio_tungstenite::connect_async(ws_url.as_str())
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))?;
        debug!(url = %ws_url, "subscribed to events");

        let (_, read) = socket.split();
        Ok(read.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(
                    serde_json::from_str(&text)
                        .map_err(|e| ClientError::Deserialization(e.to_string())),
                ),
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::WebSocket(e.to_string()))),
            }
        }))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ClientError::Http(e.to_string()))?;
    if status.is_success() {
        return serde_json::from_slice(&bytes).map_err(|e| ClientError::Deserialization(e.to_string()));
    }

    if let Ok(ErrorResponse { code, error }) = serde_json::from_slice(&bytes) {
        return Err(ClientError::Query { code, error });
    }
    let message = String::from_utf8_lossy(&bytes).into_owned();
    if status != StatusCode::NOT_FOUND {
        warn!(%status, %message, "node request failed");
    }
    Err(ClientError::Node {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tss_module::{Address, Event};
    use tss_node::{api, Genesis, Node};

    async fn spawn_node() -> (Node, NodeClient) {
        let node = Node::new(Address::new("authority"), Genesis::default(), Utc::now()).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let app = api::router(node.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = NodeClient::new(&url).with_polling(Duration::from_millis(20), 100);
        (node, client)
    }

    /// Produce blocks in the background until the test ends
    fn spawn_producer(node: Node) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(20)).await;
                node.produce_block(Utc::now()).await;
            }
        });
    }

    #[tokio::test]
    async fn test_execute_and_query() {
        let (node, client) = spawn_node().await;
        spawn_producer(node);

        let response = client
            .execute(&Command::CreateGroup {
                authority: Address::new("authority"),
                members: vec![Address::new("a"), Address::new("b")],
                threshold: 1,
                fee: 3,
            })
            .await
            .unwrap();
        assert_eq!(response, Response::GroupCreated { group_id: 1 });

        let QueryResponse::Group(result) = client.query(&Query::Group { group_id: 1 }).await.unwrap()
        else {
            panic!("expected group");
        };
        assert_eq!(result.group.fee, 3);
        assert_eq!(result.members.len(), 2);

        match client.query(&Query::Group { group_id: 9 }).await {
            Err(ClientError::Query { code, .. }) => {
                assert_eq!(code, tss_module::Error::GroupNotFound(9).code())
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_tx_is_an_error() {
        let (node, client) = spawn_node().await;
        spawn_producer(node);

        let err = client
            .execute(&Command::HealthCheck {
                sender: Address::new("a"),
                address: Address::new("a"),
            })
            .await
            .unwrap_err();
        let inactive = tss_module::Error::InactiveMember(Address::new("a")).code();
        assert!(matches!(err, ClientError::TxFailed { code, .. } if code == inactive));
    }

    #[tokio::test]
    async fn test_event_subscription() {
        let (node, client) = spawn_node().await;
        let mut events = Box::pin(client.subscribe_events().await.unwrap());

        client
            .submit(&Command::Activate {
                sender: Address::new("a"),
                address: Address::new("a"),
            })
            .await
            .unwrap();
        // give the socket task time to subscribe before the block
        tokio::time::sleep(Duration::from_millis(50)).await;
        node.produce_block(Utc::now()).await;

        let block = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(block.block.height, 1);
        assert!(block.events.contains(&Event::MemberActivated {
            address: Address::new("a")
        }));
    }
}
