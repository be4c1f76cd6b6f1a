//! HTTP and WebSocket routes

use crate::node::Node;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use tss_module::rpc::{ErrorResponse, SubmitTxResponse, TxId};
use tss_module::{Command, Error, Query};

pub fn router(node: Node) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/tx", post(submit_tx))
        .route("/v1/tx/:id", get(get_tx))
        .route("/v1/query", post(query))
        .route("/v1/block", get(latest_block))
        .route("/v1/events", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(node)
}

/// Missing records map to 404, every other rejection to 400
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::GroupNotFound(_)
        | Error::MemberNotFound { .. }
        | Error::SigningNotFound(_)
        | Error::ReplacementNotFound(_)
        | Error::GrantNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "tss-node",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn submit_tx(State(node): State<Node>, Json(command): Json<Command>) -> impl IntoResponse {
    let tx_id = node.submit(command).await;
    Json(SubmitTxResponse { tx_id })
}

async fn get_tx(State(node): State<Node>, Path(tx_id): Path<TxId>) -> impl IntoResponse {
    match node.tx_result(&tx_id) {
        Some(result) => Ok(Json(result)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown tx {tx_id}") })),
        )),
    }
}

async fn query(State(node): State<Node>, Json(query): Json<Query>) -> impl IntoResponse {
    match node.query(query).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err((
            status_for(&e),
            Json(ErrorResponse {
                code: e.code(),
                error: e.to_string(),
            }),
        )),
    }
}

async fn latest_block(State(node): State<Node>) -> impl IntoResponse {
    Json(node.latest_block().await)
}

async fn websocket_handler(ws: WebSocketUpgrade, State(node): State<Node>) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_events(socket, node))
}

/// Push every block's events until the client goes away
async fn stream_events(socket: WebSocket, node: Node) {
    let (mut sender, mut receiver) = socket.split();
    let mut blocks = node.subscribe();

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            block = blocks.recv() => match block {
                Ok(block) => {
                    let Ok(text) = serde_json::to_string(&block) else {
                        continue;
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("event subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::Genesis;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use tower::ServiceExt;
    use tss_module::rpc::{TxResult, TxStatus};
    use tss_module::Address;

    fn app() -> (Node, Router) {
        let node = Node::new(Address::new("authority"), Genesis::default(), Utc::now()).unwrap();
        (node.clone(), router(node))
    }

    fn json_request(method: &str, uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_and_fetch_tx() {
        let (node, app) = app();
        let command = Command::Activate {
            sender: Address::new("alice"),
            address: Address::new("alice"),
        };
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/tx",
                serde_json::to_string(&command).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let SubmitTxResponse { tx_id } = body_json(response).await;

        node.produce_block(Utc::now()).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/tx/{tx_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let result: TxResult = body_json(response).await;
        assert!(matches!(result.status, TxStatus::Committed { height: 1, .. }));
    }

    #[tokio::test]
    async fn test_query_errors_carry_codes() {
        let (_, app) = app();
        let query = Query::Group { group_id: 7 };
        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/query",
                serde_json::to_string(&query).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: ErrorResponse = body_json(response).await;
        assert_eq!(error.code, Error::GroupNotFound(7).code());
    }
}
