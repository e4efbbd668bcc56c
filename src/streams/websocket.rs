//! Push-subscription strategy over the RPC WebSocket (`logsSubscribe`).
//!
//! A reader task forwards log notifications into a channel. When the socket
//! drops, the channel closes, `next_batch` reports the loss once, and the
//! call after that reconnects after the configured delay.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::{SourceKind, TransactionEvent, TransactionSource};
use crate::config::CommitmentLevel;
use crate::utils::error::{IndexerError, Result};
use crate::utils::logging;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BATCH: usize = 10;

/// `logsSubscribe` source for one program.
///
/// # Example
///
/// ```
/// # use solana_domain_indexer::streams::websocket::WebSocketSource;
/// # use solana_domain_indexer::config::CommitmentLevel;
/// # use solana_sdk::pubkey::Pubkey;
/// let source = WebSocketSource::new(
///     "ws://api.mainnet-beta.solana.com",
///     Pubkey::default(),
///     CommitmentLevel::Confirmed,
///     5,
/// );
/// ```
pub struct WebSocketSource {
    /// WebSocket URL (ws:// or wss://)
    ws_url: String,
    program_id: Pubkey,
    commitment: CommitmentLevel,
    /// Reconnection delay in seconds
    reconnect_delay_secs: u64,
    reconnect_pending: bool,
    state: WebSocketState,
}

enum WebSocketState {
    Disconnected,
    Connected {
        subscription_id: u64,
        sink: WsSink,
        reader: JoinHandle<()>,
        receiver: mpsc::UnboundedReceiver<TransactionEvent>,
    },
}

/// WebSocket notification from Solana (logsSubscribe)
#[derive(Debug, Deserialize)]
struct LogsNotification {
    params: LogsNotificationParams,
}

#[derive(Debug, Deserialize)]
struct LogsNotificationParams {
    result: LogsNotificationResult,
}

#[derive(Debug, Deserialize)]
struct LogsNotificationResult {
    value: LogsNotificationValue,
    context: LogsNotificationContext,
}

#[derive(Debug, Deserialize)]
struct LogsNotificationContext {
    slot: u64,
}

#[derive(Debug, Deserialize)]
struct LogsNotificationValue {
    signature: String,
    #[serde(default)]
    logs: Vec<String>,
    err: Option<serde_json::Value>,
}

impl From<LogsNotification> for TransactionEvent {
    fn from(notification: LogsNotification) -> Self {
        let LogsNotificationResult { value, context } = notification.params.result;
        TransactionEvent::LogEvent {
            signature: value.signature,
            logs: value.logs,
            err: value.err,
            slot: context.slot,
        }
    }
}

/// Subscription response from Solana
#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    result: u64,
}

#[derive(Debug, Deserialize)]
struct RpcErrorResponse {
    error: serde_json::Value,
}

impl WebSocketSource {
    pub fn new(
        ws_url: impl Into<String>,
        program_id: Pubkey,
        commitment: CommitmentLevel,
        reconnect_delay_secs: u64,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            program_id,
            commitment,
            reconnect_delay_secs,
            reconnect_pending: false,
            state: WebSocketState::Disconnected,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.state, WebSocketState::Connected { .. })
    }

    /// Connects to WebSocket and subscribes to program notifications
    async fn connect(&mut self) -> Result<()> {
        logging::log(
            logging::LogLevel::Info,
            &format!("Connecting to WebSocket: {}", logging::redact_api_key(&self.ws_url)),
        );

        let (ws_stream, _) = connect_async(self.ws_url.as_str()).await.map_err(|e| {
            IndexerError::ConnectionError(format!("WebSocket connection failed: {e}"))
        })?;

        let (mut sink, mut read) = ws_stream.split();

        let subscribe_request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [self.program_id.to_string()] },
                { "commitment": self.commitment.as_str() }
            ]
        });

        sink.send(Message::Text(subscribe_request.to_string()))
            .await
            .map_err(|e| IndexerError::ConnectionError(format!("Failed to send subscription: {e}")))?;

        let confirmation = async {
            while let Some(message) = read.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        return Err(IndexerError::ConnectionError(format!(
                            "WebSocket read failed: {e}"
                        )))
                    }
                };
                if let Ok(response) = serde_json::from_str::<SubscriptionResponse>(&text) {
                    return Ok(response.result);
                }
                if let Ok(rejected) = serde_json::from_str::<RpcErrorResponse>(&text) {
                    return Err(IndexerError::RpcError(format!(
                        "logsSubscribe rejected: {}",
                        rejected.error
                    )));
                }
            }
            Err(IndexerError::ConnectionError(
                "WebSocket closed before subscription was confirmed".to_string(),
            ))
        };

        let subscription_id = timeout(SUBSCRIBE_TIMEOUT, confirmation)
            .await
            .map_err(|_| {
                IndexerError::ConnectionError("Timed out waiting for logsSubscribe".to_string())
            })??;

        logging::log(
            logging::LogLevel::Success,
            &format!("WebSocket subscribed (ID: {subscription_id})"),
        );

        let (tx, rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<LogsNotification>(&text) {
                            Ok(notification) => {
                                if tx.send(notification.into()).is_err() {
                                    break;
                                }
                            }
                            Err(_) => tracing::trace!(payload = %text, "Ignoring non-notification frame"),
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        tracing::warn!(?frame, "WebSocket closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
        });

        self.state = WebSocketState::Connected {
            subscription_id,
            sink,
            reader,
            receiver: rx,
        };

        Ok(())
    }

    /// Connects again, first waiting the reconnect delay if the previous
    /// connection dropped or the previous attempt failed.
    async fn reconnect(&mut self) -> Result<()> {
        if self.reconnect_pending {
            logging::log(
                logging::LogLevel::Warning,
                &format!(
                    "WebSocket disconnected, reconnecting in {}s...",
                    self.reconnect_delay_secs
                ),
            );
            sleep(Duration::from_secs(self.reconnect_delay_secs)).await;
        }
        if let Err(e) = self.connect().await {
            self.reconnect_pending = true;
            return Err(e);
        }
        self.reconnect_pending = false;
        Ok(())
    }

    /// Tears down a connection whose reader has stopped.
    fn mark_dropped(&mut self) {
        if let WebSocketState::Connected { reader, .. } =
            std::mem::replace(&mut self.state, WebSocketState::Disconnected)
        {
            reader.abort();
        }
        self.reconnect_pending = true;
    }
}

#[async_trait]
impl TransactionSource for WebSocketSource {
    async fn initialize(&mut self) -> Result<()> {
        self.connect().await
    }

    /// Waits for the next notifications. A dropped socket is reported as a
    /// `ConnectionError`; the following call reconnects and returns an empty
    /// batch once the subscription is confirmed again.
    async fn next_batch(&mut self) -> Result<Vec<TransactionEvent>> {
        let WebSocketState::Connected { receiver, .. } = &mut self.state else {
            self.reconnect().await?;
            return Ok(Vec::new());
        };

        let Some(first) = receiver.recv().await else {
            self.mark_dropped();
            return Err(IndexerError::ConnectionError(
                "WebSocket connection lost".to_string(),
            ));
        };

        let mut events = vec![first];
        while events.len() < MAX_BATCH {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }
        Ok(events)
    }

    async fn close(&mut self) {
        let state = std::mem::replace(&mut self.state, WebSocketState::Disconnected);
        if let WebSocketState::Connected {
            subscription_id,
            mut sink,
            reader,
            ..
        } = state
        {
            let unsubscribe = json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "logsUnsubscribe",
                "params": [subscription_id]
            });
            if let Err(e) = sink.send(Message::Text(unsubscribe.to_string())).await {
                tracing::debug!(error = %e, "logsUnsubscribe not delivered");
            }
            let _ = sink.close().await;
            reader.abort();
            tracing::info!(subscription_id, "WebSocket subscription closed");
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Subscription
    }

    fn source_name(&self) -> &str {
        "WebSocket"
    }
}
