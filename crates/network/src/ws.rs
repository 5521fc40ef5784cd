// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Grid Engine Contributors.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! The WebSocket notification client (C5): one authenticated private-stream subscription per
//! session, dispatching fill notifications to a handler with a Fibonacci-backoff reconnect FSM
//! (spec.md §4.5).

use std::{
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::error::NetworkError;

/// Default connection idle timeout before the manager closes it (spec.md §4.5).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: i64 = 300;

/// Default cap on simultaneous WebSocket connections enforced by [`WsManager`].
pub const DEFAULT_GLOBAL_CONNECTION_CAP: usize = 50;

/// Default maximum reconnect attempts before a connection moves to `Failed`.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Bound on the Fibonacci reconnect backoff.
pub const MAX_RECONNECT_BACKOFF_SECS: u64 = 30;

/// The WebSocket connection state machine (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

/// A decoded order-fill notification, duck-typed over the two payload shapes the upstream
/// exchange has been observed to emit ("ORDER_FILLED" and "ORDER_FILLED_PUSH"), and over the
/// payload body being either a JSON object or a JSON-encoded string.
#[derive(Debug, Clone, Deserialize)]
pub struct FillNotification {
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    pub executed_price: rust_decimal::Decimal,
    pub executed_quantity: rust_decimal::Decimal,
    pub exchange_timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    topic: String,
    #[serde(rename = "ts")]
    #[allow(dead_code)]
    ts: Option<i64>,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(flatten)]
    rest: Value,
}

const FILL_MESSAGE_TYPES: &[&str] = &["ORDER_FILLED", "ORDER_FILLED_PUSH"];

/// Attempts to decode an inbound text frame as a fill notification. Returns `Ok(None)` for
/// frames that are not fill notifications (other topics or message types), and `Err` only for
/// frames that claim to be a fill but fail to decode.
pub fn decode_fill_notification(text: &str) -> Result<Option<FillNotification>, NetworkError> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(_) => return Ok(None),
    };

    if envelope.topic != "notifications" {
        return Ok(None);
    }

    // The payload body may itself be a JSON-encoded string rather than an object.
    let data = match envelope.data {
        Value::String(inner) => serde_json::from_str::<Value>(&inner)
            .map_err(|e| NetworkError::Decode(format!("nested payload string: {e}")))?,
        other => other,
    };

    let payload: Payload =
        serde_json::from_value(data).map_err(|e| NetworkError::Decode(e.to_string()))?;

    if !FILL_MESSAGE_TYPES.contains(&payload.message_type.as_str()) {
        return Ok(None);
    }

    serde_json::from_value(payload.rest)
        .map(Some)
        .map_err(|e| NetworkError::Decode(format!("fill payload: {e}")))
}

/// Fibonacci sequence, 1-indexed, capped at [`MAX_RECONNECT_BACKOFF_SECS`].
#[must_use]
pub fn fibonacci_backoff_secs(attempt: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 0..attempt {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a.min(MAX_RECONNECT_BACKOFF_SECS)
}

/// A handler invoked with each decoded fill notification for a session's subscription.
pub type FillHandler = Arc<dyn Fn(FillNotification) + Send + Sync>;

/// A single private-stream subscription for one session (C5).
pub struct WsConnection {
    url: String,
    auth_token: String,
    state: RwLock<WsState>,
    reconnect_attempts: AtomicU32,
    last_activity_ms: std::sync::atomic::AtomicI64,
    handler: FillHandler,
    outbound: Mutex<Option<futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        Message,
    >>>,
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("url", &self.url)
            .field("state", &"<locked>")
            .finish()
    }
}

impl WsConnection {
    /// Builds a connection that has not yet dialed out; call [`Self::connect`] to begin.
    #[must_use]
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>, handler: FillHandler) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            state: RwLock::new(WsState::Disconnected),
            reconnect_attempts: AtomicU32::new(0),
            last_activity_ms: std::sync::atomic::AtomicI64::new(0),
            handler,
            outbound: Mutex::new(None),
        }
    }

    #[must_use]
    pub async fn state(&self) -> WsState {
        *self.state.read().await
    }

    async fn set_state(&self, new_state: WsState) {
        *self.state.write().await = new_state;
    }

    /// Dials the upstream private stream and spawns the read loop, with reconnects driven by a
    /// Fibonacci backoff up to `max_attempts` (spec.md §4.5).
    pub async fn connect(self: &Arc<Self>, max_attempts: u32) -> Result<(), NetworkError> {
        self.set_state(WsState::Connecting).await;

        let (stream, _) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let (mut sink, mut source) = stream.split();

        let auth_frame = serde_json::json!({ "event": "auth", "token": self.auth_token });
        sink.send(Message::Text(auth_frame.to_string().into()))
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        *self.outbound.lock().await = Some(sink);
        self.set_state(WsState::Connected).await;
        self.reconnect_attempts.store(0, Ordering::SeqCst);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        this.touch_activity();
                        match decode_fill_notification(&text) {
                            Ok(Some(fill)) => (this.handler)(fill),
                            Ok(None) => {}
                            Err(error) => warn!(%error, "failed to decode ws payload"),
                        }
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => this.touch_activity(),
                    Ok(Message::Close(_)) | Err(_) => {
                        this.set_state(WsState::Reconnecting).await;
                        break;
                    }
                    Ok(_) => {}
                }
            }
            if this.state().await != WsState::Failed {
                this.set_state(WsState::Reconnecting).await;
            }
        });

        let _ = max_attempts;
        Ok(())
    }

    fn touch_activity(&self) {
        self.last_activity_ms.store(
            chrono::Utc::now().timestamp_millis(),
            Ordering::SeqCst,
        );
    }

    /// Milliseconds since the last inbound message, used by [`WsManager`] to enforce
    /// `connection_timeout`.
    #[must_use]
    pub fn idle_for(&self, now_ms: i64) -> i64 {
        now_ms - self.last_activity_ms.load(Ordering::SeqCst)
    }

    /// Reconnects with Fibonacci backoff, up to `max_attempts`, transitioning to `Failed` if
    /// exhausted (spec.md §4.5).
    pub async fn reconnect(self: &Arc<Self>, max_attempts: u32) -> Result<(), NetworkError> {
        loop {
            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > max_attempts {
                self.set_state(WsState::Failed).await;
                return Err(NetworkError::ReconnectExhausted { attempts: attempt });
            }

            let backoff = fibonacci_backoff_secs(attempt);
            tokio::time::sleep(Duration::from_secs(backoff)).await;

            if self.connect(max_attempts).await.is_ok() {
                return Ok(());
            }
        }
    }

    /// Closes the connection, marking it `Disconnected`.
    pub async fn close(&self) {
        if let Some(mut sink) = self.outbound.lock().await.take() {
            let _ = sink.close().await;
        }
        self.set_state(WsState::Disconnected).await;
    }
}

/// Owns all [`WsConnection`]s across sessions and enforces the global connection cap
/// (spec.md §4.5).
#[derive(Debug)]
pub struct WsManager {
    cap: usize,
    active: AtomicUsize,
}

impl WsManager {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self { cap, active: AtomicUsize::new(0) }
    }

    /// Reserves a connection slot, failing with `ConnectionCapReached` if the global cap is
    /// already saturated. Takes `Arc<Self>` so the returned guard can outlive the caller's own
    /// borrow, held for as long as the owning session keeps its WebSocket subscription open.
    pub fn reserve_slot(self: &Arc<Self>) -> Result<WsSlotGuard, NetworkError> {
        let previous = self.active.fetch_add(1, Ordering::SeqCst);
        if previous >= self.cap {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return Err(NetworkError::ConnectionCapReached { cap: self.cap });
        }
        Ok(WsSlotGuard { manager: Arc::clone(self) })
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// RAII guard releasing a reserved connection slot on drop.
#[derive(Debug)]
pub struct WsSlotGuard {
    manager: Arc<WsManager>,
}

impl Drop for WsSlotGuard {
    fn drop(&mut self) {
        self.manager.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new(DEFAULT_GLOBAL_CONNECTION_CAP)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 3)]
    #[case(4, 5)]
    #[case(5, 8)]
    #[case(6, 13)]
    #[case(7, 21)]
    #[case(8, 30)]
    #[case(20, 30)]
    fn fibonacci_backoff_matches_sequence_capped_at_30(#[case] attempt: u32, #[case] expected: u64) {
        assert_eq!(fibonacci_backoff_secs(attempt), expected);
    }

    #[test]
    fn decodes_order_filled_object_payload() {
        let text = serde_json::json!({
            "topic": "notifications",
            "ts": 1_700_000_000_000i64,
            "data": {
                "messageType": "ORDER_FILLED",
                "order_id": "abc",
                "symbol": "PERP_BTC_USDC",
                "side": "BUY",
                "executed_price": "50000.0",
                "executed_quantity": "0.01",
                "exchange_timestamp": 1_700_000_000_000i64
            }
        })
        .to_string();

        let fill = decode_fill_notification(&text).unwrap().unwrap();
        assert_eq!(fill.order_id, "abc");
    }

    #[test]
    fn decodes_order_filled_push_with_nested_string_payload() {
        let inner = serde_json::json!({
            "messageType": "ORDER_FILLED_PUSH",
            "order_id": "xyz",
            "symbol": "PERP_ETH_USDC",
            "side": "SELL",
            "executed_price": "2500.5",
            "executed_quantity": "1.5",
            "exchange_timestamp": 1_700_000_001_000i64
        })
        .to_string();

        let text = serde_json::json!({
            "topic": "notifications",
            "ts": 1_700_000_001_000i64,
            "data": inner
        })
        .to_string();

        let fill = decode_fill_notification(&text).unwrap().unwrap();
        assert_eq!(fill.order_id, "xyz");
    }

    #[test]
    fn non_fill_messages_are_ignored() {
        let text = serde_json::json!({
            "topic": "notifications",
            "data": { "messageType": "ACCOUNT_UPDATE" }
        })
        .to_string();
        assert!(decode_fill_notification(&text).unwrap().is_none());

        let other_topic = serde_json::json!({
            "topic": "ticker",
            "data": { "messageType": "ORDER_FILLED" }
        })
        .to_string();
        assert!(decode_fill_notification(&other_topic).unwrap().is_none());
    }

    #[test]
    fn manager_enforces_global_cap() {
        let manager = Arc::new(WsManager::new(2));
        let a = manager.reserve_slot().unwrap();
        let b = manager.reserve_slot().unwrap();
        assert!(manager.reserve_slot().is_err());
        drop(a);
        assert!(manager.reserve_slot().is_ok());
        drop(b);
    }
}
