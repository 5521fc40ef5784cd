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

//! The session (C8): owns one grid engine (C7), one exchange handle (C2), one WebSocket
//! subscription (C5), and drives them through the session lifecycle (spec.md §4.8).

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use grid_core::{Direction, GridType, InstrumentId, Price, SessionId, SessionState};
use grid_execution::{GridEngine, LadderParams, RestorationConfig, StopBounds};
use grid_network::{ExchangeClient, FillNotification, NetworkError, WsConnection};
use rust_decimal::Decimal;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::error::LiveError;

/// Parameters for `/api/grid/start`, mirrored from the request body (spec.md §6).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_id: String,
    pub instrument: InstrumentId,
    pub direction: Direction,
    pub current_price: Price,
    pub upper_bound: Price,
    pub lower_bound: Price,
    pub grid_type: GridType,
    pub grid_ratio: Option<Decimal>,
    pub grid_levels: u32,
    pub total_margin: Decimal,
    pub stop_bot_price: Option<Price>,
    pub stop_top_price: Option<Price>,
}

impl SessionConfig {
    /// Bounds validation per spec.md §6: `lower_bound < current_price < upper_bound`
    /// (inclusive endpoints allowed), plus the band/margin/level sanity checks.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.lower_bound > self.current_price || self.current_price > self.upper_bound {
            return Err("current_price must lie within [lower_bound, upper_bound]".into());
        }
        if self.grid_levels < 2 {
            return Err("grid_levels must be >= 2".into());
        }
        if self.total_margin <= Decimal::ZERO {
            return Err("total_margin must be > 0".into());
        }
        if matches!(self.grid_type, GridType::Geometric) && self.grid_ratio.is_none() {
            return Err("grid_ratio is required for GEOMETRIC grids".into());
        }
        if let Some(stop_bot) = self.stop_bot_price
            && stop_bot >= self.lower_bound
        {
            return Err("stop_bot_price must be below lower_bound".into());
        }
        if let Some(stop_top) = self.stop_top_price
            && stop_top <= self.upper_bound
        {
            return Err("stop_top_price must be above upper_bound".into());
        }
        Ok(())
    }
}

/// A point-in-time snapshot returned by `status()` and `stop()` (spec.md §4.8).
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub state: SessionState,
    pub open_order_count: usize,
    pub warnings: Vec<String>,
}

/// A minimal profit snapshot: realized PnL is approximated from completed buy/sell cycles; a
/// full accounting ledger is out of scope for this engine (spec.md's Non-goals exclude a
/// dedicated accounting subsystem).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProfitReport {
    pub filled_cycle_count: u64,
    pub realized_pnl: Decimal,
}

/// The C8 session: one grid engine, one exchange handle, one WS subscription.
pub struct Session {
    session_id: SessionId,
    state: Mutex<SessionState>,
    engine: Mutex<GridEngine>,
    ws: Arc<WsConnection>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
    profit: Mutex<ProfitReport>,
    /// Taken by `start()` to spawn the fill-dispatch task; `None` afterwards.
    fill_rx: Mutex<Option<mpsc::UnboundedReceiver<FillNotification>>>,
    /// The most recently observed traded price, seeded from the session's starting price and
    /// updated on every fill; fed to the restoration ticker's price-deviation guard since the
    /// engine has no independent price feed of its own (spec.md §4.7 "Order sync").
    last_price: Mutex<Decimal>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("session_id", &self.session_id).finish()
    }
}

impl Session {
    /// Constructs a session's ladder and engine without placing any orders or connecting the
    /// WebSocket; callers drive the remaining lifecycle via [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::Execution`] if `config` fails ladder construction.
    pub fn new(
        session_id: SessionId,
        config: &SessionConfig,
        exchange: Arc<dyn ExchangeClient>,
        ws: Arc<WsConnection>,
        fill_rx: mpsc::UnboundedReceiver<FillNotification>,
    ) -> Result<Self, LiveError> {
        let params = LadderParams {
            lower_bound: config.lower_bound,
            upper_bound: config.upper_bound,
            grid_type: config.grid_type,
            grid_ratio: config.grid_ratio,
            grid_levels: config.grid_levels,
            total_margin: config.total_margin,
            current_price: config.current_price,
            direction: config.direction,
        };
        let stop_bounds =
            StopBounds { stop_top_price: config.stop_top_price, stop_bot_price: config.stop_bot_price };
        let engine = GridEngine::new(
            config.instrument.clone(),
            params,
            exchange,
            stop_bounds,
            RestorationConfig::default(),
        )?;

        Ok(Self {
            session_id,
            state: Mutex::new(SessionState::Creating),
            engine: Mutex::new(engine),
            ws,
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            profit: Mutex::new(ProfitReport::default()),
            fill_rx: Mutex::new(Some(fill_rx)),
            last_price: Mutex::new(config.current_price),
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Places the initial ladder, transitions Creating → Running on first successful placement
    /// (spec.md §3's lifecycle rule), and spawns the two background tasks that drive the session
    /// for the rest of its life: the fill-dispatch loop (draining WS fill notifications into the
    /// engine) and the order-sync ticker (spec.md §4.7 "Order sync").
    pub async fn start(self: &Arc<Self>) -> Vec<String> {
        let mut warnings = Vec::new();
        let signals = self.engine.lock().await.place_initial_ladder().await;
        for signal in signals {
            warnings.push(format!("{signal:?}"));
        }
        *self.state.lock().await = SessionState::Running;
        info!(session_id = %self.session_id, "session transitioned to running");

        if let Some(fill_rx) = self.fill_rx.lock().await.take() {
            let this = Arc::clone(self);
            self.track_task(tokio::spawn(this.run_fill_dispatch(fill_rx))).await;
        }

        let interval_secs = self.engine.lock().await.restoration_config().order_sync_interval_seconds;
        let this = Arc::clone(self);
        self.track_task(tokio::spawn(this.run_order_sync(interval_secs))).await;

        warnings
    }

    /// Drains fill notifications from the WebSocket handler and reacts to each through the engine,
    /// tracking the most recently traded price for the order-sync ticker's price-deviation guard
    /// and checking it against the session's stop bounds (spec.md §4.7 "Bound/stop behaviour").
    async fn run_fill_dispatch(self: Arc<Self>, mut fill_rx: mpsc::UnboundedReceiver<FillNotification>) {
        while let Some(fill) = fill_rx.recv().await {
            *self.last_price.lock().await = fill.executed_price;
            let triggered = {
                let mut engine = self.engine.lock().await;
                if let Err(error) = engine
                    .react_to_fill(&fill.order_id, fill.exchange_timestamp, fill.executed_quantity)
                    .await
                {
                    warn!(session_id = %self.session_id, %error, order_id = %fill.order_id, "failed to react to fill");
                }
                self.check_stop_bounds(&mut engine, fill.executed_price).await
            };
            if triggered {
                self.stop().await;
                return;
            }
        }
    }

    /// Periodically reconciles tracked open orders against a fresh exchange snapshot, restoring
    /// externally-cancelled orders per the configured policy, and re-checks the stop bounds against
    /// the latest observed price (spec.md §4.7 "Order sync", "Bound/stop behaviour").
    async fn run_order_sync(self: Arc<Self>, interval_secs: u64) {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        interval.tick().await; // first tick fires immediately; skip it, the ladder was just placed
        loop {
            interval.tick().await;
            let now_ms = chrono::Utc::now().timestamp_millis();
            let current_price = *self.last_price.lock().await;
            let triggered = {
                let mut engine = self.engine.lock().await;
                if let Err(error) = engine.reconcile_orders(now_ms, current_price).await {
                    warn!(session_id = %self.session_id, %error, "order-sync reconciliation failed");
                }
                self.check_stop_bounds(&mut engine, current_price).await
            };
            if triggered {
                self.stop().await;
                return;
            }
        }
    }

    /// Checks `current_price` against the engine's configured stop bounds; if crossed, the engine
    /// has already cancelled all open orders, and this returns `true` so the caller can drive the
    /// Stopping→Stopped transition through [`Self::stop`] (spec.md §4.7 "Bound/stop behaviour").
    async fn check_stop_bounds(&self, engine: &mut GridEngine, current_price: Price) -> bool {
        match engine.check_stop_bounds(current_price).await {
            Ok(Some(signal)) => {
                info!(session_id = %self.session_id, ?signal, "stop bound crossed; stopping session");
                true
            }
            Ok(None) => false,
            Err(error) => {
                warn!(session_id = %self.session_id, %error, "failed to check stop bounds");
                false
            }
        }
    }

    /// Reconnects the session's WebSocket subscription; used by the recovery supervisor's
    /// `WebSocketReconnectAction` (spec.md §4.11).
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::ReconnectExhausted`] if `max_attempts` is exceeded.
    pub async fn reconnect_ws(&self, max_attempts: u32) -> Result<(), NetworkError> {
        self.ws.reconnect(max_attempts).await
    }

    /// Registers a background task (WS reader, restoration ticker, health ping) so `stop()` can
    /// cancel it as part of teardown (spec.md §5 "Cancellation").
    pub async fn track_task(&self, handle: JoinHandle<()>) {
        self.tasks.lock().await.push(handle);
    }

    #[must_use]
    pub async fn status(&self) -> SessionStatus {
        let state = *self.state.lock().await;
        let open_order_count = self.engine.lock().await.tracker().open_order_count();
        SessionStatus { session_id: self.session_id.clone(), state, open_order_count, warnings: Vec::new() }
    }

    #[must_use]
    pub async fn profit_report(&self) -> ProfitReport {
        self.profit.lock().await.clone()
    }

    /// Cancels all known open orders (best-effort), closes the WS connection, aborts tracked
    /// background tasks, and transitions to Stopped. Idempotent: a second call is a no-op that
    /// returns the already-Stopped status (spec.md §4.8, §5 "Cancellation").
    pub async fn stop(&self) -> SessionStatus {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return self.status().await;
        }

        let mut warnings = Vec::new();
        *self.state.lock().await = SessionState::Stopping;

        {
            let engine = self.engine.lock().await;
            if let Err(error) = engine.cancel_all().await {
                warn!(session_id = %self.session_id, %error, "best-effort cancel-all failed during stop");
                warnings.push(format!("cancel_all_orders failed: {error}"));
            }
        }

        self.ws.close().await;

        for handle in self.tasks.lock().await.drain(..) {
            handle.abort();
        }

        *self.state.lock().await = SessionState::Stopped;
        info!(session_id = %self.session_id, "session stopped");

        SessionStatus {
            session_id: self.session_id.clone(),
            state: SessionState::Stopped,
            open_order_count: 0,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use grid_core::{Direction, OrderSide, Qty};
    use grid_network::{
        AccountInfo, CreatedOrder, ExchangeOrder, ExchangeOrderId, NetworkError, OrderFilters,
        Position,
    };
    use rust_decimal_macros::dec;

    use super::*;

    #[derive(Debug, Default)]
    struct StubExchange;

    #[async_trait]
    impl ExchangeClient for StubExchange {
        async fn create_limit_order(
            &self,
            _instrument: &InstrumentId,
            _side: OrderSide,
            _price: Price,
            _qty: Qty,
        ) -> Result<CreatedOrder, NetworkError> {
            Ok(CreatedOrder { order_id: ExchangeOrderId("o1".into()) })
        }

        async fn cancel_order(
            &self,
            _instrument: &InstrumentId,
            _order_id: &ExchangeOrderId,
        ) -> Result<(), NetworkError> {
            Ok(())
        }

        async fn cancel_all_orders(&self, _instrument: &InstrumentId) -> Result<(), NetworkError> {
            Ok(())
        }

        async fn get_account_info(&self) -> Result<AccountInfo, NetworkError> {
            Ok(AccountInfo { total_collateral: dec!(0), free_collateral: dec!(0) })
        }

        async fn get_positions(&self) -> Result<Vec<Position>, NetworkError> {
            Ok(Vec::new())
        }

        async fn get_orders(&self, _filters: OrderFilters) -> Result<Vec<ExchangeOrder>, NetworkError> {
            Ok(Vec::new())
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            user_id: "u1".into(),
            instrument: InstrumentId::parse("PERP_BTC_USDC").unwrap(),
            direction: Direction::Both,
            current_price: dec!(100),
            upper_bound: dec!(110),
            lower_bound: dec!(90),
            grid_type: GridType::Arithmetic,
            grid_ratio: None,
            grid_levels: 4,
            total_margin: dec!(400),
            stop_bot_price: None,
            stop_top_price: None,
        }
    }

    fn test_ws() -> Arc<WsConnection> {
        Arc::new(WsConnection::new("ws://localhost:0", "token", Arc::new(|_| {})))
    }

    fn test_fill_channel() -> mpsc::UnboundedReceiver<FillNotification> {
        mpsc::unbounded_channel().1
    }

    #[test]
    fn validate_rejects_price_outside_band() {
        let mut config = test_config();
        config.current_price = dec!(200);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_geometric_without_ratio() {
        let mut config = test_config();
        config.grid_type = GridType::Geometric;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        assert!(test_config().validate().is_ok());
    }

    #[tokio::test]
    async fn start_transitions_to_running() {
        let config = test_config();
        let session_id = SessionId::new(&config.user_id, &config.instrument);
        let session = Arc::new(
            Session::new(session_id, &config, Arc::new(StubExchange), test_ws(), test_fill_channel())
                .unwrap(),
        );
        session.start().await;
        assert_eq!(session.status().await.state, SessionState::Running);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let config = test_config();
        let session_id = SessionId::new(&config.user_id, &config.instrument);
        let session = Arc::new(
            Session::new(session_id, &config, Arc::new(StubExchange), test_ws(), test_fill_channel())
                .unwrap(),
        );
        session.start().await;

        let first = session.stop().await;
        let second = session.stop().await;
        assert_eq!(first.state, SessionState::Stopped);
        assert_eq!(second.state, SessionState::Stopped);
    }

    #[tokio::test]
    async fn fill_dispatch_reacts_to_a_queued_fill() {
        let config = test_config();
        let session_id = SessionId::new(&config.user_id, &config.instrument);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(
            Session::new(session_id, &config, Arc::new(StubExchange), test_ws(), rx).unwrap(),
        );
        session.start().await;

        let order_id = {
            let engine = session.engine.lock().await;
            engine.tracker().order_at_level(dec!(95)).unwrap().to_string()
        };
        tx.send(FillNotification {
            order_id,
            symbol: "PERP_BTC_USDC".into(),
            side: "BUY".into(),
            executed_price: dec!(95),
            executed_quantity: dec!(1),
            exchange_timestamp: 1,
        })
        .unwrap();

        // Give the spawned fill-dispatch task a chance to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(*session.last_price.lock().await, dec!(95));
        session.stop().await;
    }

    #[tokio::test]
    async fn fill_crossing_stop_top_price_stops_the_session() {
        let mut config = test_config();
        config.stop_top_price = Some(dec!(111));
        let session_id = SessionId::new(&config.user_id, &config.instrument);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(
            Session::new(session_id, &config, Arc::new(StubExchange), test_ws(), rx).unwrap(),
        );
        session.start().await;

        tx.send(FillNotification {
            order_id: "unrelated".into(),
            symbol: "PERP_BTC_USDC".into(),
            side: "SELL".into(),
            executed_price: dec!(112),
            executed_quantity: dec!(1),
            exchange_timestamp: 1,
        })
        .unwrap();

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(session.status().await.state, SessionState::Stopped);
    }
}
