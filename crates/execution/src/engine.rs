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

//! The grid engine (C7): ladder placement, fill reaction, bound/stop behaviour, and order
//! restoration, wired together over C2 (exchange client) and C6 (order tracker)
//! (spec.md §4.7).

use std::{collections::HashSet, sync::Arc};

use grid_core::{InstrumentId, OrderSide, Price, Qty};
use grid_network::{CreatedOrder, ExchangeClient, OrderFilters};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    error::ExecutionError,
    ladder::{build_ladder, Ladder, LadderParams},
    restoration::{
        classify_cancel_reason, decide_restoration, RestorationConfig, RestorationRateLimiter,
    },
    tracker::OrderTracker,
};

/// A signal the engine emits for the session (and ultimately C11/metrics) to observe.
#[derive(Debug, Clone)]
pub enum EngineSignal {
    /// A level's create order was retried and ultimately failed; it awaits restoration.
    LevelAwaitingRestoration { price: Price },
    /// Current price crossed a stop bound; the session should move to Stopping.
    StopTriggered { price: Price },
    /// A counter-order was suppressed because the target level already holds an order of the
    /// same side (spec.md §4.7 tie-break rule).
    CounterOrderSuppressed { price: Price, side: OrderSide },
}

/// Price tolerance for counter-price/grid-level coincidence comparisons, approximating the
/// exchange's price tick (spec.md §4.7's tie-break rule).
#[derive(Debug, Clone, Copy)]
pub struct PriceTick(pub Decimal);

impl Default for PriceTick {
    fn default() -> Self {
        Self(Decimal::new(1, 8))
    }
}

/// Bound/stop configuration (spec.md §4.7, §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct StopBounds {
    pub stop_top_price: Option<Price>,
    pub stop_bot_price: Option<Price>,
}

impl StopBounds {
    /// Whether `current_price` has crossed either configured stop bound.
    #[must_use]
    pub fn is_triggered(&self, current_price: Price) -> bool {
        self.stop_top_price.is_some_and(|top| current_price > top)
            || self.stop_bot_price.is_some_and(|bot| current_price < bot)
    }
}

/// The C7 grid engine for a single session.
pub struct GridEngine {
    instrument: InstrumentId,
    ladder: Ladder,
    tracker: OrderTracker,
    exchange: Arc<dyn ExchangeClient>,
    tick: PriceTick,
    stop_bounds: StopBounds,
    restoration_config: RestorationConfig,
    restoration_limiter: RestorationRateLimiter,
    awaiting_restoration: Vec<Price>,
}

impl std::fmt::Debug for GridEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridEngine")
            .field("instrument", &self.instrument)
            .field("levels", &self.ladder.levels.len())
            .field("stop_bounds", &self.stop_bounds)
            .finish()
    }
}

impl GridEngine {
    /// Builds the engine and its fixed ladder from session parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::InvalidLadder`] if `params` fail ladder construction
    /// validation (spec.md §4.7).
    pub fn new(
        instrument: InstrumentId,
        params: LadderParams,
        exchange: Arc<dyn ExchangeClient>,
        stop_bounds: StopBounds,
        restoration_config: RestorationConfig,
    ) -> Result<Self, ExecutionError> {
        let ladder = build_ladder(params)?;
        Ok(Self {
            instrument,
            ladder,
            tracker: OrderTracker::new(),
            exchange,
            tick: PriceTick::default(),
            stop_bounds,
            restoration_config,
            restoration_limiter: RestorationRateLimiter::new(),
            awaiting_restoration: Vec::new(),
        })
    }

    #[must_use]
    pub fn tracker(&self) -> &OrderTracker {
        &self.tracker
    }

    #[must_use]
    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    /// Cancels every order for this session's instrument through C2, best-effort; used by the
    /// owning session's `stop()` (spec.md §4.8).
    pub async fn cancel_all(&self) -> Result<(), grid_network::NetworkError> {
        self.exchange.cancel_all_orders(&self.instrument).await
    }

    /// Places the initial ladder: one Create call per level through C2 into C6. A level whose
    /// create ultimately fails (after C2's own retries) is marked "awaiting restoration" rather
    /// than aborting the whole placement (spec.md §4.7 "Initial placement").
    pub async fn place_initial_ladder(&mut self) -> Vec<EngineSignal> {
        let mut signals = Vec::new();
        let levels = self.ladder.levels.clone();

        for level in levels {
            match self
                .exchange
                .create_limit_order(&self.instrument, level.side, level.price, level.quantity)
                .await
            {
                Ok(CreatedOrder { order_id }) => {
                    if let Err(error) = self.tracker.register_new(
                        order_id.0,
                        level.price,
                        level.side,
                        level.quantity,
                        level.price,
                    ) {
                        warn!(%error, price = %level.price, "failed to register placed order");
                    }
                }
                Err(error) => {
                    warn!(%error, price = %level.price, "initial placement failed for grid level");
                    self.awaiting_restoration.push(level.price);
                    signals.push(EngineSignal::LevelAwaitingRestoration { price: level.price });
                }
            }
        }

        signals
    }

    /// Reacts to a fill at `order_id`, emitting the opposite-side counter-order one step away,
    /// unless the counter-price falls outside the band or coincides with an already-occupied
    /// level of the same side (spec.md §4.7 "Fill reaction").
    ///
    /// Returns `Ok(None)` if the fill was a re-delivery (tracker dedup) and no action was taken.
    pub async fn react_to_fill(
        &mut self,
        order_id: &str,
        exchange_timestamp: i64,
        executed_quantity: Qty,
    ) -> Result<Option<EngineSignal>, ExecutionError> {
        let Some(order) = self.tracker.lookup_by_id(order_id).cloned() else {
            return Err(ExecutionError::UnknownOrder(order_id.to_string()));
        };

        let is_new = self.tracker.mark_filled(order_id, exchange_timestamp, executed_quantity)?;
        if !is_new {
            return Ok(None);
        }

        let counter_side = order.side.opposite();
        let counter_price = match order.side {
            OrderSide::Buy => self.ladder.spacing.step_up(order.price),
            OrderSide::Sell => self.ladder.spacing.step_down(order.price),
        };

        let in_band = counter_price >= self.ladder.lower_bound && counter_price <= self.ladder.upper_bound;
        if !in_band {
            info!(price = %order.price, "counter-price outside band; level retired");
            return Ok(None);
        }

        if let Some(existing_id) = self.tracker.order_at_level(counter_price)
            && let Some(existing) = self.tracker.lookup_by_id(existing_id)
            && existing.side == counter_side
            && (existing.price - counter_price).abs() <= self.tick.0
        {
            return Ok(Some(EngineSignal::CounterOrderSuppressed {
                price: counter_price,
                side: counter_side,
            }));
        }

        let quantity = order.quantity;
        let created = self
            .exchange
            .create_limit_order(&self.instrument, counter_side, counter_price, quantity)
            .await?;
        self.tracker.register_new(
            created.order_id.0,
            counter_price,
            counter_side,
            quantity,
            counter_price,
        )?;

        Ok(None)
    }

    /// Checks `current_price` against the configured stop bounds, cancelling all open orders and
    /// emitting [`EngineSignal::StopTriggered`] if crossed (spec.md §4.7 "Bound/stop behaviour").
    pub async fn check_stop_bounds(
        &mut self,
        current_price: Price,
    ) -> Result<Option<EngineSignal>, ExecutionError> {
        if !self.stop_bounds.is_triggered(current_price) {
            return Ok(None);
        }

        self.exchange.cancel_all_orders(&self.instrument).await?;
        Ok(Some(EngineSignal::StopTriggered { price: current_price }))
    }

    /// Handles a C5-reported cancellation with no corresponding local request: classifies the
    /// reason, consults the restoration policy/guards, and recreates the order if permitted
    /// (spec.md §4.7 "Order restoration policy").
    pub async fn handle_external_cancel(
        &mut self,
        order_id: &str,
        raw_reason: &str,
        cancelled_at_ms: i64,
        now_ms: i64,
        current_price: Price,
    ) -> Result<bool, ExecutionError> {
        let order = self.tracker.mark_cancelled(order_id)?;

        let reason = classify_cancel_reason(raw_reason);
        let should_restore = decide_restoration(
            &self.restoration_config,
            reason,
            cancelled_at_ms,
            now_ms,
            order.price,
            current_price,
            &mut self.restoration_limiter,
        );

        if !should_restore {
            return Ok(false);
        }

        let created = self
            .exchange
            .create_limit_order(&self.instrument, order.side, order.price, order.quantity)
            .await?;
        self.tracker.register_new(created.order_id.0, order.price, order.side, order.quantity, order.price)?;
        Ok(true)
    }

    #[must_use]
    pub fn restoration_config(&self) -> &RestorationConfig {
        &self.restoration_config
    }

    /// Diffs the tracker's locally-`Open` orders against a fresh exchange snapshot, routing every
    /// order that has vanished upstream without a corresponding local cancel request through
    /// [`Self::handle_external_cancel`] classified as `EXTERNAL_CANCEL_DETECTED`. Driven
    /// periodically by the owning session at `restoration_config().order_sync_interval_seconds`
    /// (spec.md §4.7 "Order sync").
    ///
    /// # Errors
    ///
    /// Returns [`grid_network::NetworkError`] if the exchange snapshot itself fails.
    pub async fn reconcile_orders(
        &mut self,
        now_ms: i64,
        current_price: Price,
    ) -> Result<(), grid_network::NetworkError> {
        let remote = self
            .exchange
            .get_orders(OrderFilters { instrument: Some(self.instrument.clone()), status: None })
            .await?;
        let remote_ids: HashSet<&str> = remote.iter().map(|o| o.order_id.0.as_str()).collect();

        for order_id in self.tracker.open_order_ids() {
            if remote_ids.contains(order_id.as_str()) {
                continue;
            }

            info!(%order_id, "order vanished from exchange snapshot without local cancel; treating as external cancel");
            match self
                .handle_external_cancel(
                    &order_id,
                    "EXTERNAL_CANCEL_DETECTED",
                    now_ms,
                    now_ms,
                    current_price,
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    info!(%order_id, "externally-cancelled order not eligible for restoration");
                }
                Err(error) => {
                    warn!(%order_id, %error, "failed to handle externally-detected cancel during reconciliation");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use grid_core::Direction;
    use grid_network::{
        AccountInfo, ExchangeOrder, ExchangeOrderId, NetworkError, OrderFilters, Position,
    };
    use rust_decimal_macros::dec;

    use super::*;

    #[derive(Debug, Default)]
    struct StubExchange {
        next_id: Mutex<u64>,
        placed: Mutex<Vec<(OrderSide, Price, Qty)>>,
        remote_snapshot: Mutex<Option<Vec<ExchangeOrder>>>,
    }

    #[async_trait]
    impl ExchangeClient for StubExchange {
        async fn create_limit_order(
            &self,
            _instrument: &InstrumentId,
            side: OrderSide,
            price: Price,
            qty: Qty,
        ) -> Result<CreatedOrder, NetworkError> {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            self.placed.lock().unwrap().push((side, price, qty));
            Ok(CreatedOrder { order_id: ExchangeOrderId(format!("o{next_id}")) })
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
            Ok(self.remote_snapshot.lock().unwrap().clone().unwrap_or_default())
        }
    }

    fn test_engine() -> GridEngine {
        test_engine_with_exchange().0
    }

    fn test_engine_with_exchange() -> (GridEngine, Arc<StubExchange>) {
        let instrument = InstrumentId::parse("PERP_BTC_USDC").unwrap();
        let params = LadderParams {
            lower_bound: dec!(90),
            upper_bound: dec!(110),
            grid_type: grid_core::GridType::Arithmetic,
            grid_ratio: None,
            grid_levels: 4,
            total_margin: dec!(400),
            current_price: dec!(97),
            direction: Direction::Both,
        };
        let exchange = Arc::new(StubExchange::default());
        let engine = GridEngine::new(
            instrument,
            params,
            Arc::clone(&exchange) as Arc<dyn ExchangeClient>,
            StopBounds::default(),
            RestorationConfig::default(),
        )
        .unwrap();
        (engine, exchange)
    }

    #[tokio::test]
    async fn initial_placement_registers_every_level() {
        let mut engine = test_engine();
        let signals = engine.place_initial_ladder().await;
        assert!(signals.is_empty());
        assert_eq!(engine.tracker().open_order_count(), 3);
    }

    #[tokio::test]
    async fn fill_on_buy_emits_sell_counter_order_one_step_up() {
        let mut engine = test_engine();
        engine.place_initial_ladder().await;

        let buy_order_id = engine.tracker().order_at_level(dec!(95)).unwrap().to_string();
        let result = engine.react_to_fill(&buy_order_id, 1, dec!(1)).await.unwrap();

        // Counter price is 95 + step(5) = 100, already held by a SELL — suppressed by tie-break.
        assert!(matches!(
            result,
            Some(EngineSignal::CounterOrderSuppressed { price, side })
                if price == dec!(100) && side == OrderSide::Sell
        ));
        assert!(engine.tracker().is_level_occupied(dec!(100)));
    }

    #[tokio::test]
    async fn stop_bound_crossing_triggers_stop_signal() {
        let mut engine = test_engine();
        engine.place_initial_ladder().await;
        engine.stop_bounds = StopBounds { stop_top_price: Some(dec!(108)), stop_bot_price: None };

        let signal = engine.check_stop_bounds(dec!(109)).await.unwrap();
        assert!(matches!(signal, Some(EngineSignal::StopTriggered { .. })));
    }

    #[tokio::test]
    async fn stop_bound_not_crossed_returns_none() {
        let mut engine = test_engine();
        let signal = engine.check_stop_bounds(dec!(100)).await.unwrap();
        assert!(signal.is_none());
    }

    #[tokio::test]
    async fn external_cancel_with_smart_policy_restores_user_cancelled_order() {
        let mut engine = test_engine();
        engine.place_initial_ladder().await;
        let order_id = engine.tracker().order_at_level(dec!(95)).unwrap().to_string();

        let restored = engine
            .handle_external_cancel(&order_id, "USER_CANCELLED", 0, 1000, dec!(95))
            .await
            .unwrap();
        assert!(restored);
        assert!(engine.tracker().is_level_occupied(dec!(95)));
    }

    #[tokio::test]
    async fn external_cancel_with_system_reason_is_not_restored_under_smart() {
        let mut engine = test_engine();
        engine.place_initial_ladder().await;
        let order_id = engine.tracker().order_at_level(dec!(95)).unwrap().to_string();

        let restored = engine
            .handle_external_cancel(&order_id, "INSUFFICIENT_MARGIN", 0, 1000, dec!(95))
            .await
            .unwrap();
        assert!(!restored);
        assert!(!engine.tracker().is_level_occupied(dec!(95)));
    }

    #[tokio::test]
    async fn reconcile_orders_restores_a_level_missing_from_the_exchange_snapshot() {
        let (mut engine, exchange) = test_engine_with_exchange();
        engine.place_initial_ladder().await;
        assert_eq!(engine.tracker().open_order_count(), 3);

        // The exchange snapshot omits the order at 95, simulating an out-of-band cancellation
        // the session never requested.
        let remaining: Vec<ExchangeOrder> = engine
            .tracker()
            .open_order_ids()
            .into_iter()
            .filter(|id| id != engine.tracker().order_at_level(dec!(95)).unwrap())
            .map(|id| ExchangeOrder {
                order_id: ExchangeOrderId(id),
                instrument: InstrumentId::parse("PERP_BTC_USDC").unwrap(),
                side: OrderSide::Buy,
                price: dec!(90),
                quantity: dec!(1),
                status: "open".into(),
            })
            .collect();
        *exchange.remote_snapshot.lock().unwrap() = Some(remaining);

        engine.reconcile_orders(1000, dec!(95)).await.unwrap();

        // Smart policy restores EXTERNAL_CANCEL_DETECTED, so the level is re-occupied under a
        // freshly created order id.
        assert!(engine.tracker().is_level_occupied(dec!(95)));
    }

    #[tokio::test]
    async fn reconcile_orders_leaves_orders_present_in_the_snapshot_untouched() {
        let (mut engine, exchange) = test_engine_with_exchange();
        engine.place_initial_ladder().await;

        let snapshot: Vec<ExchangeOrder> = engine
            .tracker()
            .open_order_ids()
            .into_iter()
            .map(|id| ExchangeOrder {
                order_id: ExchangeOrderId(id),
                instrument: InstrumentId::parse("PERP_BTC_USDC").unwrap(),
                side: OrderSide::Buy,
                price: dec!(90),
                quantity: dec!(1),
                status: "open".into(),
            })
            .collect();
        *exchange.remote_snapshot.lock().unwrap() = Some(snapshot);

        engine.reconcile_orders(1000, dec!(100)).await.unwrap();
        assert_eq!(engine.tracker().open_order_count(), 3);
    }
}
