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

//! The order tracker (C6): per-session bookkeeping of open orders and the grid-level-to-order
//! mapping, plus fill deduplication (spec.md §4.6).

use std::collections::VecDeque;

use grid_core::{OrderSide, OrderStatus, Price, Qty};
use indexmap::{IndexMap, IndexSet};
use rust_decimal::Decimal;

use crate::error::ExecutionError;

/// The default capacity of the fill-deduplication LRU set (spec.md §4.6 leaves this
/// implementation-defined; sized generously above any plausible per-session fill rate).
pub const DEFAULT_FILL_DEDUP_CAPACITY: usize = 4096;

/// A tracked open order: its price, side, quantity, and the grid level it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOrder {
    pub price: Price,
    pub side: OrderSide,
    pub quantity: Qty,
    pub grid_level: Price,
    pub status: OrderStatus,
}

/// A fill's dedup key: the triple the spec requires re-delivery of the same fill to be a no-op
/// against (spec.md §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FillKey {
    pub order_id: String,
    pub exchange_timestamp: i64,
    pub executed_quantity: Decimal,
}

/// A bounded least-recently-used set, used to remember processed fills without growing
/// unbounded over a long-lived session.
#[derive(Debug)]
struct LruSet<K: std::hash::Hash + Eq + Clone> {
    capacity: usize,
    order: VecDeque<K>,
    members: IndexSet<K>,
}

impl<K: std::hash::Hash + Eq + Clone> LruSet<K> {
    fn new(capacity: usize) -> Self {
        Self { capacity, order: VecDeque::with_capacity(capacity), members: IndexSet::new() }
    }

    /// Inserts `key`, returning `true` if it was newly inserted (i.e. not already a member).
    fn insert(&mut self, key: K) -> bool {
        if !self.members.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity
            && let Some(evicted) = self.order.pop_front()
        {
            self.members.swap_remove(&evicted);
        }
        true
    }
}

/// Per-session order bookkeeping (C6). All mutations are taken through `&mut self`; the owning
/// session serializes access the way the spec requires ("all mutations are serialized per
/// session").
#[derive(Debug)]
pub struct OrderTracker {
    open_orders: IndexMap<String, TrackedOrder>,
    grid_level_to_order: IndexMap<Price, String>,
    processed_fills: LruSet<FillKey>,
}

impl OrderTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FILL_DEDUP_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(fill_dedup_capacity: usize) -> Self {
        Self {
            open_orders: IndexMap::new(),
            grid_level_to_order: IndexMap::new(),
            processed_fills: LruSet::new(fill_dedup_capacity),
        }
    }

    /// Registers a newly created order against its grid level.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::GridLevelOccupied`] if the grid level already has an open
    /// order (spec.md §3: "two Open orders never share a grid_level").
    pub fn register_new(
        &mut self,
        order_id: String,
        price: Price,
        side: OrderSide,
        quantity: Qty,
        grid_level: Price,
    ) -> Result<(), ExecutionError> {
        if self.grid_level_to_order.contains_key(&grid_level) {
            return Err(ExecutionError::GridLevelOccupied(grid_level));
        }
        self.grid_level_to_order.insert(grid_level, order_id.clone());
        self.open_orders.insert(
            order_id,
            TrackedOrder { price, side, quantity, grid_level, status: OrderStatus::Open },
        );
        Ok(())
    }

    /// Marks `order_id` as filled and frees its grid-level slot. Returns `true` if this is the
    /// first time this exact fill has been processed; `false` if it is a re-delivery (spec.md
    /// §4.6's dedup rule) and callers should treat it as a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::UnknownOrder`] if `order_id` is not tracked.
    pub fn mark_filled(
        &mut self,
        order_id: &str,
        exchange_timestamp: i64,
        executed_quantity: Decimal,
    ) -> Result<bool, ExecutionError> {
        let is_new = self.processed_fills.insert(FillKey {
            order_id: order_id.to_string(),
            exchange_timestamp,
            executed_quantity,
        });
        if !is_new {
            return Ok(false);
        }

        let order = self
            .open_orders
            .get_mut(order_id)
            .ok_or_else(|| ExecutionError::UnknownOrder(order_id.to_string()))?;
        order.status = OrderStatus::Filled;
        self.grid_level_to_order.swap_remove(&order.grid_level);
        Ok(true)
    }

    /// Marks `order_id` as cancelled and frees its grid-level slot.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::UnknownOrder`] if `order_id` is not tracked.
    pub fn mark_cancelled(&mut self, order_id: &str) -> Result<TrackedOrder, ExecutionError> {
        let order = self
            .open_orders
            .get_mut(order_id)
            .ok_or_else(|| ExecutionError::UnknownOrder(order_id.to_string()))?;
        order.status = OrderStatus::Cancelled;
        let snapshot = order.clone();
        self.grid_level_to_order.swap_remove(&snapshot.grid_level);
        Ok(snapshot)
    }

    #[must_use]
    pub fn lookup_by_id(&self, order_id: &str) -> Option<&TrackedOrder> {
        self.open_orders.get(order_id)
    }

    #[must_use]
    pub fn order_at_level(&self, grid_level: Price) -> Option<&str> {
        self.grid_level_to_order.get(&grid_level).map(String::as_str)
    }

    #[must_use]
    pub fn is_level_occupied(&self, grid_level: Price) -> bool {
        self.grid_level_to_order.contains_key(&grid_level)
    }

    #[must_use]
    pub fn open_order_count(&self) -> usize {
        self.open_orders.values().filter(|o| o.status == OrderStatus::Open).count()
    }

    /// Returns the exchange order ids of every order this tracker still considers `Open`, used by
    /// the order-sync reconciliation pass to diff against a fresh exchange snapshot (spec.md §4.7
    /// "Order sync").
    #[must_use]
    pub fn open_order_ids(&self) -> Vec<String> {
        self.open_orders
            .iter()
            .filter(|(_, order)| order.status == OrderStatus::Open)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn register_then_lookup_round_trips() {
        let mut tracker = OrderTracker::new();
        tracker
            .register_new("o1".into(), dec!(100), OrderSide::Buy, dec!(1), dec!(100))
            .unwrap();
        let order = tracker.lookup_by_id("o1").unwrap();
        assert_eq!(order.price, dec!(100));
        assert!(tracker.is_level_occupied(dec!(100)));
    }

    #[test]
    fn second_order_at_same_level_is_rejected() {
        let mut tracker = OrderTracker::new();
        tracker
            .register_new("o1".into(), dec!(100), OrderSide::Buy, dec!(1), dec!(100))
            .unwrap();
        let result = tracker.register_new("o2".into(), dec!(100), OrderSide::Buy, dec!(1), dec!(100));
        assert!(matches!(result, Err(ExecutionError::GridLevelOccupied(_))));
    }

    #[test]
    fn mark_filled_frees_the_grid_level() {
        let mut tracker = OrderTracker::new();
        tracker
            .register_new("o1".into(), dec!(100), OrderSide::Buy, dec!(1), dec!(100))
            .unwrap();
        let first = tracker.mark_filled("o1", 1, dec!(1)).unwrap();
        assert!(first);
        assert!(!tracker.is_level_occupied(dec!(100)));
    }

    #[test]
    fn redelivered_fill_is_a_no_op() {
        let mut tracker = OrderTracker::new();
        tracker
            .register_new("o1".into(), dec!(100), OrderSide::Buy, dec!(1), dec!(100))
            .unwrap();
        assert!(tracker.mark_filled("o1", 1, dec!(1)).unwrap());
        assert!(!tracker.mark_filled("o1", 1, dec!(1)).unwrap());
    }

    #[test]
    fn distinct_fills_on_different_quantities_are_not_deduped() {
        let mut tracker = OrderTracker::new();
        tracker
            .register_new("o1".into(), dec!(100), OrderSide::Buy, dec!(2), dec!(100))
            .unwrap();
        assert!(tracker.mark_filled("o1", 1, dec!(1)).unwrap());
        // Partial fill at a different quantity is a distinct fill event.
        assert!(tracker.mark_filled("o1", 2, dec!(1)).unwrap());
    }

    #[test]
    fn mark_cancelled_frees_the_level_and_returns_snapshot() {
        let mut tracker = OrderTracker::new();
        tracker
            .register_new("o1".into(), dec!(100), OrderSide::Sell, dec!(1), dec!(100))
            .unwrap();
        let snapshot = tracker.mark_cancelled("o1").unwrap();
        assert_eq!(snapshot.status, OrderStatus::Cancelled);
        assert!(!tracker.is_level_occupied(dec!(100)));
    }

    #[test]
    fn unknown_order_operations_error() {
        let mut tracker = OrderTracker::new();
        assert!(matches!(
            tracker.mark_cancelled("missing"),
            Err(ExecutionError::UnknownOrder(_))
        ));
    }

    #[test]
    fn open_order_ids_excludes_filled_and_cancelled() {
        let mut tracker = OrderTracker::new();
        tracker
            .register_new("o1".into(), dec!(100), OrderSide::Buy, dec!(1), dec!(100))
            .unwrap();
        tracker
            .register_new("o2".into(), dec!(105), OrderSide::Sell, dec!(1), dec!(105))
            .unwrap();
        tracker.mark_filled("o1", 1, dec!(1)).unwrap();
        assert_eq!(tracker.open_order_ids(), vec!["o2".to_string()]);
    }

    #[test]
    fn fill_dedup_set_evicts_oldest_beyond_capacity() {
        let mut tracker = OrderTracker::with_capacity(2);
        tracker
            .register_new("o1".into(), dec!(100), OrderSide::Buy, dec!(1), dec!(100))
            .unwrap();
        assert!(tracker.mark_filled("o1", 1, dec!(1)).unwrap());
        assert!(tracker.processed_fills.insert(FillKey {
            order_id: "o2".into(),
            exchange_timestamp: 2,
            executed_quantity: dec!(1),
        }));
        assert!(tracker.processed_fills.insert(FillKey {
            order_id: "o3".into(),
            exchange_timestamp: 3,
            executed_quantity: dec!(1),
        }));
        // The o1 fill key has been evicted, so re-delivering it is treated as new again.
        assert!(tracker.processed_fills.insert(FillKey {
            order_id: "o1".into(),
            exchange_timestamp: 1,
            executed_quantity: dec!(1),
        }));
    }
}
