//! In-memory index of live and historical orders (§3 "OrderBook").

use std::collections::HashMap;

use crate::order::{Order, OrderSide, OrderStatus};

/// Maps order id -> `Order`, plus order id -> grid level index (absent
/// for non-grid TP/SL/initial orders), plus ordered per-side sequences
/// for queries.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: HashMap<String, Order>,
    level_of_order: HashMap<String, u32>,
    reserved_of_order: HashMap<String, f64>,
    buy_order_ids: Vec<String>,
    sell_order_ids: Vec<String>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly placed order, optionally tied to a grid level.
    pub fn insert(&mut self, order: Order, level_index: Option<u32>) {
        match order.side {
            OrderSide::Buy => self.buy_order_ids.push(order.id.clone()),
            OrderSide::Sell => self.sell_order_ids.push(order.id.clone()),
        }
        if let Some(idx) = level_index {
            self.level_of_order.insert(order.id.clone(), idx);
        }
        self.orders.insert(order.id.clone(), order);
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn get_mut(&mut self, order_id: &str) -> Option<&mut Order> {
        self.orders.get_mut(order_id)
    }

    pub fn level_of(&self, order_id: &str) -> Option<u32> {
        self.level_of_order.get(order_id).copied()
    }

    /// Record the amount this order's own placement reserved (quote
    /// for a buy, base for a sell), so a later fill releases only its
    /// share of the aggregate reserved bucket.
    pub fn record_reservation(&mut self, order_id: String, amount: f64) {
        self.reserved_of_order.insert(order_id, amount);
    }

    /// Take and clear the reservation recorded for `order_id`; zero if
    /// none was recorded (the order was never reserved, e.g. an
    /// initial market buy or a take-profit/stop-loss liquidation).
    pub fn take_reservation(&mut self, order_id: &str) -> f64 {
        self.reserved_of_order.remove(order_id).unwrap_or(0.0)
    }

    /// Update an order's status/fill fields from a fresh snapshot.
    pub fn apply_update(&mut self, updated: Order) {
        if let Some(existing) = self.orders.get_mut(&updated.id) {
            existing.status = updated.status;
            existing.filled = updated.filled;
            existing.remaining = updated.remaining;
            existing.average = updated.average;
            existing.fee = updated.fee;
            existing.timestamp = updated.timestamp;
        } else {
            self.insert(updated, None);
        }
    }

    /// All orders currently in a non-terminal state.
    pub fn get_open_orders(&self) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .collect()
    }

    /// Open limit orders on a given side, for backtest fill simulation
    /// and grid placement checks.
    pub fn open_limit_orders(&self) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| {
                !o.status.is_terminal() && matches!(o.order_type, crate::order::OrderType::Limit)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderType;

    fn order(id: &str, side: OrderSide) -> Order {
        Order::new(id.into(), side, OrderType::Limit, 100.0, 1.0, "BTC/USDT".into())
    }

    #[test]
    fn tracks_level_association() {
        let mut book = OrderBook::new();
        book.insert(order("1", OrderSide::Buy), Some(3));
        assert_eq!(book.level_of("1"), Some(3));
        assert!(book.get("1").is_some());
    }

    #[test]
    fn open_orders_excludes_terminal() {
        let mut book = OrderBook::new();
        book.insert(order("1", OrderSide::Buy), None);
        let mut closed = order("2", OrderSide::Sell);
        closed.status = OrderStatus::Closed;
        book.insert(closed, None);
        assert_eq!(book.get_open_orders().len(), 1);
    }

    #[test]
    fn take_reservation_clears_it_and_defaults_to_zero() {
        let mut book = OrderBook::new();
        book.record_reservation("1".into(), 42.0);
        assert_eq!(book.take_reservation("1"), 42.0);
        assert_eq!(book.take_reservation("1"), 0.0);
        assert_eq!(book.take_reservation("never-recorded"), 0.0);
    }
}
