//! Order identity and fill snapshot (§3 "Order").
//!
//! Only `status` and the fill fields are mutated post-creation; the
//! rest of an `Order` is fixed at submission time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    TakeProfit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Expired,
    Unknown,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Closed | OrderStatus::Canceled | OrderStatus::Expired
        )
    }
}

/// An order as tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Exchange-assigned opaque identifier (synthetic in backtest mode).
    pub id: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub price: f64,
    pub amount: f64,
    pub filled: f64,
    pub remaining: f64,
    pub status: OrderStatus,
    pub symbol: String,
    pub timestamp: i64,
    pub average: Option<f64>,
    pub fee: f64,
}

impl Order {
    pub fn new(
        id: String,
        side: OrderSide,
        order_type: OrderType,
        price: f64,
        amount: f64,
        symbol: String,
    ) -> Self {
        Self {
            id,
            side,
            order_type,
            price,
            amount,
            filled: 0.0,
            remaining: amount,
            status: OrderStatus::Open,
            symbol,
            timestamp: 0,
            average: None,
            fee: 0.0,
        }
    }

    /// Total quote value represented by the filled quantity.
    pub fn filled_value(&self) -> f64 {
        self.filled * self.average.unwrap_or(self.price)
    }
}

/// The raw order representation consumed from the exchange adapter
/// (§6): `id, status, type, side, price, amount, filled, remaining,
/// average, timestamp, symbol, fee`. Translated into an `Order` by the
/// execution strategies and the status tracker.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    pub id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
    pub price: f64,
    pub amount: f64,
    pub filled: f64,
    pub remaining: f64,
    pub average: Option<f64>,
    pub timestamp: i64,
    pub symbol: String,
    pub fee: f64,
}

impl RawOrder {
    pub fn status(&self) -> OrderStatus {
        match self.status.to_ascii_uppercase().as_str() {
            "OPEN" => OrderStatus::Open,
            "CLOSED" => OrderStatus::Closed,
            "CANCELED" | "CANCELLED" => OrderStatus::Canceled,
            "EXPIRED" => OrderStatus::Expired,
            _ => OrderStatus::Unknown,
        }
    }

    pub fn side(&self) -> OrderSide {
        match self.side.to_ascii_uppercase().as_str() {
            "BUY" => OrderSide::Buy,
            _ => OrderSide::Sell,
        }
    }

    pub fn order_type(&self) -> OrderType {
        match self.order_type.to_ascii_uppercase().as_str() {
            "LIMIT" => OrderType::Limit,
            "MARKET" => OrderType::Market,
            "STOP" => OrderType::Stop,
            "TAKE_PROFIT" => OrderType::TakeProfit,
            _ => OrderType::Limit,
        }
    }

    pub fn into_order(self) -> Order {
        Order {
            id: self.id,
            side: self.side(),
            order_type: self.order_type(),
            price: self.price,
            amount: self.amount,
            filled: self.filled,
            remaining: self.remaining,
            status: self.status(),
            symbol: self.symbol,
            timestamp: self.timestamp,
            average: self.average,
            fee: self.fee,
        }
    }
}
