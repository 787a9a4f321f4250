//! Quote/base balances, reserved buckets, fee accrual (§3 "Balance",
//! §4.7 "Balance Tracker").

use log::debug;

use crate::error::{GridError, GridResult};
use crate::order::OrderSide;

#[derive(Debug, Clone, Default)]
pub struct Balance {
    pub quote_balance: f64,
    pub base_balance: f64,
    pub reserved_quote: f64,
    pub reserved_base: f64,
    pub total_fees: f64,
}

/// Owns the balance buckets and the reservation discipline that keeps
/// them conserved across fills.
pub struct BalanceTracker {
    balance: Balance,
}

impl BalanceTracker {
    /// Backtest mode boot: seed from configured initial balances.
    pub fn from_initial(initial_quote: f64, initial_base: f64) -> Self {
        Self {
            balance: Balance {
                quote_balance: initial_quote,
                base_balance: initial_base,
                ..Default::default()
            },
        }
    }

    /// Live/paper mode boot: seed from the exchange's `free` buckets
    /// for the configured quote and base currencies.
    pub fn from_exchange_free_balances(free_quote: f64, free_base: f64) -> Self {
        Self::from_initial(free_quote, free_base)
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    /// Move `amount_quote` from `quote_balance` to `reserved_quote`.
    pub fn reserve_funds_for_buy(&mut self, amount_quote: f64) -> GridResult<()> {
        if amount_quote > self.balance.quote_balance {
            return Err(GridError::InsufficientBalanceError {
                required: amount_quote,
                available: self.balance.quote_balance,
                currency: "quote".into(),
            });
        }
        self.balance.quote_balance -= amount_quote;
        self.balance.reserved_quote += amount_quote;
        Ok(())
    }

    /// Move `qty_base` from `base_balance` to `reserved_base`.
    pub fn reserve_funds_for_sell(&mut self, qty_base: f64) -> GridResult<()> {
        if qty_base > self.balance.base_balance {
            return Err(GridError::InsufficientCryptoBalanceError {
                required: qty_base,
                available: self.balance.base_balance,
            });
        }
        self.balance.base_balance -= qty_base;
        self.balance.reserved_base += qty_base;
        Ok(())
    }

    /// Apply a fill's effect on the balance buckets. `reserved_amount`
    /// is *this order's own* share of the aggregate reserved bucket
    /// (zero if the order was never reserved, e.g. an initial market
    /// buy or a take-profit/stop-loss liquidation) — only that share is
    /// released, leaving every other resting order's reservation
    /// intact.
    ///
    /// On a buy fill: `reserved_quote -= reserved_amount`, crediting
    /// the residual (`reserved_amount - qty*price - fee`, positive on
    /// price improvement, negative when the reservation undershot the
    /// actual cost) back to `quote_balance`; `base_balance += qty`;
    /// `total_fees += fee`. On a sell fill: the mirror image.
    pub fn apply_fill(&mut self, side: OrderSide, qty: f64, price: f64, fee: f64, reserved_amount: f64) {
        match side {
            OrderSide::Buy => {
                let cost = qty * price + fee;
                let residual = reserved_amount - cost;
                if residual < 0.0 {
                    debug!("buy fill exceeded its reservation by {}, drawing from quote_balance", -residual);
                }
                self.balance.reserved_quote = (self.balance.reserved_quote - reserved_amount).max(0.0);
                self.balance.quote_balance += residual;
                self.balance.base_balance += qty;
                self.balance.total_fees += fee;
            }
            OrderSide::Sell => {
                let residual = reserved_amount - qty;
                if residual < 0.0 {
                    debug!("sell fill exceeded its reservation by {}, drawing from base_balance", -residual);
                }
                self.balance.reserved_base = (self.balance.reserved_base - reserved_amount).max(0.0);
                self.balance.base_balance += residual;
                let proceeds = qty * price - fee;
                self.balance.quote_balance += proceeds;
                self.balance.total_fees += fee;
            }
        }
    }

    /// Used when the initial market buy was executed outside the
    /// normal reservation path (live/paper mode): the exchange-reported
    /// average price is applied directly.
    pub fn update_after_initial_purchase(&mut self, qty: f64, average_price: f64, fee: f64) {
        let cost = qty * average_price + fee;
        self.balance.quote_balance -= cost;
        self.balance.base_balance += qty;
        self.balance.total_fees += fee;
    }

    /// Total account value at `current_price`, used for the account
    /// value series in the trading strategy's backtest loop.
    pub fn account_value(&self, current_price: f64) -> f64 {
        self.balance.quote_balance
            + self.balance.reserved_quote
            + (self.balance.base_balance + self.balance.reserved_base) * current_price
    }
}
