//! Quantity/price sanity and balance-aware adjustment (§4.3).

use crate::error::{GridError, GridResult};
use crate::helpers::truncate_float;

/// Exchange-reported precision constraints used to round a validated
/// quantity down to a tradable size.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeStepSize {
    pub step_decimals: u32,
    pub min_notional: f64,
}

/// Stateless order validation; no side effects.
pub struct OrderValidator;

impl OrderValidator {
    /// Validate and adjust a buy: fails if `quantity * price` exceeds
    /// `balance`; otherwise rounds down to the exchange step and
    /// enforces the minimum notional.
    pub fn validate_buy(
        balance: f64,
        quantity: f64,
        price: f64,
        step: ExchangeStepSize,
    ) -> GridResult<f64> {
        let cost = quantity * price;
        if cost > balance {
            return Err(GridError::InsufficientBalanceError {
                required: cost,
                available: balance,
                currency: "quote".into(),
            });
        }
        let adjusted = truncate_float(quantity, step.step_decimals, false);
        if adjusted * price < step.min_notional {
            return Err(GridError::InsufficientBalanceError {
                required: step.min_notional,
                available: adjusted * price,
                currency: "quote".into(),
            });
        }
        Ok(adjusted)
    }

    /// Validate a sell: fails if `quantity` exceeds `base_balance`.
    pub fn validate_sell(base_balance: f64, quantity: f64) -> GridResult<f64> {
        if quantity > base_balance {
            return Err(GridError::InsufficientCryptoBalanceError {
                required: quantity,
                available: base_balance,
            });
        }
        Ok(quantity)
    }
}
