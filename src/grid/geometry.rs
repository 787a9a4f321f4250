//! Ladder construction (§4.2.1).

use crate::config::SpacingType;
use crate::error::{GridError, GridResult};

/// Build the price ladder and central price for a grid.
///
/// `num_grids` is the total number of price levels produced (not the
/// number of steps between them).
pub fn build_ladder(
    bottom: f64,
    top: f64,
    num_grids: u32,
    spacing: SpacingType,
) -> GridResult<(Vec<f64>, f64)> {
    if bottom <= 0.0 {
        return Err(GridError::ConfigError("bottom must be positive".into()));
    }
    if top <= bottom {
        return Err(GridError::ConfigError(
            "top must be greater than bottom".into(),
        ));
    }
    if num_grids < 2 {
        return Err(GridError::ConfigError("num_grids must be at least 2".into()));
    }

    match spacing {
        SpacingType::Arithmetic => {
            let step = (top - bottom) / (num_grids - 1) as f64;
            let prices: Vec<f64> = (0..num_grids).map(|i| bottom + i as f64 * step).collect();
            let central = (top + bottom) / 2.0;
            Ok((prices, central))
        }
        SpacingType::Geometric => {
            let ratio = (top / bottom).powf(1.0 / (num_grids - 1) as f64);
            let prices: Vec<f64> = (0..num_grids).map(|i| bottom * ratio.powi(i as i32)).collect();
            let mid = prices.len() / 2;
            let central = if prices.len() % 2 == 1 {
                prices[mid]
            } else {
                (prices[mid - 1] + prices[mid]) / 2.0
            };
            Ok((prices, central))
        }
    }
}
