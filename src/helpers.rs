//! Small numeric helpers shared across the engine.

/// Truncate (or round up) `value` to `decimals` decimal places.
///
/// With `round_up = false` this is a pure truncation (no banker's
/// rounding surprises near exchange tick boundaries). With
/// `round_up = true` the smallest representable unit at `decimals` is
/// added after truncation, matching the "submit at or better than this
/// price" rounding exchanges expect for the aggressive side of a
/// retry.
pub fn truncate_float(value: f64, decimals: u32, round_up: bool) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let truncated = (value * factor).trunc();
    let adjusted = if round_up { truncated + 1.0 } else { truncated };
    adjusted / factor
}
