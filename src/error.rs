//! Error taxonomy for the grid trading engine.
//!
//! Only the Trading Strategy loop terminates on unrecoverable errors;
//! everywhere else an error is caught at the boundary named in its doc
//! comment, logged, notified, and the affected unit of work (a grid
//! level, a single order) is skipped rather than aborting the caller.

use thiserror::Error;

/// Errors that can occur anywhere in the grid trading engine.
#[derive(Error, Debug, Clone)]
pub enum GridError {
    /// Invalid grid geometry or an unrecognized spacing/strategy type.
    /// Fatal at init; propagates to the caller.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Raised by the Order Validator for a buy whose cost exceeds the
    /// available quote balance. Caught by the Order Manager; that
    /// level is skipped for this pass.
    #[error("insufficient balance: required {required} {currency}, available {available}")]
    InsufficientBalanceError {
        required: f64,
        available: f64,
        currency: String,
    },

    /// Raised by the Order Validator for a sell whose quantity exceeds
    /// the available base balance.
    #[error("insufficient crypto balance: required {required}, available {available}")]
    InsufficientCryptoBalanceError { required: f64, available: f64 },

    /// Raised after retries are exhausted in the live execution
    /// strategy. Caught by the Order Manager; the affected level
    /// remains in its pre-attempt state.
    #[error("order execution failed after {attempts} attempts: {reason}")]
    OrderExecutionFailedError { attempts: u32, reason: String },

    /// Exchange connectivity or response-shape failure in a data path
    /// (status poll, balance fetch). The status tracker logs and
    /// continues on the next tick.
    #[error("data fetch error: {0}")]
    DataFetchError(String),

    /// Fatal at startup: the configured exchange is not supported by
    /// this build.
    #[error("unsupported exchange: {0}")]
    UnsupportedExchangeError(String),

    /// Fatal at startup: the configured timeframe is not recognized.
    #[error("unsupported timeframe: {0}")]
    UnsupportedTimeframeError(String),

    /// A grid level index does not exist in the ladder.
    #[error("grid level not found: index {0}")]
    LevelNotFound(u32),

    /// An order id is not present in the order book.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// A channel used by the event bus or the status tracker was
    /// closed unexpectedly.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// Result type for grid engine operations.
pub type GridResult<T> = std::result::Result<T, GridError>;
