//! Error taxonomy for the matching engine.
//!
//! Validation errors are raised before any book is touched. A failed
//! insert never links the order, so it is safe to resubmit.

use thiserror::Error;

/// Errors reported by the engine, its books, and their queues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Instrument index outside `[1, count]`
    #[error("instrument index {index} outside [1, {count}]")]
    InvalidInstrument { index: u32, count: usize },

    /// Order routed to a book for a different instrument
    #[error("order for instrument {order} submitted to book {book}")]
    WrongBook { book: u32, order: u32 },

    /// Quantity must be strictly positive
    #[error("order quantity must be positive")]
    InvalidQuantity,

    /// Price must be strictly positive
    #[error("order price must be positive")]
    InvalidPrice,

    /// A compare-and-swap loop failed more times than its budget allows
    #[error("compare-and-swap retry budget of {budget} attempts exhausted")]
    ContentionExhausted { budget: u32 },

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// SSZ encoding failed while hashing book state
    #[error("state encoding failed: {0}")]
    Encoding(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;
