//! Core data types for the matching engine
//!
//! `Order` and `Trade` implement SSZ serialization for deterministic
//! encoding; state roots are SHA-256 digests over those encodings.
//!
//! ## Types
//!
//! - [`Order`]: A limit order
//! - [`Side`]: Buy or Sell
//! - [`Trade`]: An executed match between a buy and a sell
//! - [`ExecutionReceipt`]: Batch execution summary

mod order;
mod trade;
mod receipt;

pub use order::{InstrumentId, Order, OrderId, Side};
pub use trade::Trade;
pub use receipt::ExecutionReceipt;
