//! # Lock-free Exchange
//!
//! Concurrent limit-order matching engine with one lock-free order book per
//! instrument.
//!
//! ## Architecture
//!
//! - **Types**: Order, Side, Trade, ExecutionReceipt
//! - **OrderBook**: per-instrument book over two CAS-based priority queues
//! - **Engine**: fixed registry of books plus a shared order ID sequence
//! - **Sim**: multi-threaded broker simulation driver
//!
//! ## Design Principles
//!
//! 1. **No global lock**: contention is confined to one instrument's queues
//! 2. **Real CAS**: every link update compares against the value it read
//! 3. **Deferred reclamation**: unlinked nodes are freed through epochs
//! 4. **Price-time priority**: better price first, then insertion order
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use lockfree_exchange::{Engine, EngineConfig, Side, TradeLog};
//!
//! let trades = Arc::new(TradeLog::new());
//! let engine = Engine::new(EngineConfig::default(), trades.clone()).unwrap();
//!
//! engine.add_order(Side::Buy, 1, 10, 100).unwrap();
//! engine.add_order(Side::Sell, 1, 10, 90).unwrap();
//!
//! let trade = &trades.trades()[0];
//! assert_eq!((trade.instrument, trade.price, trade.quantity), (1, 90, 10));
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Order, Trade, ExecutionReceipt
pub mod types;

/// Order book: lock-free priority queues and matching
pub mod orderbook;

/// Engine: instrument registry, order IDs, trade sinks
pub mod engine;

/// Engine and simulation configuration
pub mod config;

/// Error taxonomy
pub mod error;

/// Broker simulation driver
pub mod sim;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use types::{ExecutionReceipt, InstrumentId, Order, OrderId, Side, Trade};
pub use orderbook::{OrderBook, OrderNode, PriorityQueue, QueueView};
pub use engine::{
    ChannelSink, Engine, LogSink, NullSink, OrderRequest, SequenceGenerator, TradeLog, TradeSink,
};
pub use config::{EngineConfig, PricePolicy, SimulationConfig};
pub use error::{EngineError, Result};
