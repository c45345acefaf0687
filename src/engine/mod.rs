//! Matching engine module.
//!
//! ## Components
//!
//! - [`SequenceGenerator`]: lock-free order ID source
//! - [`Engine`]: fixed registry of per-instrument order books
//! - [`TradeSink`]: outbound trade reporting
//!
//! ## Routing
//!
//! ```text
//! Engine::add_order ─▶ validate ─▶ SequenceGenerator::next ─▶ OrderBook::add_order ─▶ matching ─▶ TradeSink
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use lockfree_exchange::config::EngineConfig;
//! use lockfree_exchange::engine::{Engine, TradeLog};
//! use lockfree_exchange::types::Side;
//!
//! let trades = Arc::new(TradeLog::new());
//! let engine = Engine::new(EngineConfig::default(), trades.clone()).unwrap();
//!
//! engine.add_order(Side::Buy, 1, 5, 100).unwrap();
//! engine.add_order(Side::Buy, 1, 5, 100).unwrap();
//! engine.add_order(Side::Sell, 1, 7, 100).unwrap();
//!
//! let fills: Vec<_> = trades.trades().iter().map(|t| (t.buy_order_id, t.quantity)).collect();
//! assert_eq!(fills, vec![(1, 5), (2, 2)]);
//! ```

pub mod registry;
pub mod sequence;
pub mod sink;

pub use registry::{Engine, OrderRequest};
pub use sequence::SequenceGenerator;
pub use sink::{ChannelSink, LogSink, NullSink, TradeLog, TradeSink};
