//! Engine: fixed registry of per-instrument books.
//!
//! The engine owns exactly `instrument_count` books, built at construction
//! and never resized. Books share nothing but the sequence generator, so
//! orders for different instruments never contend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{SequenceGenerator, TradeSink};
use crate::error::{EngineError, Result};
use crate::orderbook::OrderBook;
use crate::types::{ExecutionReceipt, InstrumentId, Order, OrderId, Side};

/// Inbound order as submitted by a broker or API layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRequest {
    pub side: Side,
    /// 1-based instrument index
    pub instrument: InstrumentId,
    pub quantity: u64,
    pub price: u64,
}

impl OrderRequest {
    pub fn new(side: Side, instrument: InstrumentId, quantity: u64, price: u64) -> Self {
        Self {
            side,
            instrument,
            quantity,
            price,
        }
    }
}

/// Concurrent multi-instrument matching engine.
///
/// `Engine` is `Send + Sync`; share it by reference (or `Arc`) across
/// threads and call [`Engine::add_order`] from any of them.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use lockfree_exchange::config::EngineConfig;
/// use lockfree_exchange::engine::{Engine, TradeLog};
/// use lockfree_exchange::types::Side;
///
/// let trades = Arc::new(TradeLog::new());
/// let engine = Engine::new(EngineConfig::default(), trades.clone()).unwrap();
///
/// engine.add_order(Side::Buy, 1, 10, 100).unwrap();
/// engine.add_order(Side::Sell, 1, 10, 90).unwrap();
///
/// assert_eq!(trades.trades()[0].price, 90);
/// ```
pub struct Engine {
    config: EngineConfig,
    books: Box<[OrderBook]>,
    ids: SequenceGenerator,
    sink: Arc<dyn TradeSink>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("last_order_id", &self.ids.current())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine with one empty book per instrument
    pub fn new(config: EngineConfig, sink: Arc<dyn TradeSink>) -> Result<Self> {
        config.validate()?;

        let books: Box<[OrderBook]> = (1..=config.instrument_count as InstrumentId)
            .map(|instrument| OrderBook::with_config(instrument, &config))
            .collect();

        info!(
            instruments = config.instrument_count,
            retry_budget = config.retry_budget,
            price_policy = ?config.price_policy,
            "matching engine initialized"
        );

        Ok(Self {
            config,
            books,
            ids: SequenceGenerator::new(),
            sink,
        })
    }

    /// Validate, assign an ID, rest the order on its book and match.
    ///
    /// Validation happens before an ID is drawn, so rejected requests leave
    /// no trace anywhere.
    pub fn add_order(
        &self,
        side: Side,
        instrument: InstrumentId,
        quantity: u64,
        price: u64,
    ) -> Result<OrderId> {
        let book = self.book(instrument)?;
        if quantity == 0 {
            return Err(EngineError::InvalidQuantity);
        }
        if price == 0 {
            return Err(EngineError::InvalidPrice);
        }

        let id = self.ids.next();
        book.add_order(Order::new(id, instrument, side, price, quantity), self.sink.as_ref())?;
        Ok(id)
    }

    /// Same as [`Engine::add_order`], taking a request value
    pub fn submit_order(&self, request: OrderRequest) -> Result<OrderId> {
        self.add_order(request.side, request.instrument, request.quantity, request.price)
    }

    /// Book for a 1-based instrument index
    pub fn book(&self, instrument: InstrumentId) -> Result<&OrderBook> {
        let count = self.books.len();
        (instrument as usize)
            .checked_sub(1)
            .and_then(|slot| self.books.get(slot))
            .ok_or(EngineError::InvalidInstrument {
                index: instrument,
                count,
            })
    }

    /// All books, index `i` holding instrument `i + 1`
    pub fn books(&self) -> &[OrderBook] {
        &self.books
    }

    pub fn instrument_count(&self) -> usize {
        self.books.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Last order ID handed out
    pub fn last_order_id(&self) -> OrderId {
        self.ids.current()
    }

    /// Trades resolved across every book
    pub fn trade_count(&self) -> u64 {
        self.books.iter().map(OrderBook::trade_count).sum()
    }

    /// Quantity traded across every book
    pub fn traded_quantity(&self) -> u64 {
        self.books.iter().map(OrderBook::traded_quantity).sum()
    }

    /// SHA-256 over every book's state root, in instrument order
    pub fn state_root(&self) -> Result<[u8; 32]> {
        let mut roots = Vec::with_capacity(self.books.len() * 32);
        for book in self.books.iter() {
            roots.extend_from_slice(&book.state_root()?);
        }
        Ok(ExecutionReceipt::compute_hash(&roots))
    }

    /// Summarise a batch against the engine's current totals.
    ///
    /// `trades_before` / `quantity_before` are the engine totals captured
    /// when the batch started.
    pub fn receipt(
        &self,
        batch_id: u64,
        orders_processed: u64,
        orders_rejected: u64,
        trades_before: u64,
        quantity_before: u64,
        elapsed: Duration,
    ) -> Result<ExecutionReceipt> {
        let receipt = ExecutionReceipt::new(
            batch_id,
            orders_processed,
            orders_rejected,
            self.trade_count().saturating_sub(trades_before),
            self.traded_quantity().saturating_sub(quantity_before),
            self.state_root()?,
            elapsed.as_micros() as u64,
        );
        debug!(batch_id, root = %receipt.state_root_hex(), "receipt computed");
        Ok(receipt)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{NullSink, TradeLog};

    fn engine(instruments: usize) -> (Engine, Arc<TradeLog>) {
        let trades = Arc::new(TradeLog::new());
        let config = EngineConfig::default().with_instrument_count(instruments);
        let engine = Engine::new(config, trades.clone()).unwrap();
        (engine, trades)
    }

    #[test]
    fn test_engine_has_fixed_books() {
        let (engine, _) = engine(16);

        assert_eq!(engine.instrument_count(), 16);
        assert_eq!(engine.book(1).unwrap().instrument(), 1);
        assert_eq!(engine.book(16).unwrap().instrument(), 16);
    }

    #[test]
    fn test_engine_rejects_out_of_range_instrument() {
        let (engine, _) = engine(4);

        for index in [0, 5, u32::MAX] {
            assert_eq!(
                engine.add_order(Side::Buy, index, 1, 100),
                Err(EngineError::InvalidInstrument { index, count: 4 })
            );
        }
        // Nothing consumed an ID
        assert_eq!(engine.last_order_id(), 0);
    }

    #[test]
    fn test_engine_rejects_non_positive_values() {
        let (engine, _) = engine(4);

        assert_eq!(engine.add_order(Side::Buy, 1, 0, 100), Err(EngineError::InvalidQuantity));
        assert_eq!(engine.add_order(Side::Buy, 1, 5, 0), Err(EngineError::InvalidPrice));
        assert_eq!(engine.last_order_id(), 0);
        assert!(engine.book(1).unwrap().bids().is_empty());
    }

    #[test]
    fn test_engine_assigns_increasing_ids() {
        let (engine, _) = engine(4);

        let first = engine.add_order(Side::Buy, 1, 1, 100).unwrap();
        let second = engine.submit_order(OrderRequest::new(Side::Sell, 2, 1, 100)).unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(engine.last_order_id(), 2);
    }

    #[test]
    fn test_engine_books_are_independent() {
        let (engine, trades) = engine(4);

        engine.add_order(Side::Buy, 1, 10, 100).unwrap();
        engine.add_order(Side::Sell, 2, 10, 90).unwrap();

        assert!(trades.is_empty());
        assert_eq!(engine.book(1).unwrap().best_bid(), Some(100));
        assert_eq!(engine.book(2).unwrap().best_ask(), Some(90));
    }

    #[test]
    fn test_engine_state_root_and_receipt() {
        let config = EngineConfig::default().with_instrument_count(2);
        let a = Engine::new(config.clone(), Arc::new(NullSink)).unwrap();
        let b = Engine::new(config, Arc::new(NullSink)).unwrap();
        assert_eq!(a.state_root(), b.state_root());

        a.add_order(Side::Buy, 1, 10, 100).unwrap();
        a.add_order(Side::Sell, 1, 4, 95).unwrap();
        assert_ne!(a.state_root(), b.state_root());

        let receipt = a.receipt(1, 2, 0, 0, 0, Duration::from_micros(10)).unwrap();
        assert_eq!(receipt.trades_executed, 1);
        assert_eq!(receipt.quantity_traded, 4);
        assert_eq!(receipt.state_root, a.state_root().unwrap());
    }

    #[test]
    fn test_engine_invalid_config() {
        let config = EngineConfig::default().with_instrument_count(0);
        assert!(matches!(
            Engine::new(config, Arc::new(NullSink)),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
