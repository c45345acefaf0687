//! Per-instrument order book and matching loop.
//!
//! ## Architecture
//!
//! - **Bids**: `PriorityQueue` sorted high-to-low
//! - **Asks**: `PriorityQueue` sorted low-to-high
//! - **Matching token**: at most one thread drains the book at a time
//!
//! ## Matching Handoff
//!
//! Every `add_order` inserts (lock-free), raises `pending`, then tries to
//! take the matching token:
//!
//! ```text
//! insert ─▶ pending = true ─▶ CAS token false→true ─┬─ won:  drain while pending, release, re-check
//!                                                    └─ lost: return, the holder will see `pending`
//! ```
//!
//! The holder re-checks `pending` after releasing the token, so a crossing
//! insert that raced with the end of a drain is always picked up. Having a
//! single drainer per book gives exactly-once fills and a dense trade
//! sequence without putting insertion behind a lock.
//!
//! ## Example
//!
//! ```
//! use lockfree_exchange::engine::TradeLog;
//! use lockfree_exchange::orderbook::OrderBook;
//! use lockfree_exchange::types::{Order, Side};
//!
//! let book = OrderBook::new(1);
//! let trades = TradeLog::new();
//!
//! book.add_order(Order::new(1, 1, Side::Buy, 100, 10), &trades).unwrap();
//! book.add_order(Order::new(2, 1, Side::Sell, 90, 10), &trades).unwrap();
//!
//! assert_eq!(trades.len(), 1);
//! assert_eq!(trades.trades()[0].price, 90);
//! assert!(book.best_bid().is_none());
//! assert!(book.best_ask().is_none());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::epoch;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{EngineConfig, PricePolicy};
use crate::engine::TradeSink;
use crate::error::{EngineError, Result};
use crate::orderbook::node::OrderNode;
use crate::orderbook::queue::{PriorityQueue, QueueView, DEFAULT_RETRY_BUDGET};
use crate::types::{InstrumentId, Order, Side, Trade};

/// Order book for a single instrument.
#[derive(Debug)]
pub struct OrderBook {
    instrument: InstrumentId,
    price_policy: PricePolicy,

    /// Buy orders, best (highest) first
    bids: PriorityQueue,

    /// Sell orders, best (lowest) first
    asks: PriorityQueue,

    /// Held by the thread currently draining crosses
    matching: AtomicBool,

    /// Raised after every insert; cleared by the drainer before each pass
    pending: AtomicBool,

    /// Last trade sequence handed out (only written by the token holder)
    trade_sequence: AtomicU64,

    traded_quantity: AtomicU64,
    submitted_quantity: AtomicU64,
}

impl OrderBook {
    /// Create an empty book with default settings
    pub fn new(instrument: InstrumentId) -> Self {
        Self::with_settings(instrument, DEFAULT_RETRY_BUDGET, PricePolicy::default())
    }

    /// Create an empty book using the engine's retry budget and price policy
    pub fn with_config(instrument: InstrumentId, config: &EngineConfig) -> Self {
        Self::with_settings(instrument, config.retry_budget, config.price_policy)
    }

    fn with_settings(instrument: InstrumentId, retry_budget: u32, price_policy: PricePolicy) -> Self {
        Self {
            instrument,
            price_policy,
            bids: PriorityQueue::with_retry_budget(Side::Buy, retry_budget),
            asks: PriorityQueue::with_retry_budget(Side::Sell, retry_budget),
            matching: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            trade_sequence: AtomicU64::new(0),
            traded_quantity: AtomicU64::new(0),
            submitted_quantity: AtomicU64::new(0),
        }
    }

    // ========================================================================
    // Order Entry
    // ========================================================================

    /// Rest `order` on its side, then match to a fixpoint.
    ///
    /// # Errors
    ///
    /// - `WrongBook` if the order belongs to another instrument
    /// - `InvalidQuantity` / `InvalidPrice` for zero values
    /// - `ContentionExhausted` if a CAS loop ran out of budget
    pub fn add_order(&self, order: Order, sink: &dyn TradeSink) -> Result<()> {
        if order.instrument != self.instrument {
            return Err(EngineError::WrongBook {
                book: self.instrument,
                order: order.instrument,
            });
        }
        if order.quantity == 0 || order.remaining != order.quantity {
            return Err(EngineError::InvalidQuantity);
        }
        if order.price == 0 {
            return Err(EngineError::InvalidPrice);
        }

        let (id, side, price, quantity) = (order.id, order.side(), order.price, order.quantity);
        self.queue(side).insert(order)?;
        self.submitted_quantity.fetch_add(quantity, Ordering::AcqRel);
        debug!(instrument = self.instrument, id, %side, price, quantity, "order rested");

        self.run_matching(sink).map(|_| ())
    }

    /// Drain crossing orders until the book no longer crosses.
    ///
    /// Returns the number of trades this call resolved itself. Zero does not
    /// mean nothing matched: if another thread holds the matching token, it
    /// performs the drain on this caller's behalf.
    pub fn run_matching(&self, sink: &dyn TradeSink) -> Result<usize> {
        // The handoff is a store-then-load on two flags from each side
        // (pending/token here, token/pending on release). Only SeqCst keeps
        // both threads from reading the other's flag stale.
        self.pending.store(true, Ordering::SeqCst);
        let mut resolved = 0;

        loop {
            if self
                .matching
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Ok(resolved);
            }

            let mut outcome = Ok(());
            while self.pending.swap(false, Ordering::SeqCst) {
                match self.drain(sink) {
                    Ok(count) => resolved += count,
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                }
            }

            self.matching.store(false, Ordering::SeqCst);
            outcome?;

            if !self.pending.load(Ordering::SeqCst) {
                return Ok(resolved);
            }
        }
    }

    /// One matching pass. Caller must hold the matching token.
    fn drain(&self, sink: &dyn TradeSink) -> Result<usize> {
        let mut guard = epoch::pin();
        let mut trades = 0;

        loop {
            guard.repin();

            let buy_ptr = self.bids.front(&guard);
            let sell_ptr = self.asks.front(&guard);
            // SAFETY: both pointers were read under `guard`, and nodes are
            // only freed through deferred destruction.
            let (Some(buy), Some(sell)) = (unsafe { buy_ptr.as_ref() }, unsafe { sell_ptr.as_ref() })
            else {
                return Ok(trades);
            };

            if buy.price() < sell.price() {
                return Ok(trades);
            }

            let quantity = buy.remaining().min(sell.remaining());
            if quantity > 0 {
                buy.fill(quantity);
                sell.fill(quantity);

                let trade = self.record_trade(buy, sell, quantity);
                sink.on_trade(&trade);
                trades += 1;
            }

            if buy.is_filled() {
                self.bids.remove(buy_ptr, &guard)?;
            }
            if sell.is_filled() {
                self.asks.remove(sell_ptr, &guard)?;
            }
        }
    }

    fn record_trade(&self, buy: &OrderNode, sell: &OrderNode, quantity: u64) -> Trade {
        let aggressor = if buy.order_id() > sell.order_id() {
            Side::Buy
        } else {
            Side::Sell
        };
        let price = match (self.price_policy, aggressor) {
            (PricePolicy::SellSide, _) | (PricePolicy::Maker, Side::Buy) => sell.price(),
            (PricePolicy::Maker, Side::Sell) => buy.price(),
        };

        let sequence = self.trade_sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.traded_quantity.fetch_add(quantity, Ordering::AcqRel);

        Trade::new(
            sequence,
            self.instrument,
            price,
            quantity,
            buy.order_id(),
            sell.order_id(),
            aggressor,
        )
    }

    // ========================================================================
    // Best Bid/Ask
    // ========================================================================

    /// Highest resting buy price
    pub fn best_bid(&self) -> Option<u64> {
        self.bids.peek_front().map(|order| order.price)
    }

    /// Lowest resting sell price
    pub fn best_ask(&self) -> Option<u64> {
        self.asks.peek_front().map(|order| order.price)
    }

    /// best_ask - best_bid, `None` if either side is empty or crossed
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask >= bid => Some(ask - bid),
            _ => None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    /// Read-only view of the buy side
    #[inline]
    pub fn bids(&self) -> QueueView<'_> {
        QueueView::new(&self.bids)
    }

    /// Read-only view of the sell side
    #[inline]
    pub fn asks(&self) -> QueueView<'_> {
        QueueView::new(&self.asks)
    }

    /// Read-only view of the side holding orders of `side`
    #[inline]
    pub fn side(&self, side: Side) -> QueueView<'_> {
        QueueView::new(self.queue(side))
    }

    #[inline]
    fn queue(&self, side: Side) -> &PriorityQueue {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Trades resolved so far
    pub fn trade_count(&self) -> u64 {
        self.trade_sequence.load(Ordering::Acquire)
    }

    /// Sum of trade quantities so far
    pub fn traded_quantity(&self) -> u64 {
        self.traded_quantity.load(Ordering::Acquire)
    }

    /// Sum of quantities of every accepted order
    pub fn submitted_quantity(&self) -> u64 {
        self.submitted_quantity.load(Ordering::Acquire)
    }

    /// Remaining quantity across both sides
    pub fn resting_quantity(&self) -> u64 {
        self.bids.total_quantity() + self.asks.total_quantity()
    }

    /// SHA-256 over the SSZ encoding of every resting order, bids then asks,
    /// each in priority order.
    pub fn state_root(&self) -> Result<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(self.instrument.to_le_bytes());
        for queue in [&self.bids, &self.asks] {
            let orders = queue.snapshot();
            hasher.update((orders.len() as u64).to_le_bytes());
            for order in &orders {
                let bytes = ssz_rs::serialize(order)
                    .map_err(|err| EngineError::Encoding(format!("{err:?}")))?;
                hasher.update(&bytes);
            }
        }

        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        Ok(root)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
