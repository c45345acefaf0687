//! Outbound trade reporting.
//!
//! The matching loop hands every trade to a [`TradeSink`] exactly once, in
//! the order it was resolved within its book. How trades leave the process
//! is up to the integrator; the sinks here cover logging, in-memory
//! collection, and a channel for a downstream consumer thread.

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::types::Trade;

/// Receiver of trade events. Called synchronously from the matching loop.
pub trait TradeSink: Send + Sync {
    fn on_trade(&self, trade: &Trade);
}

impl<F> TradeSink for F
where
    F: Fn(&Trade) + Send + Sync,
{
    fn on_trade(&self, trade: &Trade) {
        self(trade)
    }
}

/// Drops every trade
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TradeSink for NullSink {
    fn on_trade(&self, _trade: &Trade) {}
}

/// Emits one `info` line per trade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TradeSink for LogSink {
    fn on_trade(&self, trade: &Trade) {
        info!(
            ticker = %trade.ticker(),
            price = trade.price,
            quantity = trade.quantity,
            buy_order_id = trade.buy_order_id,
            sell_order_id = trade.sell_order_id,
            aggressor = %trade.aggressor(),
            "Matched order"
        );
    }
}

/// Collects trades in memory
#[derive(Debug, Default)]
pub struct TradeLog {
    trades: Mutex<Vec<Trade>>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every trade recorded so far
    pub fn trades(&self) -> Vec<Trade> {
        self.trades.lock().clone()
    }

    /// Remove and return every recorded trade
    pub fn drain(&self) -> Vec<Trade> {
        std::mem::take(&mut *self.trades.lock())
    }

    pub fn len(&self) -> usize {
        self.trades.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.lock().is_empty()
    }
}

impl TradeSink for TradeLog {
    fn on_trade(&self, trade: &Trade) {
        self.trades.lock().push(trade.clone());
    }
}

/// Forwards trades over a crossbeam channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Trade>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Trade>) -> Self {
        Self { tx }
    }
}

impl TradeSink for ChannelSink {
    fn on_trade(&self, trade: &Trade) {
        if self.tx.send(trade.clone()).is_err() {
            warn!(
                instrument = trade.instrument,
                sequence = trade.sequence,
                "trade receiver disconnected, dropping trade"
            );
        }
    }
}
