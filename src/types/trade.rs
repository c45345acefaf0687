//! Trade record emitted by the matching loop.
//!
//! Trades are SSZ-encodable so downstream consumers get the same bytes for
//! the same match, regardless of which thread resolved it.

use ssz_rs::prelude::*;

use super::order::{InstrumentId, OrderId, Side};

/// A single match between one buy and one sell order.
///
/// ## Sequence
///
/// `sequence` is the 1-based position of this trade in its book's
/// resolution order. Only one thread drains a book at a time, so the
/// sequence is dense and matches the order trades are reported in.
///
/// ## Aggressor
///
/// The aggressor is the later-submitted order of the pair (higher id).
///
/// ## Example
///
/// ```
/// use lockfree_exchange::types::{Side, Trade};
///
/// let trade = Trade::new(1, 5, 90, 10, 1, 2, Side::Sell);
/// assert_eq!(trade.aggressor(), Side::Sell);
/// assert_eq!(trade.notional(), 900);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct Trade {
    /// Per-book resolution sequence
    pub sequence: u64,

    /// 1-based instrument index
    pub instrument: u32,

    /// Execution price
    pub price: u64,

    /// Executed quantity
    pub quantity: u64,

    /// Buy order ID
    pub buy_order_id: u64,

    /// Sell order ID
    pub sell_order_id: u64,

    /// Aggressor side as u8 (0=Buy, 1=Sell)
    pub aggressor_raw: u8,
}

impl Trade {
    /// Create a new trade record
    pub fn new(
        sequence: u64,
        instrument: InstrumentId,
        price: u64,
        quantity: u64,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        aggressor: Side,
    ) -> Self {
        Self {
            sequence,
            instrument,
            price,
            quantity,
            buy_order_id,
            sell_order_id,
            aggressor_raw: aggressor.to_u8(),
        }
    }

    /// Side of the order that crossed the spread
    pub fn aggressor(&self) -> Side {
        Side::from_u8(self.aggressor_raw).unwrap_or(Side::Buy)
    }

    /// Price * quantity, widened so it cannot overflow
    pub fn notional(&self) -> u128 {
        (self.price as u128) * (self.quantity as u128)
    }

    /// Order ID of the participant on `side`
    pub fn order_id(&self, side: Side) -> OrderId {
        match side {
            Side::Buy => self.buy_order_id,
            Side::Sell => self.sell_order_id,
        }
    }

    /// Order ID of the resting (non-aggressing) order
    pub fn maker_order_id(&self) -> OrderId {
        self.order_id(self.aggressor().opposite())
    }

    /// Human-readable ticker, e.g. `STOCK17`
    pub fn ticker(&self) -> String {
        format!("STOCK{}", self.instrument)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
