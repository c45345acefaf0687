//! Order types for the matching engine.
//!
//! ## SSZ Serialization
//!
//! `Order` derives `SimpleSerialize` from ssz_rs so resting book state has a
//! single deterministic byte layout, which is what state roots hash over.
//!
//! ## Integer Prices
//!
//! Prices and quantities are plain positive integers (ticks and lots).
//! There is no scaling; the engine never divides.

use ssz_rs::prelude::*;

/// Unique, strictly increasing order identifier
pub type OrderId = u64;

/// 1-based instrument index at the public boundary
pub type InstrumentId = u32;

// ============================================================================
// Side enum
// ============================================================================

/// Order side: Buy or Sell
///
/// Represented as u8 for SSZ compatibility:
/// - Buy = 0
/// - Sell = 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Buy order (bid) - best price is the highest
    #[default]
    Buy,
    /// Sell order (ask) - best price is the lowest
    Sell,
}

impl Side {
    /// Convert to u8 for serialization
    pub fn to_u8(self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    /// Convert from u8 for deserialization
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Side::Buy),
            1 => Some(Side::Sell),
            _ => None,
        }
    }

    /// Returns the opposite side
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Whether `candidate` has strictly better priority than `incumbent`
    /// on this side.
    ///
    /// Equal prices never outrank each other, so a newcomer queues behind
    /// every resting order at its price (FIFO within a level).
    ///
    /// ```
    /// use lockfree_exchange::types::Side;
    ///
    /// assert!(Side::Buy.outranks(101, 100));
    /// assert!(Side::Sell.outranks(99, 100));
    /// assert!(!Side::Buy.outranks(100, 100));
    /// ```
    #[inline]
    pub fn outranks(self, candidate: u64, incumbent: u64) -> bool {
        match self {
            Side::Buy => candidate > incumbent,
            Side::Sell => candidate < incumbent,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => f.write_str("Buy"),
            Side::Sell => f.write_str("Sell"),
        }
    }
}

// ============================================================================
// Order struct
// ============================================================================

/// A limit order.
///
/// `id`, `instrument`, `side`, `price` and `quantity` are fixed at creation.
/// `remaining` is a snapshot: inside a book the live remaining quantity is
/// held atomically by the owning [`OrderNode`](crate::orderbook::OrderNode),
/// and copies handed out to callers carry its value at read time.
///
/// ## SSZ Layout
///
/// Fixed-size container: 8+4+1+8+8+8 = 37 bytes.
///
/// ## Example
///
/// ```
/// use lockfree_exchange::types::{Order, Side};
///
/// let order = Order::new(1, 7, Side::Buy, 100, 10);
/// assert_eq!(order.side(), Side::Buy);
/// assert_eq!(order.remaining, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct Order {
    /// Unique order identifier (assigned by the sequence generator)
    pub id: u64,

    /// 1-based instrument index
    pub instrument: u32,

    /// Order side as u8 (0=Buy, 1=Sell)
    pub side_raw: u8,

    /// Limit price, never mutated
    pub price: u64,

    /// Original quantity
    pub quantity: u64,

    /// Remaining quantity at the time this value was read
    pub remaining: u64,
}

impl Order {
    /// Create a new limit order with its full quantity remaining
    pub fn new(id: OrderId, instrument: InstrumentId, side: Side, price: u64, quantity: u64) -> Self {
        Self {
            id,
            instrument,
            side_raw: side.to_u8(),
            price,
            quantity,
            remaining: quantity,
        }
    }

    /// Get the order side
    pub fn side(&self) -> Side {
        Side::from_u8(self.side_raw).unwrap_or(Side::Buy)
    }

    /// Check if the order is fully filled
    pub fn is_filled(&self) -> bool {
        self.remaining == 0
    }

    /// Get the filled quantity
    pub fn filled_quantity(&self) -> u64 {
        self.quantity.saturating_sub(self.remaining)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_conversion() {
        assert_eq!(Side::Buy.to_u8(), 0);
        assert_eq!(Side::Sell.to_u8(), 1);
        assert_eq!(Side::from_u8(0), Some(Side::Buy));
        assert_eq!(Side::from_u8(1), Some(Side::Sell));
        assert_eq!(Side::from_u8(2), None);
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_side_outranks() {
        assert!(Side::Buy.outranks(101, 100));
        assert!(!Side::Buy.outranks(99, 100));
        assert!(!Side::Buy.outranks(100, 100));

        assert!(Side::Sell.outranks(99, 100));
        assert!(!Side::Sell.outranks(101, 100));
        assert!(!Side::Sell.outranks(100, 100));
    }

    #[test]
    fn test_order_new() {
        let order = Order::new(1, 42, Side::Sell, 250, 30);

        assert_eq!(order.id, 1);
        assert_eq!(order.instrument, 42);
        assert_eq!(order.side(), Side::Sell);
        assert_eq!(order.price, 250);
        assert_eq!(order.quantity, 30);
        assert_eq!(order.remaining, 30);
        assert_eq!(order.filled_quantity(), 0);
        assert!(!order.is_filled());
    }

    #[test]
    fn test_order_ssz_roundtrip() {
        let mut order = Order::new(9, 3, Side::Sell, 510, 40);
        order.remaining = 15;

        let bytes = ssz_rs::serialize(&order).expect("Failed to serialize");
        assert_eq!(bytes.len(), 37, "Order should serialize to 37 bytes");

        let decoded: Order = ssz_rs::deserialize(&bytes).expect("Failed to deserialize");
        assert_eq!(decoded, order);
        assert_eq!(decoded.filled_quantity(), 25);
    }
}
