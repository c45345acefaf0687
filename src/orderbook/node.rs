//! Order node for the lock-free priority queue.
//!
//! ## Design
//!
//! `OrderNode` wraps the immutable part of an `Order` with:
//!
//! - `remaining`: the live remaining quantity, decremented only by the
//!   book's matching loop
//! - `next`: an epoch-managed forward link to the next node
//!
//! ## Logical Deletion
//!
//! The low tag bit of `next` marks the node itself as deleted. Once set, the
//! link is frozen: every writer compares against an untagged pointer, so no
//! insert can hang a new node off a deleted one. A deleted node stays
//! reachable until some thread physically unlinks it, and its memory is only
//! handed back to the allocator after every pinned reader has moved on.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::epoch::Atomic;

use crate::types::{Order, OrderId, Side};

/// Tag carried by `next` once the owning node is logically deleted
pub(crate) const DELETED: usize = 1;

/// Node stored in a [`PriorityQueue`](crate::orderbook::PriorityQueue).
#[derive(Debug)]
pub struct OrderNode {
    /// Immutable order fields; `order.remaining` is the initial quantity
    order: Order,

    /// Live remaining quantity
    remaining: AtomicU64,

    /// Next node towards the tail (lower priority)
    pub(crate) next: Atomic<OrderNode>,
}

impl OrderNode {
    /// Create a new, unlinked order node
    ///
    /// ```
    /// use lockfree_exchange::orderbook::OrderNode;
    /// use lockfree_exchange::types::{Order, Side};
    ///
    /// let node = OrderNode::new(Order::new(1, 1, Side::Buy, 100, 10));
    /// assert_eq!(node.remaining(), 10);
    /// ```
    #[inline]
    pub fn new(order: Order) -> Self {
        let remaining = AtomicU64::new(order.remaining);
        Self {
            order,
            remaining,
            next: Atomic::null(),
        }
    }

    /// Get the order ID
    #[inline]
    pub fn order_id(&self) -> OrderId {
        self.order.id
    }

    /// Get the order price
    #[inline]
    pub fn price(&self) -> u64 {
        self.order.price
    }

    /// Get the order side
    #[inline]
    pub fn side(&self) -> Side {
        self.order.side()
    }

    /// Get the live remaining quantity
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Fill up to `quantity`
    ///
    /// # Returns
    ///
    /// The quantity actually filled (never more than what remained)
    pub fn fill(&self, quantity: u64) -> u64 {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                Some(left - quantity.min(left))
            })
            .unwrap_or_else(|left| left);
        quantity.min(previous)
    }

    /// Check if the order is fully filled
    #[inline]
    pub fn is_filled(&self) -> bool {
        self.remaining() == 0
    }

    /// Copy of the order with `remaining` read now
    pub fn snapshot(&self) -> Order {
        Order {
            remaining: self.remaining(),
            ..self.order.clone()
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
