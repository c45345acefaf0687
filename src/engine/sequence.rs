//! Order ID generation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::OrderId;

/// Lock-free source of order IDs.
///
/// A single `fetch_add` per call: every caller gets a distinct value, values
/// start at 1 and are dense (no gaps, even under contention).
///
/// ```
/// use lockfree_exchange::engine::SequenceGenerator;
///
/// let ids = SequenceGenerator::new();
/// assert_eq!(ids.next(), 1);
/// assert_eq!(ids.next(), 2);
/// assert_eq!(ids.current(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    last: AtomicU64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ID, strictly greater than every ID handed out before it
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> OrderId {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Last ID handed out, 0 if none
    #[inline]
    pub fn current(&self) -> OrderId {
        self.last.load(Ordering::Relaxed)
    }
}
