//! Lock-free price-ordered order queue (one per side per instrument).
//!
//! ## Structure
//!
//! A singly-linked list, best price at the head:
//!
//! ```text
//! head -> [101 #4] -> [100 #1] -> [100 #3] -> [99 #2] -> null     (Buy)
//! head -> [ 99 #2] -> [100 #1] -> [100 #3] -> [101 #4] -> null    (Sell)
//! ```
//!
//! Equal prices keep the order in which their inserts completed.
//!
//! ## Concurrency
//!
//! Every link update is a real `compare_exchange` against the pointer value
//! that was actually read. A failed CAS leaves the list untouched and the
//! operation restarts from a fresh read.
//!
//! Removal is two-phase:
//!
//! 1. **Mark**: tag the victim's `next` link as deleted. The thread whose
//!    mark lands owns the removal.
//! 2. **Unlink**: swing the predecessor's link past the victim. Any thread
//!    may do this while traversing; the one whose CAS succeeds retires the
//!    node to the epoch collector.
//!
//! Nodes are only freed through `Guard::defer_destroy`, so storage is never
//! reused while a pinned thread may still hold a pointer to it. That rules
//! out ABA on every link: an address seen by an in-flight CAS cannot come
//! back as a different node before that CAS resolves.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use crossbeam::utils::Backoff;
use tracing::{trace, warn};

use crate::error::{EngineError, Result};
use crate::orderbook::node::{OrderNode, DELETED};
use crate::types::{Order, Side};

/// Default number of failed CAS attempts tolerated per operation
pub const DEFAULT_RETRY_BUDGET: u32 = 1 << 16;

/// Per-operation CAS failure accounting with exponential backoff.
struct Retry {
    attempts: u32,
    budget: u32,
    backoff: Backoff,
}

impl Retry {
    fn new(budget: u32) -> Self {
        Self {
            attempts: 0,
            budget,
            backoff: Backoff::new(),
        }
    }

    /// Record a lost race; errors once the budget is spent.
    fn failed(&mut self, side: Side, op: &'static str) -> Result<()> {
        self.attempts += 1;
        if self.attempts > self.budget {
            warn!(%side, op, budget = self.budget, "CAS retry budget exhausted");
            return Err(EngineError::ContentionExhausted { budget: self.budget });
        }
        trace!(%side, op, attempt = self.attempts, "CAS lost race, retrying");
        self.backoff.spin();
        Ok(())
    }
}

/// Concurrent sorted queue of resting orders for one side of a book.
///
/// ## Example
///
/// ```
/// use lockfree_exchange::orderbook::PriorityQueue;
/// use lockfree_exchange::types::{Order, Side};
///
/// let bids = PriorityQueue::new(Side::Buy);
/// bids.insert(Order::new(1, 1, Side::Buy, 100, 5)).unwrap();
/// bids.insert(Order::new(2, 1, Side::Buy, 101, 5)).unwrap();
///
/// assert_eq!(bids.peek_front().map(|o| o.id), Some(2));
/// assert_eq!(bids.pop_front().unwrap().map(|o| o.id), Some(2));
/// assert_eq!(bids.len(), 1);
/// ```
#[derive(Debug)]
pub struct PriorityQueue {
    side: Side,
    head: Atomic<OrderNode>,
    len: AtomicUsize,
    retry_budget: u32,
}

impl PriorityQueue {
    /// Create an empty queue for `side`
    pub fn new(side: Side) -> Self {
        Self::with_retry_budget(side, DEFAULT_RETRY_BUDGET)
    }

    /// Create an empty queue with a custom CAS retry budget
    pub fn with_retry_budget(side: Side, retry_budget: u32) -> Self {
        Self {
            side,
            head: Atomic::null(),
            len: AtomicUsize::new(0),
            retry_budget,
        }
    }

    /// Side this queue sorts for
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of live (not logically deleted) orders.
    ///
    /// Exact when the queue is quiescent, approximate under concurrent use.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Check if the queue has no live orders
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Insert `order` behind every resting order of equal or better price.
    ///
    /// On `ContentionExhausted` the order was not linked and the queue is
    /// unchanged.
    pub fn insert(&self, order: Order) -> Result<()> {
        let guard = &epoch::pin();
        let price = order.price;
        let mut retry = Retry::new(self.retry_budget);
        let mut node = Owned::new(OrderNode::new(order));

        loop {
            let (pred, curr) = self.search(price, &mut retry, guard)?;
            node.next.store(curr, Ordering::Relaxed);

            match pred.compare_exchange(curr, node, Ordering::AcqRel, Ordering::Acquire, guard) {
                Ok(_) => {
                    self.len.fetch_add(1, Ordering::AcqRel);
                    return Ok(());
                }
                Err(err) => {
                    node = err.new;
                    retry.failed(self.side, "insert")?;
                }
            }
        }
    }

    /// Detach and return the head order, or `None` if the queue is empty.
    pub fn pop_front(&self) -> Result<Option<Order>> {
        let guard = &epoch::pin();
        let mut retry = Retry::new(self.retry_budget);

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            // SAFETY: nodes reachable from `head` are only destroyed through
            // `defer_destroy`, and `guard` keeps this epoch pinned.
            let Some(node) = (unsafe { head.as_ref() }) else {
                return Ok(None);
            };
            let next = node.next.load(Ordering::Acquire, guard);

            if next.tag() == DELETED {
                // Already removed by someone else; finish the unlink.
                if !self.unlink(&self.head, head, next, guard) {
                    retry.failed(self.side, "pop_front")?;
                }
                continue;
            }

            if node
                .next
                .compare_exchange(
                    next,
                    next.with_tag(DELETED),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                )
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::AcqRel);
                let order = node.snapshot();
                self.unlink(&self.head, head, next, guard);
                return Ok(Some(order));
            }

            retry.failed(self.side, "pop_front")?;
        }
    }

    /// Snapshot of the best resting order.
    ///
    /// The value may already be stale by the time the caller looks at it;
    /// anything acting on it must re-validate.
    pub fn peek_front(&self) -> Option<Order> {
        let guard = &epoch::pin();
        let front = self.front(guard);
        // SAFETY: see `front`.
        unsafe { front.as_ref() }.map(OrderNode::snapshot)
    }

    /// Live orders from head to tail.
    pub fn snapshot(&self) -> Vec<Order> {
        let guard = &epoch::pin();
        let mut orders = Vec::with_capacity(self.len());
        let mut curr = self.head.load(Ordering::Acquire, guard);

        // SAFETY: traversal is under `guard`; see `pop_front`.
        while let Some(node) = unsafe { curr.as_ref() } {
            let next = node.next.load(Ordering::Acquire, guard);
            if next.tag() != DELETED {
                orders.push(node.snapshot());
            }
            curr = next.with_tag(0);
        }
        orders
    }

    /// Sum of remaining quantity over live orders
    pub fn total_quantity(&self) -> u64 {
        self.snapshot().iter().map(|order| order.remaining).sum()
    }

    // ========================================================================
    // Crate-internal operations (used by the matching loop)
    // ========================================================================

    /// First live node, skipping any that are marked but not yet unlinked.
    pub(crate) fn front<'g>(&self, guard: &'g Guard) -> Shared<'g, OrderNode> {
        let mut curr = self.head.load(Ordering::Acquire, guard);
        // SAFETY: traversal is under `guard`; see `pop_front`.
        while let Some(node) = unsafe { curr.as_ref() } {
            let next = node.next.load(Ordering::Acquire, guard);
            if next.tag() != DELETED {
                return curr;
            }
            curr = next.with_tag(0);
        }
        Shared::null()
    }

    /// Remove a specific node (a fully filled order).
    ///
    /// Returns `false` if the node had already been removed by another
    /// thread.
    pub(crate) fn remove<'g>(&self, target: Shared<'g, OrderNode>, guard: &'g Guard) -> Result<bool> {
        // SAFETY: the caller obtained `target` under `guard`.
        let Some(node) = (unsafe { target.as_ref() }) else {
            return Ok(false);
        };
        let mut retry = Retry::new(self.retry_budget);

        loop {
            let next = node.next.load(Ordering::Acquire, guard);
            if next.tag() == DELETED {
                return Ok(false);
            }
            if node
                .next
                .compare_exchange(
                    next,
                    next.with_tag(DELETED),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                )
                .is_ok()
            {
                break;
            }
            retry.failed(self.side, "remove")?;
        }

        self.len.fetch_sub(1, Ordering::AcqRel);
        self.unlink_marked(target, node.price(), &mut retry, guard)?;
        Ok(true)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Find the insertion point for `price`.
    ///
    /// Returns `(pred, curr)` where `curr` is the first live node that
    /// `price` outranks (or null) and `pred` is the link that pointed to it
    /// when read. Marked nodes met along the way are unlinked.
    fn search<'g>(
        &'g self,
        price: u64,
        retry: &mut Retry,
        guard: &'g Guard,
    ) -> Result<(&'g Atomic<OrderNode>, Shared<'g, OrderNode>)> {
        'restart: loop {
            let mut pred = &self.head;
            let mut curr = pred.load(Ordering::Acquire, guard);

            // SAFETY: traversal is under `guard`; see `pop_front`.
            while let Some(node) = unsafe { curr.as_ref() } {
                let next = node.next.load(Ordering::Acquire, guard);

                if next.tag() == DELETED {
                    if !self.unlink(pred, curr, next, guard) {
                        retry.failed(self.side, "search")?;
                        continue 'restart;
                    }
                    curr = next.with_tag(0);
                    continue;
                }

                if self.side.outranks(price, node.price()) {
                    break;
                }

                pred = &node.next;
                curr = next;
            }

            return Ok((pred, curr));
        }
    }

    /// Physically unlink the marked node `target`, whose price is `price`.
    ///
    /// The walk ends at `target` or at the first node `price` outranks, so
    /// unlinking the head of a level touches one node no matter how deep the
    /// level is. Returns the number of nodes visited.
    fn unlink_marked<'g>(
        &self,
        target: Shared<'g, OrderNode>,
        price: u64,
        retry: &mut Retry,
        guard: &'g Guard,
    ) -> Result<usize> {
        let mut visited = 0;

        'restart: loop {
            let mut pred = &self.head;
            let mut curr = pred.load(Ordering::Acquire, guard);

            // SAFETY: traversal is under `guard`; see `pop_front`.
            while let Some(node) = unsafe { curr.as_ref() } {
                visited += 1;
                let next = node.next.load(Ordering::Acquire, guard);

                if curr.as_raw() == target.as_raw() {
                    if !self.unlink(pred, curr, next, guard) {
                        retry.failed(self.side, "remove")?;
                        continue 'restart;
                    }
                    return Ok(visited);
                }

                // Past the victim's level: another thread already unlinked it.
                if self.side.outranks(price, node.price()) {
                    return Ok(visited);
                }

                if next.tag() == DELETED {
                    if !self.unlink(pred, curr, next, guard) {
                        retry.failed(self.side, "remove")?;
                        continue 'restart;
                    }
                    curr = next.with_tag(0);
                    continue;
                }

                pred = &node.next;
                curr = next;
            }

            return Ok(visited);
        }
    }

    /// Swing `pred` from the marked node `curr` to its successor.
    ///
    /// The winner of this CAS is the only thread that retires `curr`.
    fn unlink<'g>(
        &self,
        pred: &Atomic<OrderNode>,
        curr: Shared<'g, OrderNode>,
        next: Shared<'g, OrderNode>,
        guard: &'g Guard,
    ) -> bool {
        match pred.compare_exchange(
            curr,
            next.with_tag(0),
            Ordering::AcqRel,
            Ordering::Acquire,
            guard,
        ) {
            Ok(_) => {
                // SAFETY: `curr` is now unreachable from the list; readers
                // that still hold it are pinned and outlive the deferral.
                unsafe { guard.defer_destroy(curr) };
                true
            }
            Err(_) => false,
        }
    }
}

/// Read-only handle to a queue owned by an [`OrderBook`](crate::orderbook::OrderBook).
///
/// Resting orders leave a book only through its matching loop, so the view
/// exposes queries and nothing that unlinks.
///
/// ```compile_fail
/// use lockfree_exchange::orderbook::OrderBook;
///
/// let book = OrderBook::new(1);
/// book.bids().pop_front();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct QueueView<'q> {
    queue: &'q PriorityQueue,
}

impl<'q> QueueView<'q> {
    pub(crate) fn new(queue: &'q PriorityQueue) -> Self {
        Self { queue }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.queue.side()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// See [`PriorityQueue::peek_front`]
    pub fn peek_front(&self) -> Option<Order> {
        self.queue.peek_front()
    }

    /// Live orders from head to tail
    pub fn snapshot(&self) -> Vec<Order> {
        self.queue.snapshot()
    }

    pub fn total_quantity(&self) -> u64 {
        self.queue.total_quantity()
    }
}

impl Drop for PriorityQueue {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach the list. Nodes
        // still linked (marked or not) were never handed to the collector,
        // so freeing them here cannot double free.
        unsafe {
            let guard = epoch::unprotected();
            let mut curr = self.head.load(Ordering::Relaxed, guard);
            while let Some(node) = curr.as_ref() {
                let next = node.next.load(Ordering::Relaxed, guard);
                drop(curr.into_owned());
                curr = next.with_tag(0);
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn order(id: u64, side: Side, price: u64, quantity: u64) -> Order {
        Order::new(id, 1, side, price, quantity)
    }

    fn ids(queue: &PriorityQueue) -> Vec<u64> {
        queue.snapshot().iter().map(|o| o.id).collect()
    }

    #[test]
    fn test_queue_empty() {
        let queue = PriorityQueue::new(Side::Buy);

        assert!(queue.is_empty());
        assert!(queue.peek_front().is_none());
        assert_eq!(queue.pop_front(), Ok(None));
    }

    #[test]
    fn test_buy_queue_descending_price() {
        let queue = PriorityQueue::new(Side::Buy);
        queue.insert(order(1, Side::Buy, 100, 1)).unwrap();
        queue.insert(order(2, Side::Buy, 102, 1)).unwrap();
        queue.insert(order(3, Side::Buy, 99, 1)).unwrap();
        queue.insert(order(4, Side::Buy, 101, 1)).unwrap();

        assert_eq!(ids(&queue), vec![2, 4, 1, 3]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_sell_queue_ascending_price() {
        let queue = PriorityQueue::new(Side::Sell);
        queue.insert(order(1, Side::Sell, 100, 1)).unwrap();
        queue.insert(order(2, Side::Sell, 98, 1)).unwrap();
        queue.insert(order(3, Side::Sell, 105, 1)).unwrap();
        queue.insert(order(4, Side::Sell, 99, 1)).unwrap();

        assert_eq!(ids(&queue), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_equal_price_is_fifo() {
        let queue = PriorityQueue::new(Side::Buy);
        queue.insert(order(1, Side::Buy, 100, 1)).unwrap();
        queue.insert(order(2, Side::Buy, 100, 1)).unwrap();
        queue.insert(order(3, Side::Buy, 101, 1)).unwrap();
        queue.insert(order(4, Side::Buy, 100, 1)).unwrap();

        assert_eq!(ids(&queue), vec![3, 1, 2, 4]);
    }

    #[test]
    fn test_pop_front_drains_in_priority_order() {
        let queue = PriorityQueue::new(Side::Sell);
        for (id, price) in [(1, 103), (2, 101), (3, 102), (4, 101)] {
            queue.insert(order(id, Side::Sell, price, 1)).unwrap();
        }

        let mut popped = Vec::new();
        while let Some(o) = queue.pop_front().unwrap() {
            popped.push(o.id);
        }

        assert_eq!(popped, vec![2, 4, 3, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_specific_node() {
        let queue = PriorityQueue::new(Side::Buy);
        queue.insert(order(1, Side::Buy, 100, 1)).unwrap();
        queue.insert(order(2, Side::Buy, 100, 1)).unwrap();
        queue.insert(order(3, Side::Buy, 99, 1)).unwrap();

        let guard = &epoch::pin();
        let head = queue.front(guard);
        // A better order lands in front after `head` was observed
        queue.insert(order(4, Side::Buy, 105, 1)).unwrap();

        assert_eq!(queue.remove(head, guard), Ok(true));
        assert_eq!(queue.remove(head, guard), Ok(false));
        assert_eq!(ids(&queue), vec![4, 2, 3]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_marked_head_is_skipped_and_unlinked() {
        let queue = PriorityQueue::new(Side::Sell);
        queue.insert(order(1, Side::Sell, 100, 1)).unwrap();
        queue.insert(order(2, Side::Sell, 101, 1)).unwrap();

        let guard = &epoch::pin();
        let head = queue.head.load(Ordering::Acquire, guard);
        let node = unsafe { head.deref() };
        let next = node.next.load(Ordering::Acquire, guard);
        // Mark without unlinking, as a stalled remover would leave it
        node.next.store(next.with_tag(DELETED), Ordering::Release);
        queue.len.fetch_sub(1, Ordering::AcqRel);

        assert_eq!(queue.peek_front().map(|o| o.id), Some(2));

        // An insert that traverses past the marked node unlinks it
        queue.insert(order(3, Side::Sell, 102, 1)).unwrap();
        let head = queue.head.load(Ordering::Acquire, guard);
        assert_eq!(unsafe { head.deref() }.order_id(), 2);
        assert_eq!(ids(&queue), vec![2, 3]);
    }

    /// Mark `target` deleted the way `remove` does, without unlinking it.
    fn mark(queue: &PriorityQueue, target: Shared<'_, OrderNode>, guard: &Guard) {
        let node = unsafe { target.deref() };
        let next = node.next.load(Ordering::Acquire, guard);
        node.next.store(next.with_tag(DELETED), Ordering::Release);
        queue.len.fetch_sub(1, Ordering::AcqRel);
    }

    #[test]
    fn test_unlink_head_of_deep_level_visits_one_node() {
        let queue = PriorityQueue::new(Side::Sell);
        for id in 1..=10_000 {
            queue.insert(order(id, Side::Sell, 100, 1)).unwrap();
        }

        let guard = &epoch::pin();
        let mut retry = Retry::new(queue.retry_budget);
        for expected in 1..=3 {
            let head = queue.front(guard);
            assert_eq!(unsafe { head.deref() }.order_id(), expected);
            mark(&queue, head, guard);
            assert_eq!(queue.unlink_marked(head, 100, &mut retry, guard), Ok(1));
        }
        assert_eq!(queue.len(), 9_997);
        assert_eq!(queue.peek_front().map(|o| o.id), Some(4));
    }

    #[test]
    fn test_unlink_stops_at_target_inside_level() {
        let queue = PriorityQueue::new(Side::Buy);
        for id in 1..=1_000 {
            queue.insert(order(id, Side::Buy, 100, 1)).unwrap();
        }

        let guard = &epoch::pin();
        let mut target = queue.front(guard);
        for _ in 0..4 {
            target = unsafe { target.deref() }.next.load(Ordering::Acquire, guard);
        }
        assert_eq!(unsafe { target.deref() }.order_id(), 5);

        let mut retry = Retry::new(queue.retry_budget);
        mark(&queue, target, guard);
        assert_eq!(queue.unlink_marked(target, 100, &mut retry, guard), Ok(5));
        assert_eq!(&ids(&queue)[..5], &[1, 2, 3, 4, 6]);
    }

    #[test]
    fn test_unlink_of_already_unlinked_node_stops_at_level_end() {
        let queue = PriorityQueue::new(Side::Buy);
        queue.insert(order(1, Side::Buy, 101, 1)).unwrap();
        queue.insert(order(2, Side::Buy, 100, 1)).unwrap();
        for id in 3..=100 {
            queue.insert(order(id, Side::Buy, 99, 1)).unwrap();
        }

        let guard = &epoch::pin();
        let head = queue.front(guard);
        assert_eq!(queue.remove(head, guard), Ok(true));

        // A second unlink of the same node walks to the first worse price
        let mut retry = Retry::new(queue.retry_budget);
        assert_eq!(queue.unlink_marked(head, 101, &mut retry, guard), Ok(1));
        assert_eq!(queue.len(), 99);
    }

    #[test]
    fn test_zero_budget_reports_contention() {
        let queue = PriorityQueue::with_retry_budget(Side::Buy, 0);
        let mut retry = Retry::new(queue.retry_budget);

        assert_eq!(
            retry.failed(Side::Buy, "insert"),
            Err(EngineError::ContentionExhausted { budget: 0 })
        );
        // Uncontended operations never spend budget
        queue.insert(order(1, Side::Buy, 100, 1)).unwrap();
        assert_eq!(queue.pop_front().unwrap().map(|o| o.id), Some(1));
    }

    #[test]
    fn test_total_quantity() {
        let queue = PriorityQueue::new(Side::Buy);
        queue.insert(order(1, Side::Buy, 100, 7)).unwrap();
        queue.insert(order(2, Side::Buy, 101, 5)).unwrap();

        assert_eq!(queue.total_quantity(), 12);
    }

    #[test]
    fn test_concurrent_insert_and_pop() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 500;

        let queue = Arc::new(PriorityQueue::new(Side::Buy));
        let popped = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let queue = Arc::clone(&queue);
                let popped = Arc::clone(&popped);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let id = t * PER_THREAD + i + 1;
                        queue.insert(order(id, Side::Buy, 100 + (id % 17), 1)).unwrap();
                        if i % 3 == 0 && queue.pop_front().unwrap().is_some() {
                            popped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let remaining = queue.snapshot();
        let total = (THREADS * PER_THREAD) as usize;
        assert_eq!(remaining.len() + popped.load(Ordering::Relaxed), total);
        assert_eq!(queue.len(), remaining.len());
        assert!(remaining.windows(2).all(|w| w[0].price >= w[1].price));
    }
}
