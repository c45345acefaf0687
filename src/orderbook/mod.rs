//! Order book module.
//!
//! ## Architecture
//!
//! Each instrument has one [`OrderBook`] holding two lock-free
//! [`PriorityQueue`]s:
//!
//! - **Bids**: sorted high-to-low
//! - **Asks**: sorted low-to-high
//!
//! Nodes are reclaimed through `crossbeam::epoch`, so no node is freed
//! while a concurrent reader could still dereference it.
//!
//! ## Components
//!
//! - [`OrderNode`]: order plus atomic remaining quantity and tagged link
//! - [`PriorityQueue`]: concurrent sorted list with CAS retry loops
//! - [`OrderBook`]: both sides plus the matching loop
//!
//! ## Complexity
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | Insert | O(n) walk to the price position |
//! | Pop front | O(1) |
//! | Best bid/ask | O(1) |
//! | Matching pass | O(k) in trades produced |

pub mod node;
pub mod queue;
pub mod book;

pub use node::OrderNode;
pub use queue::{PriorityQueue, QueueView, DEFAULT_RETRY_BUDGET};
pub use book::OrderBook;
