//! Execution receipt for batch processing results.
//!
//! The receipt summarises a batch of submitted orders (a simulation run or
//! any caller-defined batch), including the engine-wide state root.

use sha2::{Digest, Sha256};

/// Execution receipt summarizing a batch of processed orders.
///
/// ## State Root
///
/// The 32-byte state root is a SHA-256 hash over every book's resting
/// orders in priority order. Two single-threaded runs over the same input
/// produce the same root.
///
/// ## Example
///
/// ```
/// use lockfree_exchange::types::ExecutionReceipt;
///
/// let receipt = ExecutionReceipt::new(1, 1000, 0, 500, 12_000, [0u8; 32], 850);
/// assert_eq!(receipt.fill_rate(), Some(0.5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionReceipt {
    /// Batch sequence number
    pub batch_id: u64,

    /// Number of orders accepted in this batch
    pub orders_processed: u64,

    /// Number of orders rejected by validation
    pub orders_rejected: u64,

    /// Number of trades executed in this batch
    pub trades_executed: u64,

    /// Total quantity traded in this batch
    pub quantity_traded: u64,

    /// State root after execution (SHA-256, 32 bytes)
    pub state_root: [u8; 32],

    /// Wall-clock duration of the batch in microseconds
    pub elapsed_micros: u64,
}

impl ExecutionReceipt {
    /// Create a new execution receipt
    pub fn new(
        batch_id: u64,
        orders_processed: u64,
        orders_rejected: u64,
        trades_executed: u64,
        quantity_traded: u64,
        state_root: [u8; 32],
        elapsed_micros: u64,
    ) -> Self {
        Self {
            batch_id,
            orders_processed,
            orders_rejected,
            trades_executed,
            quantity_traded,
            state_root,
            elapsed_micros,
        }
    }

    /// Compute SHA-256 hash of the given data
    pub fn compute_hash(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    /// Get the state root as a hex string
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }

    /// Check if this receipt represents an empty batch
    pub fn is_empty(&self) -> bool {
        self.orders_processed == 0
    }

    /// Trades per accepted order, `None` for an empty batch
    pub fn fill_rate(&self) -> Option<f64> {
        if self.orders_processed == 0 {
            None
        } else {
            Some(self.trades_executed as f64 / self.orders_processed as f64)
        }
    }

    /// Accepted orders per second, `None` if no time elapsed
    pub fn throughput(&self) -> Option<f64> {
        if self.elapsed_micros == 0 {
            None
        } else {
            Some(self.orders_processed as f64 * 1_000_000.0 / self.elapsed_micros as f64)
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
