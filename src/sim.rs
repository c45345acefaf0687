//! Broker simulation driver.
//!
//! Spawns one scoped thread per broker, each submitting random limit orders
//! to a shared engine. Order values come from a `ChaCha8Rng` seeded with
//! `seed + broker`, so each broker's order stream is reproducible (the
//! interleaving across threads is not).

use std::thread;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::engine::{Engine, OrderRequest};
use crate::error::{EngineError, Result};
use crate::types::{ExecutionReceipt, InstrumentId, Side};

/// Quantity range of generated orders
pub const QUANTITY_RANGE: std::ops::RangeInclusive<u64> = 1..=100;

/// Price range of generated orders
pub const PRICE_RANGE: std::ops::RangeInclusive<u64> = 10..=509;

/// Per-broker tallies
#[derive(Debug, Default, Clone, Copy)]
struct BrokerStats {
    accepted: u64,
    rejected: u64,
}

/// Generate `count` random order requests for an engine with
/// `instrument_count` books.
pub fn generate_orders(rng: &mut impl Rng, instrument_count: usize, count: usize) -> Vec<OrderRequest> {
    let max_instrument = instrument_count.max(1) as InstrumentId;
    (0..count)
        .map(|_| {
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            OrderRequest::new(
                side,
                rng.gen_range(1..=max_instrument),
                rng.gen_range(QUANTITY_RANGE),
                rng.gen_range(PRICE_RANGE),
            )
        })
        .collect()
}

/// Run the broker simulation against `engine`.
///
/// Validation rejections are counted; any other error aborts the run and is
/// returned.
pub fn simulate_trading(engine: &Engine, config: &SimulationConfig) -> Result<ExecutionReceipt> {
    info!(
        brokers = config.brokers,
        orders_per_broker = config.orders_per_broker,
        seed = config.seed,
        "starting simulation"
    );

    let trades_before = engine.trade_count();
    let quantity_before = engine.traded_quantity();
    let start = Instant::now();

    let results: Vec<Result<BrokerStats>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.brokers)
            .map(|broker| {
                let seed = config.seed.wrapping_add(broker as u64);
                scope.spawn(move || run_broker(engine, broker, seed, config.orders_per_broker))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    let mut totals = BrokerStats::default();
    for stats in results {
        let stats = stats?;
        totals.accepted += stats.accepted;
        totals.rejected += stats.rejected;
    }

    let receipt = engine.receipt(
        config.seed,
        totals.accepted,
        totals.rejected,
        trades_before,
        quantity_before,
        start.elapsed(),
    )?;

    info!(
        orders = receipt.orders_processed,
        rejected = receipt.orders_rejected,
        trades = receipt.trades_executed,
        quantity = receipt.quantity_traded,
        elapsed_us = receipt.elapsed_micros,
        state_root = %receipt.state_root_hex(),
        "simulation complete"
    );
    Ok(receipt)
}

fn run_broker(engine: &Engine, broker: usize, seed: u64, orders: usize) -> Result<BrokerStats> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut stats = BrokerStats::default();

    for request in generate_orders(&mut rng, engine.instrument_count(), orders) {
        match engine.submit_order(request) {
            Ok(_) => stats.accepted += 1,
            Err(
                EngineError::InvalidInstrument { .. }
                | EngineError::InvalidQuantity
                | EngineError::InvalidPrice,
            ) => stats.rejected += 1,
            Err(err) => return Err(err),
        }
    }

    debug!(broker, accepted = stats.accepted, rejected = stats.rejected, "broker finished");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::NullSink;
    use std::sync::Arc;

    #[test]
    fn test_generated_orders_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let orders = generate_orders(&mut rng, 8, 1_000);

        assert_eq!(orders.len(), 1_000);
        for order in &orders {
            assert!((1..=8).contains(&order.instrument));
            assert!(QUANTITY_RANGE.contains(&order.quantity));
            assert!(PRICE_RANGE.contains(&order.price));
        }
        assert!(orders.iter().any(|o| o.side == Side::Buy));
        assert!(orders.iter().any(|o| o.side == Side::Sell));
    }

    #[test]
    fn test_generation_is_seeded() {
        let a = generate_orders(&mut ChaCha8Rng::seed_from_u64(1), 4, 50);
        let b = generate_orders(&mut ChaCha8Rng::seed_from_u64(1), 4, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_simulation_accepts_every_order() {
        let engine = Engine::new(
            EngineConfig::default().with_instrument_count(8),
            Arc::new(NullSink),
        )
        .unwrap();
        let config = SimulationConfig {
            brokers: 4,
            orders_per_broker: 250,
            seed: 3,
        };

        let receipt = simulate_trading(&engine, &config).unwrap();

        assert_eq!(receipt.orders_processed, 1_000);
        assert_eq!(receipt.orders_rejected, 0);
        assert_eq!(receipt.trades_executed, engine.trade_count());
        assert_eq!(engine.last_order_id(), 1_000);
        for book in engine.books() {
            if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                assert!(bid < ask);
            }
        }
    }
}
