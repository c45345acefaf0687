//! Lock-free Exchange - Binary Entry Point
//!
//! Runs the broker simulation against a fresh engine and logs the receipt.
//! Configure with `ENGINE_*` / `SIM_*` environment variables and `RUST_LOG`.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lockfree_exchange::sim::simulate_trading;
use lockfree_exchange::{Engine, EngineConfig, LogSink, SimulationConfig};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> lockfree_exchange::Result<()> {
    let engine_config = EngineConfig::from_env()?;
    let sim_config = SimulationConfig::from_env()?;

    let engine = Engine::new(engine_config, Arc::new(LogSink))?;
    let receipt = simulate_trading(&engine, &sim_config)?;

    info!(
        fill_rate = receipt.fill_rate().unwrap_or_default(),
        orders_per_sec = receipt.throughput().unwrap_or_default(),
        "run summary"
    );
    Ok(())
}
