//! Configuration Module
//! Engine and simulation settings, with defaults and environment overrides

use std::env;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::orderbook::DEFAULT_RETRY_BUDGET;

/// Default number of instruments (and therefore books)
pub const DEFAULT_INSTRUMENT_COUNT: usize = 1024;

/// Which order's quote a trade prints at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricePolicy {
    /// Always the sell order's price
    #[default]
    SellSide,
    /// The earlier-submitted order's price (the resting quote)
    Maker,
}

impl FromStr for PricePolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sell" | "sell-side" | "sell_side" => Ok(Self::SellSide),
            "maker" | "resting" => Ok(Self::Maker),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown price policy '{other}'"
            ))),
        }
    }
}

/// Engine construction parameters. Fixed for the lifetime of an `Engine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub instrument_count: usize,
    pub retry_budget: u32,
    pub price_policy: PricePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instrument_count: DEFAULT_INSTRUMENT_COUNT,
            retry_budget: DEFAULT_RETRY_BUDGET,
            price_policy: PricePolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_instrument_count(mut self, instrument_count: usize) -> Self {
        self.instrument_count = instrument_count;
        self
    }

    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_price_policy(mut self, price_policy: PricePolicy) -> Self {
        self.price_policy = price_policy;
        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.instrument_count == 0 {
            return Err(EngineError::InvalidConfig(
                "instrument_count must be at least 1".to_string(),
            ));
        }
        if self.instrument_count > u32::MAX as usize {
            return Err(EngineError::InvalidConfig(format!(
                "instrument_count {} does not fit a u32 index",
                self.instrument_count
            )));
        }
        Ok(())
    }

    /// Load from `ENGINE_INSTRUMENTS`, `ENGINE_RETRY_BUDGET` and
    /// `ENGINE_PRICE_POLICY`, falling back to defaults when unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            instrument_count: parse_var("ENGINE_INSTRUMENTS", defaults.instrument_count)?,
            retry_budget: parse_var("ENGINE_RETRY_BUDGET", defaults.retry_budget)?,
            price_policy: match env::var("ENGINE_PRICE_POLICY") {
                Ok(raw) => raw.parse()?,
                Err(_) => defaults.price_policy,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parameters for the broker simulation driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    pub brokers: usize,
    pub orders_per_broker: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            brokers: 10,
            orders_per_broker: 200,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Load from `SIM_BROKERS`, `SIM_ORDERS` and `SIM_SEED`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            brokers: parse_var("SIM_BROKERS", defaults.brokers)?,
            orders_per_broker: parse_var("SIM_ORDERS", defaults.orders_per_broker)?,
            seed: parse_var("SIM_SEED", defaults.seed)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidConfig(format!("{name}='{raw}' is not valid"))),
        Err(_) => Ok(default),
    }
}
