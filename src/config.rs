//! Engine configuration.
//!
//! All structs deserialize from JSON with every field optional; anything
//! left out falls back to `Default`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::utils::DEFAULT_PRICE_TOLERANCE;

/// Settings for the storage layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Relative tolerance for price equality. Orders within this distance
    /// of an existing level join it instead of opening a new one.
    pub price_tolerance: f64,

    /// Depth used by consumers that do not ask for a specific one
    pub default_depth: usize,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            price_tolerance: DEFAULT_PRICE_TOLERANCE,
            default_depth: 10,
        }
    }
}

impl BookConfig {
    pub fn with_price_tolerance(mut self, tolerance: f64) -> Self {
        self.price_tolerance = tolerance;
        self
    }

    pub fn with_default_depth(mut self, depth: usize) -> Self {
        self.default_depth = depth;
        self
    }
}

/// Which orders a `match` event reduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Only the resting maker order
    MakerOnly,
    /// The maker, and the taker too when it is itself resting
    MakerAndTaker,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy::MakerOnly
    }
}

/// Settings for event reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub match_policy: MatchPolicy,

    /// Prefix for synthetic ids of aggregated bid levels
    pub bid_id_prefix: String,

    /// Prefix for synthetic ids of aggregated ask levels
    pub ask_id_prefix: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::MakerOnly,
            bid_id_prefix: "bid-".to_string(),
            ask_id_prefix: "ask-".to_string(),
        }
    }
}

impl ReconcilerConfig {
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }
}

/// Top-level configuration for one book instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbol: String,
    pub book: BookConfig,
    pub reconciler: ReconcilerConfig,

    /// Interval between metrics reports, in milliseconds
    pub metrics_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USD".to_string(),
            book: BookConfig::default(),
            reconciler: ReconcilerConfig::default(),
            metrics_interval_ms: 5_000,
        }
    }
}

impl EngineConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> OrderBookResult<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| OrderBookError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> OrderBookResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OrderBookError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> OrderBookResult<()> {
        if self.symbol.is_empty() {
            return Err(OrderBookError::Config("symbol must not be empty".to_string()));
        }
        if !self.book.price_tolerance.is_finite() || self.book.price_tolerance < 0.0 {
            return Err(OrderBookError::Config(format!(
                "price_tolerance must be a non-negative number, got {}",
                self.book.price_tolerance
            )));
        }
        if self.reconciler.bid_id_prefix == self.reconciler.ask_id_prefix {
            return Err(OrderBookError::Config(
                "bid and ask id prefixes must differ".to_string(),
            ));
        }
        Ok(())
    }
}
