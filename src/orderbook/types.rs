use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::utils::time::Clock;

/// Exchange-assigned order identifier (or a synthetic level id in L2 mode)
pub type OrderId = String;
pub type Price = f64;
pub type Size = f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = OrderBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "bid" => Ok(Side::Buy),
            "sell" | "ask" => Ok(Side::Sell),
            _ => Err(OrderBookError::UnknownSide(s.to_string())),
        }
    }
}

/// A resting order.
///
/// Identity, side and price are fixed at construction. Only the remaining
/// size changes; a price change is modelled as remove + add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    side: Side,
    price: Price,
    size: Size,
    timestamp: u64,
}

impl Order {
    /// Create an order stamped with the current monotonic time
    pub fn new(id: impl Into<OrderId>, side: Side, price: Price, size: Size) -> Self {
        Self::with_timestamp(id, side, price, size, Clock::monotonic_nanos())
    }

    pub fn with_timestamp(
        id: impl Into<OrderId>,
        side: Side,
        price: Price,
        size: Size,
        timestamp: u64,
    ) -> Self {
        Self {
            id: id.into(),
            side,
            price,
            size,
            timestamp,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Arrival time in monotonic nanoseconds
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Reduce remaining size by `amount` (partial fill).
    ///
    /// Rejects non-positive amounts and amounts larger than what remains;
    /// the order is left untouched on failure.
    pub fn reduce_size(&mut self, amount: Size) -> OrderBookResult<()> {
        if !(amount > 0.0) || amount > self.size {
            return Err(OrderBookError::InvalidSize(amount));
        }

        self.size -= amount;
        Ok(())
    }

    /// Unconditional size write; validation happens at the feed layer.
    pub(crate) fn set_size(&mut self, size: Size) {
        self.size = size;
    }
}

/// Where an order rests: side plus the key of its price level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderLocation {
    pub side: Side,
    pub price: Price,
}

/// Aggregated view of one price level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub price: Price,
    pub size: Size,
    pub order_count: usize,
}

/// Point-in-time copy of the book, best levels first on each side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    pub bids: Vec<LevelInfo>,
    pub asks: Vec<LevelInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    Added,
    Removed,
    Modified,
    Cleared,
}

/// Payload handed to the update callback after every successful mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub kind: UpdateKind,
    pub order_id: Option<OrderId>,
    pub side: Option<Side>,
    pub price: Option<Price>,
    pub sequence: u64,
}

/// Outcome of a trade against a resting order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    /// Order still rests with this much left
    Partial { remaining: Size },
    /// Order was drained and removed
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_creation() {
        let order = Order::new("test-order-1", Side::Buy, 100.0, 1.5);

        assert_eq!(order.id(), "test-order-1");
        assert_eq!(order.side(), Side::Buy);
        assert_eq!(order.price(), 100.0);
        assert_eq!(order.size(), 1.5);
    }

    #[test]
    fn test_reduce_size() {
        let mut order = Order::new("test-order-1", Side::Buy, 100.0, 1.5);

        order.reduce_size(0.5).unwrap();
        assert_eq!(order.size(), 1.0);

        // Too much
        assert!(order.reduce_size(2.0).is_err());
        assert_eq!(order.size(), 1.0);

        // Negative, zero and NaN
        assert!(order.reduce_size(-0.5).is_err());
        assert!(order.reduce_size(0.0).is_err());
        assert!(order.reduce_size(f64::NAN).is_err());
        assert_eq!(order.size(), 1.0);

        // Exactly what remains
        order.reduce_size(1.0).unwrap();
        assert_eq!(order.size(), 0.0);
    }

    #[test]
    fn test_timestamps_follow_arrival() {
        let first = Order::new("a", Side::Sell, 10.0, 1.0);
        let second = Order::new("b", Side::Sell, 10.0, 1.0);
        assert!(second.timestamp() >= first.timestamp());
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("SELL".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!("bid".parse::<Side>().unwrap(), Side::Buy);
        assert!(matches!(
            "hold".parse::<Side>(),
            Err(OrderBookError::UnknownSide(_))
        ));
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }
}
