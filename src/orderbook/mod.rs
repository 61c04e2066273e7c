//! Core order book implementation module
//!
//! Storage layer: orders, price levels and the two-sided book that indexes
//! them. Everything here is venue-agnostic; translating exchange events into
//! these calls is the job of [`crate::feed`].

pub mod book;
pub mod error;
pub mod price_level;
pub mod types;

// Re-export main types for convenience
pub use book::{OrderBook, OrderBookStats, UpdateCallback};
pub use error::{OrderBookError, OrderBookResult};
pub use price_level::PriceLevel;
pub use types::{
    BookSnapshot, BookUpdate, Fill, LevelInfo, Order, OrderId, OrderLocation, Price, Side, Size,
    UpdateKind,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        // Test that all main types are accessible
        let _book = OrderBook::new("TEST");
        let _level = PriceLevel::new(100.0);
        let _order = Order::new("o1", Side::Buy, 100.0, 1.0);
        let _error = OrderBookError::UnknownId("o1".to_string());
    }
}
