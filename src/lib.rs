//! Feed-Driven Limit Order Book
//!
//! An in-memory, price-indexed order book for one instrument, kept in sync
//! with an exchange market-data feed. The book is a passive mirror: it never
//! matches orders itself, it only applies what the venue reports.
//!
//! # Features
//!
//! - **Price Indexing**: Bids and asks in ordered maps, best level in O(log n)
//! - **Per-Order Tracking**: FIFO queue of orders inside every price level
//! - **Feed Reconciliation**: L3 lifecycle events (`open`, `match`, `change`,
//!   `done`), L2 level changes, snapshots and ticker updates
//! - **Thread Safe**: One book-wide lock; readers never see a torn update
//! - **Monitoring**: `metrics` counters and histograms, `tracing` logs
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use feed_orderbook::{EventKind, FeedReconciler, OrderBook, Side};
//!
//! let book = Arc::new(OrderBook::new("BTC-USD"));
//! let reconciler = FeedReconciler::new(Arc::clone(&book));
//!
//! reconciler.apply_event(EventKind::Open, "o1", Some(Side::Buy), Some(100.0), Some(1.5));
//! reconciler.apply_event(EventKind::Open, "o2", Some(Side::Sell), Some(101.0), Some(1.0));
//!
//! assert_eq!(book.best_bid(), 100.0);
//! assert_eq!(book.best_ask(), 101.0);
//! assert_eq!(book.spread(), 1.0);
//! ```
//!
//! # Architecture
//!
//! The order book uses a two-level data structure:
//!
//! 1. **Price Levels**: `BTreeMap<OrderedFloat<f64>, PriceLevel>` per side
//! 2. **Order Queues**: Within each price level, orders keep arrival order in
//!    an `IndexMap` so that removal by id does not scan the queue
//!
//! A side index maps every order id to its (side, level price), which is
//! what lets `done` and `change` events that omit the side find their order.

pub mod config;
pub mod feed;
pub mod metrics;
pub mod orderbook;
pub mod utils;

// Re-export commonly used types
pub use config::{BookConfig, EngineConfig, MatchPolicy, ReconcilerConfig};
pub use feed::{
    EventKind, EventOutcome, FeedEvent, FeedHandler, FeedMessage, FeedReconciler, L2Change,
};
pub use orderbook::{
    error::{OrderBookError, OrderBookResult},
    types::{BookUpdate, Order, OrderId, Price, Side, Size, UpdateKind},
    OrderBook,
};

pub use metrics::FeedMetrics;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_l3_lifecycle_workflow() {
        let book = Arc::new(OrderBook::new("BTC-USD"));
        let reconciler = FeedReconciler::new(Arc::clone(&book));

        let events = [
            FeedEvent::open("a1", Side::Sell, 101.0, 2.0),
            FeedEvent::open("b1", Side::Buy, 100.0, 1.0),
            FeedEvent::trade("a1", 0.5).with_taker("t1"),
            FeedEvent::change("b1", 0.75),
            FeedEvent::done("b1"),
        ];
        for event in &events {
            reconciler.process(event).unwrap();
        }

        assert_eq!(book.levels(Side::Sell, 10), vec![(101.0, 1.5)]);
        assert!(book.levels(Side::Buy, 10).is_empty());
        assert_eq!(reconciler.counts().applied, 5);
    }

    #[test]
    fn test_concurrent_feed_and_readers() {
        let book = Arc::new(OrderBook::new("TEST"));
        let mut handles = vec![];

        // Spawn multiple writer threads with disjoint ids
        for thread_id in 0..4 {
            let book_clone = Arc::clone(&book);
            let handle = thread::spawn(move || {
                let reconciler = FeedReconciler::new(book_clone);
                for i in 0..100 {
                    let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                    let price = match side {
                        Side::Buy => 100.0 - (i % 10) as f64,
                        Side::Sell => 101.0 + (i % 10) as f64,
                    };
                    let id = format!("t{}-{}", thread_id, i);
                    assert!(reconciler.apply_event(EventKind::Open, &id, Some(side), Some(price), Some(1.0)));
                }
            });
            handles.push(handle);
        }

        // Readers only ever see a consistent book
        let reader_book = Arc::clone(&book);
        let reader = thread::spawn(move || {
            for _ in 0..200 {
                let snapshot = reader_book.snapshot(20);
                let bid_orders: usize = snapshot.bids.iter().map(|l| l.order_count).sum();
                let bid_size: f64 = snapshot.bids.iter().map(|l| l.size).sum();
                assert_eq!(bid_orders as f64, bid_size);
            }
        });

        for handle in handles {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(book.order_count(), 400);
        assert_eq!(book.level_count(Side::Buy), 5);
        assert_eq!(book.level_count(Side::Sell), 5);
        assert_eq!(book.total_size(Side::Buy), 200.0);
    }
}
