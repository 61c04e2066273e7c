use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::feed::event::FeedMessage;
use crate::feed::reconciler::FeedReconciler;
use crate::metrics::FeedMetrics;
use crate::orderbook::error::OrderBookError;
use crate::orderbook::OrderBook;

/// Venue-specific handling of decoded feed messages.
///
/// Transport and decoding stay with the caller; an implementation only
/// routes messages into its reconciler and decides what to log.
pub trait FeedHandler: Send + Sync {
    /// Short venue name, used as a metrics label
    fn venue(&self) -> &'static str;

    /// Book this handler maintains
    fn book(&self) -> &Arc<OrderBook>;

    /// Handle one message; true when it changed the book
    fn on_message(&self, message: FeedMessage) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Coinbase,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Coinbase => "coinbase",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Venue {
    type Err = OrderBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coinbase" => Ok(Venue::Coinbase),
            other => Err(OrderBookError::Config(format!("unknown venue: {}", other))),
        }
    }
}

/// Create the handler for a venue
pub fn handler_for(venue: Venue, reconciler: FeedReconciler) -> Box<dyn FeedHandler> {
    match venue {
        Venue::Coinbase => Box::new(CoinbaseHandler::new(reconciler)),
    }
}

/// Coinbase-style full channel: L3 lifecycle events plus level2 and ticker
pub struct CoinbaseHandler {
    reconciler: FeedReconciler,
    metrics: Option<Arc<FeedMetrics>>,
}

impl CoinbaseHandler {
    pub fn new(reconciler: FeedReconciler) -> Self {
        Self {
            reconciler,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<FeedMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn reconciler(&self) -> &FeedReconciler {
        &self.reconciler
    }
}

impl FeedHandler for CoinbaseHandler {
    fn venue(&self) -> &'static str {
        Venue::Coinbase.as_str()
    }

    fn book(&self) -> &Arc<OrderBook> {
        self.reconciler.book()
    }

    fn on_message(&self, message: FeedMessage) -> bool {
        if let Some(metrics) = &self.metrics {
            metrics.increment_messages(self.venue());
        }

        match message {
            FeedMessage::Snapshot { bids, asks } => {
                let loaded = self.reconciler.apply_snapshot(&bids, &asks);
                info!(
                    symbol = self.book().symbol(),
                    bids = bids.len(),
                    asks = asks.len(),
                    loaded,
                    "snapshot applied"
                );
                true
            }
            FeedMessage::L2Update { changes } => {
                let mut changed = false;
                for change in changes {
                    match self.reconciler.apply_l2(change) {
                        Ok(outcome) => changed |= outcome.mutated(),
                        Err(e) => warn!(
                            side = %change.side,
                            price = change.price,
                            size = change.size,
                            error = %e,
                            "l2 change dropped"
                        ),
                    }
                }
                changed
            }
            FeedMessage::Ticker {
                best_bid,
                best_bid_size,
                best_ask,
                best_ask_size,
            } => match self
                .reconciler
                .apply_ticker(best_bid, best_bid_size, best_ask, best_ask_size)
            {
                Ok(_) => true,
                Err(e) => {
                    warn!(best_bid, best_ask, error = %e, "ticker dropped");
                    false
                }
            },
            FeedMessage::L3(event) => {
                // Side for logging only; the book resolves it on its own
                let side = event
                    .side
                    .or_else(|| event.order_id.as_deref().and_then(|id| self.book().side_of(id)));

                match self.reconciler.process(&event) {
                    Ok(outcome) => {
                        debug!(
                            kind = %event.kind,
                            order_id = ?event.order_id,
                            side = ?side,
                            ?outcome,
                            "event reconciled"
                        );
                        outcome.mutated()
                    }
                    Err(e) if e.is_benign() => {
                        debug!(kind = %event.kind, order_id = ?event.order_id, error = %e, "event skipped");
                        false
                    }
                    Err(e) => {
                        warn!(kind = %event.kind, order_id = ?event.order_id, error = %e, "event dropped");
                        false
                    }
                }
            }
            FeedMessage::Heartbeat => false,
            FeedMessage::Subscriptions { channels } => {
                info!(venue = self.venue(), ?channels, "subscriptions confirmed");
                false
            }
            FeedMessage::Error(message) => {
                warn!(venue = self.venue(), %message, "venue reported error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::event::{FeedEvent, L2Change};
    use crate::orderbook::Side;

    fn handler() -> Box<dyn FeedHandler> {
        let book = Arc::new(OrderBook::new("BTC-USD"));
        handler_for(Venue::Coinbase, FeedReconciler::new(book))
    }

    #[test]
    fn test_venue_parsing() {
        assert_eq!("Coinbase".parse::<Venue>().unwrap(), Venue::Coinbase);
        assert!("kraken".parse::<Venue>().is_err());
        assert_eq!(handler().venue(), "coinbase");
    }

    #[test]
    fn test_routes_l3_events() {
        let handler = handler();

        assert!(handler.on_message(FeedMessage::L3(FeedEvent::open("o1", Side::Buy, 100.0, 1.0))));
        assert!(!handler.on_message(FeedMessage::L3(FeedEvent::open("o1", Side::Buy, 100.0, 1.0))));
        assert!(handler.on_message(FeedMessage::L3(FeedEvent::done("o1"))));
        assert!(!handler.on_message(FeedMessage::L3(FeedEvent::done("o1"))));
        assert_eq!(handler.book().order_count(), 0);
    }

    #[test]
    fn test_routes_aggregated_messages() {
        let handler = handler();

        assert!(handler.on_message(FeedMessage::Snapshot {
            bids: vec![(100.0, 1.0), (99.0, 2.0)],
            asks: vec![(101.0, 1.0)],
        }));
        assert_eq!(handler.book().order_count(), 3);

        assert!(handler.on_message(FeedMessage::L2Update {
            changes: vec![
                L2Change::new(Side::Buy, 100.0, 0.0),
                L2Change::new(Side::Sell, 101.0, 4.0),
                L2Change::new(Side::Sell, f64::NAN, 1.0),
            ],
        }));
        assert_eq!(handler.book().best_bid(), 99.0);
        assert_eq!(handler.book().levels(Side::Sell, 1), vec![(101.0, 4.0)]);

        assert!(handler.on_message(FeedMessage::Ticker {
            best_bid: 100.25,
            best_bid_size: 1.0,
            best_ask: 100.75,
            best_ask_size: 2.0,
        }));
        assert_eq!(handler.book().order_count(), 2);
        assert_eq!(handler.book().spread(), 0.5);
    }

    #[test]
    fn test_control_messages_leave_book_alone() {
        let handler = handler();
        assert!(!handler.on_message(FeedMessage::Heartbeat));
        assert!(!handler.on_message(FeedMessage::Subscriptions {
            channels: vec!["full".to_string()],
        }));
        assert!(!handler.on_message(FeedMessage::Error("bad request".to_string())));
        assert_eq!(handler.book().sequence(), 0);
    }

    #[test]
    fn test_counts_messages() {
        let book = Arc::new(OrderBook::new("BTC-USD"));
        let metrics = Arc::new(FeedMetrics::new());
        let handler = CoinbaseHandler::new(FeedReconciler::new(book)).with_metrics(Arc::clone(&metrics));

        handler.on_message(FeedMessage::Heartbeat);
        handler.on_message(FeedMessage::L3(FeedEvent::open("o", Side::Sell, 5.0, 1.0)));
        assert_eq!(metrics.messages_received(), 2);
        assert_eq!(handler.reconciler().counts().applied, 1);
    }
}
