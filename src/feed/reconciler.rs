use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::config::{MatchPolicy, ReconcilerConfig};
use crate::feed::event::{EventKind, FeedEvent, L2Change};
use crate::metrics::FeedMetrics;
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::types::{Fill, Order, OrderId, Price, Side, Size, UpdateKind};
use crate::orderbook::OrderBook;
use crate::utils::format_price;

/// What an event did to the book
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventOutcome {
    Applied(UpdateKind),
    Filled(Fill),
    /// Valid event with nothing to do (unknown id, already removed)
    Ignored,
}

impl EventOutcome {
    pub fn mutated(&self) -> bool {
        !matches!(self, EventOutcome::Ignored)
    }
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    ignored: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileCounts {
    pub applied: u64,
    pub ignored: u64,
    pub dropped: u64,
}

/// Translates exchange events into book mutations.
///
/// Holds no per-order state of its own: the book is the only source of
/// truth, and every lookup-then-write is delegated to a single book call so
/// it runs under one lock hold.
pub struct FeedReconciler {
    book: Arc<OrderBook>,
    config: ReconcilerConfig,
    metrics: Option<Arc<FeedMetrics>>,
    counters: Counters,
}

impl FeedReconciler {
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self::with_config(book, ReconcilerConfig::default())
    }

    pub fn with_config(book: Arc<OrderBook>, config: ReconcilerConfig) -> Self {
        Self {
            book,
            config,
            metrics: None,
            counters: Counters::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<FeedMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn book(&self) -> &Arc<OrderBook> {
        &self.book
    }

    /// Boolean entry point for the transport collaborator.
    ///
    /// Returns true when the event changed the book. Duplicates, unknown
    /// ids and malformed events all return false and leave the book as it
    /// was.
    pub fn apply_event(
        &self,
        kind: EventKind,
        order_id: &str,
        side: Option<Side>,
        price: Option<Price>,
        size: Option<Size>,
    ) -> bool {
        let event = FeedEvent {
            kind,
            order_id: (!order_id.is_empty()).then(|| order_id.to_string()),
            taker_order_id: None,
            side,
            price,
            size,
        };

        self.process(&event)
            .map(|outcome| outcome.mutated())
            .unwrap_or(false)
    }

    /// Apply one L3 event.
    ///
    /// Errors are returned, never logged here; `is_benign()` tells a
    /// duplicate delivery apart from a malformed event.
    pub fn process(&self, event: &FeedEvent) -> OrderBookResult<EventOutcome> {
        let result = match &self.metrics {
            Some(metrics) => metrics.time_l3(|| self.dispatch(event)),
            None => self.dispatch(event),
        };
        self.record(event.kind.as_str(), &result);
        result
    }

    /// Apply one aggregated level change.
    ///
    /// The level is modelled as a single synthetic order keyed by
    /// (side, price): size 0 deletes it, anything else sets its absolute
    /// size, adding it first if needed.
    pub fn apply_l2(&self, change: L2Change) -> OrderBookResult<EventOutcome> {
        let result = match &self.metrics {
            Some(metrics) => metrics.time_l2(|| self.reconcile_level(change)),
            None => self.reconcile_level(change),
        };
        self.record("l2update", &result);
        result
    }

    /// Replace the whole book with an aggregated snapshot.
    ///
    /// Zero-size and malformed entries are skipped. Returns the number of
    /// levels loaded.
    pub fn apply_snapshot(&self, bids: &[(Price, Size)], asks: &[(Price, Size)]) -> usize {
        let load = || {
            let orders: Vec<Order> = bids
                .iter()
                .map(|&(price, size)| (Side::Buy, price, size))
                .chain(asks.iter().map(|&(price, size)| (Side::Sell, price, size)))
                .filter(|&(_, price, size)| valid_price(price) && size.is_finite() && size > 0.0)
                .map(|(side, price, size)| Order::new(self.synthetic_id(side, price), side, price, size))
                .collect();
            self.book.reset_with(orders)
        };

        let loaded = match &self.metrics {
            Some(metrics) => metrics.time_snapshot(load),
            None => load(),
        };
        self.counters.applied.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_applied("snapshot");
        }
        loaded
    }

    /// Replace the book with just a top-of-book quote
    pub fn apply_ticker(
        &self,
        best_bid: Price,
        best_bid_size: Size,
        best_ask: Price,
        best_ask_size: Size,
    ) -> OrderBookResult<usize> {
        for price in [best_bid, best_ask] {
            if !valid_price(price) {
                return Err(OrderBookError::InvalidPrice(price));
            }
        }
        for size in [best_bid_size, best_ask_size] {
            if !size.is_finite() || size < 0.0 {
                return Err(OrderBookError::InvalidSize(size));
            }
        }

        let orders = [
            (Side::Buy, best_bid, best_bid_size),
            (Side::Sell, best_ask, best_ask_size),
        ]
        .into_iter()
        .filter(|&(_, _, size)| size > 0.0)
        .map(|(side, price, size)| Order::new(self.synthetic_id(side, price), side, price, size));

        let loaded = self.book.reset_with(orders);
        self.counters.applied.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_applied("ticker");
        }
        Ok(loaded)
    }

    /// Deterministic id standing in for a whole aggregated level
    pub fn synthetic_id(&self, side: Side, price: Price) -> OrderId {
        let prefix = match side {
            Side::Buy => &self.config.bid_id_prefix,
            Side::Sell => &self.config.ask_id_prefix,
        };
        format!("{}{}", prefix, format_price(price))
    }

    pub fn counts(&self) -> ReconcileCounts {
        ReconcileCounts {
            applied: self.counters.applied.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    // Private helper methods

    fn dispatch(&self, event: &FeedEvent) -> OrderBookResult<EventOutcome> {
        match event.kind {
            EventKind::Open | EventKind::Received => self.on_open(event),
            EventKind::Change => self.on_change(event),
            EventKind::Match => self.on_match(event),
            EventKind::Done => self.on_done(event),
        }
    }

    fn on_open(&self, event: &FeedEvent) -> OrderBookResult<EventOutcome> {
        let kind = event.kind.as_str();
        let order_id = required(kind, "order_id", event.order_id.as_deref())?;
        let side = required(kind, "side", event.side)?;
        let price = required(kind, "price", event.price)?;
        let size = required(kind, "size", event.size)?;

        if !valid_price(price) {
            return Err(OrderBookError::InvalidPrice(price));
        }
        if !size.is_finite() || size <= 0.0 {
            return Err(OrderBookError::InvalidSize(size));
        }

        self.book
            .add_order(Order::new(order_id, side, price, size))?;
        Ok(EventOutcome::Applied(UpdateKind::Added))
    }

    fn on_change(&self, event: &FeedEvent) -> OrderBookResult<EventOutcome> {
        let kind = event.kind.as_str();
        let order_id = required(kind, "order_id", event.order_id.as_deref())?;
        let new_size = required(kind, "size", event.size)?;

        if !new_size.is_finite() || new_size < 0.0 {
            return Err(OrderBookError::InvalidSize(new_size));
        }

        // Resize only; the order leaves the book on `done`
        ignore_unknown(
            self.book
                .modify_order(order_id, new_size)
                .map(|_| EventOutcome::Applied(UpdateKind::Modified)),
        )
    }

    fn on_match(&self, event: &FeedEvent) -> OrderBookResult<EventOutcome> {
        let kind = event.kind.as_str();
        let maker_id = required(kind, "order_id", event.order_id.as_deref())?;
        let traded = required(kind, "size", event.size)?;

        if !traded.is_finite() || traded < 0.0 {
            return Err(OrderBookError::InvalidSize(traded));
        }

        let taker_id = match self.config.match_policy {
            MatchPolicy::MakerAndTaker => event.taker_order_id.as_deref(),
            MatchPolicy::MakerOnly => None,
        };

        let Some(taker_id) = taker_id else {
            return ignore_unknown(self.book.fill_order(maker_id, traded).map(EventOutcome::Filled));
        };

        // Both sides of the trade land in one lock hold
        let mut results = self
            .book
            .fill_orders(&[(maker_id, traded), (taker_id, traded)])
            .into_iter()
            .map(|result| ignore_unknown(result.map(EventOutcome::Filled)));

        let maker = results.next().unwrap_or(Ok(EventOutcome::Ignored))?;
        let taker = results.next().unwrap_or(Ok(EventOutcome::Ignored))?;
        trace!(taker_id, ?taker, "taker side reduced");

        Ok(if maker.mutated() { maker } else { taker })
    }

    fn on_done(&self, event: &FeedEvent) -> OrderBookResult<EventOutcome> {
        let order_id = required(event.kind.as_str(), "order_id", event.order_id.as_deref())?;

        ignore_unknown(
            self.book
                .remove_order(order_id)
                .map(|_| EventOutcome::Applied(UpdateKind::Removed)),
        )
    }

    fn reconcile_level(&self, change: L2Change) -> OrderBookResult<EventOutcome> {
        let L2Change { side, price, size } = change;

        if !valid_price(price) {
            return Err(OrderBookError::InvalidPrice(price));
        }
        if !size.is_finite() || size < 0.0 {
            return Err(OrderBookError::InvalidSize(size));
        }

        let result = self
            .book
            .set_level(side, price, size, |level_price| self.synthetic_id(side, level_price))
            .map(EventOutcome::Applied);
        ignore_unknown(result)
    }

    fn record(&self, kind: &'static str, result: &OrderBookResult<EventOutcome>) {
        let counter = match result {
            Ok(outcome) if outcome.mutated() => &self.counters.applied,
            Ok(_) => &self.counters.ignored,
            Err(e) if e.is_benign() => &self.counters.ignored,
            Err(_) => &self.counters.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let Some(metrics) = &self.metrics {
            match result {
                Ok(outcome) if outcome.mutated() => metrics.record_applied(kind),
                Err(e) if !e.is_benign() => metrics.record_dropped(kind),
                _ => metrics.record_ignored(kind),
            }
        }
    }
}

fn required<T>(kind: &str, field: &str, value: Option<T>) -> OrderBookResult<T> {
    value.ok_or_else(|| OrderBookError::missing(kind, field))
}

fn valid_price(price: Price) -> bool {
    price.is_finite() && price > 0.0
}

/// Unknown ids are expected under out-of-order delivery
fn ignore_unknown(result: OrderBookResult<EventOutcome>) -> OrderBookResult<EventOutcome> {
    match result {
        Err(OrderBookError::UnknownId(_)) => Ok(EventOutcome::Ignored),
        other => other,
    }
}
