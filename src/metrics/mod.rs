use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

use crate::orderbook::{OrderBook, OrderBookStats};
use crate::utils::time::LatencyTimer;

/// Metrics collector for feed reconciliation and book state
#[derive(Debug)]
pub struct FeedMetrics {
    // Latency tracking
    l3_latency: LatencyTracker,
    l2_latency: LatencyTracker,
    snapshot_latency: LatencyTracker,

    // Throughput counters
    events_applied: AtomicU64,
    events_ignored: AtomicU64,
    events_dropped: AtomicU64,
    messages_received: AtomicU64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        // Register metric descriptions
        describe_counter!(
            "feed_events_total",
            "Feed events processed, labelled by kind and outcome"
        );
        describe_counter!("feed_messages_total", "Venue messages received");
        describe_histogram!(
            "feed_event_duration_seconds",
            "Time spent reconciling one event"
        );
        describe_gauge!("orderbook_levels_total", "Number of price levels in the book");
        describe_gauge!("orderbook_orders_current", "Current number of orders in the book");
        describe_gauge!("orderbook_spread", "Current bid-ask spread");

        Self {
            l3_latency: LatencyTracker::new("l3"),
            l2_latency: LatencyTracker::new("l2"),
            snapshot_latency: LatencyTracker::new("snapshot"),
            events_applied: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
        }
    }

    // Latency measurement methods
    pub fn time_l3<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.l3_latency.time(f)
    }

    pub fn time_l2<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.l2_latency.time(f)
    }

    pub fn time_snapshot<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.snapshot_latency.time(f)
    }

    // Counter methods
    pub fn record_applied(&self, kind: &'static str) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
        counter!("feed_events_total", "kind" => kind, "outcome" => "applied").increment(1);
    }

    pub fn record_ignored(&self, kind: &'static str) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
        counter!("feed_events_total", "kind" => kind, "outcome" => "ignored").increment(1);
    }

    pub fn record_dropped(&self, kind: &'static str) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
        counter!("feed_events_total", "kind" => kind, "outcome" => "dropped").increment(1);
    }

    pub fn increment_messages(&self, venue: &'static str) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        counter!("feed_messages_total", "venue" => venue).increment(1);
    }

    /// Publish current book state as gauges
    pub fn observe_book(&self, stats: &OrderBookStats) {
        gauge!("orderbook_orders_current").set(stats.order_count as f64);
        gauge!("orderbook_levels_total", "side" => "bid").set(stats.bid_levels as f64);
        gauge!("orderbook_levels_total", "side" => "ask").set(stats.ask_levels as f64);
        gauge!("orderbook_spread").set(stats.spread);
        gauge!("orderbook_best_bid").set(stats.best_bid);
        if stats.best_ask.is_finite() {
            gauge!("orderbook_best_ask").set(stats.best_ask);
        }
    }

    // Getters for current values
    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    pub fn events_ignored(&self) -> u64 {
        self.events_ignored.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn latency_stats(&self) -> LatencyStats {
        LatencyStats {
            l3: self.l3_latency.stats(),
            l2: self.l2_latency.stats(),
            snapshot: self.snapshot_latency.stats(),
        }
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency tracker for individual operations
#[derive(Debug)]
struct LatencyTracker {
    operation: &'static str,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let timer = LatencyTimer::start();
        let result = f();
        self.record(timer.stop());
        result
    }

    fn record(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        histogram!("feed_event_duration_seconds", "operation" => self.operation)
            .record(duration.as_secs_f64());
    }

    fn stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        let min = self.min_nanos.load(Ordering::Relaxed);
        let max = self.max_nanos.load(Ordering::Relaxed);

        OperationLatencyStats {
            operation: self.operation,
            samples,
            avg_nanos: if samples > 0 { total / samples } else { 0 },
            min_nanos: if min == u64::MAX { 0 } else { min },
            max_nanos: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub l3: OperationLatencyStats,
    pub l2: OperationLatencyStats,
    pub snapshot: OperationLatencyStats,
}

#[derive(Debug, Clone)]
pub struct OperationLatencyStats {
    pub operation: &'static str,
    pub samples: u64,
    pub avg_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    pub fn avg_micros(&self) -> f64 {
        self.avg_nanos as f64 / 1_000.0
    }

    pub fn max_micros(&self) -> f64 {
        self.max_nanos as f64 / 1_000.0
    }
}

/// Background metrics reporter
pub struct MetricsReporter {
    book: Arc<OrderBook>,
    metrics: Arc<FeedMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(book: Arc<OrderBook>, metrics: Arc<FeedMetrics>, interval: Duration) -> Self {
        Self {
            book,
            metrics,
            interval,
        }
    }

    pub async fn run(&self) {
        let mut interval = interval(self.interval);

        loop {
            interval.tick().await;
            self.report_once();
        }
    }

    /// Publish gauges and log one summary line
    pub fn report_once(&self) -> OrderBookStats {
        let stats = self.book.stats();
        self.metrics.observe_book(&stats);
        let latency = self.metrics.latency_stats();

        info!(
            "{} | Orders: {} | Levels: {}/{} | Bid: {} Ask: {} Spread: {} | Events: +{} ~{} x{} | Latency (μs): l3={:.2} l2={:.2}",
            stats.symbol,
            stats.order_count,
            stats.bid_levels,
            stats.ask_levels,
            stats.best_bid,
            stats.best_ask,
            stats.spread,
            self.metrics.events_applied(),
            self.metrics.events_ignored(),
            self.metrics.events_dropped(),
            latency.l3.avg_micros(),
            latency.l2.avg_micros()
        );

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{Order, Side};

    #[test]
    fn test_counters() {
        let metrics = FeedMetrics::new();

        metrics.record_applied("open");
        metrics.record_ignored("done");
        metrics.record_dropped("change");
        metrics.increment_messages("coinbase");

        assert_eq!(metrics.events_applied(), 1);
        assert_eq!(metrics.events_ignored(), 1);
        assert_eq!(metrics.events_dropped(), 1);
        assert_eq!(metrics.messages_received(), 1);
    }

    #[test]
    fn test_latency_tracking() {
        let metrics = FeedMetrics::new();

        let value = metrics.time_l3(|| {
            std::thread::sleep(Duration::from_millis(1));
            7
        });
        assert_eq!(value, 7);

        let stats = metrics.latency_stats();
        assert_eq!(stats.l3.samples, 1);
        assert!(stats.l3.min_nanos >= 1_000_000);
        assert_eq!(stats.l3.min_nanos, stats.l3.max_nanos);
        assert_eq!(stats.l2.samples, 0);
        assert_eq!(stats.l2.min_nanos, 0);
    }

    #[test]
    fn test_report_once_reads_book() {
        let book = Arc::new(OrderBook::new("TEST"));
        book.add_order(Order::new("b", Side::Buy, 99.0, 1.0)).unwrap();
        book.add_order(Order::new("a", Side::Sell, 101.0, 1.0)).unwrap();

        let reporter = MetricsReporter::new(
            Arc::clone(&book),
            Arc::new(FeedMetrics::new()),
            Duration::from_secs(1),
        );
        let stats = reporter.report_once();
        assert_eq!(stats.order_count, 2);
        assert_eq!(stats.spread, 2.0);
    }
}
