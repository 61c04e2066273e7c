//! Feed Simulator
//!
//! Drives a book from a deterministic synthetic L3 feed so the reconciler,
//! the read API and the metrics pipeline can be watched end to end.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use feed_orderbook::{
    feed::{CoinbaseHandler, FeedHandler},
    metrics::MetricsReporter,
    utils::format_price_fixed,
    BookConfig, EngineConfig, FeedEvent, FeedMessage, FeedMetrics, FeedReconciler, OrderBook, Side,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting feed simulator...");

    let config = EngineConfig {
        book: BookConfig::default()
            .with_price_tolerance(1e-9)
            .with_default_depth(5),
        ..EngineConfig::new("BTC-USD")
    };
    config.validate()?;

    if let Err(e) = install_metrics_exporter() {
        error!("Failed to start metrics exporter: {}", e);
    }

    let book = Arc::new(OrderBook::with_config(config.symbol.clone(), config.book.clone()));
    let metrics = Arc::new(FeedMetrics::new());
    let reconciler = FeedReconciler::with_config(Arc::clone(&book), config.reconciler.clone())
        .with_metrics(Arc::clone(&metrics));
    let handler = CoinbaseHandler::new(reconciler).with_metrics(Arc::clone(&metrics));

    // Transport side: decoded messages arrive on a channel
    let (tx, mut rx) = mpsc::channel::<FeedMessage>(1024);

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            handler.on_message(message);
        }
        info!("Feed channel closed");
    });

    tokio::spawn(simulate_feed(tx));

    // Consumer: poll the book the way a strategy or UI would
    let consumer_book = Arc::clone(&book);
    let depth = config.book.default_depth;
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(1));

        loop {
            interval.tick().await;

            let bids = consumer_book.depth(Side::Buy, depth);
            let asks = consumer_book.depth(Side::Sell, depth);
            let stats = consumer_book.stats();

            info!(
                "{} | Top bid: {} x {} | Top ask: {} x {} | Mid: {} | Depth: {}/{}",
                stats.symbol,
                bids.first().map(|l| format_price_fixed(l.price, 2)).unwrap_or_default(),
                bids.first().map(|l| l.size).unwrap_or_default(),
                asks.first().map(|l| format_price_fixed(l.price, 2)).unwrap_or_default(),
                asks.first().map(|l| l.size).unwrap_or_default(),
                format_price_fixed(stats.midpoint, 2),
                bids.len(),
                asks.len()
            );
        }
    });

    // Start metrics reporting
    let reporter = MetricsReporter::new(
        Arc::clone(&book),
        Arc::clone(&metrics),
        Duration::from_millis(config.metrics_interval_ms),
    );
    tokio::spawn(async move {
        reporter.run().await;
    });

    info!("Feed simulator is running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down feed simulator...");

    let stats = book.stats();
    info!(
        "Final stats for {}: {} orders, {} bid levels, {} ask levels, sequence {}",
        stats.symbol, stats.order_count, stats.bid_levels, stats.ask_levels, stats.sequence
    );

    Ok(())
}

/// Produce a deterministic mix of L3 events around a drifting mid price
async fn simulate_feed(tx: mpsc::Sender<FeedMessage>) {
    let mut interval = interval(Duration::from_millis(10));
    let mut mid = 100.0_f64;
    let mut counter: u64 = 0;
    let mut resting: VecDeque<(String, f64)> = VecDeque::new();

    // Initial snapshot so the book starts two-sided
    let bids = (1..=20).map(|i| (mid - i as f64 * 0.05, 1.0)).collect();
    let asks = (1..=20).map(|i| (mid + i as f64 * 0.05, 1.0)).collect();
    if tx.send(FeedMessage::Snapshot { bids, asks }).await.is_err() {
        return;
    }

    loop {
        interval.tick().await;
        counter += 1;

        let event = match counter % 10 {
            // New resting orders (50% of activity)
            0..=4 => {
                let side = if counter % 2 == 0 { Side::Buy } else { Side::Sell };
                let offset = ((counter % 7) + 1) as f64 * 0.05;
                let price = match side {
                    Side::Buy => mid - offset,
                    Side::Sell => mid + offset,
                };
                let size = 0.5 + (counter % 5) as f64 * 0.25;
                let order_id = format!("sim-{}", counter);

                resting.push_back((order_id.clone(), size));
                FeedEvent::open(order_id, side, price, size)
            }

            // Trades against the oldest resting order (20% of activity)
            5 | 6 => match resting.front_mut() {
                Some((order_id, size)) => {
                    let traded = (*size / 2.0).max(0.25);
                    *size -= traded;
                    let event = FeedEvent::trade(order_id.clone(), traded);
                    let exhausted = *size <= 0.0;
                    if exhausted {
                        resting.pop_front();
                    }
                    event
                }
                None => continue,
            },

            // Size changes (10% of activity)
            7 => match resting.back_mut() {
                Some((order_id, size)) => {
                    *size *= 0.5;
                    FeedEvent::change(order_id.clone(), *size)
                }
                None => continue,
            },

            // Cancels (10% of activity)
            8 => match resting.pop_front() {
                Some((order_id, _)) => FeedEvent::done(order_id),
                None => continue,
            },

            // Price drift (10% of activity)
            9 => {
                let direction = if counter % 40 < 20 { 1.0 } else { -1.0 };
                mid = (mid + direction * 0.05).max(1.0);
                if tx.send(FeedMessage::Heartbeat).await.is_err() {
                    break;
                }
                continue;
            }

            _ => unreachable!(),
        };

        if tx.send(FeedMessage::L3(event)).await.is_err() {
            break;
        }
    }
}

/// Install the Prometheus recorder and its HTTP listener
fn install_metrics_exporter() -> Result<(), Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let addr: SocketAddr = "0.0.0.0:9090".parse()?;

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    info!("Prometheus metrics available at http://{}/metrics", addr);
    Ok(())
}
