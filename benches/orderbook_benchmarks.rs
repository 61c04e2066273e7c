//! Benchmarks for book mutations and feed reconciliation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use feed_orderbook::{EventKind, FeedReconciler, L2Change, Order, OrderBook, Side};

fn populated_book(levels: usize, orders_per_level: usize) -> OrderBook {
    let book = OrderBook::new("BENCH");
    for level in 0..levels {
        for n in 0..orders_per_level {
            let bid = Order::new(format!("b{}-{}", level, n), Side::Buy, 100.0 - level as f64 * 0.01, 1.0);
            let ask = Order::new(format!("a{}-{}", level, n), Side::Sell, 100.01 + level as f64 * 0.01, 1.0);
            let _ = book.add_order(bid);
            let _ = book.add_order(ask);
        }
    }
    book
}

fn benchmark_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("book_mutations");

    let book = populated_book(100, 10);
    group.bench_function("add_then_remove", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let order_id = format!("x{}", counter);
            let price = 99.0 - (counter % 50) as f64 * 0.01;
            book.add_order(Order::new(order_id.clone(), Side::Buy, price, 1.0)).unwrap();
            black_box(book.remove_order(&order_id).unwrap());
        });
    });

    group.bench_function("modify", |b| {
        let mut size = 1.0;
        b.iter(|| {
            size = if size > 5.0 { 1.0 } else { size + 0.5 };
            black_box(book.modify_order("b50-5", size).unwrap());
        });
    });

    group.finish();
}

fn benchmark_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("book_reads");

    for levels in [10usize, 100, 1000] {
        let book = populated_book(levels, 4);

        group.bench_with_input(BenchmarkId::new("best_bid_ask", levels), &book, |b, book| {
            b.iter(|| black_box((book.best_bid(), book.best_ask())));
        });

        group.bench_with_input(BenchmarkId::new("levels_top10", levels), &book, |b, book| {
            b.iter(|| black_box(book.levels(Side::Sell, 10)));
        });
    }

    group.finish();
}

fn benchmark_reconciler(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciler");

    group.throughput(Throughput::Elements(3));
    group.bench_function("open_match_done", |b| {
        let book = Arc::new(OrderBook::new("BENCH"));
        let reconciler = FeedReconciler::new(Arc::clone(&book));
        let mut counter = 0u64;

        b.iter(|| {
            counter += 1;
            let order_id = format!("o{}", counter);
            let price = 100.0 + (counter % 20) as f64 * 0.05;
            reconciler.apply_event(EventKind::Open, &order_id, Some(Side::Sell), Some(price), Some(2.0));
            reconciler.apply_event(EventKind::Match, &order_id, None, None, Some(0.5));
            black_box(reconciler.apply_event(EventKind::Done, &order_id, None, None, None));
        });
    });

    group.throughput(Throughput::Elements(1));
    group.bench_function("l2_upsert", |b| {
        let reconciler = FeedReconciler::new(Arc::new(OrderBook::new("BENCH")));
        let mut counter = 0u64;

        b.iter(|| {
            counter += 1;
            let price = 100.0 + (counter % 50) as f64 * 0.01;
            let size = if counter % 10 == 0 { 0.0 } else { (counter % 7) as f64 + 1.0 };
            let _ = black_box(reconciler.apply_l2(L2Change::new(Side::Sell, price, size)));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_add_remove,
    benchmark_reads,
    benchmark_reconciler
);
criterion_main!(benches);
