use indexmap::IndexMap;

use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::types::{LevelInfo, Order, OrderId, Price, Size};
use crate::utils::{prices_equal, DEFAULT_PRICE_TOLERANCE};

/// Represents a price level in the order book
/// All orders at this price level maintain time priority (FIFO)
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: Price,
    tolerance: f64,
    orders: IndexMap<OrderId, Order>,
    total_size: Size,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self::with_tolerance(price, DEFAULT_PRICE_TOLERANCE)
    }

    pub fn with_tolerance(price: Price, tolerance: f64) -> Self {
        Self {
            price,
            tolerance,
            orders: IndexMap::new(),
            total_size: 0.0,
        }
    }

    /// Add an order at the tail of the queue
    pub fn add(&mut self, order: Order) -> OrderBookResult<()> {
        if !prices_equal(order.price(), self.price, self.tolerance) {
            return Err(OrderBookError::PriceMismatch {
                expected: self.price,
                actual: order.price(),
            });
        }

        if self.orders.contains_key(order.id()) {
            return Err(OrderBookError::DuplicateId(order.id().to_string()));
        }

        self.total_size += order.size();
        self.orders.insert(order.id().to_string(), order);
        Ok(())
    }

    /// Remove an order by id, preserving the queue order of the rest
    pub fn remove(&mut self, order_id: &str) -> OrderBookResult<Order> {
        let order = self
            .orders
            .shift_remove(order_id)
            .ok_or_else(|| OrderBookError::UnknownId(order_id.to_string()))?;

        if self.orders.is_empty() {
            // Start clean rather than carry accumulated rounding residue
            self.total_size = 0.0;
        } else {
            self.total_size -= order.size();
        }

        Ok(order)
    }

    /// Overwrite an order's size and return the previous one.
    ///
    /// This is an unconditional write: zero, negative or NaN sizes are
    /// stored as given. Whether a drained order should leave the book is
    /// the caller's decision.
    pub fn update_size(&mut self, order_id: &str, new_size: Size) -> OrderBookResult<Size> {
        let order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderBookError::UnknownId(order_id.to_string()))?;

        let old_size = order.size();
        order.set_size(new_size);
        self.total_size += new_size - old_size;

        Ok(old_size)
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.orders.contains_key(order_id)
    }

    /// Oldest order at this level
    pub fn front(&self) -> Option<&Order> {
        self.orders.values().next()
    }

    /// Orders in arrival order
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn total_size(&self) -> Size {
        self.total_size
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn info(&self) -> LevelInfo {
        LevelInfo {
            price: self.price,
            size: self.total_size,
            order_count: self.orders.len(),
        }
    }
}
