use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::config::BookConfig;
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{
    BookSnapshot, BookUpdate, Fill, LevelInfo, Order, OrderId, OrderLocation, Price, Side, Size,
    UpdateKind,
};
use crate::utils::prices_equal;

/// Callback fired after every successful mutation.
///
/// Runs synchronously while the book lock is held: it must not block and
/// must not call back into the book.
pub type UpdateCallback = Arc<dyn Fn(&BookUpdate) + Send + Sync>;

type LevelKey = OrderedFloat<Price>;

/// One side of the book, keyed by price.
///
/// Stored ascending; bids are read from the back so both sides iterate
/// best-first.
#[derive(Debug)]
struct BookSide {
    side: Side,
    levels: BTreeMap<LevelKey, PriceLevel>,
}

impl BookSide {
    fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    fn best(&self) -> Option<&PriceLevel> {
        match self.side {
            Side::Buy => self.levels.values().next_back(),
            Side::Sell => self.levels.values().next(),
        }
    }

    fn best_first(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.values().rev()),
            Side::Sell => Box::new(self.levels.values()),
        }
    }

    /// Key of an existing level whose price is within tolerance of `price`
    fn find_key(&self, price: Price, tolerance: f64) -> Option<LevelKey> {
        let key = OrderedFloat(price);
        if self.levels.contains_key(&key) {
            return Some(key);
        }

        let delta = tolerance * price.abs().max(1.0);
        self.levels
            .range(OrderedFloat(price - delta)..=OrderedFloat(price + delta))
            .map(|(k, _)| *k)
            .find(|k| prices_equal(k.0, price, tolerance))
    }

    fn total_size(&self) -> Size {
        self.levels.values().map(|l| l.total_size()).sum()
    }
}

#[derive(Debug)]
struct BookState {
    bids: BookSide,
    asks: BookSide,
    order_locations: HashMap<OrderId, OrderLocation>,
    sequence: u64,
}

impl BookState {
    fn new() -> Self {
        Self {
            bids: BookSide::new(Side::Buy),
            asks: BookSide::new(Side::Sell),
            order_locations: HashMap::new(),
            sequence: 0,
        }
    }

    fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn best_bid(&self) -> Price {
        self.bids.best().map(|l| l.price()).unwrap_or(0.0)
    }

    fn best_ask(&self) -> Price {
        self.asks.best().map(|l| l.price()).unwrap_or(f64::INFINITY)
    }

    fn has_two_sided_quote(&self) -> bool {
        self.best_bid() > 0.0 && self.best_ask() < f64::INFINITY
    }

    fn insert(&mut self, order: Order, tolerance: f64) -> OrderBookResult<OrderLocation> {
        if self.order_locations.contains_key(order.id()) {
            return Err(OrderBookError::DuplicateId(order.id().to_string()));
        }

        let side = order.side();
        let price = order.price();
        if !price.is_finite() || price <= 0.0 {
            return Err(OrderBookError::InvalidPrice(price));
        }

        let order_id = order.id().to_string();
        let book_side = self.side_mut(side);

        // Join an existing level within tolerance, else create one at this price
        let key = book_side
            .find_key(price, tolerance)
            .unwrap_or(OrderedFloat(price));
        let level = book_side
            .levels
            .entry(key)
            .or_insert_with(|| PriceLevel::with_tolerance(key.0, tolerance));
        if let Err(e) = level.add(order) {
            if level.is_empty() {
                book_side.levels.remove(&key);
            }
            return Err(e);
        }

        let location = OrderLocation {
            side,
            price: key.0,
        };
        self.order_locations.insert(order_id, location);
        Ok(location)
    }

    fn remove(&mut self, order_id: &str) -> OrderBookResult<(Order, OrderLocation)> {
        let location = self
            .order_locations
            .remove(order_id)
            .ok_or_else(|| OrderBookError::UnknownId(order_id.to_string()))?;

        let book_side = self.side_mut(location.side);
        let key = OrderedFloat(location.price);
        let level = book_side
            .levels
            .get_mut(&key)
            .ok_or_else(|| OrderBookError::UnknownId(order_id.to_string()))?;

        let order = level.remove(order_id)?;

        // Clean up empty price level
        if level.is_empty() {
            book_side.levels.remove(&key);
        }

        Ok((order, location))
    }

    fn modify(&mut self, order_id: &str, new_size: Size) -> OrderBookResult<(Size, OrderLocation)> {
        let location = *self
            .order_locations
            .get(order_id)
            .ok_or_else(|| OrderBookError::UnknownId(order_id.to_string()))?;

        let level = self
            .side_mut(location.side)
            .levels
            .get_mut(&OrderedFloat(location.price))
            .ok_or_else(|| OrderBookError::UnknownId(order_id.to_string()))?;

        let old_size = level.update_size(order_id, new_size)?;
        Ok((old_size, location))
    }

    fn get(&self, order_id: &str) -> Option<&Order> {
        let location = self.order_locations.get(order_id)?;
        self.side(location.side)
            .levels
            .get(&OrderedFloat(location.price))?
            .get(order_id)
    }

    fn levels(&self, side: Side, depth: usize) -> Vec<LevelInfo> {
        self.side(side)
            .best_first()
            .take(depth)
            .map(|level| level.info())
            .collect()
    }
}

/// Price-indexed limit order book for a single instrument.
///
/// Every public operation, reads included, takes the same book-wide lock
/// for its whole duration, so readers never observe a half-applied update.
pub struct OrderBook {
    symbol: String,
    config: BookConfig,
    state: Mutex<BookState>,
    callback: Mutex<Option<UpdateCallback>>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_config(symbol, BookConfig::default())
    }

    pub fn with_config(symbol: impl Into<String>, config: BookConfig) -> Self {
        let symbol = symbol.into();
        info!("Creating new order book for symbol: {}", symbol);

        Self {
            symbol,
            config,
            state: Mutex::new(BookState::new()),
            callback: Mutex::new(None),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Add a new resting order.
    ///
    /// Not an upsert: an id already in the book is rejected with
    /// `DuplicateId` and the book is left unchanged.
    pub fn add_order(&self, order: Order) -> OrderBookResult<()> {
        let mut state = self.state.lock();
        let order_id = order.id().to_string();
        let location = state.insert(order, self.config.price_tolerance)?;

        debug!(
            symbol = %self.symbol,
            order_id = %order_id,
            side = %location.side,
            price = location.price,
            "order added"
        );
        self.notify(&mut state, UpdateKind::Added, Some(order_id), location);
        Ok(())
    }

    /// Remove a resting order, evicting its level if it was the last one
    pub fn remove_order(&self, order_id: &str) -> OrderBookResult<Order> {
        let mut state = self.state.lock();
        let (order, location) = state.remove(order_id)?;

        debug!(symbol = %self.symbol, order_id, "order removed");
        self.notify(
            &mut state,
            UpdateKind::Removed,
            Some(order_id.to_string()),
            location,
        );
        Ok(order)
    }

    /// Replace an order's size with `new_size`, returning the old size.
    ///
    /// A zero or negative size does not remove the order; callers that mean
    /// "this order is gone" must call `remove_order`.
    pub fn modify_order(&self, order_id: &str, new_size: Size) -> OrderBookResult<Size> {
        let mut state = self.state.lock();
        let (old_size, location) = state.modify(order_id, new_size)?;

        debug!(
            symbol = %self.symbol,
            order_id,
            old_size,
            new_size,
            "order modified"
        );
        self.notify(
            &mut state,
            UpdateKind::Modified,
            Some(order_id.to_string()),
            location,
        );
        Ok(old_size)
    }

    /// Add the order if its id is absent, otherwise set the resting order's
    /// size to `order.size()`. Both paths run under one lock hold.
    pub fn upsert_order(&self, order: Order) -> OrderBookResult<UpdateKind> {
        let mut state = self.state.lock();
        let order_id = order.id().to_string();

        let (kind, location) = if state.order_locations.contains_key(&order_id) {
            let (_, location) = state.modify(&order_id, order.size())?;
            (UpdateKind::Modified, location)
        } else {
            (UpdateKind::Added, state.insert(order, self.config.price_tolerance)?)
        };

        trace!(symbol = %self.symbol, order_id = %order_id, ?kind, "order upserted");
        self.notify(&mut state, kind, Some(order_id), location);
        Ok(kind)
    }

    /// Apply a trade of `traded` against a resting order.
    ///
    /// Looks the order up and then either shrinks it or removes it when
    /// nothing is left, all under one lock hold.
    pub fn fill_order(&self, order_id: &str, traded: Size) -> OrderBookResult<Fill> {
        let mut state = self.state.lock();
        self.fill_locked(&mut state, order_id, traded)
    }

    /// Apply several fills under a single lock hold.
    ///
    /// Readers see either none or all of them. Each fill succeeds or fails
    /// on its own; a failed one does not stop the rest.
    pub fn fill_orders(&self, fills: &[(&str, Size)]) -> Vec<OrderBookResult<Fill>> {
        let mut state = self.state.lock();
        fills
            .iter()
            .map(|&(order_id, traded)| self.fill_locked(&mut state, order_id, traded))
            .collect()
    }

    /// Set the aggregated size of the level at (side, price).
    ///
    /// The level is held as one synthetic order whose id `id_for` derives
    /// from the canonical level price: an existing level within tolerance
    /// keeps its key. Size 0 removes it (`UnknownId` if there is none),
    /// anything else adds or resizes it. One lock hold throughout.
    pub fn set_level<F>(
        &self,
        side: Side,
        price: Price,
        size: Size,
        id_for: F,
    ) -> OrderBookResult<UpdateKind>
    where
        F: FnOnce(Price) -> OrderId,
    {
        let mut state = self.state.lock();
        let level_price = state
            .side(side)
            .find_key(price, self.config.price_tolerance)
            .map(|key| key.0)
            .unwrap_or(price);
        let order_id = id_for(level_price);

        let (kind, location) = if size == 0.0 {
            let (_, location) = state.remove(&order_id)?;
            (UpdateKind::Removed, location)
        } else if state.order_locations.contains_key(&order_id) {
            let (_, location) = state.modify(&order_id, size)?;
            (UpdateKind::Modified, location)
        } else {
            let order = Order::new(order_id.clone(), side, level_price, size);
            (UpdateKind::Added, state.insert(order, self.config.price_tolerance)?)
        };

        trace!(symbol = %self.symbol, order_id = %order_id, size, ?kind, "level set");
        self.notify(&mut state, kind, Some(order_id), location);
        Ok(kind)
    }

    /// Drop every order on both sides in one step.
    ///
    /// The way to resynchronise after a snapshot or reconnect; concurrent
    /// readers see either the old book or the empty one.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let orders = state.order_locations.len();

        state.bids.levels.clear();
        state.asks.levels.clear();
        state.order_locations.clear();

        info!(symbol = %self.symbol, orders, "order book cleared");
        state.sequence += 1;
        let update = BookUpdate {
            kind: UpdateKind::Cleared,
            order_id: None,
            side: None,
            price: None,
            sequence: state.sequence,
        };
        self.fire(&update);
    }

    /// Clear the book and load `orders` in its place under one lock hold.
    ///
    /// Orders that fail to insert (duplicate id, bad price) are skipped.
    /// Returns how many were loaded.
    pub fn reset_with<I>(&self, orders: I) -> usize
    where
        I: IntoIterator<Item = Order>,
    {
        let mut state = self.state.lock();
        state.bids.levels.clear();
        state.asks.levels.clear();
        state.order_locations.clear();

        state.sequence += 1;
        let cleared = BookUpdate {
            kind: UpdateKind::Cleared,
            order_id: None,
            side: None,
            price: None,
            sequence: state.sequence,
        };
        self.fire(&cleared);

        let mut loaded = 0;
        for order in orders {
            let order_id = order.id().to_string();
            match state.insert(order, self.config.price_tolerance) {
                Ok(location) => {
                    loaded += 1;
                    self.notify(&mut state, UpdateKind::Added, Some(order_id), location);
                }
                Err(e) => trace!(symbol = %self.symbol, order_id = %order_id, error = %e, "snapshot entry skipped"),
            }
        }

        info!(symbol = %self.symbol, loaded, "order book reset");
        loaded
    }

    /// Highest bid price, or 0.0 when there are no bids
    pub fn best_bid(&self) -> Price {
        self.state.lock().best_bid()
    }

    /// Lowest ask price, or +infinity when there are no asks
    pub fn best_ask(&self) -> Price {
        self.state.lock().best_ask()
    }

    /// Best ask minus best bid; 0.0 unless both sides are populated.
    /// Negative for a crossed book.
    pub fn spread(&self) -> Price {
        let state = self.state.lock();
        if state.has_two_sided_quote() {
            state.best_ask() - state.best_bid()
        } else {
            0.0
        }
    }

    /// Mean of best bid and best ask; 0.0 unless both sides are populated
    pub fn midpoint(&self) -> Price {
        let state = self.state.lock();
        if state.has_two_sided_quote() {
            (state.best_bid() + state.best_ask()) / 2.0
        } else {
            0.0
        }
    }

    /// Up to `depth` (price, total size) pairs, best first
    pub fn levels(&self, side: Side, depth: usize) -> Vec<(Price, Size)> {
        self.state
            .lock()
            .side(side)
            .best_first()
            .take(depth)
            .map(|level| (level.price(), level.total_size()))
            .collect()
    }

    /// Like `levels` but with per-level order counts
    pub fn depth(&self, side: Side, depth: usize) -> Vec<LevelInfo> {
        self.state.lock().levels(side, depth)
    }

    /// Copy of a resting order
    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.state.lock().get(order_id).cloned()
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.state.lock().order_locations.contains_key(order_id)
    }

    /// Side of a resting order, for events that omit it
    pub fn side_of(&self, order_id: &str) -> Option<Side> {
        self.state
            .lock()
            .order_locations
            .get(order_id)
            .map(|loc| loc.side)
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().order_locations.len()
    }

    pub fn level_count(&self, side: Side) -> usize {
        self.state.lock().side(side).levels.len()
    }

    /// Sum of all level totals on one side
    pub fn total_size(&self, side: Side) -> Size {
        self.state.lock().side(side).total_size()
    }

    /// Number of mutations applied so far (clears included)
    pub fn sequence(&self) -> u64 {
        self.state.lock().sequence
    }

    /// Consistent copy of the top `depth` levels of both sides
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        let state = self.state.lock();
        BookSnapshot {
            symbol: self.symbol.clone(),
            timestamp: chrono::Utc::now(),
            sequence: state.sequence,
            bids: state.levels(Side::Buy, depth),
            asks: state.levels(Side::Sell, depth),
        }
    }

    /// Get statistics
    pub fn stats(&self) -> OrderBookStats {
        let state = self.state.lock();
        let two_sided = state.has_two_sided_quote();

        OrderBookStats {
            symbol: self.symbol.clone(),
            order_count: state.order_locations.len(),
            bid_levels: state.bids.levels.len(),
            ask_levels: state.asks.levels.len(),
            best_bid: state.best_bid(),
            best_ask: state.best_ask(),
            spread: if two_sided {
                state.best_ask() - state.best_bid()
            } else {
                0.0
            },
            midpoint: if two_sided {
                (state.best_bid() + state.best_ask()) / 2.0
            } else {
                0.0
            },
            sequence: state.sequence,
        }
    }

    /// Register the update callback, replacing any previous one
    pub fn register_update_callback<F>(&self, callback: F)
    where
        F: Fn(&BookUpdate) + Send + Sync + 'static,
    {
        // Taking the book lock first keeps registration ordered with mutations
        let _state = self.state.lock();
        *self.callback.lock() = Some(Arc::new(callback));
    }

    pub fn clear_update_callback(&self) {
        let _state = self.state.lock();
        *self.callback.lock() = None;
    }

    // Private helper methods

    fn fill_locked(
        &self,
        state: &mut BookState,
        order_id: &str,
        traded: Size,
    ) -> OrderBookResult<Fill> {
        if traded.is_nan() || traded < 0.0 {
            return Err(OrderBookError::InvalidSize(traded));
        }

        let current = state
            .get(order_id)
            .map(|o| o.size())
            .ok_or_else(|| OrderBookError::UnknownId(order_id.to_string()))?;

        // A few ulps of the operands, so `0.3 - 0.1 - 0.2` drains but any
        // real remainder stays, whatever the order size
        let remaining = current - traded;
        let dust = current.abs().max(traded.abs()) * 4.0 * f64::EPSILON;

        if remaining <= dust {
            let (_, location) = state.remove(order_id)?;
            debug!(symbol = %self.symbol, order_id, traded, "order filled");
            self.notify(
                state,
                UpdateKind::Removed,
                Some(order_id.to_string()),
                location,
            );
            Ok(Fill::Complete)
        } else {
            let (_, location) = state.modify(order_id, remaining)?;
            debug!(
                symbol = %self.symbol,
                order_id,
                traded,
                remaining,
                "order partially filled"
            );
            self.notify(
                state,
                UpdateKind::Modified,
                Some(order_id.to_string()),
                location,
            );
            Ok(Fill::Partial { remaining })
        }
    }

    fn notify(
        &self,
        state: &mut BookState,
        kind: UpdateKind,
        order_id: Option<OrderId>,
        location: OrderLocation,
    ) {
        state.sequence += 1;
        let update = BookUpdate {
            kind,
            order_id,
            side: Some(location.side),
            price: Some(location.price),
            sequence: state.sequence,
        };
        self.fire(&update);
    }

    /// Must only be called while the book lock is held
    fn fire(&self, update: &BookUpdate) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(update);
        }
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("symbol", &self.symbol)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookStats {
    pub symbol: String,
    pub order_count: usize,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub best_bid: Price,
    pub best_ask: Price,
    pub spread: Price,
    pub midpoint: Price,
    pub sequence: u64,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new("DEFAULT")
    }
}
