use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::orderbook::error::OrderBookError;
use crate::orderbook::types::{OrderId, Price, Side, Size};

/// L3 order lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Received,
    Open,
    Change,
    Match,
    Done,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Received => "received",
            EventKind::Open => "open",
            EventKind::Change => "change",
            EventKind::Match => "match",
            EventKind::Done => "done",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = OrderBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(EventKind::Received),
            "open" => Ok(EventKind::Open),
            "change" => Ok(EventKind::Change),
            "match" => Ok(EventKind::Match),
            "done" => Ok(EventKind::Done),
            other => Err(OrderBookError::UnknownEventKind(other.to_string())),
        }
    }
}

/// One decoded L3 event.
///
/// Which fields are required depends on `kind`; the reconciler checks them.
/// For `Match`, `order_id` is the maker and `size` the traded amount. For
/// `Change`, `size` is the new absolute size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub kind: EventKind,
    pub order_id: Option<OrderId>,
    pub taker_order_id: Option<OrderId>,
    pub side: Option<Side>,
    pub price: Option<Price>,
    pub size: Option<Size>,
}

impl FeedEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            order_id: None,
            taker_order_id: None,
            side: None,
            price: None,
            size: None,
        }
    }

    pub fn open(order_id: impl Into<OrderId>, side: Side, price: Price, size: Size) -> Self {
        Self {
            order_id: Some(order_id.into()),
            side: Some(side),
            price: Some(price),
            size: Some(size),
            ..Self::new(EventKind::Open)
        }
    }

    pub fn change(order_id: impl Into<OrderId>, new_size: Size) -> Self {
        Self {
            order_id: Some(order_id.into()),
            size: Some(new_size),
            ..Self::new(EventKind::Change)
        }
    }

    /// Trade of `size` against the resting maker order
    pub fn trade(maker_order_id: impl Into<OrderId>, size: Size) -> Self {
        Self {
            order_id: Some(maker_order_id.into()),
            size: Some(size),
            ..Self::new(EventKind::Match)
        }
    }

    pub fn done(order_id: impl Into<OrderId>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            ..Self::new(EventKind::Done)
        }
    }

    pub fn with_taker(mut self, taker_order_id: impl Into<OrderId>) -> Self {
        self.taker_order_id = Some(taker_order_id.into());
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }
}

/// One aggregated level change: new absolute size at (side, price)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct L2Change {
    pub side: Side,
    pub price: Price,
    pub size: Size,
}

impl L2Change {
    pub fn new(side: Side, price: Price, size: Size) -> Self {
        Self { side, price, size }
    }
}

/// Already-decoded venue message handed over by the transport collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedMessage {
    /// Full aggregated book; replaces everything
    Snapshot {
        bids: Vec<(Price, Size)>,
        asks: Vec<(Price, Size)>,
    },
    /// Incremental aggregated changes
    L2Update { changes: Vec<L2Change> },
    /// Top of book only
    Ticker {
        best_bid: Price,
        best_bid_size: Size,
        best_ask: Price,
        best_ask_size: Size,
    },
    /// Per-order lifecycle event
    L3(FeedEvent),
    Heartbeat,
    Subscriptions { channels: Vec<String> },
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_parsing() {
        for kind in [
            EventKind::Received,
            EventKind::Open,
            EventKind::Change,
            EventKind::Match,
            EventKind::Done,
        ] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }

        assert!(matches!(
            "l3update".parse::<EventKind>(),
            Err(OrderBookError::UnknownEventKind(_))
        ));
    }

    #[test]
    fn test_constructors_fill_required_fields() {
        let open = FeedEvent::open("o1", Side::Buy, 100.0, 1.5);
        assert_eq!(open.kind, EventKind::Open);
        assert_eq!(open.price, Some(100.0));

        let trade = FeedEvent::trade("maker", 0.5).with_taker("taker");
        assert_eq!(trade.kind, EventKind::Match);
        assert_eq!(trade.order_id.as_deref(), Some("maker"));
        assert_eq!(trade.taker_order_id.as_deref(), Some("taker"));

        let done = FeedEvent::done("o1");
        assert_eq!(done.side, None);
        assert_eq!(done.size, None);
    }

    #[test]
    fn test_event_kind_serde_uses_wire_names() {
        let json = serde_json::to_string(&EventKind::Match).unwrap();
        assert_eq!(json, "\"match\"");
    }
}
