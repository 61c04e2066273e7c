use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::types::OrderId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderBookError {
    /// An order with this id is already resting in the book
    DuplicateId(OrderId),

    /// No resting order has this id
    UnknownId(OrderId),

    /// Order price does not match the level it was routed to
    PriceMismatch { expected: f64, actual: f64 },

    /// Event is missing a field its kind requires
    MissingField { kind: String, field: String },

    /// Size is NaN, infinite or negative
    InvalidSize(f64),

    /// Price is NaN, infinite, zero or negative
    InvalidPrice(f64),

    /// Event kind string not recognised
    UnknownEventKind(String),

    /// Side string not recognised
    UnknownSide(String),

    /// Configuration could not be loaded
    Config(String),
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::DuplicateId(id) => write!(f, "Order {} already exists", id),
            OrderBookError::UnknownId(id) => write!(f, "Order {} not found", id),
            OrderBookError::PriceMismatch { expected, actual } => {
                write!(f, "Price mismatch: level {} got order at {}", expected, actual)
            }
            OrderBookError::MissingField { kind, field } => {
                write!(f, "Missing field '{}' in {} event", field, kind)
            }
            OrderBookError::InvalidSize(size) => write!(f, "Invalid size: {}", size),
            OrderBookError::InvalidPrice(price) => write!(f, "Invalid price: {}", price),
            OrderBookError::UnknownEventKind(kind) => write!(f, "Unknown event kind: {}", kind),
            OrderBookError::UnknownSide(side) => write!(f, "Unknown side: {}", side),
            OrderBookError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for OrderBookError {}

impl OrderBookError {
    /// Failures expected during normal feed operation (duplicate or
    /// out-of-order delivery), as opposed to malformed input.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            OrderBookError::DuplicateId(_) | OrderBookError::UnknownId(_)
        )
    }

    pub(crate) fn missing(kind: &str, field: &str) -> Self {
        OrderBookError::MissingField {
            kind: kind.to_string(),
            field: field.to_string(),
        }
    }
}

/// Result type for order book operations
pub type OrderBookResult<T> = Result<T, OrderBookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            OrderBookError::UnknownId("o1".to_string()).to_string(),
            "Order o1 not found"
        );
        assert_eq!(
            OrderBookError::missing("match", "size").to_string(),
            "Missing field 'size' in match event"
        );
        assert_eq!(
            OrderBookError::Config("bad json".to_string()).to_string(),
            "Configuration error: bad json"
        );
    }

    #[test]
    fn test_benign_classification() {
        assert!(OrderBookError::DuplicateId("a".to_string()).is_benign());
        assert!(OrderBookError::UnknownId("a".to_string()).is_benign());
        assert!(!OrderBookError::InvalidSize(f64::NAN).is_benign());
        assert!(!OrderBookError::missing("open", "price").is_benign());
    }

    #[test]
    fn test_error_serialization() {
        let error = OrderBookError::PriceMismatch {
            expected: 100.0,
            actual: 101.0,
        };
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: OrderBookError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
