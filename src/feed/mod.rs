//! Feed layer: exchange events in, book mutations out.
//!
//! The reconciler owns no order state of its own and drives the book only
//! through its public operations.

pub mod event;
pub mod handler;
pub mod reconciler;

pub use event::{EventKind, FeedEvent, FeedMessage, L2Change};
pub use handler::{handler_for, CoinbaseHandler, FeedHandler, Venue};
pub use reconciler::{EventOutcome, FeedReconciler, ReconcileCounts};
