//! Shared-bus fabric: arbitration, decoding, and transaction logging.

/// Round-robin initiator arbitration.
pub mod arbiter;
/// Window-membership address decoding.
pub mod decoder;
/// Completed-transaction log.
pub mod monitor;
/// Transaction and response types.
pub mod transaction;

pub use arbiter::{BusArbiter, Grant, InitiatorId};
pub use decoder::{BusDecoder, Decoded, TargetId};
pub use monitor::{format_transaction, BusMonitor};
pub use transaction::{Access, BusResponse, Transaction};
