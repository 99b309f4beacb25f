//! Core system-integration crate: memory map, bus fabric, and interrupt
//! aggregation for a processor with memory-mapped peripherals.

/// Construction conflicts, decode faults, and programming-error aborts.
pub mod fault;
pub use fault::{ConflictError, DecodeFault};

/// Bus geometry and the hierarchical address registry.
pub mod memory;
pub use memory::{
    AddressRegistry, BusGeometry, GeometryError, Lookup, MappedResource, MappedWindow, Resource,
    Resources, Window, MAX_DATA_WIDTH, NATIVE_ADDR_WIDTH, NATIVE_DATA_WIDTH, NATIVE_GRANULARITY,
};

/// Shared-bus arbitration, decoding, and transaction logging.
pub mod bus;
pub use bus::{
    format_transaction, Access, BusArbiter, BusDecoder, BusMonitor, BusResponse, Decoded, Grant,
    InitiatorId, TargetId, Transaction,
};

/// Level-sensitive interrupt aggregation.
pub mod irq;
pub use irq::{InterruptAggregator, InterruptSource, SourceId, MAX_IRQ_WIDTH, NATIVE_IRQ_WIDTH};

/// Processor and peripheral boundary traits.
pub mod api;
pub use api::{BusFault, BusInitiator, BusTarget, ProcessorPorts};

/// System composition and the per-cycle bus step.
pub mod system;
pub use system::{StepReport, System, SystemBuilder};

#[cfg(test)]
use proptest as _;
