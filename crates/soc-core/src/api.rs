//! Boundary contracts between the bus fabric and the devices attached to it.
//!
//! The processor pipeline and the peripheral datapaths live outside this
//! crate. They are reached only through these traits.

use crate::{AddressRegistry, BusResponse, InitiatorId, Transaction};

/// Producer of bus transactions, such as a processor's instruction or data
/// port.
pub trait BusInitiator {
    /// Name used in arbitration logs and diagnostics.
    fn name(&self) -> &str;

    /// Transaction this initiator wants to issue this cycle, if any.
    ///
    /// Must keep returning the same transaction until it is completed.
    fn request(&self) -> Option<Transaction>;

    /// Delivers the response for a previously requested transaction.
    fn complete(&mut self, transaction: Transaction, response: BusResponse);
}

/// Consumer of bus transactions addressed to its window.
pub trait BusTarget {
    /// Name of the window this target claims.
    fn name(&self) -> &str;

    /// Layout of the claimed window. Its size is the window size and its
    /// resources (registers, memories) are relative to the window base.
    fn memory_map(&self) -> AddressRegistry;

    /// Reads the word at `offset` within the window.
    fn read(&mut self, offset: u64, select: u8) -> u32;

    /// Writes the selected lanes of `data` at `offset` within the window.
    fn write(&mut self, offset: u64, data: u32, select: u8);

    /// Current level of the target's interrupt line.
    fn irq(&self) -> bool {
        false
    }
}

/// Arbiter ids of the processor's two independent bus ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ProcessorPorts {
    /// Instruction-fetch port.
    pub ibus: InitiatorId,
    /// Load/store port.
    pub dbus: InitiatorId,
}

/// Bus fault reported to the processor for its trap logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusFault {
    /// Initiator whose transaction faulted.
    pub initiator: InitiatorId,
    /// Faulting byte address.
    pub address: u64,
}
