use thiserror::Error;

/// Construction-time conflicts raised while composing the memory map or the
/// interrupt vector.
///
/// Every variant is recoverable by the caller: rename, resize, or reposition
/// the offending entry and try again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ConflictError {
    /// A resource, window, or interrupt source reused a name.
    #[error("name '{name}' is already registered")]
    DuplicateName {
        /// The rejected name.
        name: String,
    },
    /// The requested range intersects an existing entry.
    #[error(
        "'{name}' at 0x{start:x}..0x{end:x} overlaps '{existing}' at 0x{existing_start:x}..0x{existing_end:x}"
    )]
    Overlap {
        /// The rejected name.
        name: String,
        /// Requested start address (inclusive).
        start: u64,
        /// Requested end address (exclusive).
        end: u64,
        /// Name of the entry already occupying the range.
        existing: String,
        /// Start address of the existing entry.
        existing_start: u64,
        /// End address of the existing entry.
        existing_end: u64,
    },
    /// The requested range does not fit in the map's address space.
    #[error("'{name}' at 0x{start:x} with size 0x{size:x} exceeds the map limit 0x{limit:x}")]
    OutOfBounds {
        /// The rejected name.
        name: String,
        /// Requested start address.
        start: u64,
        /// Requested size in bytes.
        size: u64,
        /// Size of the address space being inserted into.
        limit: u64,
    },
    /// A zero-sized range was requested.
    #[error("'{name}' has an empty address range")]
    EmptyRange {
        /// The rejected name.
        name: String,
    },
    /// Granularity is zero or not a power of two.
    #[error("'{name}' uses invalid access granularity {granularity}")]
    InvalidGranularity {
        /// The rejected name.
        name: String,
        /// Requested granularity in bytes.
        granularity: u32,
    },
    /// Start or size is not a multiple of the access granularity.
    #[error("'{name}' at 0x{start:x} with size 0x{size:x} is not aligned to {granularity} bytes")]
    Misaligned {
        /// The rejected name.
        name: String,
        /// Requested start address.
        start: u64,
        /// Requested size in bytes.
        size: u64,
        /// Requested granularity in bytes.
        granularity: u32,
    },
    /// Two interrupt sources were assigned the same slot.
    #[error("interrupt slot {slot} for '{name}' is already taken by '{existing}'")]
    DuplicateSlot {
        /// The rejected source name.
        name: String,
        /// Requested slot.
        slot: u32,
        /// Source already holding the slot.
        existing: String,
    },
    /// The interrupt slot is outside the pending vector.
    #[error("interrupt slot {slot} for '{name}' exceeds vector width {width}")]
    SlotOutOfRange {
        /// The rejected source name.
        name: String,
        /// Requested slot.
        slot: u32,
        /// Width of the pending vector.
        width: u32,
    },
}

/// Runtime fault raised when a transaction address has no mapped target.
///
/// The processor surfaces this as a bus-error trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("no target mapped at address 0x{address:08x}")]
pub struct DecodeFault {
    /// Faulting byte address.
    pub address: u64,
}

/// Aborts on a construction bug.
///
/// Programming errors (mutation after freeze, unknown ids, queries before
/// sealing) are not runtime conditions and are never returned as values.
#[cold]
#[track_caller]
pub(crate) fn programming_error(message: std::fmt::Arguments<'_>) -> ! {
    panic!("programming error: {message}")
}
