//! Shared-bus transaction and response types.

use crate::DecodeFault;

/// Direction and write payload of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Access {
    /// Read one word.
    Read,
    /// Write one word; only selected lanes are meaningful.
    Write(u32),
}

/// One single-word transaction issued by a bus initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Transaction {
    /// Byte address of the accessed word.
    pub address: u64,
    /// Read or write.
    pub access: Access,
    /// Lane-select mask, bit `n` enabling lane `n`.
    pub select: u8,
}

impl Transaction {
    /// Builds a read of the word at `address`.
    #[must_use]
    pub const fn read(address: u64, select: u8) -> Self {
        Self {
            address,
            access: Access::Read,
            select,
        }
    }

    /// Builds a write of `data` to the word at `address`.
    #[must_use]
    pub const fn write(address: u64, data: u32, select: u8) -> Self {
        Self {
            address,
            access: Access::Write(data),
            select,
        }
    }

    /// Returns `true` for writes.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self.access, Access::Write(_))
    }
}

/// Completion status returned to the initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BusResponse {
    /// Transaction acknowledged; carries read data (zero for writes).
    Ack(u32),
    /// No target claimed the address. The processor raises a bus-error trap.
    Error {
        /// Faulting byte address.
        address: u64,
    },
}

impl BusResponse {
    /// Returns `true` for [`BusResponse::Error`].
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Read data when acknowledged.
    #[must_use]
    pub const fn data(self) -> Option<u32> {
        match self {
            Self::Ack(data) => Some(data),
            Self::Error { .. } => None,
        }
    }
}

impl From<DecodeFault> for BusResponse {
    fn from(fault: DecodeFault) -> Self {
        Self::Error {
            address: fault.address,
        }
    }
}
