//! Shared-bus geometry and the native address-space contract.

use thiserror::Error;

/// Word address width of the processor's native shared bus.
pub const NATIVE_ADDR_WIDTH: u32 = 30;
/// Data width in bits of the native shared bus.
pub const NATIVE_DATA_WIDTH: u32 = 32;
/// Access granularity in bits of the native shared bus.
pub const NATIVE_GRANULARITY: u32 = 8;

/// Widest data path supported by the byte-lane select model.
pub const MAX_DATA_WIDTH: u32 = 32;

/// Address, data, and granularity widths of a shared bus.
///
/// Addresses handed to the registry and the decoder are always byte
/// addresses; `addr_width` counts word addresses, as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusGeometry {
    addr_width: u32,
    data_width: u32,
    granularity: u32,
}

/// Rejected geometry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum GeometryError {
    /// Data width is not a multiple of 8, or wider than [`MAX_DATA_WIDTH`].
    #[error("data width {0} must be a multiple of 8 and at most {max}", max = MAX_DATA_WIDTH)]
    DataWidth(u32),
    /// Granularity does not split the data width into a power-of-two lane count.
    #[error("granularity {granularity} does not evenly split data width {data_width}")]
    Granularity {
        /// Requested data width in bits.
        data_width: u32,
        /// Requested granularity in bits.
        granularity: u32,
    },
    /// Address width leaves no room for byte addressing in 64 bits.
    #[error("address width {0} is out of range")]
    AddrWidth(u32),
}

impl BusGeometry {
    /// Native processor bus: 30-bit word address, 32-bit data, byte granularity.
    pub const NATIVE: Self = Self {
        addr_width: NATIVE_ADDR_WIDTH,
        data_width: NATIVE_DATA_WIDTH,
        granularity: NATIVE_GRANULARITY,
    };

    /// Validates and builds a bus geometry.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError`] when the widths cannot describe a
    /// byte-addressable bus with power-of-two byte lanes.
    pub const fn new(
        addr_width: u32,
        data_width: u32,
        granularity: u32,
    ) -> Result<Self, GeometryError> {
        if data_width == 0 || data_width % 8 != 0 || data_width > MAX_DATA_WIDTH {
            return Err(GeometryError::DataWidth(data_width));
        }
        if granularity == 0
            || granularity % 8 != 0
            || data_width % granularity != 0
            || !(data_width / granularity).is_power_of_two()
        {
            return Err(GeometryError::Granularity {
                data_width,
                granularity,
            });
        }
        if addr_width == 0 || addr_width > 48 {
            return Err(GeometryError::AddrWidth(addr_width));
        }
        Ok(Self {
            addr_width,
            data_width,
            granularity,
        })
    }

    /// Word address width.
    #[must_use]
    pub const fn addr_width(self) -> u32 {
        self.addr_width
    }

    /// Data width in bits.
    #[must_use]
    pub const fn data_width(self) -> u32 {
        self.data_width
    }

    /// Granularity in bits.
    #[must_use]
    pub const fn granularity(self) -> u32 {
        self.granularity
    }

    /// Number of independently selectable lanes per word.
    #[must_use]
    pub const fn lanes(self) -> u32 {
        self.data_width / self.granularity
    }

    /// Bytes per bus word.
    #[must_use]
    pub const fn word_bytes(self) -> u32 {
        self.data_width / 8
    }

    /// Bytes per addressable unit.
    #[must_use]
    pub const fn granularity_bytes(self) -> u32 {
        self.granularity / 8
    }

    /// Width of a byte address on this bus.
    #[must_use]
    pub const fn byte_address_width(self) -> u32 {
        self.addr_width + self.word_bytes().trailing_zeros()
    }

    /// Total byte address space reachable on this bus.
    #[must_use]
    pub const fn address_space_bytes(self) -> u64 {
        1 << self.byte_address_width()
    }

    /// Lane-select mask with every lane enabled.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn full_select(self) -> u8 {
        // lanes <= 4 because data_width <= 32 and granularity >= 8
        ((1_u16 << self.lanes()) - 1) as u8
    }
}

impl Default for BusGeometry {
    fn default() -> Self {
        Self::NATIVE
    }
}

const _: () = assert_native_geometry();

const fn assert_native_geometry() {
    assert!(
        BusGeometry::NATIVE.byte_address_width() == 32,
        "native bus must address a 4 GiB byte space"
    );
    assert!(
        BusGeometry::NATIVE.lanes() == 4,
        "native bus must expose four byte lanes"
    );
    assert!(
        BusGeometry::NATIVE.full_select() == 0b1111,
        "native full select must cover four lanes"
    );
}
