//! Address decoding of granted transactions onto peripheral targets.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::fault::programming_error;
use crate::{AddressRegistry, BusGeometry, ConflictError, DecodeFault, Lookup};

/// Identifier assigned to a target in connection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TargetId(usize);

impl TargetId {
    /// Zero-based connection index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// A successfully decoded address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decoded {
    /// Target owning the address.
    pub target: TargetId,
    /// Offset of the address from the target's window base.
    pub offset: u64,
}

/// Routes addresses to the target whose window contains them.
///
/// Each connected target claims one window in the shared registry. Overlap
/// checking is delegated to [`AddressRegistry`].
#[derive(Debug, Clone)]
pub struct BusDecoder {
    geometry: BusGeometry,
    map: AddressRegistry,
    targets: Vec<String>,
    by_window: HashMap<String, TargetId>,
}

impl BusDecoder {
    /// Creates a decoder spanning the full address space of `geometry`.
    #[must_use]
    pub fn new(geometry: BusGeometry) -> Self {
        Self {
            geometry,
            map: AddressRegistry::for_bus("decoder", geometry),
            targets: Vec::new(),
            by_window: HashMap::new(),
        }
    }

    /// Bus geometry the decoder was built for.
    #[must_use]
    pub const fn geometry(&self) -> BusGeometry {
        self.geometry
    }

    /// Registers `window` as the target named `name` at `base`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] when the window's name or range conflicts
    /// with an already connected target.
    ///
    /// # Panics
    ///
    /// Panics after [`Self::seal`].
    pub fn connect(
        &mut self,
        name: &str,
        window: AddressRegistry,
        base: u64,
    ) -> Result<TargetId, ConflictError> {
        if self.map.is_frozen() {
            programming_error(format_args!("target '{name}' connected after seal"));
        }
        self.map.insert_window(name, window, base)?;
        let id = TargetId(self.targets.len());
        self.targets.push(name.to_string());
        self.by_window.insert(name.to_string(), id);
        debug!(target_name = name, id = %id, base = format_args!("{base:#x}"), "target connected");
        Ok(id)
    }

    /// Freezes the memory map. Required before the first decode.
    pub fn seal(&mut self) {
        self.map.freeze();
    }

    /// Returns `true` once sealed.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.map.is_frozen()
    }

    /// The composed memory map.
    #[must_use]
    pub const fn memory_map(&self) -> &AddressRegistry {
        &self.map
    }

    /// Name a target was connected with.
    #[must_use]
    pub fn target_name(&self, id: TargetId) -> Option<&str> {
        self.targets.get(id.0).map(String::as_str)
    }

    /// Number of connected targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` when no target is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Resolves `address` to its owning target.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeFault`] when no window contains `address`.
    ///
    /// # Panics
    ///
    /// Panics when called before [`Self::seal`].
    pub fn decode(&self, address: u64) -> Result<Decoded, DecodeFault> {
        if !self.map.is_frozen() {
            programming_error(format_args!(
                "decode of {address:#x} before the decoder was sealed"
            ));
        }
        match self.map.find(address) {
            Some(Lookup::Window { window, start, .. }) => {
                let target = self.by_window[window.name()];
                Ok(Decoded {
                    target,
                    offset: address - start,
                })
            }
            Some(Lookup::Resource { .. }) | None => {
                warn!(address = format_args!("{address:#010x}"), "decode fault");
                Err(DecodeFault { address })
            }
        }
    }
}
