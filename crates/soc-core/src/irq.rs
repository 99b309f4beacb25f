//! Interrupt aggregation into the processor's pending vector.
//!
//! Sources are level-sensitive. The pending vector is recomputed from the
//! current levels on every evaluation and nothing is latched, so a source
//! that deasserts disappears from the next evaluation. Priority among set
//! bits is left to the processor.

use tracing::debug;

use crate::fault::programming_error;
use crate::ConflictError;

/// Width of the processor's interrupt-pending register.
pub const NATIVE_IRQ_WIDTH: u32 = 32;

/// Widest pending vector an aggregator can produce.
pub const MAX_IRQ_WIDTH: u32 = 64;

/// Identifier of a registered interrupt source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SourceId(usize);

impl SourceId {
    /// Zero-based registration index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A named interrupt line bound to one slot of the pending vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InterruptSource {
    /// Source name.
    pub name: String,
    /// Bit position in the pending vector.
    pub slot: u32,
}

/// Collects interrupt sources into a fixed-width pending bitmask.
#[derive(Debug, Clone)]
pub struct InterruptAggregator {
    width: u32,
    sources: Vec<InterruptSource>,
    levels: Vec<bool>,
}

impl InterruptAggregator {
    /// Creates an aggregator producing a `width`-bit pending vector.
    ///
    /// # Panics
    ///
    /// Panics when `width` is zero or above [`MAX_IRQ_WIDTH`].
    #[must_use]
    pub fn new(width: u32) -> Self {
        if width == 0 || width > MAX_IRQ_WIDTH {
            programming_error(format_args!(
                "interrupt vector width {width} outside 1..={MAX_IRQ_WIDTH}"
            ));
        }
        Self {
            width,
            sources: Vec::new(),
            levels: Vec::new(),
        }
    }

    /// Width of the pending vector.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Binds a new source to bit `slot`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] when the name or slot is already taken, or
    /// when `slot` does not fit the vector.
    pub fn add_source(&mut self, name: &str, slot: u32) -> Result<SourceId, ConflictError> {
        if slot >= self.width {
            return Err(ConflictError::SlotOutOfRange {
                name: name.to_string(),
                slot,
                width: self.width,
            });
        }
        if self.sources.iter().any(|source| source.name == name) {
            return Err(ConflictError::DuplicateName {
                name: name.to_string(),
            });
        }
        if let Some(existing) = self.sources.iter().find(|source| source.slot == slot) {
            return Err(ConflictError::DuplicateSlot {
                name: name.to_string(),
                slot,
                existing: existing.name.clone(),
            });
        }

        debug!(source = name, slot, "interrupt source added");
        self.sources.push(InterruptSource {
            name: name.to_string(),
            slot,
        });
        self.levels.push(false);
        Ok(SourceId(self.sources.len() - 1))
    }

    /// Registered sources in registration order.
    #[must_use]
    pub fn sources(&self) -> &[InterruptSource] {
        &self.sources
    }

    /// Slot bound to the source named `name`.
    #[must_use]
    pub fn slot_of(&self, name: &str) -> Option<u32> {
        self.sources
            .iter()
            .find(|source| source.name == name)
            .map(|source| source.slot)
    }

    /// Drives the current level of a source.
    ///
    /// # Panics
    ///
    /// Panics when `id` was not returned by [`Self::add_source`].
    pub fn set_level(&mut self, id: SourceId, asserted: bool) {
        match self.levels.get_mut(id.0) {
            Some(level) => *level = asserted,
            None => programming_error(format_args!("unknown interrupt source #{}", id.0)),
        }
    }

    /// OR of all asserted sources into their slots, from the stored levels.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.pending_from(|id| self.levels[id.0])
    }

    /// OR of all asserted sources into their slots, sampling each level
    /// through `level`.
    #[must_use]
    pub fn pending_from(&self, level: impl Fn(SourceId) -> bool) -> u64 {
        self.sources
            .iter()
            .enumerate()
            .filter(|(index, _)| level(SourceId(*index)))
            .fold(0, |vector, (_, source)| vector | (1 << source.slot))
    }
}

impl Default for InterruptAggregator {
    fn default() -> Self {
        Self::new(NATIVE_IRQ_WIDTH)
    }
}
