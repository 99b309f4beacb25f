//! Round-robin arbitration of bus initiators onto the shared bus.

use std::fmt;

use tracing::trace;

use crate::fault::programming_error;

/// Identifier assigned to an initiator in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InitiatorId(usize);

impl InitiatorId {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Zero-based registration index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InitiatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// Grants the shared bus to one requesting initiator per transaction.
///
/// The rotating pointer is the only runtime state. It moves to one past the
/// granted id on each grant and stays put on idle cycles, so an initiator
/// that requests every cycle waits for at most `N - 1` other grants.
#[derive(Debug, Clone, Default)]
pub struct BusArbiter {
    initiators: Vec<String>,
    pointer: usize,
    sealed: bool,
    owner: Option<InitiatorId>,
}

impl BusArbiter {
    /// Creates an arbiter with no initiators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an initiator and returns its id.
    ///
    /// # Panics
    ///
    /// Panics once arbitration has started.
    pub fn register(&mut self, name: impl Into<String>) -> InitiatorId {
        let name = name.into();
        if self.sealed {
            programming_error(format_args!(
                "initiator '{name}' registered after arbitration started"
            ));
        }
        let id = InitiatorId(self.initiators.len());
        self.initiators.push(name);
        id
    }

    /// Number of registered initiators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.initiators.len()
    }

    /// Returns `true` when no initiator is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.initiators.is_empty()
    }

    /// Name an initiator was registered with.
    #[must_use]
    pub fn name(&self, id: InitiatorId) -> Option<&str> {
        self.initiators.get(id.0).map(String::as_str)
    }

    /// Id the next grant search starts from.
    #[must_use]
    pub const fn pointer(&self) -> InitiatorId {
        InitiatorId(self.pointer)
    }

    /// Initiator owning the bus, if a grant is outstanding.
    #[must_use]
    pub const fn owner(&self) -> Option<InitiatorId> {
        self.owner
    }

    /// Grants the bus to the first requesting initiator at or after the
    /// rotating pointer, wrapping around.
    ///
    /// The returned [`Grant`] borrows the arbiter, so no second grant can be
    /// issued until the owner completes its transaction by dropping it.
    ///
    /// # Panics
    ///
    /// Panics when `requesting` names an id that was never registered.
    pub fn arbitrate(&mut self, requesting: &[InitiatorId]) -> Option<Grant<'_>> {
        self.sealed = true;
        let count = self.initiators.len();
        if let Some(unknown) = requesting.iter().find(|id| id.0 >= count) {
            programming_error(format_args!(
                "arbitration requested by unregistered initiator {unknown}"
            ));
        }

        let granted = (0..count)
            .map(|step| InitiatorId((self.pointer + step) % count))
            .find(|candidate| requesting.contains(candidate))?;

        self.pointer = (granted.0 + 1) % count;
        self.owner = Some(granted);
        trace!(initiator = %granted, next = self.pointer, "bus granted");
        Some(Grant {
            arbiter: self,
            id: granted,
        })
    }
}

/// Exclusive ownership of the shared bus for one transaction.
///
/// Dropping the grant (or calling [`Grant::complete`]) signals completion.
#[derive(Debug)]
pub struct Grant<'a> {
    arbiter: &'a mut BusArbiter,
    id: InitiatorId,
}

impl Grant<'_> {
    /// The initiator that owns the bus.
    #[must_use]
    pub const fn id(&self) -> InitiatorId {
        self.id
    }

    /// Ends the transaction and releases the bus.
    pub fn complete(self) {}
}

impl Drop for Grant<'_> {
    fn drop(&mut self) {
        trace!(initiator = %self.id, "bus released");
        self.arbiter.owner = None;
    }
}
