//! Composition of processor ports, peripherals, and interrupt lines into one
//! addressable system.
//!
//! [`SystemBuilder`] is the single-threaded construction phase. [`System`]
//! is the sealed result, stepped once per bus cycle by the caller.

use tracing::{debug, info};

use crate::{
    Access, AddressRegistry, BusArbiter, BusDecoder, BusFault, BusGeometry, BusInitiator,
    BusMonitor, BusResponse, BusTarget, ConflictError, DecodeFault, Decoded, InitiatorId,
    InterruptAggregator, ProcessorPorts, SourceId, TargetId, Transaction,
};

/// Outcome of one bus cycle that carried a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepReport {
    /// Initiator that owned the bus.
    pub initiator: InitiatorId,
    /// The transaction it issued.
    pub transaction: Transaction,
    /// Response delivered back to it.
    pub response: BusResponse,
}

/// Mutable construction state of a system.
pub struct SystemBuilder {
    arbiter: BusArbiter,
    decoder: BusDecoder,
    irqs: InterruptAggregator,
    initiators: Vec<Box<dyn BusInitiator>>,
    targets: Vec<Box<dyn BusTarget>>,
    irq_lines: Vec<(SourceId, TargetId)>,
}

impl SystemBuilder {
    /// Starts a system on a bus of the given geometry with a `irq_width`-bit
    /// pending vector.
    ///
    /// # Panics
    ///
    /// Panics when `irq_width` is not a supported vector width.
    #[must_use]
    pub fn new(geometry: BusGeometry, irq_width: u32) -> Self {
        Self {
            arbiter: BusArbiter::new(),
            decoder: BusDecoder::new(geometry),
            irqs: InterruptAggregator::new(irq_width),
            initiators: Vec::new(),
            targets: Vec::new(),
            irq_lines: Vec::new(),
        }
    }

    /// Registers a bus initiator. Registration order is arbitration order.
    pub fn add_initiator(&mut self, initiator: Box<dyn BusInitiator>) -> InitiatorId {
        let id = self.arbiter.register(initiator.name());
        debug!(initiator = initiator.name(), id = %id, "initiator registered");
        self.initiators.push(initiator);
        id
    }

    /// Registers the processor's instruction port, then its data port.
    pub fn add_processor(
        &mut self,
        ibus: Box<dyn BusInitiator>,
        dbus: Box<dyn BusInitiator>,
    ) -> ProcessorPorts {
        ProcessorPorts {
            ibus: self.add_initiator(ibus),
            dbus: self.add_initiator(dbus),
        }
    }

    /// Connects a target's window at `base`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] when the window collides with an already
    /// connected target.
    pub fn add_target(
        &mut self,
        target: Box<dyn BusTarget>,
        base: u64,
    ) -> Result<TargetId, ConflictError> {
        let id = self
            .decoder
            .connect(target.name(), target.memory_map(), base)?;
        self.targets.push(target);
        Ok(id)
    }

    /// Routes a target's interrupt line to bit `slot` of the pending vector.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] when the slot is taken or out of range, or
    /// when the target's line is already routed.
    ///
    /// # Panics
    ///
    /// Panics when `target` was not returned by [`Self::add_target`].
    pub fn add_irq(&mut self, target: TargetId, slot: u32) -> Result<SourceId, ConflictError> {
        let Some(name) = self.decoder.target_name(target) else {
            crate::fault::programming_error(format_args!("interrupt routed from unknown {target}"));
        };
        let source = self.irqs.add_source(name, slot)?;
        self.irq_lines.push((source, target));
        Ok(source)
    }

    /// Memory map composed so far.
    #[must_use]
    pub const fn memory_map(&self) -> &AddressRegistry {
        self.decoder.memory_map()
    }

    /// Seals the decoder and freezes the memory map.
    #[must_use]
    pub fn build(mut self) -> System {
        self.decoder.seal();
        info!(
            initiators = self.initiators.len(),
            targets = self.targets.len(),
            interrupts = self.irq_lines.len(),
            "system sealed"
        );
        System {
            monitor: None,
            last_fault: None,
            arbiter: self.arbiter,
            decoder: self.decoder,
            irqs: self.irqs,
            initiators: self.initiators,
            targets: self.targets,
            irq_lines: self.irq_lines,
        }
    }
}

/// A sealed system ready to run bus cycles.
pub struct System {
    arbiter: BusArbiter,
    decoder: BusDecoder,
    irqs: InterruptAggregator,
    initiators: Vec<Box<dyn BusInitiator>>,
    targets: Vec<Box<dyn BusTarget>>,
    irq_lines: Vec<(SourceId, TargetId)>,
    monitor: Option<BusMonitor>,
    last_fault: Option<BusFault>,
}

impl System {
    /// The frozen memory map.
    #[must_use]
    pub const fn memory_map(&self) -> &AddressRegistry {
        self.decoder.memory_map()
    }

    /// Bus geometry of the shared bus.
    #[must_use]
    pub const fn geometry(&self) -> BusGeometry {
        self.decoder.geometry()
    }

    /// The arbiter, for inspecting the rotating pointer.
    #[must_use]
    pub const fn arbiter(&self) -> &BusArbiter {
        &self.arbiter
    }

    /// The interrupt aggregator, for inspecting slot assignments.
    #[must_use]
    pub const fn interrupts(&self) -> &InterruptAggregator {
        &self.irqs
    }

    /// Resolves an address against the sealed map.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeFault`] for unmapped addresses.
    pub fn decode(&self, address: u64) -> Result<Decoded, DecodeFault> {
        self.decoder.decode(address)
    }

    /// Starts logging acknowledged transactions.
    pub fn enable_monitor(&mut self) {
        if self.monitor.is_none() {
            self.monitor = Some(BusMonitor::new(self.geometry()));
        }
    }

    /// Transaction log, when enabled.
    #[must_use]
    pub const fn monitor(&self) -> Option<&BusMonitor> {
        self.monitor.as_ref()
    }

    /// Mutable transaction log, when enabled.
    pub fn monitor_mut(&mut self) -> Option<&mut BusMonitor> {
        self.monitor.as_mut()
    }

    /// Most recent bus fault, reported to the processor as a trap.
    #[must_use]
    pub const fn last_fault(&self) -> Option<BusFault> {
        self.last_fault
    }

    /// Clears and returns the most recent bus fault.
    pub fn take_fault(&mut self) -> Option<BusFault> {
        self.last_fault.take()
    }

    /// Runs one bus cycle: arbitrate among requesting initiators, decode the
    /// winner's transaction, dispatch it, and complete it.
    ///
    /// Returns `None` on an idle cycle.
    pub fn step(&mut self) -> Option<StepReport> {
        let requesting: Vec<InitiatorId> = self
            .initiators
            .iter()
            .enumerate()
            .filter(|(_, initiator)| initiator.request().is_some())
            .map(|(index, _)| InitiatorId::from_index(index))
            .collect();

        let grant = self.arbiter.arbitrate(&requesting)?;
        let id = grant.id();
        let initiator = &mut self.initiators[id.index()];
        let transaction = initiator.request()?;

        let response = match self.decoder.decode(transaction.address) {
            Ok(decoded) => {
                let target = &mut self.targets[decoded.target.index()];
                match transaction.access {
                    Access::Read => {
                        BusResponse::Ack(target.read(decoded.offset, transaction.select))
                    }
                    Access::Write(data) => {
                        target.write(decoded.offset, data, transaction.select);
                        BusResponse::Ack(0)
                    }
                }
            }
            Err(fault) => {
                self.last_fault = Some(BusFault {
                    initiator: id,
                    address: fault.address,
                });
                fault.into()
            }
        };

        initiator.complete(transaction, response);
        if let Some(monitor) = &mut self.monitor {
            monitor.observe(&transaction, response);
        }
        grant.complete();

        Some(StepReport {
            initiator: id,
            transaction,
            response,
        })
    }

    /// Current interrupt-pending vector, sampled from the targets' lines.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.irqs.pending_from(|source| {
            self.irq_lines
                .iter()
                .find(|(line, _)| *line == source)
                .is_some_and(|(_, target)| self.targets[target.index()].irq())
        })
    }
}
