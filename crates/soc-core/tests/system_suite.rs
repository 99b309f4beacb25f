//! Memory map, arbitration, decode, and interrupt coverage across the whole
//! fabric, including the address-map properties.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use soc_core::{
    AddressRegistry, BusArbiter, BusDecoder, BusFault, BusGeometry, BusInitiator, BusResponse,
    BusTarget, ConflictError, DecodeFault, InterruptAggregator, Lookup, SystemBuilder,
    Transaction, NATIVE_IRQ_WIDTH,
};
use thiserror as _;
use tracing as _;

struct Port {
    name: &'static str,
    queue: VecDeque<Transaction>,
    responses: Rc<RefCell<Vec<BusResponse>>>,
}

impl Port {
    fn new(name: &'static str, script: impl IntoIterator<Item = Transaction>) -> Self {
        Self {
            name,
            queue: script.into_iter().collect(),
            responses: Rc::default(),
        }
    }
}

impl BusInitiator for Port {
    fn name(&self) -> &str {
        self.name
    }

    fn request(&self) -> Option<Transaction> {
        self.queue.front().copied()
    }

    fn complete(&mut self, transaction: Transaction, response: BusResponse) {
        assert_eq!(self.queue.pop_front(), Some(transaction));
        self.responses.borrow_mut().push(response);
    }
}

struct Ram {
    name: &'static str,
    words: Vec<u32>,
    line: Rc<Cell<bool>>,
}

impl Ram {
    fn new(name: &'static str, words: Vec<u32>) -> Self {
        Self {
            name,
            words,
            line: Rc::default(),
        }
    }
}

impl BusTarget for Ram {
    fn name(&self) -> &str {
        self.name
    }

    fn memory_map(&self) -> AddressRegistry {
        let size = 4 * self.words.len() as u64;
        let mut map = AddressRegistry::new(self.name, size);
        map.insert("mem", size, 4).expect("ram fits its own window");
        map
    }

    fn read(&mut self, offset: u64, _select: u8) -> u32 {
        self.words[(offset / 4) as usize]
    }

    fn write(&mut self, offset: u64, data: u32, select: u8) {
        let word = &mut self.words[(offset / 4) as usize];
        for lane in 0..4 {
            if select & (1 << lane) != 0 {
                let mask = 0xFF << (lane * 8);
                *word = (*word & !mask) | (data & mask);
            }
        }
    }

    fn irq(&self) -> bool {
        self.line.get()
    }
}

#[test]
fn two_initiators_two_targets_decode_and_rotate() {
    let mut arbiter = BusArbiter::new();
    let i0 = arbiter.register("I0");
    let i1 = arbiter.register("I1");

    let mut decoder = BusDecoder::new(BusGeometry::NATIVE);
    let t0 = decoder
        .connect("T0", AddressRegistry::new("T0", 4), 0x1000)
        .expect("T0");
    let t1 = decoder
        .connect("T1", AddressRegistry::new("T1", 4), 0x2000)
        .expect("T1");
    decoder.seal();

    let hit = decoder.decode(0x1002).expect("T0 claims 0x1002");
    assert_eq!(hit.target, t0);
    assert_eq!(hit.offset, 2);
    assert_eq!(decoder.decode(0x2003).map(|hit| hit.target), Ok(t1));
    assert_eq!(decoder.decode(0x3000), Err(DecodeFault { address: 0x3000 }));

    assert_eq!(arbiter.arbitrate(&[i0, i1]).map(|grant| grant.id()), Some(i0));
    assert_eq!(arbiter.arbitrate(&[i0, i1]).map(|grant| grant.id()), Some(i1));
}

#[test]
fn overlapping_target_windows_are_rejected() {
    let mut decoder = BusDecoder::new(BusGeometry::NATIVE);
    decoder
        .connect("uart", AddressRegistry::new("uart", 0x1000), 0x1000_5000)
        .expect("uart");
    let err = decoder
        .connect("timer", AddressRegistry::new("timer", 0x1000), 0x1000_5800)
        .expect_err("timer overlaps uart");
    assert!(matches!(
        err,
        ConflictError::Overlap {
            ref existing,
            existing_start: 0x1000_5000,
            ..
        } if existing == "uart"
    ));
    assert_eq!(decoder.len(), 1);
}

#[test]
fn stepped_system_routes_reads_writes_and_faults() {
    let ibus = Port::new("ibus", [Transaction::read(0x1000, 0b1111)]);
    let ibus_log = Rc::clone(&ibus.responses);
    let dbus = Port::new(
        "dbus",
        [
            Transaction::write(0x2000, 0xAABB_CCDD, 0b0011),
            Transaction::read(0x2000, 0b1111),
            Transaction::read(0x3000, 0b1111),
        ],
    );
    let dbus_log = Rc::clone(&dbus.responses);

    let mut builder = SystemBuilder::new(BusGeometry::NATIVE, NATIVE_IRQ_WIDTH);
    let ports = builder.add_processor(Box::new(ibus), Box::new(dbus));
    builder
        .add_target(Box::new(Ram::new("rom", vec![0x0000_0013])), 0x1000)
        .expect("rom");
    builder
        .add_target(Box::new(Ram::new("sram", vec![0x1111_1111])), 0x2000)
        .expect("sram");
    let mut system = builder.build();
    system.enable_monitor();

    let first = system.step().expect("ibus and dbus both request");
    assert_eq!(first.initiator, ports.ibus);
    assert_eq!(first.response, BusResponse::Ack(0x0000_0013));

    let reports: Vec<_> = std::iter::from_fn(|| system.step()).collect();
    assert_eq!(
        reports.iter().map(|report| report.initiator).collect::<Vec<_>>(),
        [ports.dbus; 3]
    );
    assert_eq!(*ibus_log.borrow(), [BusResponse::Ack(0x0000_0013)]);
    assert_eq!(
        *dbus_log.borrow(),
        [
            BusResponse::Ack(0),
            BusResponse::Ack(0x1111_CCDD),
            BusResponse::Error { address: 0x3000 },
        ]
    );
    assert_eq!(
        system.take_fault(),
        Some(BusFault {
            initiator: ports.dbus,
            address: 0x3000,
        })
    );
    assert_eq!(system.last_fault(), None);

    let lines = system.monitor_mut().expect("monitor enabled").take();
    assert_eq!(
        lines,
        [
            "00001000,R,00000013",
            "00002000,W,____ccdd",
            "00002000,R,1111ccdd",
        ]
    );
    assert!(system.step().is_none());
}

#[test]
fn system_pending_follows_target_lines() {
    let timer = Ram::new("timer", vec![0; 4]);
    let timer_line = Rc::clone(&timer.line);
    let uart = Ram::new("uart", vec![0; 4]);
    let uart_line = Rc::clone(&uart.line);

    let mut builder = SystemBuilder::new(BusGeometry::NATIVE, NATIVE_IRQ_WIDTH);
    let timer_id = builder.add_target(Box::new(timer), 0x1000_6000).expect("timer");
    let uart_id = builder.add_target(Box::new(uart), 0x1000_5000).expect("uart");
    builder.add_irq(timer_id, 0).expect("timer irq");
    builder.add_irq(uart_id, 1).expect("uart irq");
    assert!(matches!(
        builder.add_irq(uart_id, 2),
        Err(ConflictError::DuplicateName { .. })
    ));
    let system = builder.build();

    assert_eq!(system.pending(), 0);
    uart_line.set(true);
    assert_eq!(system.pending(), 0b10);
    timer_line.set(true);
    assert_eq!(system.pending(), 0b11);
    uart_line.set(false);
    assert_eq!(system.pending(), 0b01);
    assert_eq!(system.interrupts().slot_of("uart"), Some(1));
}

#[test]
fn sealed_map_exposes_target_registers_in_address_order() {
    let mut builder = SystemBuilder::new(BusGeometry::NATIVE, NATIVE_IRQ_WIDTH);
    builder
        .add_target(Box::new(Ram::new("sram", vec![0; 0x80])), 0x1000_4000)
        .expect("sram");
    builder
        .add_target(Box::new(Ram::new("rom", vec![0; 0x100])), 0x0)
        .expect("rom");
    let system = builder.build();

    let table: Vec<_> = system
        .memory_map()
        .resources()
        .map(|mapped| (mapped.qualified_name(), mapped.start, mapped.end))
        .collect();
    assert_eq!(
        table,
        [
            ("rom.mem".to_string(), 0x0, 0x400),
            ("sram.mem".to_string(), 0x1000_4000, 0x1000_4200),
        ]
    );
    assert_eq!(system.memory_map().window_base("sram"), Some(0x1000_4000));
}

#[test]
#[should_panic(expected = "programming error")]
fn decode_before_seal_is_fatal() {
    let decoder = BusDecoder::new(BusGeometry::NATIVE);
    let _ = decoder.decode(0);
}

fn nested_map(resource_sizes: &[u64]) -> AddressRegistry {
    let mut level_size = 0x400;
    let mut inner: Option<AddressRegistry> = None;
    for (depth, size) in resource_sizes.iter().enumerate().rev() {
        let mut map = AddressRegistry::new(format!("level{depth}"), level_size);
        map.insert(&format!("head{depth}"), *size, 1).expect("head fits");
        if let Some(child) = inner.take() {
            map.insert_window(&format!("w{}", depth + 1), child, 0x100)
                .expect("child window fits after head");
        }
        map.insert(&format!("tail{depth}"), *size, 1).expect("tail fits");
        inner = Some(map);
        level_size *= 4;
    }
    inner.expect("at least one level")
}

proptest! {
    #[test]
    fn property_find_returns_owner_for_every_address(
        layout in prop::collection::vec((1u64..=16, 0u64..=8), 1..8)
    ) {
        let mut map = AddressRegistry::new("bus", 0x1000);
        let mut placed = Vec::new();
        let mut cursor = 0;
        for (index, (size, gap)) in layout.iter().enumerate() {
            let base = cursor + gap;
            let name = format!("r{index}");
            map.insert_at(&name, base, *size, 1).expect("non-overlapping layout");
            placed.push((name, base, base + size));
            cursor = base + size;
        }
        map.freeze();

        for address in 0..cursor + 4 {
            let owner = placed.iter().find(|(_, start, end)| (*start..*end).contains(&address));
            match (map.find(address), owner) {
                (Some(Lookup::Resource { resource, .. }), Some((name, _, _))) => {
                    prop_assert_eq!(resource.name(), name.as_str());
                }
                (None, None) => {}
                (found, expected) => {
                    prop_assert!(
                        false,
                        "address {address:#x}: found {found:?}, expected {expected:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn property_intersecting_ranges_always_conflict(
        first_start in 0u64..64,
        first_len in 1u64..32,
        into in 0u64..32,
        second_len in 1u64..32,
        reversed in any::<bool>(),
    ) {
        let second_start = first_start + into % first_len;
        let (a, b) = if reversed {
            ((second_start, second_len), (first_start, first_len))
        } else {
            ((first_start, first_len), (second_start, second_len))
        };
        let mut map = AddressRegistry::new("bus", 0x100);
        map.insert_at("a", a.0, a.1, 1).expect("first insert is free");
        let is_overlap = matches!(
            map.insert_at("b", b.0, b.1, 1),
            Err(ConflictError::Overlap { .. })
        );
        prop_assert!(is_overlap);
    }

    #[test]
    fn property_resources_sorted_and_disjoint_when_nested(
        sizes in prop::collection::vec(1u64..=0x40, 1..5)
    ) {
        let mut map = nested_map(&sizes);
        map.freeze();
        let spans: Vec<_> = map.resources().map(|mapped| (mapped.start, mapped.end)).collect();
        prop_assert_eq!(spans.len(), sizes.len() * 2);
        for pair in spans.windows(2) {
            prop_assert!(pair[0].0 < pair[0].1);
            prop_assert!(pair[0].1 <= pair[1].0, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn property_round_robin_is_a_rotation(
        count in 1usize..8,
        rounds in 1usize..4,
        warmup in 0usize..8,
    ) {
        let mut arbiter = BusArbiter::new();
        let ids: Vec<_> = (0..count).map(|index| arbiter.register(format!("i{index}"))).collect();
        let first = ids[warmup % count];
        prop_assert_eq!(arbiter.arbitrate(&[first]).map(|grant| grant.id()), Some(first));

        let grants: Vec<_> = (0..count * rounds)
            .filter_map(|_| arbiter.arbitrate(&ids).map(|grant| grant.id().index()))
            .collect();
        let expected: Vec<_> = (0..count * rounds)
            .map(|step| (first.index() + 1 + step) % count)
            .collect();
        prop_assert_eq!(grants, expected);
    }

    #[test]
    fn property_toggling_one_source_changes_only_its_bit(
        levels in prop::collection::vec(any::<bool>(), 32),
        toggled in 0usize..32,
    ) {
        let mut irqs = InterruptAggregator::default();
        let sources: Vec<_> = (0..32u32)
            .map(|slot| irqs.add_source(&format!("src{slot}"), 31 - slot).expect("free slot"))
            .collect();
        for (source, level) in sources.iter().zip(&levels) {
            irqs.set_level(*source, *level);
        }
        let before = irqs.pending();
        irqs.set_level(sources[toggled], !levels[toggled]);
        let after = irqs.pending();
        prop_assert_eq!(before ^ after, 1u64 << (31 - toggled));
    }
}
