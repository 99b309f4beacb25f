//! Hierarchical address registry with eager overlap checking.
//!
//! A registry owns the resources and windows placed at one level of the
//! memory map. Windows own a nested registry whose addresses are relative to
//! the window base, so the whole map is a tree with a single owner per node.
//!
//! Insertions are validated immediately. Once [`AddressRegistry::freeze`] is
//! called the tree is read-only and may be enumerated in address order.

use std::collections::{btree_map, BTreeMap, HashMap};

use tracing::debug;

use crate::fault::programming_error;
use crate::{BusGeometry, ConflictError};

/// A named leaf addressable unit, such as one register or a whole memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Resource {
    name: String,
    start: u64,
    end: u64,
    granularity: u32,
}

impl Resource {
    /// Resource name, unique within its registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start address relative to the owning registry (inclusive).
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// End address relative to the owning registry (exclusive).
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.end - self.start
    }

    /// Access granularity in bytes.
    #[must_use]
    pub const fn granularity(&self) -> u32 {
        self.granularity
    }
}

/// A nested registry embedded into its parent at a base offset.
#[derive(Debug, Clone)]
pub struct Window {
    name: String,
    base: u64,
    map: AddressRegistry,
}

impl Window {
    /// Window name, unique within its parent registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base offset in the parent's address space.
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Window size, equal to the nested registry's address space.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.map.size
    }

    /// End offset in the parent's address space (exclusive).
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base + self.map.size
    }

    /// The nested registry owned by this window.
    #[must_use]
    pub const fn map(&self) -> &AddressRegistry {
        &self.map
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Resource(Resource),
    Window(Window),
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Self::Resource(resource) => &resource.name,
            Self::Window(window) => &window.name,
        }
    }

    const fn start(&self) -> u64 {
        match self {
            Self::Resource(resource) => resource.start,
            Self::Window(window) => window.base,
        }
    }

    const fn end(&self) -> u64 {
        match self {
            Self::Resource(resource) => resource.end,
            Self::Window(window) => window.end(),
        }
    }
}

/// Result of a single-level address lookup.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// The address falls in a leaf resource at this level.
    Resource {
        /// The matched resource.
        resource: &'a Resource,
        /// Start address in the queried registry's space.
        start: u64,
        /// End address in the queried registry's space (exclusive).
        end: u64,
    },
    /// The address falls in a nested window at this level.
    Window {
        /// The matched window.
        window: &'a Window,
        /// Start address in the queried registry's space.
        start: u64,
        /// End address in the queried registry's space (exclusive).
        end: u64,
    },
}

impl Lookup<'_> {
    /// Name of the matched entry.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Resource { resource, .. } => resource.name(),
            Self::Window { window, .. } => window.name(),
        }
    }

    /// Start address of the matched entry.
    #[must_use]
    pub const fn start(&self) -> u64 {
        match self {
            Self::Resource { start, .. } | Self::Window { start, .. } => *start,
        }
    }

    /// End address of the matched entry (exclusive).
    #[must_use]
    pub const fn end(&self) -> u64 {
        match self {
            Self::Resource { end, .. } | Self::Window { end, .. } => *end,
        }
    }
}

/// A leaf resource resolved to absolute addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedResource<'a> {
    /// The resource as registered.
    pub resource: &'a Resource,
    /// Absolute start address (inclusive).
    pub start: u64,
    /// Absolute end address (exclusive).
    pub end: u64,
    /// Names of the enclosing windows, outermost first.
    pub path: Vec<&'a str>,
}

impl MappedResource<'_> {
    /// Access granularity in bytes.
    #[must_use]
    pub const fn granularity(&self) -> u32 {
        self.resource.granularity
    }

    /// Resource name prefixed by its enclosing window names, joined by `.`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        let mut name = String::new();
        for window in &self.path {
            name.push_str(window);
            name.push('.');
        }
        name.push_str(self.resource.name());
        name
    }
}

/// A direct child window resolved to its parent's address space.
#[derive(Debug, Clone, Copy)]
pub struct MappedWindow<'a> {
    /// The window as registered.
    pub window: &'a Window,
    /// Start address (inclusive).
    pub start: u64,
    /// End address (exclusive).
    pub end: u64,
}

/// Owning container of resources and windows at one level of the memory map.
#[derive(Debug, Clone)]
pub struct AddressRegistry {
    name: String,
    size: u64,
    entries: BTreeMap<u64, Entry>,
    names: HashMap<String, u64>,
    cursor: u64,
    frozen: bool,
}

impl AddressRegistry {
    /// Creates an empty, open registry spanning `size` bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            entries: BTreeMap::new(),
            names: HashMap::new(),
            cursor: 0,
            frozen: false,
        }
    }

    /// Creates a registry spanning the full byte address space of a bus.
    #[must_use]
    pub fn for_bus(name: impl Into<String>, geometry: BusGeometry) -> Self {
        Self::new(name, geometry.address_space_bytes())
    }

    /// Registry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the address space in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Number of direct children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been registered at this level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` once [`Self::freeze`] has been called.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Places a resource at the lowest free address at or after the
    /// allocation cursor, aligned to `granularity`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] for a duplicate name, a malformed range,
    /// or when no aligned gap large enough remains.
    ///
    /// # Panics
    ///
    /// Panics when the registry is frozen.
    pub fn insert(
        &mut self,
        name: &str,
        size: u64,
        granularity: u32,
    ) -> Result<u64, ConflictError> {
        self.assert_open("insert");
        self.check_name(name)?;
        validate_shape(name, 0, size, granularity)?;

        let align = u64::from(granularity);
        let mut base = self.align_within(name, self.cursor, size, align)?;
        loop {
            let end = self.bounded_end(name, base, size)?;
            let Some(next) = self.first_overlap(base, end).map(Entry::end) else {
                break;
            };
            base = self.align_within(name, next, size, align)?;
        }

        self.place(Entry::Resource(Resource {
            name: name.to_string(),
            start: base,
            end: base + size,
            granularity,
        }));
        Ok(base)
    }

    /// Places a resource at a caller-chosen base address.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] when the name is taken, the range is
    /// malformed, or `[base, base + size)` intersects an existing entry.
    ///
    /// # Panics
    ///
    /// Panics when the registry is frozen.
    pub fn insert_at(
        &mut self,
        name: &str,
        base: u64,
        size: u64,
        granularity: u32,
    ) -> Result<(), ConflictError> {
        self.assert_open("insert");
        self.check_name(name)?;
        validate_shape(name, base, size, granularity)?;
        let end = self.bounded_end(name, base, size)?;
        if let Some(existing) = self.first_overlap(base, end) {
            return Err(overlap(name, base, end, existing));
        }

        self.place(Entry::Resource(Resource {
            name: name.to_string(),
            start: base,
            end,
            granularity,
        }));
        Ok(())
    }

    /// Embeds `map` as a window at `base`. The window spans `map.size()`
    /// bytes and its contents are addressed relative to `base`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] under the same rules as [`Self::insert_at`].
    ///
    /// # Panics
    ///
    /// Panics when this registry is frozen.
    pub fn insert_window(
        &mut self,
        name: &str,
        map: Self,
        base: u64,
    ) -> Result<(), ConflictError> {
        self.assert_open("insert a window");
        self.check_name(name)?;
        if map.size == 0 {
            return Err(ConflictError::EmptyRange {
                name: name.to_string(),
            });
        }
        let end = self.bounded_end(name, base, map.size)?;
        if let Some(existing) = self.first_overlap(base, end) {
            return Err(overlap(name, base, end, existing));
        }

        self.place(Entry::Window(Window {
            name: name.to_string(),
            base,
            map,
        }));
        Ok(())
    }

    /// Mutable access to a still-open nested registry.
    ///
    /// # Panics
    ///
    /// Panics when this registry is frozen.
    pub fn window_mut(&mut self, name: &str) -> Option<&mut Self> {
        self.assert_open("modify a window of");
        let start = *self.names.get(name)?;
        match self.entries.get_mut(&start)? {
            Entry::Window(window) => Some(&mut window.map),
            Entry::Resource(_) => None,
        }
    }

    /// The direct child window named `name`, if any.
    #[must_use]
    pub fn window(&self, name: &str) -> Option<&Window> {
        let start = self.names.get(name)?;
        match self.entries.get(start)? {
            Entry::Window(window) => Some(window),
            Entry::Resource(_) => None,
        }
    }

    /// Base address of the direct child window named `name`.
    #[must_use]
    pub fn window_base(&self, name: &str) -> Option<u64> {
        self.window(name).map(Window::base)
    }

    /// Marks this registry and every nested registry read-only. Idempotent.
    pub fn freeze(&mut self) {
        if !self.frozen {
            debug!(map = %self.name, entries = self.entries.len(), "freezing address map");
        }
        self.frozen = true;
        for entry in self.entries.values_mut() {
            if let Entry::Window(window) = entry {
                window.map.freeze();
            }
        }
    }

    /// Enumerates every leaf resource of the tree in ascending absolute
    /// address order. Each call starts a fresh traversal.
    ///
    /// # Panics
    ///
    /// Panics when the registry has not been frozen.
    #[must_use]
    pub fn resources(&self) -> Resources<'_> {
        if !self.frozen {
            programming_error(format_args!(
                "resources of map '{}' enumerated before freeze",
                self.name
            ));
        }
        Resources {
            frames: vec![Frame {
                offset: 0,
                label: None,
                entries: self.entries.values(),
            }],
        }
    }

    /// Direct child windows in ascending address order.
    pub fn windows(&self) -> impl Iterator<Item = MappedWindow<'_>> + '_ {
        self.entries.values().filter_map(|entry| match entry {
            Entry::Window(window) => Some(MappedWindow {
                window,
                start: window.base,
                end: window.end(),
            }),
            Entry::Resource(_) => None,
        })
    }

    /// Finds the direct child whose range contains `address`.
    #[must_use]
    pub fn find(&self, address: u64) -> Option<Lookup<'_>> {
        let (_, entry) = self.entries.range(..=address).next_back()?;
        if address >= entry.end() {
            return None;
        }
        Some(match entry {
            Entry::Resource(resource) => Lookup::Resource {
                resource,
                start: resource.start,
                end: resource.end,
            },
            Entry::Window(window) => Lookup::Window {
                window,
                start: window.base,
                end: window.end(),
            },
        })
    }

    /// Descends through nested windows to the leaf resource containing
    /// `address`.
    #[must_use]
    pub fn find_resource(&self, address: u64) -> Option<MappedResource<'_>> {
        let mut map = self;
        let mut offset = 0;
        let mut path = Vec::new();
        loop {
            let local = address.checked_sub(offset)?;
            let (_, entry) = map.entries.range(..=local).next_back()?;
            if local >= entry.end() {
                return None;
            }
            match entry {
                Entry::Resource(resource) => {
                    return Some(MappedResource {
                        resource,
                        start: offset + resource.start,
                        end: offset + resource.end,
                        path,
                    });
                }
                Entry::Window(window) => {
                    path.push(window.name.as_str());
                    offset += window.base;
                    map = &window.map;
                }
            }
        }
    }

    fn assert_open(&self, operation: &str) {
        if self.frozen {
            programming_error(format_args!(
                "cannot {operation} into frozen map '{}'",
                self.name
            ));
        }
    }

    fn check_name(&self, name: &str) -> Result<(), ConflictError> {
        if self.names.contains_key(name) {
            return Err(ConflictError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn bounded_end(&self, name: &str, start: u64, size: u64) -> Result<u64, ConflictError> {
        start
            .checked_add(size)
            .filter(|end| *end <= self.size)
            .ok_or_else(|| ConflictError::OutOfBounds {
                name: name.to_string(),
                start,
                size,
                limit: self.size,
            })
    }

    fn align_within(
        &self,
        name: &str,
        value: u64,
        size: u64,
        align: u64,
    ) -> Result<u64, ConflictError> {
        value
            .checked_add(align - 1)
            .map(|bumped| bumped & !(align - 1))
            .ok_or_else(|| ConflictError::OutOfBounds {
                name: name.to_string(),
                start: value,
                size,
                limit: self.size,
            })
    }

    fn first_overlap(&self, start: u64, end: u64) -> Option<&Entry> {
        // Entries are disjoint, so the last one starting before `end` is the
        // only candidate that can reach past `start`.
        self.entries
            .range(..end)
            .next_back()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.end() > start)
    }

    fn place(&mut self, entry: Entry) {
        let start = entry.start();
        debug!(
            map = %self.name,
            name = entry.name(),
            start = format_args!("{start:#x}"),
            end = format_args!("{:#x}", entry.end()),
            "registered address range"
        );
        self.cursor = entry.end();
        self.names.insert(entry.name().to_string(), start);
        self.entries.insert(start, entry);
    }
}

fn validate_shape(
    name: &str,
    start: u64,
    size: u64,
    granularity: u32,
) -> Result<(), ConflictError> {
    if size == 0 {
        return Err(ConflictError::EmptyRange {
            name: name.to_string(),
        });
    }
    if !granularity.is_power_of_two() {
        return Err(ConflictError::InvalidGranularity {
            name: name.to_string(),
            granularity,
        });
    }
    let align = u64::from(granularity);
    if start % align != 0 || size % align != 0 {
        return Err(ConflictError::Misaligned {
            name: name.to_string(),
            start,
            size,
            granularity,
        });
    }
    Ok(())
}

fn overlap(name: &str, start: u64, end: u64, existing: &Entry) -> ConflictError {
    ConflictError::Overlap {
        name: name.to_string(),
        start,
        end,
        existing: existing.name().to_string(),
        existing_start: existing.start(),
        existing_end: existing.end(),
    }
}

/// Lazy depth-first traversal of a frozen registry's leaf resources.
#[derive(Debug, Clone)]
pub struct Resources<'a> {
    frames: Vec<Frame<'a>>,
}

#[derive(Debug, Clone)]
struct Frame<'a> {
    offset: u64,
    label: Option<&'a str>,
    entries: btree_map::Values<'a, u64, Entry>,
}

impl<'a> Resources<'a> {
    fn path(&self) -> Vec<&'a str> {
        self.frames.iter().filter_map(|frame| frame.label).collect()
    }
}

impl<'a> Iterator for Resources<'a> {
    type Item = MappedResource<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.frames.last_mut()?;
            let offset = frame.offset;
            match frame.entries.next() {
                None => {
                    self.frames.pop();
                }
                Some(Entry::Resource(resource)) => {
                    return Some(MappedResource {
                        resource,
                        start: offset + resource.start,
                        end: offset + resource.end,
                        path: self.path(),
                    });
                }
                Some(Entry::Window(window)) => {
                    self.frames.push(Frame {
                        offset: offset + window.base,
                        label: Some(window.name.as_str()),
                        entries: window.map.entries.values(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AddressRegistry, Lookup};
    use crate::ConflictError;
    use rstest::rstest;

    fn uart_window() -> AddressRegistry {
        let mut map = AddressRegistry::new("uart", 0x20);
        map.insert("divisor", 4, 4).expect("divisor");
        map.insert("rx_data", 4, 4).expect("rx_data");
        map.insert("tx_data", 4, 4).expect("tx_data");
        map
    }

    #[test]
    fn auto_placement_follows_cursor_and_alignment() {
        let mut map = AddressRegistry::new("top", 0x100);
        assert_eq!(map.insert("a", 1, 1), Ok(0x0));
        assert_eq!(map.insert("b", 4, 4), Ok(0x4));
        assert_eq!(map.insert("c", 2, 2), Ok(0x8));
    }

    #[test]
    fn auto_placement_skips_explicit_ranges() {
        let mut map = AddressRegistry::new("top", 0x100);
        map.insert_at("fixed", 0x4, 0x8, 4).expect("fixed");
        map.insert_at("low", 0x0, 0x2, 1).expect("low");
        assert_eq!(map.insert("auto", 4, 4), Ok(0xC));
    }

    #[test]
    fn auto_placement_reports_exhaustion() {
        let mut map = AddressRegistry::new("top", 0x10);
        map.insert("a", 0xC, 4).expect("a");
        assert!(matches!(
            map.insert("b", 8, 4),
            Err(ConflictError::OutOfBounds { start: 0xC, size: 8, limit: 0x10, .. })
        ));
    }

    #[rstest]
    #[case(0x00, 0x10)]
    #[case(0x0F, 0x01)]
    #[case(0x08, 0x04)]
    #[case(0x04, 0x20)]
    fn overlap_is_rejected_in_both_orders(#[case] start: u64, #[case] size: u64) {
        let mut forward = AddressRegistry::new("top", 0x100);
        forward.insert_at("first", 0x0, 0x10, 1).expect("first");
        assert!(matches!(
            forward.insert_at("second", start, size, 1),
            Err(ConflictError::Overlap { .. })
        ));

        let mut reverse = AddressRegistry::new("top", 0x100);
        reverse.insert_at("second", start, size, 1).expect("second");
        assert!(matches!(
            reverse.insert_at("first", 0x0, 0x10, 1),
            Err(ConflictError::Overlap { .. })
        ));
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        let mut map = AddressRegistry::new("top", 0x100);
        map.insert_at("a", 0x0, 0x10, 1).expect("a");
        map.insert_at("b", 0x10, 0x10, 1).expect("b");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut map = AddressRegistry::new("top", 0x100);
        map.insert_at("a", 0x0, 0x10, 1).expect("a");
        assert_eq!(
            map.insert_at("a", 0x40, 0x10, 1),
            Err(ConflictError::DuplicateName {
                name: "a".to_string()
            })
        );
        assert_eq!(
            map.insert_window("a", AddressRegistry::new("x", 0x10), 0x80),
            Err(ConflictError::DuplicateName {
                name: "a".to_string()
            })
        );
    }

    #[rstest]
    #[case(0x0, 0, 1, "empty")]
    #[case(0x0, 4, 3, "granularity")]
    #[case(0x2, 4, 4, "misaligned")]
    #[case(0x0, 6, 4, "misaligned")]
    #[case(0xF8, 0x10, 1, "bounds")]
    #[case(u64::MAX, 2, 1, "bounds")]
    fn malformed_ranges_are_rejected(
        #[case] start: u64,
        #[case] size: u64,
        #[case] granularity: u32,
        #[case] expected: &str,
    ) {
        let mut map = AddressRegistry::new("top", 0x100);
        let error = map
            .insert_at("bad", start, size, granularity)
            .expect_err("malformed insert must fail");
        let kind = match error {
            ConflictError::EmptyRange { .. } => "empty",
            ConflictError::InvalidGranularity { .. } => "granularity",
            ConflictError::Misaligned { .. } => "misaligned",
            ConflictError::OutOfBounds { .. } => "bounds",
            other => panic!("unexpected error {other:?}"),
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn nested_windows_resolve_to_absolute_addresses() {
        let mut top = AddressRegistry::new("top", 0x1_0000);
        top.insert_at("rom", 0x0, 0x1000, 4).expect("rom");
        let mut bridge = AddressRegistry::new("bridge", 0x1000);
        bridge
            .insert_window("uart", uart_window(), 0x100)
            .expect("uart window");
        top.insert_window("bridge", bridge, 0x8000).expect("bridge");
        top.freeze();

        let rows: Vec<_> = top
            .resources()
            .map(|r| (r.qualified_name(), r.start, r.end, r.granularity()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("rom".to_string(), 0x0, 0x1000, 4),
                ("bridge.uart.divisor".to_string(), 0x8100, 0x8104, 4),
                ("bridge.uart.rx_data".to_string(), 0x8104, 0x8108, 4),
                ("bridge.uart.tx_data".to_string(), 0x8108, 0x810C, 4),
            ]
        );

        let leaf = top.find_resource(0x8106).expect("rx_data");
        assert_eq!(leaf.resource.name(), "rx_data");
        assert_eq!(leaf.path, vec!["bridge", "uart"]);
        assert!(top.find_resource(0x810C).is_none());
    }

    #[test]
    fn resources_traversal_is_restartable() {
        let mut top = AddressRegistry::new("top", 0x100);
        top.insert_window("uart", uart_window(), 0x40).expect("uart");
        top.freeze();

        let mut first = top.resources();
        first.next();
        let again: Vec<_> = top.resources().map(|r| r.start).collect();
        assert_eq!(again, vec![0x40, 0x44, 0x48]);
        assert_eq!(first.map(|r| r.start).collect::<Vec<_>>(), vec![0x44, 0x48]);
    }

    #[test]
    fn find_returns_direct_child() {
        let mut top = AddressRegistry::new("top", 0x100);
        top.insert_at("ctrl", 0x0, 0x4, 4).expect("ctrl");
        top.insert_window("uart", uart_window(), 0x40).expect("uart");

        assert!(matches!(top.find(0x2), Some(Lookup::Resource { start: 0, end: 4, .. })));
        let window = top.find(0x5F).expect("uart window");
        assert_eq!(window.name(), "uart");
        assert_eq!((window.start(), window.end()), (0x40, 0x60));
        assert!(top.find(0x60).is_none());
        assert!(top.find(0x4).is_none());
    }

    #[test]
    fn window_base_and_enumeration() {
        let mut top = AddressRegistry::new("top", 0x1000);
        top.insert_window("timer", AddressRegistry::new("timer", 0x20), 0x200)
            .expect("timer");
        top.insert_window("uart", uart_window(), 0x100).expect("uart");
        top.insert_at("ctrl", 0x0, 0x4, 4).expect("ctrl");

        assert_eq!(top.window_base("uart"), Some(0x100));
        assert_eq!(top.window_base("ctrl"), None);
        let names: Vec<_> = top.windows().map(|w| (w.window.name(), w.start)).collect();
        assert_eq!(names, vec![("uart", 0x100), ("timer", 0x200)]);
    }

    #[test]
    fn open_window_can_still_grow_within_its_size() {
        let mut top = AddressRegistry::new("top", 0x1000);
        top.insert_window("uart", uart_window(), 0x100).expect("uart");
        let uart = top.window_mut("uart").expect("uart is a window");
        assert_eq!(uart.insert("tx_rdy", 4, 4), Ok(0xC));
        assert!(matches!(
            uart.insert_at("oversize", 0x1C, 8, 4),
            Err(ConflictError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn freeze_is_recursive_and_idempotent() {
        let mut top = AddressRegistry::new("top", 0x1000);
        top.insert_window("uart", uart_window(), 0x100).expect("uart");
        top.freeze();
        top.freeze();
        assert!(top.is_frozen());
        assert!(top.window("uart").expect("uart").map().is_frozen());
    }

    #[test]
    #[should_panic(expected = "frozen map 'top'")]
    fn insert_after_freeze_panics() {
        let mut top = AddressRegistry::new("top", 0x100);
        top.freeze();
        let _ = top.insert("late", 4, 4);
    }

    #[test]
    #[should_panic(expected = "before freeze")]
    fn resources_before_freeze_panics() {
        let top = AddressRegistry::new("top", 0x100);
        let _ = top.resources();
    }
}
