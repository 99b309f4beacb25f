//! Simulation blackbox declarations for off-chip device models.
//!
//! Each model becomes a Verilog module stub whose pins expand to an input,
//! output, and output-enable triple. The stubs are collected in a
//! [`SupportTable`] so that each module is declared once per build.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::debug;

const CLOCK_EDGE_ATTRIBUTE: &str = "(* cxxrtl_edge=\"a\" *)";

/// One pin group of a blackbox model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlackboxPort {
    name: String,
    width: u32,
    clock_edge: bool,
}

impl BlackboxPort {
    /// A pin group sampled on the model's own schedule.
    ///
    /// # Panics
    ///
    /// Panics when `width` is zero.
    #[must_use]
    pub fn new(name: impl Into<String>, width: u32) -> Self {
        assert!(width > 0, "programming error: blackbox pin of zero width");
        Self {
            name: name.into(),
            width,
            clock_edge: false,
        }
    }

    /// Parses the `>`-prefixed pin notation, where a leading `>` marks a pin
    /// whose output edge drives the model.
    ///
    /// # Panics
    ///
    /// Panics when `width` is zero.
    #[must_use]
    pub fn parse(notation: &str, width: u32) -> Self {
        let (name, clock_edge) = notation
            .strip_prefix('>')
            .map_or((notation, false), |name| (name, true));
        Self {
            clock_edge,
            ..Self::new(name, width)
        }
    }

    /// Pin group name. Empty for a model with a single unnamed group.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in bits.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Whether the output carries the clock-edge attribute.
    #[must_use]
    pub const fn clock_edge(&self) -> bool {
        self.clock_edge
    }
}

/// Renders the Verilog declaration of one blackbox module.
#[must_use]
pub fn render_blackbox(module: &str, ports: &[BlackboxPort]) -> String {
    let mut text = format!("(* blackbox, cxxrtl_blackbox, keep *) module {module} (\n");
    let mut pins = Vec::with_capacity(ports.len() * 3);
    for port in ports {
        let name = if port.name.is_empty() {
            "periph"
        } else {
            port.name.as_str()
        };
        let msb = port.width - 1;
        let edge = if port.clock_edge {
            CLOCK_EDGE_ATTRIBUTE
        } else {
            ""
        };
        pins.push(format!("    output [{msb}:0] {name}_i"));
        pins.push(format!("{edge}    input  [{msb}:0] {name}_o"));
        pins.push(format!("    input  [{msb}:0] {name}_oeb"));
    }
    text.push_str(&pins.join(",\n"));
    text.push_str("\n);\nendmodule\n");
    text
}

/// Deduplicated, name-keyed table of generated blackbox declarations.
///
/// The first registration of a module name wins. Call [`Self::reset`]
/// between builds so a fresh build does not inherit stale declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportTable {
    boxes: BTreeMap<String, String>,
}

impl SupportTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `module` unless it is already present. Returns `true` when
    /// the declaration was added.
    pub fn register(&mut self, module: &str, ports: &[BlackboxPort]) -> bool {
        if self.boxes.contains_key(module) {
            return false;
        }
        debug!(module, pins = ports.len(), "blackbox declared");
        self.boxes
            .insert(module.to_string(), render_blackbox(module, ports));
        true
    }

    /// Number of declared modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns `true` when nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Declared module names in sorted order.
    pub fn modules(&self) -> impl Iterator<Item = &str> + '_ {
        self.boxes.keys().map(String::as_str)
    }

    /// Drops every declaration.
    pub fn reset(&mut self) {
        self.boxes.clear();
    }

    /// All declarations sorted by module name, each followed by a blank
    /// line.
    #[must_use]
    pub fn render(&self) -> String {
        self.boxes.values().fold(String::new(), |mut out, declaration| {
            let _ = writeln!(out, "{declaration}");
            out
        })
    }
}
