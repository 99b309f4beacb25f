//! TOML system descriptions.
//!
//! ```toml
//! [system]
//! name = "board"
//! reset_address = 0x00100000
//!
//! [[peripheral]]
//! name = "uart"
//! base = 0x10005000
//! size = 0x1000
//! irq = 1
//! registers = [{ name = "divisor" }, { name = "tx_data" }]
//! blackbox = { module = "uart_model", pins = [{ name = "tx" }, { name = "rx" }] }
//!
//! [build]
//! commands = ["make -C {{ build_dir }}"]
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use soc_core::{
    AddressRegistry, BusGeometry, BusInitiator, BusResponse, BusTarget, ConflictError, System,
    SystemBuilder, Transaction, MAX_IRQ_WIDTH, NATIVE_IRQ_WIDTH,
};
use thiserror::Error;
use tracing::debug;

use crate::blackbox::BlackboxPort;
use crate::generator::BuildPlanGenerator;

/// A complete system description.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Global parameters.
    pub system: SystemSection,
    /// Peripherals in connection order.
    #[serde(default, rename = "peripheral")]
    pub peripherals: Vec<PeripheralConfig>,
    /// Build script inputs.
    #[serde(default)]
    pub build: BuildSection,
}

/// The `[system]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemSection {
    /// Output name used for generated files.
    pub name: String,
    /// Processor reset vector.
    #[serde(default)]
    pub reset_address: u64,
    /// System clock frequency in hertz.
    #[serde(default)]
    pub clock_hz: u64,
    /// Width of the interrupt-pending vector.
    #[serde(default = "default_irq_width")]
    pub irq_width: u32,
}

/// One `[[peripheral]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeripheralConfig {
    /// Window name.
    pub name: String,
    /// Window base address.
    pub base: u64,
    /// Window size in bytes.
    pub size: u64,
    /// Registers inside the window. An empty list maps the whole window as
    /// one byte-addressed memory named `mem`.
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,
    /// Interrupt slot, when the peripheral raises interrupts.
    #[serde(default)]
    pub irq: Option<u32>,
    /// Simulation model attached to the peripheral's pins.
    #[serde(default)]
    pub blackbox: Option<BlackboxConfig>,
}

/// One register of a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterConfig {
    /// Register name.
    pub name: String,
    /// Offset within the window. Omitted registers follow the previous one.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Access width in bytes.
    #[serde(default = "default_register_width")]
    pub width: u32,
}

/// Simulation blackbox for a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlackboxConfig {
    /// Verilog module name.
    pub module: String,
    /// Pin groups, `>`-prefixed for clock-edge outputs.
    pub pins: Vec<PinConfig>,
}

/// One blackbox pin group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinConfig {
    /// Group name, possibly empty.
    #[serde(default)]
    pub name: String,
    /// Width in bits.
    #[serde(default = "default_pin_width")]
    pub width: u32,
}

/// The `[build]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Command fragments, in script order.
    #[serde(default)]
    pub commands: Vec<String>,
}

const fn default_irq_width() -> u32 {
    NATIVE_IRQ_WIDTH
}

const fn default_register_width() -> u32 {
    4
}

const fn default_pin_width() -> u32 {
    1
}

/// Errors loading or applying a system description.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The text is not a valid description.
    #[error("invalid system description: {0}")]
    Parse(#[from] toml::de::Error),
    /// A peripheral does not fit the memory map or the interrupt vector.
    #[error("peripheral '{peripheral}': {source}")]
    Layout {
        /// Offending peripheral.
        peripheral: String,
        /// The conflict.
        #[source]
        source: ConflictError,
    },
    /// The interrupt vector width is unsupported.
    #[error("interrupt vector width {0} is outside 1..={max}", max = MAX_IRQ_WIDTH)]
    IrqWidth(u32),
    /// A blackbox pin group has zero width.
    #[error("blackbox '{module}' pin '{pin}' has zero width")]
    PinWidth {
        /// Blackbox module.
        module: String,
        /// Offending pin group.
        pin: String,
    },
}

impl SystemConfig {
    /// Parses a TOML description.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML description.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The reference board: SPI flash ROM, SRAM, HyperRAM, UART, timer and
    /// GPIO.
    #[must_use]
    pub fn default_layout() -> Self {
        let registers = |names: &[&str]| -> Vec<RegisterConfig> {
            names
                .iter()
                .map(|name| RegisterConfig {
                    name: (*name).to_string(),
                    offset: None,
                    width: default_register_width(),
                })
                .collect()
        };
        let blackbox = |module: &str, pins: &[(&str, u32)]| {
            Some(BlackboxConfig {
                module: module.to_string(),
                pins: pins
                    .iter()
                    .map(|(name, width)| PinConfig {
                        name: (*name).to_string(),
                        width: *width,
                    })
                    .collect(),
            })
        };
        let peripheral = |name: &str, base: u64, size: u64| PeripheralConfig {
            name: name.to_string(),
            base,
            size,
            registers: Vec::new(),
            irq: None,
            blackbox: None,
        };

        Self {
            system: SystemSection {
                name: "soc".to_string(),
                reset_address: 0x0010_0000,
                clock_hz: 27_000_000,
                irq_width: NATIVE_IRQ_WIDTH,
            },
            peripherals: vec![
                peripheral("rom", 0x0000_0000, 0x0100_0000),
                PeripheralConfig {
                    registers: registers(&["config", "status"]),
                    blackbox: blackbox("spiflash_model", &[(">clk", 1), (">csn", 1), ("d", 4)]),
                    ..peripheral("flash_ctrl", 0x1000_7000, 0x1000)
                },
                PeripheralConfig {
                    blackbox: blackbox(
                        "hyperram_model",
                        &[(">clk", 1), (">rwds", 1), (">csn", 1), ("d", 8)],
                    ),
                    ..peripheral("hram", 0x2000_0000, 0x0080_0000)
                },
                peripheral("sram", 0x1000_4000, 0x200),
                PeripheralConfig {
                    registers: registers(&[
                        "divisor", "rx_data", "rx_rdy", "rx_err", "tx_data", "tx_rdy",
                    ]),
                    irq: Some(1),
                    blackbox: blackbox("uart_model", &[("tx", 1), ("rx", 1)]),
                    ..peripheral("uart", 0x1000_5000, 0x1000)
                },
                PeripheralConfig {
                    registers: registers(&["reload", "en", "ctr"]),
                    irq: Some(0),
                    ..peripheral("timer", 0x1000_6000, 0x1000)
                },
                PeripheralConfig {
                    registers: registers(&["out", "oe", "in"]),
                    blackbox: blackbox("gpio_model", &[("", 8)]),
                    ..peripheral("gpio", 0x1000_8000, 0x1000)
                },
            ],
            build: BuildSection::default(),
        }
    }

    /// Assembles the described system on the native bus.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Layout`] for the first peripheral whose window,
    /// registers, or interrupt slot conflict, and [`ConfigError::IrqWidth`]
    /// for an unsupported vector width.
    pub fn build_system(&self) -> Result<System, ConfigError> {
        let width = self.system.irq_width;
        if width == 0 || width > MAX_IRQ_WIDTH {
            return Err(ConfigError::IrqWidth(width));
        }

        let mut builder = SystemBuilder::new(BusGeometry::NATIVE, width);
        builder.add_processor(
            Box::new(IdlePort::new("cpu.ibus")),
            Box::new(IdlePort::new("cpu.dbus")),
        );
        for peripheral in &self.peripherals {
            let layout = |source| ConfigError::Layout {
                peripheral: peripheral.name.clone(),
                source,
            };
            let device = ConfiguredDevice::new(peripheral).map_err(layout)?;
            let target = builder
                .add_target(Box::new(device), peripheral.base)
                .map_err(layout)?;
            if let Some(slot) = peripheral.irq {
                builder.add_irq(target, slot).map_err(layout)?;
            }
        }
        Ok(builder.build())
    }

    /// A generator carrying this description's commands and blackboxes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PinWidth`] for a zero-width pin group.
    pub fn plan_generator(&self) -> Result<BuildPlanGenerator, ConfigError> {
        let mut generator = BuildPlanGenerator::new();
        for command in &self.build.commands {
            generator.add_command(command.as_str());
        }
        for blackbox in self.peripherals.iter().filter_map(|p| p.blackbox.as_ref()) {
            let ports = blackbox
                .pins
                .iter()
                .map(|pin| {
                    if pin.width == 0 {
                        return Err(ConfigError::PinWidth {
                            module: blackbox.module.clone(),
                            pin: pin.name.clone(),
                        });
                    }
                    Ok(BlackboxPort::parse(&pin.name, pin.width))
                })
                .collect::<Result<Vec<_>, _>>()?;
            generator.add_blackbox(&blackbox.module, &ports);
        }
        Ok(generator)
    }
}

/// Stand-in for a processor port whose pipeline lives elsewhere. It never
/// requests the bus.
#[derive(Debug, Clone)]
struct IdlePort {
    name: String,
}

impl IdlePort {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl BusInitiator for IdlePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn request(&self) -> Option<Transaction> {
        None
    }

    fn complete(&mut self, _transaction: Transaction, _response: BusResponse) {}
}

/// Peripheral described only by its memory map. Writes are latched per
/// word so reads return the last value written.
#[derive(Debug, Clone)]
struct ConfiguredDevice {
    map: AddressRegistry,
    words: HashMap<u64, u32>,
}

impl ConfiguredDevice {
    fn new(config: &PeripheralConfig) -> Result<Self, ConflictError> {
        let mut map = AddressRegistry::new(config.name.as_str(), config.size);
        if config.registers.is_empty() {
            map.insert("mem", config.size, 1)?;
        }
        for register in &config.registers {
            let size = u64::from(register.width);
            match register.offset {
                Some(offset) => map.insert_at(&register.name, offset, size, register.width)?,
                None => {
                    map.insert(&register.name, size, register.width)?;
                }
            }
        }
        debug!(peripheral = %config.name, entries = map.len(), "peripheral map built");
        Ok(Self {
            map,
            words: HashMap::new(),
        })
    }
}

impl BusTarget for ConfiguredDevice {
    fn name(&self) -> &str {
        self.map.name()
    }

    fn memory_map(&self) -> AddressRegistry {
        self.map.clone()
    }

    fn read(&mut self, offset: u64, _select: u8) -> u32 {
        self.words.get(&(offset & !3)).copied().unwrap_or(0)
    }

    fn write(&mut self, offset: u64, data: u32, select: u8) {
        let word = self.words.entry(offset & !3).or_insert(0);
        for lane in 0..4 {
            if select & (1 << lane) != 0 {
                let mask = 0xFF << (lane * 8);
                *word = (*word & !mask) | (data & mask);
            }
        }
    }
}
