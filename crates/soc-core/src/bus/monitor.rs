//! Transaction log of completed bus cycles.
//!
//! Each acknowledged transaction becomes one line:
//!
//! ```text
//! 10005004,W,__ab__cd
//! ```
//!
//! address as eight hex digits, `R` or `W`, then the data word most
//! significant lane first with `__` for lanes that were not selected.
//! Errored transactions are not logged.

use std::fmt::Write as _;

use crate::{Access, BusGeometry, BusResponse, Transaction};

/// Formats one acknowledged transaction as a monitor line.
#[must_use]
pub fn format_transaction(geometry: BusGeometry, transaction: &Transaction, data: u32) -> String {
    let value = match transaction.access {
        Access::Read => data,
        Access::Write(written) => written,
    };
    let direction = if transaction.is_write() { 'W' } else { 'R' };
    let mut line = format!("{:08x},{direction},", transaction.address);

    let lane_bits = geometry.granularity();
    let digits = (lane_bits / 4) as usize;
    for lane in (0..geometry.lanes()).rev() {
        if transaction.select & (1 << lane) == 0 {
            line.push_str(&"_".repeat(digits));
        } else {
            let mask = if lane_bits >= 32 {
                u32::MAX
            } else {
                (1 << lane_bits) - 1
            };
            let lane_value = (value >> (lane * lane_bits)) & mask;
            let _ = write!(line, "{lane_value:0digits$x}");
        }
    }
    line
}

/// Records completed transactions in bus order.
#[derive(Debug, Clone)]
pub struct BusMonitor {
    geometry: BusGeometry,
    lines: Vec<String>,
}

impl BusMonitor {
    /// Creates an empty monitor for a bus of the given geometry.
    #[must_use]
    pub const fn new(geometry: BusGeometry) -> Self {
        Self {
            geometry,
            lines: Vec::new(),
        }
    }

    /// Records a completed transaction. Error responses are skipped.
    pub fn observe(&mut self, transaction: &Transaction, response: BusResponse) {
        if let BusResponse::Ack(data) = response {
            self.lines
                .push(format_transaction(self.geometry, transaction, data));
        }
    }

    /// Lines recorded so far.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Drains the recorded lines.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}
