//! Data structures for sensor readings.

use serde::{Deserialize, Serialize};

/// One voltage/current pair rendered into a single page.
///
/// The two channels are read one after the other, so a snapshot is
/// approximately simultaneous rather than an atomic instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadingSnapshot {
    /// Input voltage in volts
    pub voltage: f64,
    /// Signed current in amperes
    pub current: f64,
}

impl ReadingSnapshot {
    /// Create a snapshot from already converted values.
    pub fn new(voltage: f64, current: f64) -> Self {
        Self { voltage, current }
    }

    /// Instantaneous power in watts.
    pub fn power_watts(&self) -> f64 {
        self.voltage * self.current
    }
}
