//! Calibrated voltage and current channels.

use crate::error::Result;
use crate::sensors::calibration::CalibrationParameters;
use crate::sensors::sampler::{RawSample, RawSampler};
use std::sync::Arc;

/// Voltage measured behind a resistive divider.
pub struct VoltageChannel {
    sampler: Box<dyn RawSampler>,
    calibration: Arc<CalibrationParameters>,
}

impl VoltageChannel {
    /// Create a channel reading from `sampler`.
    pub fn new(sampler: Box<dyn RawSampler>, calibration: Arc<CalibrationParameters>) -> Self {
        Self {
            sampler,
            calibration,
        }
    }

    /// Input voltage that produced `raw`, undoing the divider.
    pub fn volts(&self, raw: RawSample) -> f64 {
        let adc_voltage = self.calibration.adc_volts(f64::from(raw));
        adc_voltage / self.calibration.divider_ratio()
    }

    /// Sample the channel and convert to volts.
    pub fn read_voltage(&self) -> Result<f64> {
        let raw = self.sampler.read()?;
        Ok(self.volts(raw))
    }
}

/// Signed current from a Hall-effect sensor centred on its zero offset.
pub struct CurrentChannel {
    sampler: Box<dyn RawSampler>,
    calibration: Arc<CalibrationParameters>,
}

impl CurrentChannel {
    /// Create a channel reading from `sampler`.
    pub fn new(sampler: Box<dyn RawSampler>, calibration: Arc<CalibrationParameters>) -> Self {
        Self {
            sampler,
            calibration,
        }
    }

    /// Current in amperes for `raw`. Positive above the zero offset,
    /// negative below it.
    pub fn amps(&self, raw: RawSample) -> f64 {
        let voltage = self.calibration.adc_volts(f64::from(raw));
        (voltage - self.calibration.zero_offset_voltage()) * 1000.0
            / self.calibration.sensitivity_mv_per_amp()
    }

    /// Sample the channel and convert to amperes.
    pub fn read_current(&self) -> Result<f64> {
        let raw = self.sampler.read()?;
        Ok(self.amps(raw))
    }
}
