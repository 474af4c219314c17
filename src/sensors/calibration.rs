//! Calibration constants and the startup zero-current pass.
//!
//! [`SensorSettings`] holds everything known at build time. The only value
//! measured at runtime is the current sensor's resting output, which
//! [`ZeroCalibrator`] turns into a finished [`CalibrationParameters`].
//! Nothing can read current without one, so no handler can run before
//! calibration has completed.

use crate::error::{MonitorError, Result};
use crate::sensors::sampler::RawSampler;
use crate::{ADC_MAX, DEFAULT_REFERENCE_VOLTAGE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Number of samples averaged by the zero-current pass.
pub const ZERO_CALIBRATION_SAMPLES: usize = 100;

/// Delay between zero-current samples.
pub const ZERO_CALIBRATION_INTERVAL: Duration = Duration::from_millis(10);

/// Two-resistor divider in front of the voltage channel.
///
/// The ADC sees `r2 / (r1 + r2)` of the input voltage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageDivider {
    pub r1_ohms: f64,
    pub r2_ohms: f64,
}

impl VoltageDivider {
    /// 30k / 7.5k module, ratio 0.2.
    pub const REFERENCE: Self = Self {
        r1_ohms: 30_000.0,
        r2_ohms: 7_500.0,
    };

    /// No divider: the input is wired straight to the ADC pin.
    pub const DIRECT: Self = Self {
        r1_ohms: 0.0,
        r2_ohms: 1.0,
    };

    /// Create a divider from resistor values in ohms.
    pub fn new(r1_ohms: f64, r2_ohms: f64) -> Result<Self> {
        if !r1_ohms.is_finite() || !r2_ohms.is_finite() || r1_ohms < 0.0 || r2_ohms <= 0.0 {
            return Err(MonitorError::config_error(format!(
                "Invalid divider resistors: r1={} r2={}",
                r1_ohms, r2_ohms
            )));
        }
        Ok(Self { r1_ohms, r2_ohms })
    }

    /// Fraction of the input voltage present at the ADC.
    pub fn ratio(&self) -> f64 {
        self.r2_ohms / (self.r1_ohms + self.r2_ohms)
    }
}

impl Default for VoltageDivider {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// ACS712 part variants and their sensitivities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorVariant {
    /// ±5 A part, 185 mV/A
    #[default]
    Range5A,
    /// ±20 A part, 100 mV/A
    Range20A,
    /// ±30 A part, 66 mV/A
    Range30A,
}

impl SensorVariant {
    /// Output change per ampere, in millivolts.
    pub fn sensitivity_mv_per_amp(self) -> f64 {
        match self {
            Self::Range5A => 185.0,
            Self::Range20A => 100.0,
            Self::Range30A => 66.0,
        }
    }
}

impl fmt::Display for SensorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Range5A => "5a",
            Self::Range20A => "20a",
            Self::Range30A => "30a",
        };
        f.write_str(name)
    }
}

impl FromStr for SensorVariant {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.strip_prefix("acs712-").unwrap_or(&lowered) {
            "5a" => Ok(Self::Range5A),
            "20a" => Ok(Self::Range20A),
            "30a" => Ok(Self::Range30A),
            _ => Err(MonitorError::config_error(format!(
                "Unknown sensor variant '{}', expected 5a, 20a or 30a",
                s
            ))),
        }
    }
}

/// Build-time calibration constants, before the zero pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    reference_voltage: f64,
    max_raw_value: u16,
    divider: VoltageDivider,
    variant: SensorVariant,
}

impl SensorSettings {
    /// Create settings for a 12-bit ADC with the given reference voltage.
    pub fn new(
        reference_voltage: f64,
        divider: VoltageDivider,
        variant: SensorVariant,
    ) -> Result<Self> {
        if !reference_voltage.is_finite() || reference_voltage <= 0.0 {
            return Err(MonitorError::config_error(format!(
                "Reference voltage must be positive, got {}",
                reference_voltage
            )));
        }
        Ok(Self {
            reference_voltage,
            max_raw_value: ADC_MAX,
            divider,
            variant,
        })
    }

    /// Use a different divider.
    pub fn with_divider(mut self, divider: VoltageDivider) -> Self {
        self.divider = divider;
        self
    }

    /// Use a different current sensor variant.
    pub fn with_variant(mut self, variant: SensorVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Finish calibration with an already known zero-current voltage.
    pub fn with_zero_offset(self, zero_offset_voltage: f64) -> CalibrationParameters {
        CalibrationParameters {
            settings: self,
            zero_offset_voltage,
        }
    }

    /// Voltage at the ADC pin for a (possibly averaged) raw count.
    pub fn adc_volts(&self, raw: f64) -> f64 {
        raw / f64::from(self.max_raw_value) * self.reference_voltage
    }

    pub fn reference_voltage(&self) -> f64 {
        self.reference_voltage
    }

    pub fn max_raw_value(&self) -> u16 {
        self.max_raw_value
    }

    pub fn divider(&self) -> VoltageDivider {
        self.divider
    }

    pub fn variant(&self) -> SensorVariant {
        self.variant
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
            max_raw_value: ADC_MAX,
            divider: VoltageDivider::REFERENCE,
            variant: SensorVariant::Range5A,
        }
    }
}

/// Finished, read-only calibration shared by every reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    settings: SensorSettings,
    zero_offset_voltage: f64,
}

impl CalibrationParameters {
    pub fn divider_ratio(&self) -> f64 {
        self.settings.divider.ratio()
    }

    pub fn sensitivity_mv_per_amp(&self) -> f64 {
        self.settings.variant.sensitivity_mv_per_amp()
    }

    /// Current sensor output at zero current, in volts.
    pub fn zero_offset_voltage(&self) -> f64 {
        self.zero_offset_voltage
    }

    /// Voltage at the ADC pin for a raw count.
    pub fn adc_volts(&self, raw: f64) -> f64 {
        self.settings.adc_volts(raw)
    }
}

/// One-shot averaging pass that measures the current sensor's resting
/// output.
///
/// Precondition: no current flows through the sensor while this runs. The
/// pass cannot detect a violation; it simply records what it measures.
#[derive(Debug, Clone, Copy)]
pub struct ZeroCalibrator {
    samples: usize,
    interval: Duration,
}

impl ZeroCalibrator {
    /// Create a calibrator taking `samples` readings `interval` apart.
    pub fn new(samples: usize, interval: Duration) -> Self {
        Self { samples, interval }
    }

    /// Change the delay between samples.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of samples averaged.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Run the pass. Blocks the calling thread for roughly
    /// `samples * interval`.
    pub fn calibrate<S>(
        &self,
        settings: SensorSettings,
        sampler: &S,
    ) -> Result<CalibrationParameters>
    where
        S: RawSampler + ?Sized,
    {
        if self.samples == 0 {
            return Err(MonitorError::calibration_error(
                "zero calibration needs at least one sample",
            ));
        }

        info!(
            "Calibrating current sensor zero: {} samples, {:?} apart",
            self.samples, self.interval
        );

        let mut total: u64 = 0;
        for i in 0..self.samples {
            let sample = sampler.read().map_err(|e| {
                MonitorError::calibration_error(format!("sample {} failed: {}", i, e))
            })?;
            total += u64::from(sample.value());

            if i + 1 < self.samples && !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }

        let mean_raw = total as f64 / self.samples as f64;
        let zero_offset_voltage = settings.adc_volts(mean_raw);
        debug!("Zero calibration mean raw value: {:.2}", mean_raw);
        info!("Current sensor zero offset: {:.4} V", zero_offset_voltage);

        Ok(settings.with_zero_offset(zero_offset_voltage))
    }
}

impl Default for ZeroCalibrator {
    fn default() -> Self {
        Self::new(ZERO_CALIBRATION_SAMPLES, ZERO_CALIBRATION_INTERVAL)
    }
}
