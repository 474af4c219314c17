//! Sensor acquisition and calibration.
//!
//! Raw ADC samples flow through calibrated channels into
//! [`ReadingSnapshot`]s. The current channel needs a zero-current baseline,
//! measured once at startup by [`ZeroCalibrator`].

pub mod adc;
pub mod calibration;
pub mod channels;
pub mod data;
pub mod pipeline;
pub mod sampler;

// Re-export commonly used items
pub use calibration::{
    CalibrationParameters, SensorSettings, SensorVariant, VoltageDivider, ZeroCalibrator,
};
pub use channels::{CurrentChannel, VoltageChannel};
pub use data::ReadingSnapshot;
pub use pipeline::SensorPipeline;
pub use sampler::{ConstantSampler, RawSample, RawSampler, SequenceSampler, SyntheticSampler};
