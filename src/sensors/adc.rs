//! Analog input backends.
//!
//! With the `gpio` feature the two channels are read from an MCP3208 12-bit
//! SPI ADC through rppal. Without it, synthetic waveforms stand in so the
//! binary still runs on a development machine.

use crate::error::Result;
use crate::sensors::sampler::RawSampler;

/// ADC channel wired to the voltage divider output.
pub const VOLTAGE_CHANNEL: u8 = 0;

/// ADC channel wired to the Hall-effect current sensor output.
pub const CURRENT_CHANNEL: u8 = 1;

/// The voltage and current samplers used by the binary.
pub struct AnalogInputs {
    pub voltage: Box<dyn RawSampler>,
    pub current: Box<dyn RawSampler>,
}

#[cfg(feature = "gpio")]
mod mcp3208 {
    use super::*;
    use crate::error::MonitorError;
    use crate::sensors::sampler::RawSample;
    use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
    use std::sync::{Arc, Mutex};

    const SPI_CLOCK_HZ: u32 = 1_000_000;

    /// One single-ended channel of an MCP3208 on SPI0/CE0.
    pub struct Mcp3208Sampler {
        spi: Arc<Mutex<Spi>>,
        channel: u8,
    }

    impl Mcp3208Sampler {
        /// Open the SPI bus shared by all channels.
        pub fn open_bus() -> Result<Arc<Mutex<Spi>>> {
            let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
                .map_err(|e| MonitorError::sampler_error(format!("Failed to open SPI0: {}", e)))?;
            Ok(Arc::new(Mutex::new(spi)))
        }

        /// Bind a sampler to `channel` (0..=7) on an open bus.
        pub fn new(spi: Arc<Mutex<Spi>>, channel: u8) -> Result<Self> {
            if channel > 7 {
                return Err(MonitorError::sampler_error(format!(
                    "MCP3208 has no channel {}",
                    channel
                )));
            }
            Ok(Self { spi, channel })
        }
    }

    impl RawSampler for Mcp3208Sampler {
        fn read(&self) -> Result<RawSample> {
            // Start bit, single-ended mode, then the three channel select bits.
            let command = [
                0b0000_0110 | ((self.channel & 0b100) >> 2),
                (self.channel & 0b011) << 6,
                0x00,
            ];
            let mut response = [0u8; 3];

            let spi = self
                .spi
                .lock()
                .map_err(|_| MonitorError::sampler_error("SPI bus lock poisoned"))?;
            spi.transfer(&mut response, &command).map_err(|e| {
                MonitorError::sampler_error(format!(
                    "SPI transfer on channel {} failed: {}",
                    self.channel, e
                ))
            })?;

            let value = (u16::from(response[1] & 0x0F) << 8) | u16::from(response[2]);
            Ok(RawSample::new(value))
        }
    }

    /// Open both channels on the MCP3208.
    pub fn open_inputs() -> Result<AnalogInputs> {
        let bus = Mcp3208Sampler::open_bus()?;
        Ok(AnalogInputs {
            voltage: Box::new(Mcp3208Sampler::new(bus.clone(), VOLTAGE_CHANNEL)?),
            current: Box::new(Mcp3208Sampler::new(bus, CURRENT_CHANNEL)?),
        })
    }
}

#[cfg(not(feature = "gpio"))]
mod synthetic {
    use super::*;
    use crate::sensors::sampler::SyntheticSampler;

    /// Synthetic inputs: a slowly swinging divider voltage and a current
    /// sensor idling near mid-rail.
    pub fn open_inputs() -> Result<AnalogInputs> {
        tracing::warn!("No ADC backend compiled in, using synthetic analog inputs");
        Ok(AnalogInputs {
            voltage: Box::new(SyntheticSampler::new(2048, 400, 60)),
            current: Box::new(SyntheticSampler::new(2048, 40, 30)),
        })
    }
}

#[cfg(feature = "gpio")]
pub use mcp3208::{open_inputs, Mcp3208Sampler};

#[cfg(not(feature = "gpio"))]
pub use synthetic::open_inputs;
