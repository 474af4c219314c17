//! # Power Probe - Voltage and Current Readings Over HTTP
//!
//! Samples a resistive voltage divider and a Hall-effect current sensor,
//! converts the raw ADC counts into volts and amperes, and serves them as a
//! small self-refreshing HTML page to whoever connects to the device's
//! access point.
//!
//! ## Features
//!
//! - **Calibrated channels**: divider-corrected voltage, zero-offset corrected current
//! - **Startup zero pass**: averages the current sensor at rest before serving
//! - **Concurrent responder**: one task per connection, accept loop never blocks
//! - **SPI ADC support**: MCP3208 via rppal (feature-gated)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use power_probe::{
//!     sensors::{adc, SensorPipeline, SensorSettings, ZeroCalibrator},
//!     start_web_server, WebConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let inputs = adc::open_inputs()?;
//!     let pipeline = SensorPipeline::calibrate(
//!         SensorSettings::default(),
//!         &ZeroCalibrator::default(),
//!         inputs.voltage,
//!         inputs.current,
//!     )?;
//!
//!     // Serve on port 8080
//!     start_web_server(WebConfig::default(), Arc::new(pipeline)).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod sensors;
pub mod web;

// Re-export public API
pub use error::{MonitorError, Result};
pub use sensors::{
    CalibrationParameters, RawSample, RawSampler, ReadingSnapshot, SensorPipeline,
    SensorSettings, SensorVariant, VoltageDivider, ZeroCalibrator,
};
pub use web::{handle_connection, start_web_server, ConnectionServer, WebConfig};

/// Full-scale count of the 12-bit ADC
pub const ADC_MAX: u16 = 4095;

/// ADC reference voltage in volts
pub const DEFAULT_REFERENCE_VOLTAGE: f64 = 3.3;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;

/// The default listen backlog
pub const DEFAULT_BACKLOG: u32 = 5;

/// The default request read size in bytes
pub const DEFAULT_REQUEST_BUFFER_SIZE: usize = 1024;

/// The default page refresh interval in milliseconds
pub const DEFAULT_REFRESH_MS: u64 = 2000;

/// SSID of the access point clients join to reach the page
pub const ACCESS_POINT_SSID: &str = "ESP32-AP";

/// Passphrase of that access point
pub const ACCESS_POINT_PASSWORD: &str = "12345678";
