//! Error handling for the power probe crate.

/// A specialized `Result` type for power probe operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// The main error type for sampling, calibration and serving.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading a raw sample from an analog channel failed
    #[error("Sampler error: {0}")]
    Sampler(String),

    /// Zero-current calibration could not complete
    #[error("Calibration error: {0}")]
    Calibration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),
}

impl MonitorError {
    /// Create a new sampler error
    pub fn sampler_error(msg: impl Into<String>) -> Self {
        Self::Sampler(msg.into())
    }

    /// Create a new calibration error
    pub fn calibration_error(msg: impl Into<String>) -> Self {
        Self::Calibration(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }
}
