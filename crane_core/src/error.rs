use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CraneError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for telemetry")]
    Timeout,
    #[error("insufficient telemetry to interpolate")]
    InsufficientData,
    #[error("telemetry feed disconnected")]
    Disconnected,
    #[error("perception error: {0}")]
    Perception(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing command sink")]
    MissingCommandSink,
    #[error("missing telemetry source")]
    MissingTelemetrySource,
    #[error("missing perception source")]
    MissingPerception,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
