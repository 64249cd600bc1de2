use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("volume engine error: {0}")]
    Engine(String),
    #[error("device error: {0}")]
    Device(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("timeout waiting for device")]
    Timeout,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing volume engine")]
    MissingEngine,
    #[error("missing frame source")]
    MissingFrameSource,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
