use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("volume engine: {0}")]
    Engine(String),
    #[error("device timeout")]
    Timeout,
    #[error("invalid frame: {0}")]
    Frame(String),
    #[error("range meter: {0}")]
    RangeMeter(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
