use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("can interface not found: {0}")]
    InterfaceNotFound(String),
    #[error("bus read timeout")]
    Timeout,
    #[error("bus closed")]
    Closed,
    #[error("short frame write: {0} bytes")]
    ShortWrite(usize),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
