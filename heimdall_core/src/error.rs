use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DetectorError {
    #[error("sensor protocol error: {0}")]
    Protocol(String),
    #[error("unknown lane index {0}")]
    UnknownLane(usize),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing rangefinder")]
    MissingSensor,
    #[error("missing lane set")]
    MissingLanes,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
