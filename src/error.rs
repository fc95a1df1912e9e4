use thiserror::Error;

/// Errors surfaced by the registry and the control facade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
    #[error("Simulator not found: {0}")]
    NotFound(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reserved; ids are always generated so nothing raises this yet
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl SimulatorError {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound(id.to_string())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type SimResult<T> = std::result::Result<T, SimulatorError>;
