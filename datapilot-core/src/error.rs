use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PilotError {
    #[error("{message}")]
    PreconditionNotMet { message: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Network { message: String },

    #[error("Index {index} is out of range for {len} entries")]
    OutOfRange { index: usize, len: usize },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PilotError {
    pub fn precondition(message: impl Into<String>) -> Self {
        PilotError::PreconditionNotMet {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        PilotError::Network {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PilotError::Validation {
            message: message.into(),
        }
    }

    /// True for failures reported by (or on the way to) the remote service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            PilotError::Validation { .. } | PilotError::Network { .. }
        )
    }
}

impl From<reqwest::Error> for PilotError {
    fn from(err: reqwest::Error) -> Self {
        PilotError::Network {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PilotError {
    fn from(err: serde_json::Error) -> Self {
        PilotError::Network {
            message: format!("Unexpected response: {}", err),
        }
    }
}

impl From<url::ParseError> for PilotError {
    fn from(err: url::ParseError) -> Self {
        PilotError::Config {
            message: format!("Invalid URL: {}", err),
        }
    }
}

impl From<std::io::Error> for PilotError {
    fn from(err: std::io::Error) -> Self {
        PilotError::Storage {
            message: err.to_string(),
        }
    }
}
