use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum DashboardError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection is not open")]
    NotConnected,

    #[error("Malformed frame: {0}")]
    Decode(String),

    #[error("Request to {url} failed with HTTP {status}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Command rejected by server: {0}")]
    CommandRejected(String),

    #[error("Invalid open timeout {0}: must be between 1 and 60 minutes")]
    InvalidOpenTimeout(u32),

    #[error("Sync engine is no longer running")]
    EngineStopped,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl DashboardError {
    /// Whether this error came from an operator command and should be shown
    /// to the operator rather than only logged.
    pub fn is_command_error(&self) -> bool {
        matches!(
            self,
            DashboardError::HttpStatus { .. }
                | DashboardError::CommandRejected(_)
                | DashboardError::InvalidOpenTimeout(_)
                | DashboardError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
