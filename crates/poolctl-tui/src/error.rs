use poolctl_core::CoreError;
use poolctl_service::ServiceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// Rejected locally, no request was sent.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Request(#[from] ServiceError),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("admin only")]
    AdminOnly,

    #[error("leader settings are disabled while multi-node mode is off")]
    LeaderSettingsDisabled,

    /// A batched save stopped at `key`. Keys in `applied` were already saved.
    #[error("{key}: {message}")]
    SaveAborted {
        applied: Vec<String>,
        key: String,
        message: String,
    },
}

impl ConsoleError {
    /// HTTP status of the underlying request failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConsoleError::Request(e) => e.status(),
            _ => None,
        }
    }
}
