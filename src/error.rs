use thiserror::Error;

use crate::platform::PlatformError;

/// Errors surfaced by the query/mutation layer. Read-path enrichment never
/// produces these; write-path mutations escalate distinguishable failures
/// (auth, conflict) as typed variants and everything else generically.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Conflict(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Invalid(String),
    #[error("platform error: {0}")]
    Platform(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<PlatformError> for ApiError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::Unauthorized(_) => ApiError::Unauthorized,
            PlatformError::NotFound(_) => ApiError::NotFound,
            PlatformError::Conflict(m) => ApiError::Conflict(m),
            PlatformError::SessionActive => {
                ApiError::Conflict("a session is already active".into())
            }
            PlatformError::Other(m) => ApiError::Platform(m),
        }
    }
}
