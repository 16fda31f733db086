use thiserror::Error;
use vault_store::StoreError;

use crate::session::AuthMode;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Password too short ({actual} characters, minimum {min})")]
    TooShort { min: usize, actual: usize },

    #[error("Passwords do not match")]
    Mismatch,

    /// Wrong passcode. Also returned when none is stored, so the two cases
    /// look the same to the caller.
    #[error("Access denied")]
    AccessDenied,

    #[error("Vault is locked")]
    Locked,

    #[error("{event} is not allowed in {mode} mode")]
    InvalidTransition { mode: AuthMode, event: &'static str },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    #[error("Storage failure: {0}")]
    StorageFailure(#[source] StoreError),
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        if e.is_unavailable() {
            SessionError::StorageUnavailable(e)
        } else {
            SessionError::StorageFailure(e)
        }
    }
}

impl SessionError {
    /// Validation and credential errors that the user fixes by re-entering
    /// input, as opposed to storage or sequencing faults.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SessionError::TooShort { .. } | SessionError::Mismatch | SessionError::AccessDenied
        )
    }
}
