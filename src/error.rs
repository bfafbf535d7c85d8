use thiserror::Error;

use crate::store::StoreError;

/// Why a session could not be established or continued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Not logged in.")]
    NotSignedIn,

    #[error("Profile not found. Check profiles table for this user.")]
    ProfileMissing,

    #[error("Your account is pending approval. Please contact admin.")]
    PendingApproval,

    #[error("{0}")]
    InvalidCredentials(String),

    /// The identity provider no longer reports a user mid-action.
    #[error("Session error. Please log in again.")]
    Lost,

    #[error("Session expired. Please log in again.")]
    Expired,
}

/// Failure side of every user-facing entry point.
///
/// The `Display` output is the message shown next to the control that
/// triggered the action, so variants carry user-readable text only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrmError {
    /// Rejected before any call to the row store.
    #[error("{0}")]
    Validation(String),

    /// The row store answered with an error; the message is passed through verbatim.
    #[error("{0}")]
    Remote(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The edit state machine was asked for a transition it does not expose.
    #[error("{0}")]
    InvalidState(String),
}

impl CrmError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<StoreError> for CrmError {
    fn from(err: StoreError) -> Self {
        CrmError::Remote(err.to_string())
    }
}

pub type CrmResult<T> = Result<T, CrmError>;
