use rusoto_core::RusotoError;
use rusoto_s3::DeleteObjectError;
use thiserror::Error;
use uuid::Uuid;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents a malformed or out-of-range request.
    #[error("{0}")]
    InvalidArgument(String),

    /// Represents a request without a usable bearer credential.
    #[error("authentication required")]
    Unauthenticated,

    /// Represents a request whose credential belongs to a suspended user.
    #[error("account suspended")]
    Suspended,

    /// Represents an assignment that does not resolve in the catalog.
    #[error("assignment {0} not found")]
    AssignmentNotFound(String),

    /// Represents a recording that does not exist.
    #[error("recording {0} not found")]
    RecordingNotFound(Uuid),

    /// Represents an attempt to act on someone else's recording.
    #[error("not allowed to modify recording {0}")]
    NotOwner(Uuid),

    /// Represents a confirmation naming recordings that are not all owned
    /// by the caller and awaiting confirmation.
    #[error("some recordings not found or unauthorized")]
    NotConfirmable,

    /// Represents a second attempt to answer the onboarding questions.
    #[error("onboarding already completed")]
    AlreadyOnboarded,

    /// Represents a user row that disappeared between authentication and use.
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    /// Represents a failure to produce a signed upload target.
    #[error("failed to prepare upload {index}: {source}")]
    MintFailed {
        index: usize,
        source: Box<BackendError>,
    },

    /// Represents a signed URL that could not be parsed back.
    #[error("failed to sign storage URL")]
    PresignFailed { source: url::ParseError },

    /// Represents an error returned by the storage backend when deleting.
    #[error("failed to delete object from storage")]
    DeleteFailed {
        source: RusotoError<DeleteObjectError>,
    },

    /// Represents a recording ID collision.
    #[error("recording ID already exists")]
    RecordingAlreadyExists,

    /// Represents a storage key collision.
    #[error("storage key already exists")]
    StorageKeyAlreadyExists,

    /// Represents an SQL error.
    #[error("database error")]
    Sqlx { source: sqlx::Error },
}

impl BackendError {
    /// Shorthand for [`BackendError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        BackendError::InvalidArgument(message.into())
    }

    /// Whether this error came from the storage backend.
    pub fn is_storage_failure(&self) -> bool {
        use BackendError::*;

        match self {
            MintFailed { .. } | PresignFailed { .. } | DeleteFailed { .. } => true,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(source: sqlx::Error) -> Self {
        BackendError::Sqlx { source }
    }
}
