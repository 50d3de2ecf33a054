//! Error types shared across the crate.
//!
//! Every failure is scoped to the operation that raised it. Nothing here is
//! fatal to the process; callers decide whether to show, retry or drop.

use crate::revision::Revision;

/// Why embed input could not be turned into a trusted URL
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbedError {
    /// No URL and no `<iframe src=...>` could be found in the input
    #[error("could not find a valid URL in the embed code")]
    NoUrlFound,

    /// A candidate was found but it is not an absolute http(s) URL
    #[error("'{candidate}' is not a valid embed URL: {reason}")]
    InvalidUrl { candidate: String, reason: String },

    /// The URL points at a host outside the allow-list
    #[error("'{host}' is not in the trusted domains list for security reasons")]
    UntrustedDomain { host: String },
}

/// Discriminant of [`EmbedError`] for callers that only branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedErrorKind {
    NoUrlFound,
    InvalidUrl,
    UntrustedDomain,
}

impl EmbedError {
    pub fn kind(&self) -> EmbedErrorKind {
        match self {
            EmbedError::NoUrlFound => EmbedErrorKind::NoUrlFound,
            EmbedError::InvalidUrl { .. } => EmbedErrorKind::InvalidUrl,
            EmbedError::UntrustedDomain { .. } => EmbedErrorKind::UntrustedDomain,
        }
    }

    /// True when the input was well formed but the host is not allowed
    pub fn is_trust_rejection(&self) -> bool {
        matches!(self, EmbedError::UntrustedDomain { .. })
    }
}

/// Client-side slug check failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    #[error("profile slug must be at least {min} characters long (got {len})")]
    TooShort { len: usize, min: usize },

    #[error("profile slug can only contain lowercase letters, numbers, underscores, and hyphens")]
    InvalidCharacters,
}

/// Input rejected before any backend call was attempted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Slug(#[from] SlugError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("question text cannot be empty")]
    EmptyQuestion,

    #[error("answer text cannot be empty")]
    EmptyAnswer,
}

/// Backend read/write failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("failed to build query: {0}")]
    Query(#[from] sea_query::error::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A unique constraint rejected the write
    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    /// A check constraint rejected the write
    #[error("check constraint '{constraint}' violated")]
    CheckViolation { constraint: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// A stored row could not be decoded into the in-memory model
    #[error("stored row {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    /// Block content that would not read back as the same block type
    #[error("block {id} has content that cannot be stored: {reason}")]
    InvalidContent { id: String, reason: String },

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Name of the violated constraint, if the backend reported one
    pub fn constraint(&self) -> Option<&str> {
        match self {
            StoreError::UniqueViolation { constraint }
            | StoreError::CheckViolation { constraint } => Some(constraint.as_str()),
            _ => None,
        }
    }
}

/// Failure of a block list save.
///
/// Any variant means the stored list may not match what the caller holds;
/// offer a retry rather than treating it as a no-op.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The existing rows were left untouched
    #[error("blocks were not saved; stored blocks are unchanged: {0}")]
    NothingWritten(#[source] StoreError),

    /// Existing rows were deleted but the replacement rows were not written.
    /// The profile may now have zero blocks.
    #[error("removed {deleted} stored blocks but failed to write {attempted} replacements: {source}")]
    PartialWrite {
        deleted: u64,
        attempted: usize,
        #[source]
        source: StoreError,
    },

    /// The rows were written but the stored list could not be read back
    #[error("blocks were saved but could not be read back: {0}")]
    Unreadable(#[source] StoreError),

    /// The stored list changed since the caller loaded it
    #[error("blocks were changed elsewhere (expected revision {expected}, found {found})")]
    Conflict { expected: Revision, found: Revision },
}

impl SaveError {
    /// True when stored rows were removed without their replacements landing
    pub fn is_partial_write(&self) -> bool {
        matches!(self, SaveError::PartialWrite { .. })
    }
}

/// Umbrella error for the [`crate::OneLink`] facade
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("you must be signed in to do that")]
    NotSignedIn,

    #[error("profile slug '{0}' is already taken")]
    SlugTaken(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Save(#[from] SaveError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Error::NotFound(what),
            other => Error::Store(other),
        }
    }
}

impl From<SlugError> for Error {
    fn from(err: SlugError) -> Self {
        Error::Validation(err.into())
    }
}

impl From<EmbedError> for Error {
    fn from(err: EmbedError) -> Self {
        Error::Validation(err.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
