use thiserror::Error;

use crate::types::{ColumnName, DataType, DdlTimestamp, EntityId, SequenceId};

/// Convenience alias for `Result<T, CatalogError>`.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Error classification for retry/escalation decisions.
///
/// - `UserError` — invalid declaration or conflicting statement; retrying
///   the same statement cannot succeed
/// - `Retryable` — another writer won a race; the caller MAY retry
/// - `Internal`  — codec/transport failure or broken invariant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserError,
    Retryable,
    Internal,
}

/// Failures reported by the metadata store client.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    #[error("entity already exists: {0}")]
    AlreadyExists(EntityId),

    #[error("version conflict on {identity}: expected {expected}, found {actual}")]
    VersionConflict {
        identity: EntityId,
        expected: DdlTimestamp,
        actual: DdlTimestamp,
    },

    #[error("sequence not found: {0}")]
    SequenceNotFound(SequenceId),

    #[error("sequence already exists: {0}")]
    SequenceAlreadyExists(SequenceId),

    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("definition snapshot codec error: {0}")]
    Codec(String),
}

/// Validation failures detected before any mutation is issued.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("cannot remove column {column} from append-only entity {identity}")]
    ColumnRemoved {
        identity: EntityId,
        column: ColumnName,
    },

    #[error("cannot drop column {column}: entity {identity} has an append-only schema")]
    DropRejected {
        identity: EntityId,
        column: ColumnName,
    },

    #[error("view {view} must declare an append-only schema: base entity {base} is append-only")]
    ViewNotAppendOnly { view: EntityId, base: EntityId },

    #[error("entity {identity}: an append-only schema requires a bounded cache frequency")]
    InvalidCacheConfig { identity: EntityId },

    #[error("column {column} of {identity}: declared {actual}, stored {expected}")]
    TypeMismatch {
        identity: EntityId,
        column: ColumnName,
        expected: DataType,
        actual: DataType,
    },

    #[error("column {column} of {identity}: declared nullability differs from stored definition")]
    NullabilityMismatch {
        identity: EntityId,
        column: ColumnName,
    },

    #[error("duplicate column {column} in declaration of {identity}")]
    DuplicateColumn {
        identity: EntityId,
        column: ColumnName,
    },

    #[error("unknown column {column} on entity {identity}")]
    UnknownColumn {
        identity: EntityId,
        column: ColumnName,
    },

    #[error("view {identity} declares no base entity")]
    MissingParent { identity: EntityId },

    #[error("view hierarchy cycle detected at {identity}")]
    ViewCycle { identity: EntityId },
}

/// Top-level error type that all catalog operations return.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Classify this error for retry/escalation decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Schema(SchemaError::ViewCycle { .. }) => ErrorKind::Internal,
            CatalogError::Schema(_) => ErrorKind::UserError,
            CatalogError::Store(StoreError::NotFound(_)) => ErrorKind::UserError,
            CatalogError::Store(StoreError::AlreadyExists(_)) => ErrorKind::UserError,
            CatalogError::Store(StoreError::SequenceNotFound(_)) => ErrorKind::UserError,
            CatalogError::Store(StoreError::SequenceAlreadyExists(_)) => ErrorKind::UserError,
            CatalogError::Store(StoreError::VersionConflict { .. }) => ErrorKind::Retryable,
            CatalogError::Store(StoreError::Unavailable(_)) => ErrorKind::Retryable,
            CatalogError::Store(StoreError::Codec(_)) => ErrorKind::Internal,
            CatalogError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller may retry this operation.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    /// Returns true if this is an input error (retrying the same
    /// statement cannot succeed).
    pub fn is_user_error(&self) -> bool {
        self.kind() == ErrorKind::UserError
    }
}
