//! Error types for the sync engine

use crate::store::InvariantViolation;
use crate::types::{CardId, ColumnId};
use thiserror::Error;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while reordering or synchronizing a board
#[derive(Debug, Error)]
pub enum SyncError {
    /// Card not present in the snapshot
    #[error("card not found: {id}")]
    CardNotFound { id: CardId },

    /// Column not present in the snapshot
    #[error("column not found: {id}")]
    ColumnNotFound { id: ColumnId },

    /// A gesture's source does not match where the item actually sits
    #[error("{item} is not at {expected}")]
    PositionMismatch { item: String, expected: String },

    /// An operation needs a loaded snapshot
    #[error("no board snapshot is loaded")]
    NoSnapshot,

    /// Network unreachable or timed out
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The remote store answered with a non-success status
    #[error("remote store rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// A response belonging to a superseded snapshot load
    #[error("stale response from generation {issued} (current generation is {current})")]
    StaleGeneration { issued: u64, current: u64 },

    /// A snapshot broke an ordering invariant
    #[error("ordering invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Invalid field value
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] kanban_sync_config::ConfigError),

    /// A response body that does not decode into the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a rejection error
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Failures of the remote call itself, as opposed to local defects
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Rejected { .. })
    }

    /// Local precondition violations: the gesture referenced something the
    /// snapshot does not hold where it claims
    pub fn is_invalid_move(&self) -> bool {
        matches!(
            self,
            Self::CardNotFound { .. } | Self::ColumnNotFound { .. } | Self::PositionMismatch { .. }
        )
    }

    /// Whether the remote state may now differ from the local snapshot
    pub fn requires_reload(&self) -> bool {
        self.is_transport()
    }
}
