//! # Sync Error Types
//!
//! Error types for cache, store and write operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Availability   │  │     Input       │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotInitialized │  │  Validation     │  │  InvalidConfig          │ │
//! │  │  NotFound       │  │  InvalidRecord  │  │  ConfigLoadFailed       │ │
//! │  │  Unavailable    │  │  InvalidQuery   │  │  ConfigSaveFailed       │ │
//! │  │  Store          │  │  Malformed      │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │     Outbox      │  │                 Internal                    │  │
//! │  │                 │  │                                             │  │
//! │  │  Serialization  │  │  ChannelError, Internal                     │  │
//! │  │                 │  │                                             │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Display` of a `SyncError` is the error string handed to callers.

use thiserror::Error;

use goldtea_core::{CoreError, ValidationError};
use goldtea_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible cache and sync failures.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Availability Errors
    // =========================================================================
    /// The service was built without a store.
    #[error("Data service not initialized")]
    NotInitialized,

    /// A single requested entity does not exist.
    #[error("{collection} not found: {id}")]
    NotFound { collection: String, id: String },

    /// Transient store or network failure.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Store failure that retrying will not fix by itself.
    #[error("Store error: {0}")]
    Store(String),

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Record failed validation before any write was issued.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Record rejected by a domain rule (e.g. overpayment).
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Query uses an unsupported field or limit.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Stored document does not decode into the expected record.
    #[error("Malformed {collection} document {id}: {reason}")]
    MalformedDocument {
        collection: String,
        id: String,
        reason: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Outbox Errors
    // =========================================================================
    /// Failed to serialize or deserialize a queued operation.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

/// Convert database errors to SyncError.
///
/// ## Error Mapping
/// ```text
/// DbError::ConnectionFailed / PoolExhausted → SyncError::Unavailable
/// DbError::NotFound                         → SyncError::NotFound
/// DbError::InvalidQuery                     → SyncError::InvalidQuery
/// DbError::Serialization                    → SyncError::SerializationFailed
/// everything else                           → SyncError::Store
/// ```
impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        if err.is_connectivity() {
            return SyncError::Unavailable(err.to_string());
        }
        match err {
            DbError::NotFound { entity, id } => SyncError::NotFound {
                collection: entity,
                id,
            },
            DbError::InvalidQuery(msg) => SyncError::InvalidQuery(msg),
            DbError::Serialization(msg) => SyncError::SerializationFailed(msg),
            other => SyncError::Store(other.to_string()),
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => SyncError::Validation(v),
            CoreError::MalformedDocument { entity, id, reason } => SyncError::MalformedDocument {
                collection: entity,
                id,
                reason,
            },
            other => SyncError::InvalidRecord(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the failed operation may succeed when retried later.
    ///
    /// ## Retryable Errors
    /// - Store unreachable (network issues, offline)
    /// - Store-side failures
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Validation and malformed data
    /// - Not initialized / not found
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Unavailable(_) | SyncError::Store(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the caller supplied bad input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SyncError::Validation(_)
                | SyncError::InvalidRecord(_)
                | SyncError::InvalidQuery(_)
        )
    }

    /// Shorthand for a missing entity.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        SyncError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}
