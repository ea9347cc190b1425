//! Error types for the patch engine.
//!
//! Every variant maps to a recovery behavior: configuration errors poison
//! only `init`, everything else is recovered locally without mutating
//! persisted state. Errors never cross the C boundary; the FFI layer
//! translates them into negative return values.

/// Result type alias for patch engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the patch engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// A caller-supplied configuration field was missing or malformed.
    #[error("invalid configuration: {field}: {reason}")]
    Config { field: String, reason: String },

    /// The engine was already initialized in this process.
    #[error("patch engine already initialized")]
    AlreadyInitialized,

    /// An operation was attempted before a successful `init`.
    #[error("patch engine not initialized")]
    NotInitialized,

    // =========================================================================
    // Network Errors
    // =========================================================================
    /// Transport failure reaching the update service.
    #[error("network error: {0}")]
    Network(String),

    /// The update service returned a response the engine cannot act on.
    #[error("malformed server response: {0}")]
    BadServerResponse(String),

    // =========================================================================
    // Verification Errors
    // =========================================================================
    /// A downloaded artifact did not match its expected checksum.
    #[error("patch {number} failed verification: expected {expected}, computed {computed}")]
    Verification {
        number: u64,
        expected: String,
        computed: String,
    },

    /// A diff artifact could not be applied to the baseline.
    #[error("malformed patch delta: {0}")]
    Delta(String),

    /// A downloaded artifact's signature did not verify against the
    /// configured public key.
    #[error("patch signature rejected: {0}")]
    Signature(String),

    // =========================================================================
    // State Machine Errors
    // =========================================================================
    /// An operation conflicts with the current patch lifecycle state.
    #[error("invalid state: {0}")]
    State(String),

    /// A launch report arrived out of order and was ignored.
    #[error("out-of-order launch report: {0}")]
    Ordering(String),

    /// Another update is already in flight.
    #[error("update already in progress")]
    UpdateInProgress,

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The boot-record document could not be persisted.
    #[error("failed to persist boot records: {0}")]
    Storage(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
