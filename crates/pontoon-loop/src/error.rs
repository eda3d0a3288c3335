//! Host-side error types.
//!
//! These cover genuine host failures only. Script-caused errors never
//! surface here; they travel as rejection reasons or as engine-native
//! exceptions raised by the bridge.

use thiserror::Error;

/// Errors raised by the event loop itself.
#[derive(Debug, Error)]
pub enum LoopError {
    /// The loop has been shut down and no longer accepts work.
    #[error("event loop is shut down")]
    ShutDown,

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for loop operations.
pub type LoopResult<T> = Result<T, LoopError>;
