//! Bridge-level error types.
//!
//! These are host-facing errors for the embedding layer, fatal to
//! adapter setup rather than per-call. Script-caused failures never
//! appear here; they surface as thrown script values or rejections.

use pontoon_loop::LoopError;
use thiserror::Error;

/// Errors raised by bridge construction and installation.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The global surface was already installed into this scope.
    #[error("promise globals already installed (found existing `{0}` binding)")]
    AlreadyInstalled(String),

    /// Underlying scheduler failure.
    #[error(transparent)]
    Loop(#[from] LoopError),
}

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
