//! Caller-facing error type for discovery requests.
//!
//! Every failure below the orchestrator degrades locally (fallback plan,
//! empty step, fail-closed rejection) and never reaches the caller. The only
//! failures that do propagate are violations of the input contract.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The request document or target-field list is unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
