use thiserror::Error;

/// Error taxonomy shared by the booking, settlement and payout crates.
///
/// The split matters to callers:
/// - `Validation` is rejected before any state change; resubmit corrected input.
/// - `Conflict` means someone else got there first; the core never retries it.
/// - `Gateway` leaves a Pending payment record in place; the caller may retry.
/// - `Invariant` indicates a bug or data corruption, never a default to paper over.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not authorized")]
    Authorization(String),

    #[error("payment gateway failure: {0}")]
    Gateway(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CoreError::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }
}
