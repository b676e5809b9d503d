//! Presentation mapping from [`CoreError`] to caller-facing messages.

use common::error::CoreError;
use tracing::error;

/// What a caller may see. Validation, conflict and not-found messages
/// pass through; authorization and internal failures are rendered
/// generically so they never leak entity existence or internals.
///
/// This is the response rendering for the HTTP surface over
/// [`crate::api::BookingApi`]; until that router lands, in-process
/// hosts see [`CoreError`] directly.
pub fn user_message(err: &CoreError) -> String {
    match err {
        CoreError::Validation(msg) => msg.clone(),
        CoreError::Conflict(msg) => msg.clone(),
        CoreError::NotFound(msg) => format!("{msg} not found"),
        CoreError::Authorization(detail) => {
            error!(%detail, "authorization rejected");
            "not authorized".to_string()
        }
        CoreError::Gateway(msg) => {
            error!(%msg, "gateway failure surfaced to caller");
            "payment provider error; please retry".to_string()
        }
        CoreError::Invariant(detail) => {
            error!(%detail, "invariant violation surfaced to caller");
            "internal error".to_string()
        }
        CoreError::Internal(e) => {
            error!(error = %e, "internal error surfaced to caller");
            "internal error".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_detail_is_hidden() {
        let err = CoreError::Authorization("user 42 is not party to booking 7".into());
        assert_eq!(user_message(&err), "not authorized");
    }

    #[test]
    fn validation_detail_passes_through() {
        let err = CoreError::validation("refund amount must be positive");
        assert_eq!(user_message(&err), "refund amount must be positive");
    }
}
