//! Domain events for downstream notification.
//!
//! The core only emits; rendering and delivery live outside. Emission is
//! best-effort: a full channel drops the event with a warning rather
//! than blocking a settlement transition on a slow consumer.

use tokio::sync::mpsc::Sender;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum DomainEvent {
    PaymentConfirmed {
        booking_id: Uuid,
        provider_id: Uuid,
        amount_cents: i64,
    },
    RefundIssued {
        booking_id: Uuid,
        amount_cents: i64,
        reason: String,
    },
    PayoutSent {
        provider_id: Uuid,
        amount_cents: i64,
        transfer_id: String,
    },
}

pub type EventSender = Sender<DomainEvent>;

pub fn emit(tx: &EventSender, event: DomainEvent) {
    if let Err(e) = tx.try_send(event) {
        warn!(error = %e, "domain event dropped; channel unavailable");
    }
}
