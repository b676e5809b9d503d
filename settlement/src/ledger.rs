//! Payment-intent lifecycle.
//!
//! The ledger is the single writer of [`PaymentRecord`] transitions and
//! of wallet entries on the booking path. Gateway webhooks may arrive
//! duplicated, concurrently, or out of order, so `confirm` and `fail`
//! are no-ops on any record that already reached a terminal status and
//! flip Pending with a guarded update, settling each intent exactly
//! once.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use booking::coordinator::ReservationCoordinator;
use booking::model::{Booking, BookingStatus};
use common::error::CoreError;
use common::time::now;
use gateway::types::ChargeInstruction;
use gateway::PaymentGateway;

use crate::events::{emit, DomainEvent, EventSender};
use crate::fees::{round_ratio, FeePolicy};
use crate::model::{PaymentKind, PaymentRecord, PaymentStatus, ReleaseStatus};
use crate::store::PaymentStore;
use crate::wallet::ProviderWallet;

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub currency: String,
    /// Gateways reject charges below their floor; anything smaller is
    /// charged at the floor while the ledger keeps the true split.
    pub minimum_chargeable_cents: i64,
    pub fee_policy: FeePolicy,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            minimum_chargeable_cents: 50,
            fee_policy: FeePolicy::default(),
        }
    }
}

/// What the booking client needs to complete the charge.
#[derive(Debug, Clone)]
pub struct IntentHandle {
    pub payment_record_id: Uuid,
    pub client_token: String,
}

pub struct SettlementLedger {
    payments: Arc<dyn PaymentStore>,
    coordinator: Arc<ReservationCoordinator>,
    wallet: Arc<ProviderWallet>,
    gateway: Arc<dyn PaymentGateway>,
    cfg: SettlementConfig,
    events: EventSender,
}

impl SettlementLedger {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        coordinator: Arc<ReservationCoordinator>,
        wallet: Arc<ProviderWallet>,
        gateway: Arc<dyn PaymentGateway>,
        cfg: SettlementConfig,
        events: EventSender,
    ) -> Self {
        Self {
            payments,
            coordinator,
            wallet,
            gateway,
            cfg,
            events,
        }
    }

    /// Open a payment intent for a reserved booking.
    ///
    /// The Pending record is persisted before the gateway call so a
    /// crash mid-flight leaves a row the reaper can reconcile. On
    /// gateway failure the record stays Pending with no intent id and
    /// the reservation keeps ticking toward its TTL.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    pub async fn create_intent(&self, booking: &Booking) -> Result<IntentHandle, CoreError> {
        if booking.status != BookingStatus::Reserved {
            return Err(CoreError::conflict(format!(
                "booking {} is {}, expected Reserved",
                booking.id, booking.status
            )));
        }
        if booking.total_price_cents <= 0 {
            return Err(CoreError::validation("booking price must be positive"));
        }

        if let Some(existing) = self.payments.find_booking_payment(booking.id).await? {
            if existing.status != PaymentStatus::Failed {
                return Err(CoreError::conflict(format!(
                    "payment already initiated for booking {} ({})",
                    booking.id, existing.status
                )));
            }
        }

        let breakdown = self.cfg.fee_policy.decompose(booking.total_price_cents);

        let mut record = PaymentRecord {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            provider_id: booking.provider_id,
            kind: PaymentKind::Booking,
            status: PaymentStatus::Pending,
            amount_cents: booking.total_price_cents,
            platform_fee_cents: breakdown.platform_fee_cents,
            tax_cents: breakdown.tax_cents,
            gateway_fee_cents: breakdown.gateway_fee_cents,
            provider_amount_cents: breakdown.provider_amount_cents,
            release_status: ReleaseStatus::Held,
            gateway_intent_id: None,
            gateway_refund_id: None,
            gateway_transfer_id: None,
            created_at: now(),
        };
        self.payments.save_payment(&record).await?;

        let instruction = match self.payments.find_profile(booking.provider_id).await? {
            Some(profile) if profile.can_route_charges() => Some(ChargeInstruction {
                destination_account: profile
                    .connected_account_id
                    .clone()
                    .ok_or_else(|| CoreError::Invariant("routable profile without account".into()))?,
                application_fee_cents: breakdown.platform_fee_cents + breakdown.tax_cents,
            }),
            _ => None,
        };

        let charge_cents = record.amount_cents.max(self.cfg.minimum_chargeable_cents);
        let intent = self
            .gateway
            .create_payment_intent(
                charge_cents,
                &self.cfg.currency,
                instruction,
                &booking.id.to_string(),
            )
            .await
            .map_err(|e| CoreError::Gateway(e.to_string()))?;

        record.gateway_intent_id = Some(intent.id.clone());
        self.payments.save_payment(&record).await?;

        self.coordinator
            .set_booking_status(booking.id, BookingStatus::Pending)
            .await?;

        info!(intent_id = %intent.id, amount_cents = charge_cents, "payment intent opened");

        Ok(IntentHandle {
            payment_record_id: record.id,
            client_token: intent.client_secret,
        })
    }

    /// Settle a successful charge: record Completed, flip the segment to
    /// Booked, confirm the booking and credit the provider's share.
    #[instrument(skip(self))]
    pub async fn confirm(&self, intent_id: &str) -> Result<(), CoreError> {
        let record = self
            .payments
            .find_by_intent(intent_id)
            .await?
            .ok_or_else(|| CoreError::Invariant(format!("no payment for intent {intent_id}")))?;

        if record.status.is_terminal() {
            info!(status = %record.status, "intent already settled; ignoring");
            return Ok(());
        }

        // Redeliveries of the same event can race past the read above;
        // the guarded flip picks the one delivery that settles.
        if !self
            .payments
            .settle_pending(record.id, PaymentStatus::Completed)
            .await?
        {
            info!("intent settled concurrently; ignoring");
            return Ok(());
        }

        let booking = self.coordinator.find_booking(record.booking_id).await?;
        self.coordinator
            .confirm(booking.slot_id, booking.segment_index, booking.id)
            .await?;

        if record.provider_amount_cents > 0 {
            self.wallet
                .credit(
                    record.provider_id,
                    record.provider_amount_cents,
                    format!("booking {} payment", record.booking_id),
                    Some(record.booking_id),
                )
                .await?;
        }

        emit(
            &self.events,
            DomainEvent::PaymentConfirmed {
                booking_id: record.booking_id,
                provider_id: record.provider_id,
                amount_cents: record.amount_cents,
            },
        );

        Ok(())
    }

    /// Record a failed charge and put the segment back on the market.
    #[instrument(skip(self))]
    pub async fn fail(&self, intent_id: &str) -> Result<(), CoreError> {
        let record = self
            .payments
            .find_by_intent(intent_id)
            .await?
            .ok_or_else(|| CoreError::Invariant(format!("no payment for intent {intent_id}")))?;

        if record.status.is_terminal() {
            info!(status = %record.status, "intent already settled; ignoring failure");
            return Ok(());
        }

        if !self
            .payments
            .settle_pending(record.id, PaymentStatus::Failed)
            .await?
        {
            info!("intent settled concurrently; ignoring failure");
            return Ok(());
        }

        let booking = self.coordinator.find_booking(record.booking_id).await?;
        self.coordinator
            .release(booking.slot_id, booking.segment_index, booking.id)
            .await?;

        warn!(booking_id = %record.booking_id, "payment failed; reservation released");
        Ok(())
    }

    /// Issue a refund of `amount_cents` against the booking's payment.
    ///
    /// The fee and tax components are clawed back proportionally to how
    /// much of the original charge is being returned; the provider share
    /// is whatever remains, which keeps the three parts summing to the
    /// refund exactly.
    #[instrument(skip(self, reason), fields(%booking_id, amount_cents))]
    pub async fn refund(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
        reason: &str,
    ) -> Result<PaymentRecord, CoreError> {
        let mut original = self
            .payments
            .find_booking_payment(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("payment for booking {booking_id}")))?;

        if original.status != PaymentStatus::Completed {
            return Err(CoreError::conflict(format!(
                "payment for booking {booking_id} is {}, only Completed payments are refundable",
                original.status
            )));
        }
        if amount_cents <= 0 {
            return Err(CoreError::validation("refund amount must be positive"));
        }
        if amount_cents > original.amount_cents {
            return Err(CoreError::validation(format!(
                "refund of {amount_cents} exceeds original charge of {}",
                original.amount_cents
            )));
        }
        if original.release_status == ReleaseStatus::PaidOut {
            return Err(CoreError::conflict(
                "provider share already paid out; refund must be handled manually",
            ));
        }

        let intent_id = original
            .gateway_intent_id
            .clone()
            .ok_or_else(|| CoreError::Invariant("completed payment without an intent id".into()))?;

        let receipt = self
            .gateway
            .create_refund(&intent_id, amount_cents)
            .await
            .map_err(|e| CoreError::Gateway(e.to_string()))?;

        let platform_fee_refund =
            round_ratio(amount_cents, original.platform_fee_cents, original.amount_cents);
        let tax_refund = round_ratio(amount_cents, original.tax_cents, original.amount_cents);
        let provider_refund = amount_cents - platform_fee_refund - tax_refund;

        let refund_record = PaymentRecord {
            id: Uuid::new_v4(),
            booking_id,
            provider_id: original.provider_id,
            kind: PaymentKind::Refund,
            status: PaymentStatus::Completed,
            amount_cents: -amount_cents,
            platform_fee_cents: -platform_fee_refund,
            tax_cents: -tax_refund,
            gateway_fee_cents: 0,
            provider_amount_cents: -provider_refund,
            release_status: ReleaseStatus::Held,
            gateway_intent_id: Some(intent_id),
            gateway_refund_id: Some(receipt.id.clone()),
            gateway_transfer_id: None,
            created_at: now(),
        };
        self.payments.save_payment(&refund_record).await?;

        // Net the refunded components out of the original record so the
        // payout path sees what the provider is still owed; the Refund
        // row above keeps the audit of what was returned.
        original.platform_fee_cents -= platform_fee_refund;
        original.tax_cents -= tax_refund;
        original.provider_amount_cents -= provider_refund;
        original.status = if amount_cents == original.amount_cents {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.payments.save_payment(&original).await?;

        if provider_refund > 0 {
            self.wallet
                .debit(
                    original.provider_id,
                    provider_refund,
                    format!("booking {booking_id} refund: {reason}"),
                    Some(booking_id),
                )
                .await?;
        }

        info!(refund_id = %receipt.id, provider_refund, "refund issued");
        emit(
            &self.events,
            DomainEvent::RefundIssued {
                booking_id,
                amount_cents,
                reason: reason.to_string(),
            },
        );

        Ok(refund_record)
    }

    /// Mark a completed payment's provider share payout-eligible,
    /// typically when the booking is completed. Already-released and
    /// paid-out shares are left alone.
    #[instrument(skip(self), fields(%booking_id))]
    pub async fn release(&self, booking_id: Uuid) -> Result<(), CoreError> {
        let mut record = self
            .payments
            .find_booking_payment(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("payment for booking {booking_id}")))?;

        match record.status {
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded => {}
            other => {
                return Err(CoreError::conflict(format!(
                    "payment for booking {booking_id} is {other}; nothing to release"
                )));
            }
        }

        if record.release_status != ReleaseStatus::Held {
            info!(release_status = %record.release_status, "share already released; ignoring");
            return Ok(());
        }

        record.release_status = ReleaseStatus::Released;
        self.payments.save_payment(&record).await?;

        info!(amount_cents = record.provider_amount_cents, "provider share released");
        Ok(())
    }

    pub async fn payment_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<PaymentRecord, CoreError> {
        self.payments
            .find_booking_payment(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("payment for booking {booking_id}")))
    }
}
