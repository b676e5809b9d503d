//! Operation surface over the booking and settlement cores.
//!
//! Callers are pre-authenticated; `Caller` is trusted input. This layer
//! does ownership and role checks, sequences the core calls, and leaves
//! transport (HTTP, queues) to whatever hosts it.

use std::sync::Arc;

use chrono::TimeZone;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use booking::coordinator::ReservationCoordinator;
use booking::model::{Booking, BookingStatus};
use booking::registry::SlotRegistry;
use booking::store::BookingStore;
use common::error::CoreError;
use common::logger::TraceId;
use common::time::now;
use gateway::webhook::{parse_event, WebhookEvent};
use payout::engine::{PayoutEngine, ProviderPayout};
use settlement::ledger::SettlementLedger;
use settlement::model::WalletTransaction;
use settlement::refund::refund_amount;
use settlement::wallet::ProviderWallet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Provider,
    Admin,
}

#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub service_id: Uuid,
    pub slot_id: Uuid,
    pub segment_index: u32,
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct ReserveResponse {
    pub booking_id: Uuid,
    /// Gateway client secret the caller uses to complete the charge.
    pub client_token: String,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub booking_id: Uuid,
    pub amount_cents: i64,
}

#[derive(Debug, Clone)]
pub struct WalletStatement {
    pub provider_id: Uuid,
    pub balance_cents: i64,
    pub transactions: Vec<WalletTransaction>,
}

pub struct BookingApi {
    registry: Arc<SlotRegistry>,
    coordinator: Arc<ReservationCoordinator>,
    bookings: Arc<dyn BookingStore>,
    ledger: Arc<SettlementLedger>,
    wallet: Arc<ProviderWallet>,
    payouts: Arc<PayoutEngine>,
    webhook_secret: String,
}

impl BookingApi {
    pub fn new(
        registry: Arc<SlotRegistry>,
        coordinator: Arc<ReservationCoordinator>,
        bookings: Arc<dyn BookingStore>,
        ledger: Arc<SettlementLedger>,
        wallet: Arc<ProviderWallet>,
        payouts: Arc<PayoutEngine>,
        webhook_secret: String,
    ) -> Self {
        Self {
            registry,
            coordinator,
            bookings,
            ledger,
            wallet,
            payouts,
            webhook_secret,
        }
    }

    /// Claim one segment for the caller and open a payment intent.
    ///
    /// The reservation holds the segment until the intent is confirmed,
    /// fails, or the TTL reaper releases it. A gateway outage leaves the
    /// claim in place so the caller can retry the charge.
    #[instrument(
        skip(self, req),
        fields(trace_id = %TraceId::new(), slot_id = %req.slot_id, index = req.segment_index)
    )]
    pub async fn reserve_segment(
        &self,
        caller: Caller,
        req: ReserveRequest,
    ) -> Result<ReserveResponse, CoreError> {
        let service = self
            .bookings
            .find_service(req.service_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("service {}", req.service_id)))?;
        let slot = self
            .bookings
            .find_slot(req.slot_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("slot {}", req.slot_id)))?;
        if slot.service_id != service.id {
            return Err(CoreError::validation("slot does not belong to this service"));
        }

        let segment = self
            .registry
            .get_or_create_segment(req.slot_id, req.segment_index)
            .await?;

        let scheduled_start =
            Utc.from_utc_datetime(&slot.date.and_time(segment.start_time));

        let booking = Booking {
            id: Uuid::new_v4(),
            service_id: service.id,
            client_id: caller.user_id,
            provider_id: slot.provider_id,
            slot_id: slot.id,
            segment_index: segment.index,
            scheduled_start,
            duration_minutes: service.duration_minutes,
            status: BookingStatus::Reserved,
            address: req.address,
            total_price_cents: service.price_cents,
            reserved_at: now(),
        };

        self.coordinator.reserve(&booking).await?;
        let handle = self.ledger.create_intent(&booking).await?;

        info!(booking_id = %booking.id, "segment reserved, intent opened");
        Ok(ReserveResponse {
            booking_id: booking.id,
            client_token: handle.client_token,
        })
    }

    /// Direct confirmation path for trusted internal callers; webhook
    /// deliveries land in [`Self::handle_gateway_webhook`].
    pub async fn confirm_payment(&self, intent_id: &str) -> Result<(), CoreError> {
        self.ledger.confirm(intent_id).await
    }

    /// Verify and apply one gateway webhook delivery.
    #[instrument(skip_all, fields(trace_id = %TraceId::new()))]
    pub async fn handle_gateway_webhook(
        &self,
        raw_body: &str,
        signature: &str,
    ) -> Result<(), CoreError> {
        let event = parse_event(raw_body, signature, &self.webhook_secret)
            .map_err(|e| CoreError::Authorization(format!("webhook rejected: {e}")))?;

        match event {
            WebhookEvent::IntentSucceeded { intent_id } => self.ledger.confirm(&intent_id).await,
            WebhookEvent::IntentFailed { intent_id } => self.ledger.fail(&intent_id).await,
            WebhookEvent::ChargeRefunded { intent_id } => {
                // Refunds originate here, so the gateway's echo is audit
                // trail only.
                info!(%intent_id, "gateway acknowledged refund");
                Ok(())
            }
        }
    }

    /// Cancel-with-refund. For future bookings any party may request it
    /// and the amount follows the cancellation policy; once the service
    /// time has passed only an admin may refund, and in full.
    #[instrument(skip(self, caller), fields(%booking_id))]
    pub async fn request_refund(
        &self,
        caller: Caller,
        booking_id: Uuid,
    ) -> Result<RefundOutcome, CoreError> {
        let booking = self.coordinator.find_booking(booking_id).await?;
        self.ensure_party(&caller, &booking)?;

        let requested_at = now();
        let (amount_cents, reason) = if requested_at < booking.scheduled_start {
            let hours = (booking.scheduled_start - requested_at).num_minutes() as f64 / 60.0;
            let amount = refund_amount(
                booking.total_price_cents,
                booking.scheduled_start,
                requested_at,
            );
            if amount == 0 {
                return Err(CoreError::conflict(
                    "cancellation window passed; no refund due",
                ));
            }
            (amount, format!("cancellation {hours:.1}h before service"))
        } else {
            if !caller.is_admin() {
                return Err(CoreError::Authorization(format!(
                    "user {} asked to refund past booking {booking_id}",
                    caller.user_id
                )));
            }
            (booking.total_price_cents, "admin refund".to_string())
        };

        let record = self.ledger.refund(booking_id, amount_cents, &reason).await?;

        if requested_at < booking.scheduled_start {
            self.coordinator
                .set_booking_status(booking_id, BookingStatus::Cancelled)
                .await?;
        }

        Ok(RefundOutcome {
            booking_id,
            amount_cents: -record.amount_cents,
        })
    }

    /// Mark the service rendered and release the provider's share for
    /// payout.
    #[instrument(skip(self, caller), fields(%booking_id))]
    pub async fn complete_booking(
        &self,
        caller: Caller,
        booking_id: Uuid,
    ) -> Result<(), CoreError> {
        let booking = self.coordinator.find_booking(booking_id).await?;
        if !caller.is_admin() && caller.user_id != booking.provider_id {
            return Err(CoreError::Authorization(format!(
                "user {} asked to complete booking {booking_id}",
                caller.user_id
            )));
        }

        match booking.status {
            BookingStatus::Confirmed | BookingStatus::InProgress => {}
            other => {
                return Err(CoreError::conflict(format!(
                    "booking {booking_id} is {other}; only confirmed bookings can be completed"
                )));
            }
        }

        self.coordinator
            .set_booking_status(booking_id, BookingStatus::Completed)
            .await?;
        self.ledger.release(booking_id).await?;

        info!("booking completed; provider share released");
        Ok(())
    }

    pub async fn get_provider_wallet(
        &self,
        caller: Caller,
        provider_id: Uuid,
    ) -> Result<WalletStatement, CoreError> {
        self.ensure_self_or_admin(&caller, provider_id)?;

        let (balance_cents, transactions) = self.wallet.statement(provider_id).await?;
        Ok(WalletStatement {
            provider_id,
            balance_cents,
            transactions,
        })
    }

    /// On-demand payout of everything currently released for the
    /// provider.
    pub async fn request_payout(
        &self,
        caller: Caller,
        provider_id: Uuid,
    ) -> Result<ProviderPayout, CoreError> {
        self.ensure_self_or_admin(&caller, provider_id)?;
        self.payouts.run_for_provider(provider_id).await
    }

    /// One scheduled payout cycle over all providers.
    pub async fn run_scheduled_payouts(&self) -> Result<Vec<ProviderPayout>, CoreError> {
        self.payouts.run_cycle().await
    }

    fn ensure_party(&self, caller: &Caller, booking: &Booking) -> Result<(), CoreError> {
        if caller.is_admin()
            || caller.user_id == booking.client_id
            || caller.user_id == booking.provider_id
        {
            Ok(())
        } else {
            Err(CoreError::Authorization(format!(
                "user {} is not party to booking {}",
                caller.user_id, booking.id
            )))
        }
    }

    fn ensure_self_or_admin(&self, caller: &Caller, provider_id: Uuid) -> Result<(), CoreError> {
        if caller.is_admin() || caller.user_id == provider_id {
            Ok(())
        } else {
            Err(CoreError::Authorization(format!(
                "user {} asked for provider {provider_id}",
                caller.user_id
            )))
        }
    }
}
