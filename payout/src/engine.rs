//! Batching engine: one gateway transfer per provider per cycle.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use common::error::CoreError;
use common::time::now;
use gateway::PaymentGateway;
use settlement::events::{emit, DomainEvent, EventSender};
use settlement::model::{PaymentKind, PaymentRecord, PaymentStatus, ReleaseStatus};
use settlement::store::PaymentStore;
use settlement::wallet::ProviderWallet;

use crate::eligibility::{assess, PayoutEligibility};

/// One completed provider transfer.
#[derive(Debug, Clone)]
pub struct ProviderPayout {
    pub provider_id: Uuid,
    pub total_cents: i64,
    pub transfer_id: String,
}

pub struct PayoutEngine {
    payments: Arc<dyn PaymentStore>,
    wallet: Arc<ProviderWallet>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    events: EventSender,
}

impl PayoutEngine {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        wallet: Arc<ProviderWallet>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
        events: EventSender,
    ) -> Self {
        Self {
            payments,
            wallet,
            gateway,
            currency,
            events,
        }
    }

    /// Scheduled cycle over every provider with released funds.
    ///
    /// One provider's gateway failure is logged and skipped so it never
    /// blocks the rest of the batch; their records stay Released and are
    /// picked up again next cycle.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<Vec<ProviderPayout>, CoreError> {
        let records = self.payments.released_unpaid(None).await?;

        let mut by_provider: HashMap<Uuid, Vec<PaymentRecord>> = HashMap::new();
        for record in records {
            by_provider.entry(record.provider_id).or_default().push(record);
        }

        let mut payouts = Vec::new();
        for (provider_id, batch) in by_provider {
            match self.pay_batch(provider_id, batch, true).await {
                Ok(Some(payout)) => payouts.push(payout),
                Ok(None) => {}
                Err(e) => {
                    error!(%provider_id, error = %e, "payout failed; batch deferred");
                }
            }
        }

        info!(transfers = payouts.len(), "payout cycle finished");
        Ok(payouts)
    }

    /// On-demand payout for one provider, ignoring the manual-payouts
    /// opt-out. Skips become errors here so the caller learns why
    /// nothing moved.
    #[instrument(skip(self), fields(%provider_id))]
    pub async fn run_for_provider(&self, provider_id: Uuid) -> Result<ProviderPayout, CoreError> {
        let batch = self.payments.released_unpaid(Some(provider_id)).await?;

        match self.pay_batch(provider_id, batch, false).await? {
            Some(payout) => Ok(payout),
            None => Err(CoreError::conflict(format!(
                "no released funds eligible for payout for provider {provider_id}"
            ))),
        }
    }

    async fn pay_batch(
        &self,
        provider_id: Uuid,
        mut batch: Vec<PaymentRecord>,
        scheduled: bool,
    ) -> Result<Option<ProviderPayout>, CoreError> {
        let total_cents: i64 = batch.iter().map(|r| r.provider_amount_cents).sum();
        let profile = self.payments.find_profile(provider_id).await?;

        let destination = match assess(profile.as_ref(), total_cents, scheduled) {
            PayoutEligibility::Eligible {
                destination_account,
                ..
            } => destination_account,
            skip => {
                info!(%provider_id, ?skip, "provider skipped this cycle");
                return Ok(None);
            }
        };

        let receipt = self
            .gateway
            .create_transfer(&destination, total_cents, &self.currency)
            .await
            .map_err(|e| CoreError::Gateway(e.to_string()))?;

        // The transfer happened; everything below is bookkeeping. A crash
        // here leaves Released records with money already sent, which the
        // next cycle would resend, so stamping comes immediately after.
        for record in &mut batch {
            record.release_status = ReleaseStatus::PaidOut;
            record.gateway_transfer_id = Some(receipt.id.clone());
            self.payments.save_payment(record).await?;
        }

        let audit = PaymentRecord {
            id: Uuid::new_v4(),
            booking_id: Uuid::nil(),
            provider_id,
            kind: PaymentKind::Payout,
            status: PaymentStatus::Completed,
            amount_cents: total_cents,
            platform_fee_cents: 0,
            tax_cents: 0,
            gateway_fee_cents: 0,
            provider_amount_cents: total_cents,
            release_status: ReleaseStatus::PaidOut,
            gateway_intent_id: None,
            gateway_refund_id: None,
            gateway_transfer_id: Some(receipt.id.clone()),
            created_at: now(),
        };
        self.payments.save_payment(&audit).await?;

        self.wallet
            .debit(
                provider_id,
                total_cents,
                format!("payout {}", receipt.id),
                None,
            )
            .await?;

        info!(%provider_id, total_cents, transfer_id = %receipt.id, "provider paid out");
        emit(
            &self.events,
            DomainEvent::PayoutSent {
                provider_id,
                amount_cents: total_cents,
                transfer_id: receipt.id.clone(),
            },
        );

        Ok(Some(ProviderPayout {
            provider_id,
            total_cents,
            transfer_id: receipt.id,
        }))
    }
}
