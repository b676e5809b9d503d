pub mod sqlite_store;

use uuid::Uuid;

use crate::model::{PaymentRecord, PaymentStatus, ProviderProfile, WalletTransaction};

/// Persistence seam for payment records, wallet transactions and
/// provider payout profiles.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert-or-update by record id.
    async fn save_payment(&self, record: &PaymentRecord) -> anyhow::Result<()>;
    async fn find_payment(&self, id: Uuid) -> anyhow::Result<Option<PaymentRecord>>;
    async fn find_by_intent(&self, intent_id: &str) -> anyhow::Result<Option<PaymentRecord>>;
    /// The Booking-kind record for a booking (1:1 relationship).
    async fn find_booking_payment(&self, booking_id: Uuid)
        -> anyhow::Result<Option<PaymentRecord>>;

    /// Flip a Pending record to `status`. Returns false when the record
    /// already left Pending, so racing webhook deliveries resolve to
    /// exactly one winner.
    async fn settle_pending(&self, id: Uuid, status: PaymentStatus) -> anyhow::Result<bool>;

    /// Booking-kind records with `release_status = Released` and no
    /// transfer id yet, optionally scoped to one provider. The payout
    /// batch input.
    async fn released_unpaid(
        &self,
        provider_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<PaymentRecord>>;

    // Wallet
    async fn append_transaction(&self, txn: &WalletTransaction) -> anyhow::Result<()>;
    async fn transactions_for(&self, provider_id: Uuid)
        -> anyhow::Result<Vec<WalletTransaction>>;
    /// Sum of all transaction amounts for the provider.
    async fn balance(&self, provider_id: Uuid) -> anyhow::Result<i64>;

    // Provider payout profiles
    async fn upsert_profile(&self, profile: &ProviderProfile) -> anyhow::Result<()>;
    async fn find_profile(&self, provider_id: Uuid) -> anyhow::Result<Option<ProviderProfile>>;
}
