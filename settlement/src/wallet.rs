//! Append-only provider ledger.
//!
//! Mutations for one provider are serialized through a per-provider
//! async mutex so concurrent credit/debit calls cannot lose updates;
//! different providers never contend. The balance is always the sum of
//! transactions — there is no independently mutable balance field.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use common::error::CoreError;
use common::time::now;

use crate::model::{TxnKind, WalletTransaction};
use crate::store::PaymentStore;

pub struct ProviderWallet {
    store: Arc<dyn PaymentStore>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ProviderWallet {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, provider_id: Uuid) -> Arc<Mutex<()>> {
        let mut guard = self.locks.lock().await;
        guard.entry(provider_id).or_default().clone()
    }

    #[instrument(skip(self, description), fields(%provider_id, amount_cents))]
    pub async fn credit(
        &self,
        provider_id: Uuid,
        amount_cents: i64,
        description: impl Into<String>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, CoreError> {
        if amount_cents <= 0 {
            return Err(CoreError::validation("credit amount must be positive"));
        }
        self.append(provider_id, amount_cents, TxnKind::Credit, description, booking_id)
            .await
    }

    /// Debits are never rejected for driving the balance negative: a
    /// refund can land after the funds were already paid out, and the
    /// negative balance is the record that the provider owes the
    /// platform.
    #[instrument(skip(self, description), fields(%provider_id, amount_cents))]
    pub async fn debit(
        &self,
        provider_id: Uuid,
        amount_cents: i64,
        description: impl Into<String>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, CoreError> {
        if amount_cents <= 0 {
            return Err(CoreError::validation("debit amount must be positive"));
        }
        self.append(provider_id, -amount_cents, TxnKind::Debit, description, booking_id)
            .await
    }

    async fn append(
        &self,
        provider_id: Uuid,
        signed_amount: i64,
        kind: TxnKind,
        description: impl Into<String>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, CoreError> {
        let lock = self.lock_for(provider_id).await;
        let _guard = lock.lock().await;

        let txn = WalletTransaction {
            id: Uuid::new_v4(),
            provider_id,
            amount_cents: signed_amount,
            kind,
            description: description.into(),
            booking_id,
            created_at: now(),
        };

        self.store.append_transaction(&txn).await?;

        let balance = self.store.balance(provider_id).await?;
        info!(balance_cents = balance, kind = %txn.kind, "wallet entry appended");

        Ok(txn)
    }

    pub async fn balance(&self, provider_id: Uuid) -> Result<i64, CoreError> {
        Ok(self.store.balance(provider_id).await?)
    }

    /// Balance plus the full transaction history, oldest first.
    pub async fn statement(
        &self,
        provider_id: Uuid,
    ) -> Result<(i64, Vec<WalletTransaction>), CoreError> {
        let transactions = self.store.transactions_for(provider_id).await?;
        let balance: i64 = transactions.iter().map(|t| t.amount_cents).sum();
        Ok((balance, transactions))
    }
}
