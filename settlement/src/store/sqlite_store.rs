//! SQLite-backed implementation of [`PaymentStore`].

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use super::PaymentStore;
use crate::model::{
    PaymentKind, PaymentRecord, PaymentStatus, ProviderProfile, ReleaseStatus, TxnKind,
    WalletTransaction,
};
use common::time::{from_ms, to_ms};

pub struct SqlitePaymentStore {
    pool: SqlitePool,
}

impl SqlitePaymentStore {
    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Connect and ensure schema exists.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Self::from_pool(pool).await
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                booking_id TEXT NOT NULL,
                provider_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                platform_fee_cents INTEGER NOT NULL,
                tax_cents INTEGER NOT NULL,
                gateway_fee_cents INTEGER NOT NULL,
                provider_amount_cents INTEGER NOT NULL,
                release_status TEXT NOT NULL,
                gateway_intent_id TEXT,
                gateway_refund_id TEXT,
                gateway_transfer_id TEXT,
                created_at_ms INTEGER NOT NULL
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_transactions (
                id TEXT PRIMARY KEY,
                provider_id TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                kind TEXT NOT NULL,
                description TEXT NOT NULL,
                booking_id TEXT,
                created_at_ms INTEGER NOT NULL
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS provider_profiles (
                provider_id TEXT PRIMARY KEY,
                connected_account_id TEXT,
                payouts_enabled INTEGER NOT NULL CHECK (payouts_enabled IN (0,1)),
                manual_payouts INTEGER NOT NULL CHECK (manual_payouts IN (0,1))
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_payments_intent ON payments(gateway_intent_id);"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_payments_release ON payments(release_status, kind);"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_wallet_provider ON wallet_transactions(provider_id);"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PaymentStore for SqlitePaymentStore {
    async fn save_payment(&self, record: &PaymentRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, booking_id, provider_id, kind, status,
                amount_cents, platform_fee_cents, tax_cents,
                gateway_fee_cents, provider_amount_cents,
                release_status, gateway_intent_id, gateway_refund_id,
                gateway_transfer_id, created_at_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                platform_fee_cents = excluded.platform_fee_cents,
                tax_cents = excluded.tax_cents,
                provider_amount_cents = excluded.provider_amount_cents,
                release_status = excluded.release_status,
                gateway_intent_id = excluded.gateway_intent_id,
                gateway_refund_id = excluded.gateway_refund_id,
                gateway_transfer_id = excluded.gateway_transfer_id;
        "#,
        )
        .bind(record.id.to_string())
        .bind(record.booking_id.to_string())
        .bind(record.provider_id.to_string())
        .bind(record.kind.to_string())
        .bind(record.status.to_string())
        .bind(record.amount_cents)
        .bind(record.platform_fee_cents)
        .bind(record.tax_cents)
        .bind(record.gateway_fee_cents)
        .bind(record.provider_amount_cents)
        .bind(record.release_status.to_string())
        .bind(&record.gateway_intent_id)
        .bind(&record.gateway_refund_id)
        .bind(&record.gateway_transfer_id)
        .bind(to_ms(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_payment(&self, id: Uuid) -> anyhow::Result<Option<PaymentRecord>> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_payment(&r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_intent(&self, intent_id: &str) -> anyhow::Result<Option<PaymentRecord>> {
        let row = sqlx::query("SELECT * FROM payments WHERE gateway_intent_id = ?")
            .bind(intent_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_payment(&r)?)),
            None => Ok(None),
        }
    }

    async fn settle_pending(&self, id: Uuid, status: PaymentStatus) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = ?
            WHERE id = ? AND status = 'Pending';
        "#,
        )
        .bind(status.to_string())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_booking_payment(
        &self,
        booking_id: Uuid,
    ) -> anyhow::Result<Option<PaymentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM payments
            WHERE booking_id = ? AND kind = 'Booking'
            ORDER BY created_at_ms DESC
            LIMIT 1;
        "#,
        )
        .bind(booking_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_payment(&r)?)),
            None => Ok(None),
        }
    }

    async fn released_unpaid(
        &self,
        provider_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<PaymentRecord>> {
        let rows = match provider_id {
            Some(pid) => {
                sqlx::query(
                    r#"
                    SELECT * FROM payments
                    WHERE release_status = 'Released' AND kind = 'Booking'
                      AND status IN ('Completed', 'PartiallyRefunded')
                      AND gateway_transfer_id IS NULL AND provider_id = ?;
                "#,
                )
                .bind(pid.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM payments
                    WHERE release_status = 'Released' AND kind = 'Booking'
                      AND status IN ('Completed', 'PartiallyRefunded')
                      AND gateway_transfer_id IS NULL;
                "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for r in rows {
            records.push(row_to_payment(&r)?);
        }
        Ok(records)
    }

    async fn append_transaction(&self, txn: &WalletTransaction) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, provider_id, amount_cents, kind, description, booking_id, created_at_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?);
        "#,
        )
        .bind(txn.id.to_string())
        .bind(txn.provider_id.to_string())
        .bind(txn.amount_cents)
        .bind(txn.kind.to_string())
        .bind(&txn.description)
        .bind(txn.booking_id.map(|b| b.to_string()))
        .bind(to_ms(txn.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transactions_for(
        &self,
        provider_id: Uuid,
    ) -> anyhow::Result<Vec<WalletTransaction>> {
        let rows = sqlx::query(
            "SELECT * FROM wallet_transactions WHERE provider_id = ? ORDER BY created_at_ms",
        )
        .bind(provider_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut txns = Vec::with_capacity(rows.len());
        for r in rows {
            txns.push(row_to_txn(&r)?);
        }
        Ok(txns)
    }

    async fn balance(&self, provider_id: Uuid) -> anyhow::Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount_cents), 0) AS balance FROM wallet_transactions WHERE provider_id = ?",
        )
        .bind(provider_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("balance"))
    }

    async fn upsert_profile(&self, profile: &ProviderProfile) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_profiles (
                provider_id, connected_account_id, payouts_enabled, manual_payouts
            )
            VALUES (?, ?, ?, ?)
            ON CONFLICT(provider_id) DO UPDATE SET
                connected_account_id = excluded.connected_account_id,
                payouts_enabled = excluded.payouts_enabled,
                manual_payouts = excluded.manual_payouts;
        "#,
        )
        .bind(profile.provider_id.to_string())
        .bind(&profile.connected_account_id)
        .bind(profile.payouts_enabled as i64)
        .bind(profile.manual_payouts as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_profile(&self, provider_id: Uuid) -> anyhow::Result<Option<ProviderProfile>> {
        let row = sqlx::query("SELECT * FROM provider_profiles WHERE provider_id = ?")
            .bind(provider_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(ProviderProfile {
                provider_id: parse_uuid(&r, "provider_id")?,
                connected_account_id: r.get("connected_account_id"),
                payouts_enabled: r.get::<i64, _>("payouts_enabled") == 1,
                manual_payouts: r.get::<i64, _>("manual_payouts") == 1,
            })),
            None => Ok(None),
        }
    }
}

/* =========================
Row mapping
========================= */

fn row_to_payment(r: &sqlx::sqlite::SqliteRow) -> anyhow::Result<PaymentRecord> {
    let kind_str: String = r.get("kind");
    let status_str: String = r.get("status");
    let release_str: String = r.get("release_status");

    Ok(PaymentRecord {
        id: parse_uuid(r, "id")?,
        booking_id: parse_uuid(r, "booking_id")?,
        provider_id: parse_uuid(r, "provider_id")?,
        kind: PaymentKind::from_str(&kind_str)?,
        status: PaymentStatus::from_str(&status_str)?,
        amount_cents: r.get("amount_cents"),
        platform_fee_cents: r.get("platform_fee_cents"),
        tax_cents: r.get("tax_cents"),
        gateway_fee_cents: r.get("gateway_fee_cents"),
        provider_amount_cents: r.get("provider_amount_cents"),
        release_status: ReleaseStatus::from_str(&release_str)?,
        gateway_intent_id: r.get("gateway_intent_id"),
        gateway_refund_id: r.get("gateway_refund_id"),
        gateway_transfer_id: r.get("gateway_transfer_id"),
        created_at: from_ms(r.get("created_at_ms"))?,
    })
}

fn row_to_txn(r: &sqlx::sqlite::SqliteRow) -> anyhow::Result<WalletTransaction> {
    let kind_str: String = r.get("kind");
    let booking_id = r
        .get::<Option<String>, _>("booking_id")
        .map(|s| Uuid::parse_str(&s))
        .transpose()?;

    Ok(WalletTransaction {
        id: parse_uuid(r, "id")?,
        provider_id: parse_uuid(r, "provider_id")?,
        amount_cents: r.get("amount_cents"),
        kind: TxnKind::from_str(&kind_str)?,
        description: r.get("description"),
        booking_id,
        created_at: from_ms(r.get("created_at_ms"))?,
    })
}

fn parse_uuid(r: &sqlx::sqlite::SqliteRow, column: &str) -> anyhow::Result<Uuid> {
    let s: String = r.get(column);
    Ok(Uuid::parse_str(&s)?)
}
