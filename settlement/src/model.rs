use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentKind {
    /// A client paying for a booking.
    Booking,
    /// A reversal of (part of) a booking payment; amounts are negative.
    Refund,
    /// Synthetic audit row written when a provider payout batch is sent.
    Payout,
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentKind::Booking => "Booking",
            PaymentKind::Refund => "Refund",
            PaymentKind::Payout => "Payout",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Booking" => Ok(PaymentKind::Booking),
            "Refund" => Ok(PaymentKind::Refund),
            "Payout" => Ok(PaymentKind::Payout),
            other => Err(anyhow::anyhow!("Invalid PaymentKind value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    /// Terminal states absorb webhook redeliveries as no-ops.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
            PaymentStatus::PartiallyRefunded => "PartiallyRefunded",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Completed" => Ok(PaymentStatus::Completed),
            "Failed" => Ok(PaymentStatus::Failed),
            "Refunded" => Ok(PaymentStatus::Refunded),
            "PartiallyRefunded" => Ok(PaymentStatus::PartiallyRefunded),
            other => Err(anyhow::anyhow!("Invalid PaymentStatus value: {}", other)),
        }
    }
}

/// Escrow position of a completed payment's provider share. Funds become
/// payout-eligible only once the service is actually rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    Held,
    Released,
    PaidOut,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseStatus::Held => "Held",
            ReleaseStatus::Released => "Released",
            ReleaseStatus::PaidOut => "PaidOut",
        };
        f.write_str(s)
    }
}

impl FromStr for ReleaseStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Held" => Ok(ReleaseStatus::Held),
            "Released" => Ok(ReleaseStatus::Released),
            "PaidOut" => Ok(ReleaseStatus::PaidOut),
            other => Err(anyhow::anyhow!("Invalid ReleaseStatus value: {}", other)),
        }
    }
}

/// One row per money movement. A Booking-kind record is 1:1 with its
/// booking; Refund rows carry the booking id for traceability, and
/// Payout rows cover a whole batch so they use the nil id.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider_id: Uuid,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub tax_cents: i64,
    /// What the gateway charges the platform for processing. Reporting
    /// only; never deducted from any party's share.
    pub gateway_fee_cents: i64,
    pub provider_amount_cents: i64,
    pub release_status: ReleaseStatus,
    pub gateway_intent_id: Option<String>,
    pub gateway_refund_id: Option<String>,
    pub gateway_transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnKind {
    Credit,
    Debit,
}

impl fmt::Display for TxnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxnKind::Credit => "Credit",
            TxnKind::Debit => "Debit",
        };
        f.write_str(s)
    }
}

impl FromStr for TxnKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit" => Ok(TxnKind::Credit),
            "Debit" => Ok(TxnKind::Debit),
            other => Err(anyhow::anyhow!("Invalid TxnKind value: {}", other)),
        }
    }
}

/// Append-only provider ledger entry. `amount_cents` is signed: positive
/// for credits, negative for debits; the wallet balance is the running
/// sum of these rows and nothing else.
#[derive(Debug, Clone)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub amount_cents: i64,
    pub kind: TxnKind,
    pub description: String,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Payout routing data for one provider.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub provider_id: Uuid,
    pub connected_account_id: Option<String>,
    pub payouts_enabled: bool,
    /// Provider opted out of scheduled payouts; they request them.
    pub manual_payouts: bool,
}

impl ProviderProfile {
    /// Whether charges can be routed straight to the provider's
    /// connected account with an application fee.
    pub fn can_route_charges(&self) -> bool {
        self.payouts_enabled && self.connected_account_id.is_some()
    }
}
