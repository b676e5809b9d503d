//! Abstraction over the external payment gateway.
//!
//! The settlement and payout crates only ever talk to the
//! [`PaymentGateway`] trait; the reqwest-backed client in [`client`]
//! is wired in by the backend binary, and tests substitute mocks.

pub mod client;
pub mod types;
pub mod webhook;

use async_trait::async_trait;

use crate::types::{ChargeInstruction, PaymentIntent, RefundReceipt, TransferReceipt};

/// Money-movement operations this core consumes.
///
/// Implementations must normalize transport errors into `anyhow` errors;
/// the settlement layer maps them to its gateway-failure variant and
/// never auto-retries.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Open a payment intent for `amount_cents`. When `instruction` is
    /// present the gateway routes funds to the provider's connected
    /// account and keeps the application fee for the platform.
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        instruction: Option<ChargeInstruction>,
        metadata_booking_id: &str,
    ) -> anyhow::Result<PaymentIntent>;

    /// Refund `amount_cents` of a previously confirmed intent.
    async fn create_refund(
        &self,
        intent_id: &str,
        amount_cents: i64,
    ) -> anyhow::Result<RefundReceipt>;

    /// Transfer `amount_cents` to a provider's connected account.
    async fn create_transfer(
        &self,
        destination_account: &str,
        amount_cents: i64,
        currency: &str,
    ) -> anyhow::Result<TransferReceipt>;
}
