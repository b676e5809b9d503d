use serde::Deserialize;

/// Destination routing for a charge: send the provider's share to their
/// connected account and keep `application_fee_cents` for the platform.
#[derive(Debug, Clone)]
pub struct ChargeInstruction {
    pub destination_account: String,
    pub application_fee_cents: i64,
}

/// Gateway-side payment intent. `client_secret` is handed back to the
/// booking client so it can complete the charge directly.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundReceipt {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferReceipt {
    pub id: String,
}
