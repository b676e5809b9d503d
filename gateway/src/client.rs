use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::types::{ChargeInstruction, PaymentIntent, RefundReceipt, TransferReceipt};
use crate::PaymentGateway;

/// Reqwest-backed gateway client speaking the form-encoded REST dialect
/// of the payment processor.
#[derive(Clone)]
pub struct HttpGateway {
    http: Client,
    base_url: String,
    secret_key: String,
}

impl HttpGateway {
    pub fn new(base_url: String, secret_key: String) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            secret_key,
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    #[instrument(skip(self, instruction), fields(amount_cents), level = "debug")]
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        instruction: Option<ChargeInstruction>,
        metadata_booking_id: &str,
    ) -> anyhow::Result<PaymentIntent> {
        let mut form = vec![
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_string()),
            ("metadata[booking_id]", metadata_booking_id.to_string()),
        ];

        if let Some(instr) = instruction {
            form.push(("transfer_data[destination]", instr.destination_account));
            form.push((
                "application_fee_amount",
                instr.application_fee_cents.to_string(),
            ));
        }

        let intent: PaymentIntent = self.post_form("/v1/payment_intents", &form).await?;

        debug!(intent_id = %intent.id, "payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self), level = "debug")]
    async fn create_refund(
        &self,
        intent_id: &str,
        amount_cents: i64,
    ) -> anyhow::Result<RefundReceipt> {
        let form = vec![
            ("payment_intent", intent_id.to_string()),
            ("amount", amount_cents.to_string()),
        ];

        self.post_form("/v1/refunds", &form).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn create_transfer(
        &self,
        destination_account: &str,
        amount_cents: i64,
        currency: &str,
    ) -> anyhow::Result<TransferReceipt> {
        let form = vec![
            ("destination", destination_account.to_string()),
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_string()),
        ];

        self.post_form("/v1/transfers", &form).await
    }
}
