use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use gateway::types::{ChargeInstruction, PaymentIntent, RefundReceipt, TransferReceipt};
use gateway::PaymentGateway;

/// Records every call and hands back deterministic ids. Set `fail_next`
/// to make the next call error like a gateway outage would.
#[derive(Default)]
pub struct MockGateway {
    counter: AtomicU64,
    pub fail_next: AtomicBool,
    pub intents: Mutex<Vec<(i64, Option<ChargeInstruction>, String)>>,
    pub refunds: Mutex<Vec<(String, i64)>>,
    pub transfers: Mutex<Vec<(String, i64)>>,
}

impl MockGateway {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}_{n}")
    }

    fn maybe_fail(&self) -> anyhow::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("gateway unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        _currency: &str,
        instruction: Option<ChargeInstruction>,
        metadata_booking_id: &str,
    ) -> anyhow::Result<PaymentIntent> {
        self.maybe_fail()?;
        self.intents
            .lock()
            .await
            .push((amount_cents, instruction, metadata_booking_id.to_string()));
        let id = self.next_id("pi");
        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
        })
    }

    async fn create_refund(
        &self,
        intent_id: &str,
        amount_cents: i64,
    ) -> anyhow::Result<RefundReceipt> {
        self.maybe_fail()?;
        self.refunds
            .lock()
            .await
            .push((intent_id.to_string(), amount_cents));
        Ok(RefundReceipt {
            id: self.next_id("re"),
        })
    }

    async fn create_transfer(
        &self,
        destination_account: &str,
        amount_cents: i64,
        _currency: &str,
    ) -> anyhow::Result<TransferReceipt> {
        self.maybe_fail()?;
        self.transfers
            .lock()
            .await
            .push((destination_account.to_string(), amount_cents));
        Ok(TransferReceipt {
            id: self.next_id("tr"),
        })
    }
}
