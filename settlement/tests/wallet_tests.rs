use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use common::error::CoreError;
use settlement::model::TxnKind;
use settlement::store::sqlite_store::SqlitePaymentStore;
use settlement::wallet::ProviderWallet;

async fn wallet() -> Arc<ProviderWallet> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = Arc::new(SqlitePaymentStore::from_pool(pool).await.unwrap());
    Arc::new(ProviderWallet::new(store))
}

#[tokio::test]
async fn balance_is_the_sum_of_signed_entries() {
    let w = wallet().await;
    let provider = Uuid::new_v4();

    w.credit(provider, 3_900, "booking payment", None).await.unwrap();
    w.credit(provider, 1_200, "booking payment", None).await.unwrap();
    w.debit(provider, 3_510, "refund", None).await.unwrap();

    assert_eq!(w.balance(provider).await.unwrap(), 1_590);

    let (balance, txns) = w.statement(provider).await.unwrap();
    assert_eq!(balance, 1_590);
    assert_eq!(txns.len(), 3);
    assert_eq!(txns.iter().map(|t| t.amount_cents).sum::<i64>(), balance);
}

#[tokio::test]
async fn debit_entries_are_stored_negative() {
    let w = wallet().await;
    let provider = Uuid::new_v4();

    w.debit(provider, 500, "refund", None).await.unwrap();

    let (_, txns) = w.statement(provider).await.unwrap();
    assert_eq!(txns[0].kind, TxnKind::Debit);
    assert_eq!(txns[0].amount_cents, -500);
}

#[tokio::test]
async fn refund_after_payout_drives_balance_negative() {
    let w = wallet().await;
    let provider = Uuid::new_v4();

    w.credit(provider, 1_000, "booking payment", None).await.unwrap();
    w.debit(provider, 1_000, "payout", None).await.unwrap();
    w.debit(provider, 750, "refund", None).await.unwrap();

    assert_eq!(w.balance(provider).await.unwrap(), -750);
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let w = wallet().await;
    let provider = Uuid::new_v4();

    let err = w.credit(provider, 0, "nothing", None).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    let err = w.debit(provider, -10, "nothing", None).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn providers_do_not_see_each_others_entries() {
    let w = wallet().await;
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    w.credit(a, 1_000, "booking payment", None).await.unwrap();
    w.credit(b, 2_000, "booking payment", None).await.unwrap();

    assert_eq!(w.balance(a).await.unwrap(), 1_000);
    assert_eq!(w.balance(b).await.unwrap(), 2_000);
}

proptest::proptest! {
    // Over any interleaving of credits and debits, the balance is the
    // running sum of the signed entries.
    #[test]
    fn balance_matches_sum_for_arbitrary_sequences(
        ops in proptest::collection::vec((proptest::bool::ANY, 1i64..10_000), 1..32)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let w = wallet().await;
            let provider = Uuid::new_v4();

            let mut expected = 0i64;
            for (is_credit, amount) in ops {
                if is_credit {
                    w.credit(provider, amount, "entry", None).await.unwrap();
                    expected += amount;
                } else {
                    w.debit(provider, amount, "entry", None).await.unwrap();
                    expected -= amount;
                }
            }

            assert_eq!(w.balance(provider).await.unwrap(), expected);
        });
    }
}

#[tokio::test]
async fn concurrent_credits_all_land() {
    let w = wallet().await;
    let provider = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let w = w.clone();
        handles.push(tokio::spawn(async move {
            w.credit(provider, 100, "booking payment", None).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    assert_eq!(w.balance(provider).await.unwrap(), 800);
    let (_, txns) = w.statement(provider).await.unwrap();
    assert_eq!(txns.len(), 8);
}
