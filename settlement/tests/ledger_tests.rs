use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::mpsc;
use tokio::test;
use uuid::Uuid;

use booking::coordinator::ReservationCoordinator;
use booking::model::{Booking, BookingStatus, Segment, SegmentState, SlotId};
use booking::store::sqlite_store::SqliteBookingStore;
use booking::store::BookingStore;
use common::error::CoreError;
use settlement::events::DomainEvent;
use settlement::ledger::{SettlementConfig, SettlementLedger};
use settlement::model::{PaymentStatus, ProviderProfile, ReleaseStatus};
use settlement::store::sqlite_store::SqlitePaymentStore;
use settlement::store::PaymentStore;
use settlement::wallet::ProviderWallet;

mod mock_gateway;
use mock_gateway::MockGateway;

struct Harness {
    ledger: SettlementLedger,
    payments: Arc<SqlitePaymentStore>,
    bookings: Arc<SqliteBookingStore>,
    wallet: Arc<ProviderWallet>,
    gateway: Arc<MockGateway>,
    events: mpsc::Receiver<DomainEvent>,
}

// A single connection so both stores see the same in-memory database.
async fn harness() -> Harness {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let bookings = Arc::new(SqliteBookingStore::from_pool(pool.clone()).await.unwrap());
    let payments = Arc::new(SqlitePaymentStore::from_pool(pool).await.unwrap());

    let coordinator = Arc::new(ReservationCoordinator::new(bookings.clone()));
    let wallet = Arc::new(ProviderWallet::new(payments.clone()));
    let gateway = Arc::new(MockGateway::default());
    let (tx, rx) = mpsc::channel(16);

    let ledger = SettlementLedger::new(
        payments.clone(),
        coordinator,
        wallet.clone(),
        gateway.clone(),
        SettlementConfig::default(),
        tx,
    );

    Harness {
        ledger,
        payments,
        bookings,
        wallet,
        gateway,
        events: rx,
    }
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn sample_booking(slot_id: SlotId, provider_id: Uuid) -> Booking {
    Booking {
        id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        provider_id,
        slot_id,
        segment_index: 0,
        scheduled_start: Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap(),
        duration_minutes: 60,
        status: BookingStatus::Reserved,
        address: "12 Main St".into(),
        total_price_cents: 5_000,
        reserved_at: Utc::now(),
    }
}

/// Seed one slot with one Available segment and reserve it for a fresh
/// booking, returning the booking as reserved.
async fn reserved_booking(h: &Harness) -> Booking {
    reserved_booking_priced(h, 5_000).await
}

async fn reserved_booking_priced(h: &Harness, price_cents: i64) -> Booking {
    let provider_id = Uuid::new_v4();
    let slot = booking::model::Slot {
        id: Uuid::new_v4(),
        provider_id,
        service_id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
        start_time: t(9, 0),
        end_time: t(10, 0),
    };
    h.bookings.insert_slot(&slot).await.unwrap();
    h.bookings
        .insert_segment_if_absent(&Segment {
            slot_id: slot.id,
            index: 0,
            start_time: t(9, 0),
            end_time: t(10, 0),
            state: SegmentState::Available,
            booking_id: None,
        })
        .await
        .unwrap();

    let mut booking = sample_booking(slot.id, provider_id);
    booking.total_price_cents = price_cents;
    h.bookings.insert_booking(&booking).await.unwrap();
    assert!(h
        .bookings
        .try_reserve_segment(slot.id, 0, booking.id)
        .await
        .unwrap());
    booking
}

async fn intent_id_for(h: &Harness, booking_id: Uuid) -> String {
    h.payments
        .find_booking_payment(booking_id)
        .await
        .unwrap()
        .unwrap()
        .gateway_intent_id
        .unwrap()
}

#[test]
async fn create_intent_decomposes_and_marks_booking_pending() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;

    let handle = h.ledger.create_intent(&booking).await.unwrap();
    assert!(handle.client_token.ends_with("_secret"));

    let record = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.amount_cents, 5_000);
    assert_eq!(record.platform_fee_cents, 750);
    assert_eq!(record.tax_cents, 350);
    assert_eq!(record.provider_amount_cents, 3_900);
    assert_eq!(record.release_status, ReleaseStatus::Held);
    assert!(record.gateway_intent_id.is_some());

    let stored = h.bookings.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
}

#[test]
async fn create_intent_routes_charge_for_connected_provider() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.payments
        .upsert_profile(&ProviderProfile {
            provider_id: booking.provider_id,
            connected_account_id: Some("acct_123".into()),
            payouts_enabled: true,
            manual_payouts: false,
        })
        .await
        .unwrap();

    h.ledger.create_intent(&booking).await.unwrap();

    let intents = h.gateway.intents.lock().await;
    let (amount, instruction, metadata) = &intents[0];
    assert_eq!(*amount, 5_000);
    assert_eq!(metadata, &booking.id.to_string());
    let instruction = instruction.as_ref().expect("charge should be routed");
    assert_eq!(instruction.destination_account, "acct_123");
    // Platform keeps fee + tax; provider share goes to the account.
    assert_eq!(instruction.application_fee_cents, 1_100);
}

#[test]
async fn create_intent_without_profile_charges_platform_directly() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;

    h.ledger.create_intent(&booking).await.unwrap();

    let intents = h.gateway.intents.lock().await;
    assert!(intents[0].1.is_none());
}

#[test]
async fn create_intent_rejects_double_initiation() {
    let h = harness().await;
    let mut booking = reserved_booking(&h).await;

    h.ledger.create_intent(&booking).await.unwrap();
    // Even if the caller re-reads a stale Reserved snapshot.
    booking.status = BookingStatus::Reserved;
    let err = h.ledger.create_intent(&booking).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[test]
async fn gateway_outage_leaves_record_pending_without_intent() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.gateway.fail_next.store(true, Ordering::SeqCst);

    let err = h.ledger.create_intent(&booking).await.unwrap_err();
    assert!(matches!(err, CoreError::Gateway(_)));

    let record = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert!(record.gateway_intent_id.is_none());
    // The booking keeps ticking toward the reservation TTL.
    let stored = h.bookings.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Reserved);
}

#[test]
async fn small_charges_are_raised_to_the_gateway_floor() {
    let h = harness().await;
    let booking = reserved_booking_priced(&h, 25).await;

    h.ledger.create_intent(&booking).await.unwrap();

    let intents = h.gateway.intents.lock().await;
    assert_eq!(intents[0].0, 50);
    drop(intents);

    // The ledger still records the true price.
    let record = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.amount_cents, 25);
}

#[test]
async fn confirm_books_segment_and_credits_provider() {
    let mut h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();
    let intent_id = intent_id_for(&h, booking.id).await;

    h.ledger.confirm(&intent_id).await.unwrap();

    let record = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Completed);
    assert_eq!(record.release_status, ReleaseStatus::Held);

    let segment = h
        .bookings
        .find_segment(booking.slot_id, 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(segment.state, SegmentState::Booked);

    let stored = h.bookings.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);

    assert_eq!(h.wallet.balance(booking.provider_id).await.unwrap(), 3_900);

    match h.events.try_recv().unwrap() {
        DomainEvent::PaymentConfirmed {
            booking_id,
            amount_cents,
            ..
        } => {
            assert_eq!(booking_id, booking.id);
            assert_eq!(amount_cents, 5_000);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
async fn duplicate_confirm_credits_once() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();
    let intent_id = intent_id_for(&h, booking.id).await;

    h.ledger.confirm(&intent_id).await.unwrap();
    h.ledger.confirm(&intent_id).await.unwrap();

    assert_eq!(h.wallet.balance(booking.provider_id).await.unwrap(), 3_900);
    let (_, txns) = h.wallet.statement(booking.provider_id).await.unwrap();
    assert_eq!(txns.len(), 1);
}

#[test]
async fn concurrent_duplicate_confirms_credit_once() {
    let h = Arc::new(harness().await);

    // The same succeeded event delivered twice at once; only one
    // delivery may land the wallet credit.
    for _ in 0..25 {
        let booking = reserved_booking(&h).await;
        h.ledger.create_intent(&booking).await.unwrap();
        let intent_id = intent_id_for(&h, booking.id).await;

        let first = tokio::spawn({
            let h = h.clone();
            let intent_id = intent_id.clone();
            async move { h.ledger.confirm(&intent_id).await }
        });
        let second = tokio::spawn({
            let h = h.clone();
            let intent_id = intent_id.clone();
            async move { h.ledger.confirm(&intent_id).await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(h.wallet.balance(booking.provider_id).await.unwrap(), 3_900);
        let (_, txns) = h.wallet.statement(booking.provider_id).await.unwrap();
        assert_eq!(txns.len(), 1);
    }
}

#[test]
async fn fail_after_confirm_is_a_no_op() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();
    let intent_id = intent_id_for(&h, booking.id).await;

    h.ledger.confirm(&intent_id).await.unwrap();
    h.ledger.fail(&intent_id).await.unwrap();

    let record = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Completed);
    let segment = h
        .bookings
        .find_segment(booking.slot_id, 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(segment.state, SegmentState::Booked);
}

#[test]
async fn fail_releases_segment_and_cancels_booking() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();
    let intent_id = intent_id_for(&h, booking.id).await;

    h.ledger.fail(&intent_id).await.unwrap();

    let record = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Failed);

    let segment = h
        .bookings
        .find_segment(booking.slot_id, 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(segment.state, SegmentState::Available);
    assert_eq!(segment.booking_id, None);

    let stored = h.bookings.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
}

#[test]
async fn unknown_intent_is_an_invariant_violation() {
    let h = harness().await;
    let err = h.ledger.confirm("pi_unknown").await.unwrap_err();
    assert!(matches!(err, CoreError::Invariant(_)));
}

#[test]
async fn full_refund_debits_provider_and_marks_refunded() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();
    let intent_id = intent_id_for(&h, booking.id).await;
    h.ledger.confirm(&intent_id).await.unwrap();

    let refund = h
        .ledger
        .refund(booking.id, 5_000, "provider cancelled")
        .await
        .unwrap();
    assert_eq!(refund.amount_cents, -5_000);
    assert_eq!(refund.platform_fee_cents, -750);
    assert_eq!(refund.tax_cents, -350);
    assert_eq!(refund.provider_amount_cents, -3_900);
    assert!(refund.gateway_refund_id.is_some());

    let original = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.status, PaymentStatus::Refunded);
    assert_eq!(original.provider_amount_cents, 0);

    assert_eq!(h.wallet.balance(booking.provider_id).await.unwrap(), 0);
}

#[test]
async fn partial_refund_claws_back_proportionally() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();
    let intent_id = intent_id_for(&h, booking.id).await;
    h.ledger.confirm(&intent_id).await.unwrap();

    // 90% cancellation refund on a $50.00 booking.
    let refund = h
        .ledger
        .refund(booking.id, 4_500, "client cancelled 30h ahead")
        .await
        .unwrap();
    assert_eq!(refund.platform_fee_cents, -675);
    assert_eq!(refund.tax_cents, -315);
    assert_eq!(refund.provider_amount_cents, -3_510);

    let original = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.status, PaymentStatus::PartiallyRefunded);
    // The original record now carries what the provider is still owed.
    assert_eq!(original.provider_amount_cents, 390);

    assert_eq!(h.wallet.balance(booking.provider_id).await.unwrap(), 390);
}

#[test]
async fn refund_rejects_amount_above_original() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();
    let intent_id = intent_id_for(&h, booking.id).await;
    h.ledger.confirm(&intent_id).await.unwrap();

    let err = h.ledger.refund(booking.id, 5_001, "oops").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
async fn refund_rejects_pending_payment() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();

    let err = h.ledger.refund(booking.id, 1_000, "early").await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[test]
async fn refund_rejects_paid_out_share() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();
    let intent_id = intent_id_for(&h, booking.id).await;
    h.ledger.confirm(&intent_id).await.unwrap();

    let mut record = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    record.release_status = ReleaseStatus::PaidOut;
    h.payments.save_payment(&record).await.unwrap();

    let err = h.ledger.refund(booking.id, 1_000, "late").await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert!(h.gateway.refunds.lock().await.is_empty());
}

#[test]
async fn release_is_idempotent_and_requires_completion() {
    let h = harness().await;
    let booking = reserved_booking(&h).await;
    h.ledger.create_intent(&booking).await.unwrap();

    // Pending payments cannot be released.
    let err = h.ledger.release(booking.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let intent_id = intent_id_for(&h, booking.id).await;
    h.ledger.confirm(&intent_id).await.unwrap();

    h.ledger.release(booking.id).await.unwrap();
    h.ledger.release(booking.id).await.unwrap();

    let record = h
        .payments
        .find_booking_payment(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.release_status, ReleaseStatus::Released);

    let released = h.payments.released_unpaid(None).await.unwrap();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].booking_id, booking.id);
}
