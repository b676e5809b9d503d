use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use backend::{api::BookingApi, config::AppConfig, db, reaper::ReservationReaper};
use booking::coordinator::ReservationCoordinator;
use booking::registry::SlotRegistry;
use booking::store::sqlite_store::SqliteBookingStore;
use booking::store::BookingStore;
use common::logger::init_logger;
use gateway::client::HttpGateway;
use gateway::PaymentGateway;
use payout::engine::PayoutEngine;
use settlement::events::{DomainEvent, EventSender};
use settlement::fees::FeePolicy;
use settlement::ledger::{SettlementConfig, SettlementLedger};
use settlement::store::sqlite_store::SqlitePaymentStore;
use settlement::store::PaymentStore;
use settlement::wallet::ProviderWallet;

/// Connects the pool and constructs both stores; each ensures its own
/// schema on construction.
async fn init_stores(
    cfg: &AppConfig,
) -> anyhow::Result<(Arc<dyn BookingStore>, Arc<dyn PaymentStore>)> {
    let pool = db::connect(&cfg.database_url).await?;
    let bookings: Arc<dyn BookingStore> =
        Arc::new(SqliteBookingStore::from_pool(pool.clone()).await?);
    let payments: Arc<dyn PaymentStore> = Arc::new(SqlitePaymentStore::from_pool(pool).await?);
    Ok((bookings, payments))
}

/// Drains domain events. Delivery (push, email) hangs off this task;
/// for now each event is logged.
fn start_event_drain(mut rx: mpsc::Receiver<DomainEvent>) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::info!(?event, "domain event");
        }
    });
}

fn start_reaper_loop(reaper: ReservationReaper, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match reaper.sweep().await {
                Ok(0) => {}
                Ok(n) => tracing::info!(released = n, "reaper sweep finished"),
                Err(e) => tracing::error!(error = %e, "reaper sweep failed"),
            }
        }
    });
}

fn start_payout_loop(api: Arc<BookingApi>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick so restarts do not trigger an
        // off-schedule cycle.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = api.run_scheduled_payouts().await {
                tracing::error!(error = %e, "payout cycle failed");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("booker-backend");

    tracing::info!("Starting booker backend...");

    let cfg = AppConfig::from_env();

    let (bookings, payments) = init_stores(&cfg).await?;

    let registry = Arc::new(SlotRegistry::new(bookings.clone()));
    let coordinator = Arc::new(ReservationCoordinator::new(bookings.clone()));
    let wallet = Arc::new(ProviderWallet::new(payments.clone()));

    let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpGateway::new(
        cfg.gateway_base_url.clone(),
        cfg.gateway_secret_key.clone(),
    )?);

    let (event_tx, event_rx) = mpsc::channel(cfg.event_queue_capacity);
    start_event_drain(event_rx);
    let events: EventSender = event_tx;

    let ledger = Arc::new(SettlementLedger::new(
        payments.clone(),
        coordinator.clone(),
        wallet.clone(),
        gateway.clone(),
        SettlementConfig {
            currency: cfg.currency.clone(),
            minimum_chargeable_cents: cfg.minimum_chargeable_cents,
            fee_policy: FeePolicy {
                platform_fee_pct: cfg.platform_fee_pct,
                tax_pct: cfg.tax_pct,
            },
        },
        events.clone(),
    ));

    let payout_engine = Arc::new(PayoutEngine::new(
        payments.clone(),
        wallet.clone(),
        gateway,
        cfg.currency.clone(),
        events,
    ));

    let api = Arc::new(BookingApi::new(
        registry,
        coordinator.clone(),
        bookings.clone(),
        ledger,
        wallet,
        payout_engine,
        cfg.gateway_webhook_secret.clone(),
    ));

    let reaper = ReservationReaper::new(bookings, coordinator, cfg.reservation_ttl_minutes);
    start_reaper_loop(reaper, Duration::from_secs(cfg.reaper_interval_secs));
    start_payout_loop(api, Duration::from_secs(cfg.payout_interval_secs));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
