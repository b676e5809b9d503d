#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // Settlement configuration
    // =========================
    /// Platform commission, percent of the booking price.
    pub platform_fee_pct: u32,

    /// Tax withheld, percent of the booking price.
    pub tax_pct: u32,

    /// Gateways reject charges under their floor; smaller bookings are
    /// charged at this floor while the ledger keeps the true price.
    pub minimum_chargeable_cents: i64,

    /// ISO currency code passed through to the gateway.
    pub currency: String,

    // =========================
    // Reservation reaper
    // =========================
    /// How long an unpaid reservation holds its segment before the
    /// reaper releases it.
    pub reservation_ttl_minutes: i64,

    /// Cadence of the reaper loop.
    pub reaper_interval_secs: u64,

    // =========================
    // Payouts
    // =========================
    /// Cadence of the scheduled payout cycle. Weekly by default.
    pub payout_interval_secs: u64,

    // =========================
    // Gateway
    // =========================
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    /// Shared secret used to verify webhook signatures.
    pub gateway_webhook_secret: String,

    /// Capacity of the domain-event channel. Emission is best-effort;
    /// a full channel drops events rather than blocking settlement.
    pub event_queue_capacity: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://booker_dev.db".to_string());

        Self {
            database_url,

            platform_fee_pct: env_or("PLATFORM_FEE_PCT", 15),
            tax_pct: env_or("TAX_PCT", 7),
            minimum_chargeable_cents: env_or("MINIMUM_CHARGEABLE_CENTS", 50),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "usd".to_string()),

            reservation_ttl_minutes: env_or("RESERVATION_TTL_MINUTES", 15),
            reaper_interval_secs: env_or("REAPER_INTERVAL_SECS", 60),

            payout_interval_secs: env_or("PAYOUT_INTERVAL_SECS", 7 * 24 * 3600),

            gateway_base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            gateway_secret_key: std::env::var("GATEWAY_SECRET_KEY").unwrap_or_default(),
            gateway_webhook_secret: std::env::var("GATEWAY_WEBHOOK_SECRET").unwrap_or_default(),

            event_queue_capacity: env_or("EVENT_QUEUE_CAPACITY", 256),
        }
    }
}
