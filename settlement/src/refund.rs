//! Refund-percentage policy.
//
//  Pure: the percentage depends only on how far ahead of the service
//  start the cancellation lands. Past or in-progress bookings fall
//  through to 0% here; the admin full-refund override is an
//  authorization concern handled by the API layer, not a policy branch.

use chrono::{DateTime, Utc};

use crate::fees::round_pct;

/// Threshold table, evaluated in descending order, first match wins.
pub fn refund_percentage(hours_until_service: f64) -> u32 {
    if hours_until_service >= 24.0 {
        90
    } else if hours_until_service >= 12.0 {
        75
    } else if hours_until_service >= 6.0 {
        50
    } else {
        0
    }
}

/// Refundable amount for a cancellation at `cancelled_at` of a booking
/// starting at `service_start`.
pub fn refund_amount(
    original_cents: i64,
    service_start: DateTime<Utc>,
    cancelled_at: DateTime<Utc>,
) -> i64 {
    let minutes = (service_start - cancelled_at).num_minutes();
    let hours = minutes as f64 / 60.0;

    round_pct(original_cents, refund_percentage(hours))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn service_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
    }

    fn cancel_before(hours: i64, minutes: i64) -> DateTime<Utc> {
        service_start() - Duration::hours(hours) - Duration::minutes(minutes)
    }

    #[test]
    fn ninety_percent_at_exactly_24h() {
        assert_eq!(refund_amount(100_00, service_start(), cancel_before(24, 0)), 90_00);
    }

    #[test]
    fn seventy_five_percent_at_exactly_12h() {
        assert_eq!(refund_amount(100_00, service_start(), cancel_before(12, 0)), 75_00);
    }

    #[test]
    fn fifty_percent_at_exactly_6h() {
        assert_eq!(refund_amount(100_00, service_start(), cancel_before(6, 0)), 50_00);
    }

    #[test]
    fn nothing_at_5h59m() {
        assert_eq!(refund_amount(100_00, service_start(), cancel_before(5, 59)), 0);
    }

    #[test]
    fn just_under_24h_drops_to_75() {
        assert_eq!(
            refund_amount(100_00, service_start(), cancel_before(23, 59)),
            75_00
        );
    }

    #[test]
    fn far_ahead_stays_at_90() {
        assert_eq!(
            refund_amount(100_00, service_start(), cancel_before(24 * 14, 0)),
            90_00
        );
    }

    #[test]
    fn past_service_time_yields_zero() {
        let after = service_start() + Duration::hours(1);
        assert_eq!(refund_amount(100_00, service_start(), after), 0);
    }

    #[test]
    fn fractional_amounts_round_half_up() {
        // 90% of 55 cents = 49.5 -> 50
        assert_eq!(refund_amount(55, service_start(), cancel_before(30, 0)), 50);
    }
}
