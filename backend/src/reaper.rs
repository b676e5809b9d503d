//! Reservation TTL reaper.
//!
//! A reservation holds its segment while the client completes the
//! charge. If no webhook arrives within the TTL, the segment goes back
//! on the market and the booking is cancelled; any Pending payment
//! record stays behind for audit.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, instrument, warn};

use booking::coordinator::ReservationCoordinator;
use booking::store::BookingStore;
use common::error::CoreError;
use common::time::now;

pub struct ReservationReaper {
    bookings: Arc<dyn BookingStore>,
    coordinator: Arc<ReservationCoordinator>,
    ttl_minutes: i64,
}

impl ReservationReaper {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        coordinator: Arc<ReservationCoordinator>,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            bookings,
            coordinator,
            ttl_minutes,
        }
    }

    /// One sweep; returns how many reservations were released.
    ///
    /// A booking confirmed between the query and the release is safe:
    /// the release CAS only moves Reserved segments, so the late
    /// confirm's Booked state wins and the booking stays Confirmed.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<usize, CoreError> {
        let cutoff = now() - Duration::minutes(self.ttl_minutes);
        let stale = self.bookings.stale_unpaid_bookings(cutoff).await?;

        let mut released = 0;
        for booking in stale {
            match self
                .coordinator
                .release(booking.slot_id, booking.segment_index, booking.id)
                .await
            {
                Ok(()) => {
                    released += 1;
                    info!(booking_id = %booking.id, "expired reservation released");
                }
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "reaper skipped booking");
                }
            }
        }

        Ok(released)
    }
}
