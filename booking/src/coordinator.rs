//! The reservation state machine over segments.
//!
//! All three transitions are store-level compare-and-sets; two
//! concurrent `reserve` calls on the same `(slot_id, index)` yield
//! exactly one success and one conflict.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use common::error::CoreError;

use crate::model::{Booking, BookingId, BookingStatus, SegmentState, SlotId};
use crate::store::BookingStore;

/// Slot-level aggregate, always derived from segment truth on read and
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFlags {
    /// Every materialized segment is Booked.
    pub fully_booked: bool,
    /// At least one segment is Reserved.
    pub reserved: bool,
}

pub struct ReservationCoordinator {
    store: Arc<dyn BookingStore>,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Persist the booking, then atomically claim its segment.
    ///
    /// The booking row is written first so a crash between the two
    /// writes leaves a self-describing state (a Reserved booking whose
    /// segment was never claimed is reaped, not lost money). A losing
    /// racer gets its booking cancelled and a conflict back.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, slot_id = %booking.slot_id, index = booking.segment_index))]
    pub async fn reserve(&self, booking: &Booking) -> Result<(), CoreError> {
        self.store.insert_booking(booking).await?;

        let won = self
            .store
            .try_reserve_segment(booking.slot_id, booking.segment_index, booking.id)
            .await?;

        if !won {
            self.store
                .set_booking_status(booking.id, BookingStatus::Cancelled)
                .await?;

            return Err(CoreError::conflict(format!(
                "segment ({}, {}) is not available",
                booking.slot_id, booking.segment_index
            )));
        }

        info!("segment reserved");
        Ok(())
    }

    /// Reserved -> Booked for the expected booking; marks the booking
    /// Confirmed. A segment already Booked by the same booking is a
    /// no-op (webhook redelivery), anything else is an invariant breach.
    #[instrument(skip(self), fields(%booking_id, %slot_id, index))]
    pub async fn confirm(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> Result<(), CoreError> {
        let moved = self
            .store
            .confirm_segment(slot_id, index, booking_id)
            .await?;

        if !moved {
            let segment = self.store.find_segment(slot_id, index).await?;
            match segment {
                Some(s) if s.state == SegmentState::Booked && s.booking_id == Some(booking_id) => {
                    warn!("segment already booked for this booking; treating as no-op");
                    return Ok(());
                }
                other => {
                    return Err(CoreError::Invariant(format!(
                        "cannot confirm segment ({slot_id}, {index}) for booking {booking_id}: {other:?}"
                    )));
                }
            }
        }

        self.store
            .set_booking_status(booking_id, BookingStatus::Confirmed)
            .await?;

        info!("segment booked");
        Ok(())
    }

    /// Reserved -> Available, clearing the booking reference; marks the
    /// booking Cancelled. Called on payment failure or reservation
    /// timeout. Already-released segments are a no-op.
    #[instrument(skip(self), fields(%booking_id, %slot_id, index))]
    pub async fn release(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> Result<(), CoreError> {
        let moved = self
            .store
            .release_segment(slot_id, index, booking_id)
            .await?;

        if !moved {
            let segment = self.store.find_segment(slot_id, index).await?;
            match segment {
                // Our claim is gone already: released earlier, or the
                // segment was re-reserved by another booking since.
                Some(s) if s.booking_id != Some(booking_id) => {
                    warn!("segment claim already gone; treating as no-op");
                }
                other => {
                    return Err(CoreError::Invariant(format!(
                        "cannot release segment ({slot_id}, {index}) for booking {booking_id}: {other:?}"
                    )));
                }
            }
        }

        self.store
            .set_booking_status(booking_id, BookingStatus::Cancelled)
            .await?;

        info!("segment released");
        Ok(())
    }

    /// Recompute the slot aggregate from its segments.
    pub async fn slot_flags(&self, slot_id: SlotId) -> Result<SlotFlags, CoreError> {
        let segments = self.store.segments_for_slot(slot_id).await?;

        let fully_booked =
            !segments.is_empty() && segments.iter().all(|s| s.state == SegmentState::Booked);
        let reserved = segments.iter().any(|s| s.state == SegmentState::Reserved);

        Ok(SlotFlags {
            fully_booked,
            reserved,
        })
    }

    pub async fn find_booking(&self, id: BookingId) -> Result<Booking, CoreError> {
        self.store
            .find_booking(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("booking {id}")))
    }

    pub async fn set_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), CoreError> {
        self.store.set_booking_status(id, status).await?;
        Ok(())
    }
}
