pub mod sqlite_store;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::model::{Booking, BookingId, BookingStatus, Segment, Service, Slot, SlotId};

/// Persistence seam for slots, segments, services and bookings.
///
/// The three segment transition methods are compare-and-set: they mutate
/// only when the row is in the expected state and report whether a row
/// was actually changed. Callers never read-then-write across two round
/// trips.
#[async_trait::async_trait]
pub trait BookingStore: Send + Sync {
    // Services
    async fn insert_service(&self, service: &Service) -> anyhow::Result<()>;
    async fn find_service(&self, id: Uuid) -> anyhow::Result<Option<Service>>;

    // Slots
    async fn insert_slot(&self, slot: &Slot) -> anyhow::Result<()>;
    async fn find_slot(&self, id: SlotId) -> anyhow::Result<Option<Slot>>;
    async fn find_slot_by_window(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> anyhow::Result<Option<Slot>>;
    async fn slots_for_service(
        &self,
        service_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<Slot>>;
    async fn delete_slot(&self, id: SlotId) -> anyhow::Result<()>;

    // Segments
    /// Insert unless `(slot_id, index)` already exists. Both the eager
    /// and the lazy materialization path converge through this.
    async fn insert_segment_if_absent(&self, segment: &Segment) -> anyhow::Result<()>;
    async fn segments_for_slot(&self, slot_id: SlotId) -> anyhow::Result<Vec<Segment>>;
    async fn find_segment(&self, slot_id: SlotId, index: u32) -> anyhow::Result<Option<Segment>>;

    /// Available -> Reserved, stamping `booking_id`. Returns false when
    /// the segment was not Available at update time.
    async fn try_reserve_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool>;

    /// Reserved -> Booked, guarded on the expected booking id.
    async fn confirm_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool>;

    /// Reserved -> Available, clearing the booking reference.
    async fn release_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool>;

    // Bookings
    async fn insert_booking(&self, booking: &Booking) -> anyhow::Result<()>;
    async fn find_booking(&self, id: BookingId) -> anyhow::Result<Option<Booking>>;
    async fn set_booking_status(&self, id: BookingId, status: BookingStatus)
        -> anyhow::Result<()>;

    /// Bookings still awaiting payment whose reservation predates `cutoff`.
    /// Consumed by the reservation reaper.
    async fn stale_unpaid_bookings(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<Booking>>;
}
