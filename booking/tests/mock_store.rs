use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use booking::model::{
    Booking, BookingId, BookingStatus, Segment, SegmentState, Service, Slot, SlotId,
};
use booking::store::BookingStore;

/// In-memory BookingStore with the same compare-and-set semantics as the
/// sqlite implementation.
#[derive(Default)]
pub struct InMemoryBookingStore {
    pub services: Arc<Mutex<HashMap<Uuid, Service>>>,
    pub slots: Arc<Mutex<HashMap<SlotId, Slot>>>,
    pub segments: Arc<Mutex<HashMap<(SlotId, u32), Segment>>>,
    pub bookings: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert_service(&self, service: &Service) -> anyhow::Result<()> {
        self.services
            .lock()
            .await
            .insert(service.id, service.clone());
        Ok(())
    }

    async fn find_service(&self, id: Uuid) -> anyhow::Result<Option<Service>> {
        Ok(self.services.lock().await.get(&id).cloned())
    }

    async fn insert_slot(&self, slot: &Slot) -> anyhow::Result<()> {
        self.slots.lock().await.insert(slot.id, slot.clone());
        Ok(())
    }

    async fn find_slot(&self, id: SlotId) -> anyhow::Result<Option<Slot>> {
        Ok(self.slots.lock().await.get(&id).cloned())
    }

    async fn find_slot_by_window(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> anyhow::Result<Option<Slot>> {
        Ok(self
            .slots
            .lock()
            .await
            .values()
            .find(|s| {
                s.provider_id == provider_id
                    && s.date == date
                    && s.start_time == start_time
                    && s.end_time == end_time
            })
            .cloned())
    }

    async fn slots_for_service(
        &self,
        service_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<Slot>> {
        let mut out: Vec<Slot> = self
            .slots
            .lock()
            .await
            .values()
            .filter(|s| s.service_id == service_id && s.date >= from && s.date <= to)
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.date, s.start_time));
        Ok(out)
    }

    async fn delete_slot(&self, id: SlotId) -> anyhow::Result<()> {
        self.slots.lock().await.remove(&id);
        self.segments.lock().await.retain(|(sid, _), _| *sid != id);
        Ok(())
    }

    async fn insert_segment_if_absent(&self, segment: &Segment) -> anyhow::Result<()> {
        self.segments
            .lock()
            .await
            .entry((segment.slot_id, segment.index))
            .or_insert_with(|| segment.clone());
        Ok(())
    }

    async fn segments_for_slot(&self, slot_id: SlotId) -> anyhow::Result<Vec<Segment>> {
        let mut out: Vec<Segment> = self
            .segments
            .lock()
            .await
            .values()
            .filter(|s| s.slot_id == slot_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.index);
        Ok(out)
    }

    async fn find_segment(&self, slot_id: SlotId, index: u32) -> anyhow::Result<Option<Segment>> {
        Ok(self.segments.lock().await.get(&(slot_id, index)).cloned())
    }

    async fn try_reserve_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool> {
        let mut guard = self.segments.lock().await;
        match guard.get_mut(&(slot_id, index)) {
            Some(s) if s.state == SegmentState::Available => {
                s.state = SegmentState::Reserved;
                s.booking_id = Some(booking_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn confirm_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool> {
        let mut guard = self.segments.lock().await;
        match guard.get_mut(&(slot_id, index)) {
            Some(s) if s.state == SegmentState::Reserved && s.booking_id == Some(booking_id) => {
                s.state = SegmentState::Booked;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool> {
        let mut guard = self.segments.lock().await;
        match guard.get_mut(&(slot_id, index)) {
            Some(s) if s.state == SegmentState::Reserved && s.booking_id == Some(booking_id) => {
                s.state = SegmentState::Available;
                s.booking_id = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_booking(&self, booking: &Booking) -> anyhow::Result<()> {
        self.bookings
            .lock()
            .await
            .insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_booking(&self, id: BookingId) -> anyhow::Result<Option<Booking>> {
        Ok(self.bookings.lock().await.get(&id).cloned())
    }

    async fn set_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> anyhow::Result<()> {
        if let Some(b) = self.bookings.lock().await.get_mut(&id) {
            b.status = status;
        }
        Ok(())
    }

    async fn stale_unpaid_bookings(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<Booking>> {
        Ok(self
            .bookings
            .lock()
            .await
            .values()
            .filter(|b| {
                matches!(b.status, BookingStatus::Reserved | BookingStatus::Pending)
                    && b.reserved_at < cutoff
            })
            .cloned()
            .collect())
    }
}
