//! Slot declaration and segment materialization.
//!
//! Segments are carved eagerly when a slot is declared, but slots that
//! predate eager materialization can still be booked: the lazy path
//! derives the same `(slot_id, index)` identity and identical times from
//! `slot.start_time + index * duration`.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, instrument};
use uuid::Uuid;

use common::error::CoreError;

use crate::model::{Segment, SegmentState, Slot, SlotAvailability, SlotId};
use crate::store::BookingStore;

pub struct SlotRegistry {
    store: Arc<dyn BookingStore>,
}

impl SlotRegistry {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Declare an availability window and eagerly carve its segments.
    #[instrument(skip(self), fields(%provider_id, %service_id, %date))]
    pub async fn declare_slot(
        &self,
        provider_id: Uuid,
        service_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Slot, CoreError> {
        if end_time <= start_time {
            return Err(CoreError::validation(format!(
                "slot end {end_time} must be after start {start_time}"
            )));
        }

        let service = self
            .store
            .find_service(service_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("service {service_id}")))?;

        if service.duration_minutes == 0 {
            return Err(CoreError::Invariant(format!(
                "service {service_id} has zero duration"
            )));
        }

        if self
            .store
            .find_slot_by_window(provider_id, date, start_time, end_time)
            .await?
            .is_some()
        {
            return Err(CoreError::conflict(format!(
                "slot {date} {start_time}-{end_time} already declared"
            )));
        }

        let slot = Slot {
            id: Uuid::new_v4(),
            provider_id,
            service_id,
            date,
            start_time,
            end_time,
        };

        self.store.insert_slot(&slot).await?;
        let segments = self
            .materialize_segments(&slot, service.duration_minutes)
            .await?;

        debug!(slot_id = %slot.id, segments = segments.len(), "slot declared");
        Ok(slot)
    }

    /// Partition a slot into `floor(slot_minutes / duration)` contiguous
    /// segments; remainder minutes are dropped. Idempotent: existing
    /// segments are kept, never duplicated.
    pub async fn materialize_segments(
        &self,
        slot: &Slot,
        duration_minutes: u32,
    ) -> Result<Vec<Segment>, CoreError> {
        let capacity = segment_capacity(slot, duration_minutes);

        for index in 0..capacity {
            let (start_time, end_time) = segment_bounds(slot.start_time, index, duration_minutes);
            let segment = Segment {
                slot_id: slot.id,
                index,
                start_time,
                end_time,
                state: SegmentState::Available,
                booking_id: None,
            };
            self.store.insert_segment_if_absent(&segment).await?;
        }

        Ok(self.store.segments_for_slot(slot.id).await?)
    }

    /// Lazy counterpart of eager materialization for historical slots.
    /// Derives identical times for the same index as the eager path.
    pub async fn get_or_create_segment(
        &self,
        slot_id: SlotId,
        index: u32,
    ) -> Result<Segment, CoreError> {
        if let Some(segment) = self.store.find_segment(slot_id, index).await? {
            return Ok(segment);
        }

        let slot = self
            .store
            .find_slot(slot_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("slot {slot_id}")))?;

        let service = self
            .store
            .find_service(slot.service_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("service {}", slot.service_id)))?;

        let capacity = segment_capacity(&slot, service.duration_minutes);
        if index >= capacity {
            return Err(CoreError::validation(format!(
                "segment index {index} out of range for slot {slot_id} (capacity {capacity})"
            )));
        }

        let (start_time, end_time) = segment_bounds(slot.start_time, index, service.duration_minutes);
        let segment = Segment {
            slot_id,
            index,
            start_time,
            end_time,
            state: SegmentState::Available,
            booking_id: None,
        };

        // Concurrent lazy creation converges on the same row; re-read
        // after the conditional insert so a racing winner's state wins.
        self.store.insert_segment_if_absent(&segment).await?;

        self.store
            .find_segment(slot_id, index)
            .await?
            .ok_or_else(|| CoreError::Invariant(format!("segment ({slot_id}, {index}) vanished")))
    }

    /// Slots in the date range enriched with segments, keeping only
    /// those with at least one Available segment.
    pub async fn list_available(
        &self,
        service_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SlotAvailability>, CoreError> {
        let slots = self.store.slots_for_service(service_id, from, to).await?;

        let mut out = Vec::new();
        for slot in slots {
            let segments = self.store.segments_for_slot(slot.id).await?;
            let entry = SlotAvailability { slot, segments };
            if entry.has_open_segment() {
                out.push(entry);
            }
        }

        Ok(out)
    }

    /// Delete a slot, allowed only while nothing under it is held.
    pub async fn delete_slot(&self, slot_id: SlotId) -> Result<(), CoreError> {
        let segments = self.store.segments_for_slot(slot_id).await?;

        if segments
            .iter()
            .any(|s| s.state != SegmentState::Available)
        {
            return Err(CoreError::conflict(format!(
                "slot {slot_id} has reserved or booked segments"
            )));
        }

        self.store.delete_slot(slot_id).await?;
        Ok(())
    }
}

/// Number of whole segments that fit in the slot; remainder is dropped,
/// never a partial segment.
pub fn segment_capacity(slot: &Slot, duration_minutes: u32) -> u32 {
    if duration_minutes == 0 {
        return 0;
    }
    (slot.minutes() / duration_minutes as i64) as u32
}

/// Deterministic bounds for segment `index`, shared by the eager and
/// lazy paths.
pub fn segment_bounds(
    slot_start: NaiveTime,
    index: u32,
    duration_minutes: u32,
) -> (NaiveTime, NaiveTime) {
    let offset = Duration::minutes(index as i64 * duration_minutes as i64);
    let start = slot_start + offset;
    let end = start + Duration::minutes(duration_minutes as i64);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(start: NaiveTime, end: NaiveTime) -> Slot {
        Slot {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn capacity_drops_remainder_minutes() {
        // 100 minutes / 30-minute service => 3 segments, 10 minutes dropped.
        let s = slot(t(9, 0), t(10, 40));
        assert_eq!(segment_capacity(&s, 30), 3);
    }

    #[test]
    fn capacity_exact_fit() {
        let s = slot(t(9, 0), t(12, 0));
        assert_eq!(segment_capacity(&s, 60), 3);
    }

    #[test]
    fn capacity_zero_when_slot_shorter_than_service() {
        let s = slot(t(9, 0), t(9, 20));
        assert_eq!(segment_capacity(&s, 30), 0);
    }

    #[test]
    fn bounds_are_contiguous_and_deterministic() {
        let (s0, e0) = segment_bounds(t(9, 0), 0, 45);
        let (s1, e1) = segment_bounds(t(9, 0), 1, 45);

        assert_eq!(s0, t(9, 0));
        assert_eq!(e0, t(9, 45));
        assert_eq!(s1, e0);
        assert_eq!(e1, t(10, 30));
    }
}
