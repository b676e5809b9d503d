use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SlotId = Uuid;
pub type BookingId = Uuid;

/// Lifecycle of one bookable segment.
///
/// `Booked` is terminal for the booking that claimed it: a cancelled or
/// completed booking keeps its segment historically Booked. Only a
/// failed or timed-out payment releases a `Reserved` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Available,
    Reserved,
    Booked,
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentState::Available => "Available",
            SegmentState::Reserved => "Reserved",
            SegmentState::Booked => "Booked",
        };
        f.write_str(s)
    }
}

impl FromStr for SegmentState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(SegmentState::Available),
            "Reserved" => Ok(SegmentState::Reserved),
            "Booked" => Ok(SegmentState::Booked),
            other => Err(anyhow::anyhow!("Invalid SegmentState value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Reserved,
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Reserved => "Reserved",
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::InProgress => "InProgress",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reserved" => Ok(BookingStatus::Reserved),
            "Pending" => Ok(BookingStatus::Pending),
            "Confirmed" => Ok(BookingStatus::Confirmed),
            "InProgress" => Ok(BookingStatus::InProgress),
            "Completed" => Ok(BookingStatus::Completed),
            "Cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(anyhow::anyhow!("Invalid BookingStatus value: {}", other)),
        }
    }
}

/// A fixed-duration, fixed-price offering by one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub duration_minutes: u32,
    pub price_cents: i64,
}

/// A provider-declared availability window on one calendar date.
///
/// No booked/reserved flags live here; see
/// [`crate::coordinator::SlotFlags`] for the derived aggregate.
#[derive(Debug, Clone)]
pub struct Slot {
    pub id: SlotId,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Slot {
    pub fn minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// The atomic bookable unit inside a slot. Identity is `(slot_id, index)`
/// regardless of whether the row was materialized eagerly or lazily.
#[derive(Debug, Clone)]
pub struct Segment {
    pub slot_id: SlotId,
    pub index: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub state: SegmentState,
    pub booking_id: Option<BookingId>,
}

/// A client's claim on exactly one segment. Bookings carry their segment
/// reference from creation, so lookup-by-id is the only path back to the
/// segment.
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: BookingId,
    pub service_id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub slot_id: SlotId,
    pub segment_index: u32,
    pub scheduled_start: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub address: String,
    pub total_price_cents: i64,
    pub reserved_at: DateTime<Utc>,
}

/// A slot enriched with its segments, as returned by availability listing.
#[derive(Debug, Clone)]
pub struct SlotAvailability {
    pub slot: Slot,
    pub segments: Vec<Segment>,
}

impl SlotAvailability {
    pub fn has_open_segment(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.state == SegmentState::Available)
    }
}
