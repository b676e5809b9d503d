//! SQLite-backed implementation of [`BookingStore`].
//!
//! Schema is bootstrapped in the constructor so a fresh database file
//! (or an in-memory pool in tests) is usable immediately. The segment
//! transitions are single conditional UPDATEs; `rows_affected` is the
//! atomic check-and-set result the coordinator relies on.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use super::BookingStore;
use crate::model::{
    Booking, BookingId, BookingStatus, Segment, SegmentState, Service, Slot, SlotId,
};
use common::time::{from_ms, to_ms};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S";

pub struct SqliteBookingStore {
    pool: SqlitePool,
}

impl SqliteBookingStore {
    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Connect and ensure schema exists.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Self::from_pool(pool).await
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY,
                provider_id TEXT NOT NULL,
                name TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL,
                price_cents INTEGER NOT NULL
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                id TEXT PRIMARY KEY,
                provider_id TEXT NOT NULL,
                service_id TEXT NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                UNIQUE(provider_id, date, start_time, end_time)
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS segments (
                slot_id TEXT NOT NULL,
                seg_index INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                state TEXT NOT NULL,
                booking_id TEXT,
                PRIMARY KEY (slot_id, seg_index)
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                service_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                provider_id TEXT NOT NULL,
                slot_id TEXT NOT NULL,
                seg_index INTEGER NOT NULL,
                scheduled_start_ms INTEGER NOT NULL,
                duration_minutes INTEGER NOT NULL,
                status TEXT NOT NULL,
                address TEXT NOT NULL,
                total_price_cents INTEGER NOT NULL,
                reserved_at_ms INTEGER NOT NULL
            );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_slots_service_date ON slots(service_id, date);"#)
            .execute(&self.pool)
            .await?;

        sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);"#)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl BookingStore for SqliteBookingStore {
    async fn insert_service(&self, service: &Service) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO services (id, provider_id, name, duration_minutes, price_cents)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                provider_id = excluded.provider_id,
                name = excluded.name,
                duration_minutes = excluded.duration_minutes,
                price_cents = excluded.price_cents;
        "#,
        )
        .bind(service.id.to_string())
        .bind(service.provider_id.to_string())
        .bind(&service.name)
        .bind(service.duration_minutes as i64)
        .bind(service.price_cents)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_service(&self, id: Uuid) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query("SELECT * FROM services WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_service(&r)?)),
            None => Ok(None),
        }
    }

    async fn insert_slot(&self, slot: &Slot) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO slots (id, provider_id, service_id, date, start_time, end_time)
            VALUES (?, ?, ?, ?, ?, ?);
        "#,
        )
        .bind(slot.id.to_string())
        .bind(slot.provider_id.to_string())
        .bind(slot.service_id.to_string())
        .bind(slot.date.format(DATE_FMT).to_string())
        .bind(slot.start_time.format(TIME_FMT).to_string())
        .bind(slot.end_time.format(TIME_FMT).to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_slot(&self, id: SlotId) -> anyhow::Result<Option<Slot>> {
        let row = sqlx::query("SELECT * FROM slots WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_slot(&r)?)),
            None => Ok(None),
        }
    }

    async fn find_slot_by_window(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> anyhow::Result<Option<Slot>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM slots
            WHERE provider_id = ? AND date = ? AND start_time = ? AND end_time = ?;
        "#,
        )
        .bind(provider_id.to_string())
        .bind(date.format(DATE_FMT).to_string())
        .bind(start_time.format(TIME_FMT).to_string())
        .bind(end_time.format(TIME_FMT).to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_slot(&r)?)),
            None => Ok(None),
        }
    }

    async fn slots_for_service(
        &self,
        service_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<Slot>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM slots
            WHERE service_id = ? AND date >= ? AND date <= ?
            ORDER BY date, start_time;
        "#,
        )
        .bind(service_id.to_string())
        .bind(from.format(DATE_FMT).to_string())
        .bind(to.format(DATE_FMT).to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut slots = Vec::with_capacity(rows.len());
        for r in rows {
            slots.push(row_to_slot(&r)?);
        }
        Ok(slots)
    }

    async fn delete_slot(&self, id: SlotId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM segments WHERE slot_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM slots WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_segment_if_absent(&self, segment: &Segment) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO segments (slot_id, seg_index, start_time, end_time, state, booking_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(slot_id, seg_index) DO NOTHING;
        "#,
        )
        .bind(segment.slot_id.to_string())
        .bind(segment.index as i64)
        .bind(segment.start_time.format(TIME_FMT).to_string())
        .bind(segment.end_time.format(TIME_FMT).to_string())
        .bind(segment.state.to_string())
        .bind(segment.booking_id.map(|b| b.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn segments_for_slot(&self, slot_id: SlotId) -> anyhow::Result<Vec<Segment>> {
        let rows = sqlx::query("SELECT * FROM segments WHERE slot_id = ? ORDER BY seg_index")
            .bind(slot_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut segments = Vec::with_capacity(rows.len());
        for r in rows {
            segments.push(row_to_segment(&r)?);
        }
        Ok(segments)
    }

    async fn find_segment(&self, slot_id: SlotId, index: u32) -> anyhow::Result<Option<Segment>> {
        let row = sqlx::query("SELECT * FROM segments WHERE slot_id = ? AND seg_index = ?")
            .bind(slot_id.to_string())
            .bind(index as i64)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_segment(&r)?)),
            None => Ok(None),
        }
    }

    async fn try_reserve_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE segments
            SET state = 'Reserved', booking_id = ?
            WHERE slot_id = ? AND seg_index = ? AND state = 'Available';
        "#,
        )
        .bind(booking_id.to_string())
        .bind(slot_id.to_string())
        .bind(index as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn confirm_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE segments
            SET state = 'Booked'
            WHERE slot_id = ? AND seg_index = ? AND state = 'Reserved' AND booking_id = ?;
        "#,
        )
        .bind(slot_id.to_string())
        .bind(index as i64)
        .bind(booking_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_segment(
        &self,
        slot_id: SlotId,
        index: u32,
        booking_id: BookingId,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE segments
            SET state = 'Available', booking_id = NULL
            WHERE slot_id = ? AND seg_index = ? AND state = 'Reserved' AND booking_id = ?;
        "#,
        )
        .bind(slot_id.to_string())
        .bind(index as i64)
        .bind(booking_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_booking(&self, booking: &Booking) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, service_id, client_id, provider_id,
                slot_id, seg_index, scheduled_start_ms, duration_minutes,
                status, address, total_price_cents, reserved_at_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
        "#,
        )
        .bind(booking.id.to_string())
        .bind(booking.service_id.to_string())
        .bind(booking.client_id.to_string())
        .bind(booking.provider_id.to_string())
        .bind(booking.slot_id.to_string())
        .bind(booking.segment_index as i64)
        .bind(to_ms(booking.scheduled_start))
        .bind(booking.duration_minutes as i64)
        .bind(booking.status.to_string())
        .bind(&booking.address)
        .bind(booking.total_price_cents)
        .bind(to_ms(booking.reserved_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_booking(&self, id: BookingId) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_booking(&r)?)),
            None => Ok(None),
        }
    }

    async fn set_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn stale_unpaid_bookings(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM bookings
            WHERE status IN ('Reserved', 'Pending') AND reserved_at_ms < ?;
        "#,
        )
        .bind(to_ms(cutoff))
        .fetch_all(&self.pool)
        .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for r in rows {
            bookings.push(row_to_booking(&r)?);
        }
        Ok(bookings)
    }
}

/* =========================
Row mapping
========================= */

fn row_to_service(r: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Service> {
    Ok(Service {
        id: parse_uuid(r, "id")?,
        provider_id: parse_uuid(r, "provider_id")?,
        name: r.get("name"),
        duration_minutes: r.get::<i64, _>("duration_minutes") as u32,
        price_cents: r.get("price_cents"),
    })
}

fn row_to_slot(r: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Slot> {
    Ok(Slot {
        id: parse_uuid(r, "id")?,
        provider_id: parse_uuid(r, "provider_id")?,
        service_id: parse_uuid(r, "service_id")?,
        date: NaiveDate::parse_from_str(&r.get::<String, _>("date"), DATE_FMT)?,
        start_time: NaiveTime::parse_from_str(&r.get::<String, _>("start_time"), TIME_FMT)?,
        end_time: NaiveTime::parse_from_str(&r.get::<String, _>("end_time"), TIME_FMT)?,
    })
}

fn row_to_segment(r: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Segment> {
    let state_str: String = r.get("state");
    let booking_id = r
        .get::<Option<String>, _>("booking_id")
        .map(|s| Uuid::parse_str(&s))
        .transpose()?;

    Ok(Segment {
        slot_id: parse_uuid(r, "slot_id")?,
        index: r.get::<i64, _>("seg_index") as u32,
        start_time: NaiveTime::parse_from_str(&r.get::<String, _>("start_time"), TIME_FMT)?,
        end_time: NaiveTime::parse_from_str(&r.get::<String, _>("end_time"), TIME_FMT)?,
        state: SegmentState::from_str(&state_str)?,
        booking_id,
    })
}

fn row_to_booking(r: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Booking> {
    let status_str: String = r.get("status");

    Ok(Booking {
        id: parse_uuid(r, "id")?,
        service_id: parse_uuid(r, "service_id")?,
        client_id: parse_uuid(r, "client_id")?,
        provider_id: parse_uuid(r, "provider_id")?,
        slot_id: parse_uuid(r, "slot_id")?,
        segment_index: r.get::<i64, _>("seg_index") as u32,
        scheduled_start: from_ms(r.get("scheduled_start_ms"))?,
        duration_minutes: r.get::<i64, _>("duration_minutes") as u32,
        status: BookingStatus::from_str(&status_str)?,
        address: r.get("address"),
        total_price_cents: r.get("total_price_cents"),
        reserved_at: from_ms(r.get("reserved_at_ms"))?,
    })
}

fn parse_uuid(r: &sqlx::sqlite::SqliteRow, column: &str) -> anyhow::Result<Uuid> {
    let s: String = r.get(column);
    Ok(Uuid::parse_str(&s)?)
}
