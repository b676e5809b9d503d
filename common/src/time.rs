use chrono::{DateTime, Utc};

/// Current wall-clock instant. All core timestamps are UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Millisecond epoch representation used by the sqlite stores.
pub fn to_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_ms(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| anyhow::anyhow!("timestamp out of range: {ms}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_round_trip_truncates_to_millis() {
        let ts = now();
        let back = from_ms(to_ms(ts)).unwrap();
        assert_eq!(back.timestamp_millis(), ts.timestamp_millis());
    }
}
