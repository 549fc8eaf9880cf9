//! Reservation event payloads
//!
//! The JSON body carried in the `job` field of a queue entry. Producers have
//! emitted both camelCase (`userId`) and PascalCase (`UserId`) keys; both are
//! accepted. Unknown keys are ignored.

use crate::error::DecodeError;
use chrono::{DateTime, FixedOffset};
use domain_users::UserId;
use serde::{Deserialize, Serialize};

/// A reservation as announced on a queue. The queue decides the [`crate::EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationEvent {
    #[serde(alias = "UserId")]
    pub user_id: UserId,
    #[serde(alias = "Saloon")]
    pub saloon: String,
    #[serde(alias = "Service")]
    pub service: String,
    #[serde(alias = "Worker")]
    pub worker: String,
    #[serde(alias = "StartTime", deserialize_with = "timestamp::deserialize")]
    pub start_time: DateTime<FixedOffset>,
    #[serde(alias = "EndTime", deserialize_with = "timestamp::deserialize")]
    pub end_time: DateTime<FixedOffset>,
}

impl ReservationEvent {
    /// Serialize as a queue payload. Timestamps are written as RFC 3339.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Decode a queue payload.
pub fn decode(payload: &[u8]) -> Result<ReservationEvent, DecodeError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let event: ReservationEvent = serde_json::from_slice(payload)?;

    if event.start_time > event.end_time {
        return Err(DecodeError::InvalidTimeRange {
            start: event.start_time,
            end: event.end_time,
        });
    }

    Ok(event)
}

/// RFC 3339, or a naive ISO-8601 date-time read as UTC
mod timestamp {
    use chrono::{DateTime, FixedOffset, NaiveDateTime};
    use serde::{Deserialize, Deserializer, de::Error};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

    pub fn parse(raw: &str) -> Option<DateTime<FixedOffset>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt);
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc().fixed_offset())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}
