use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::StationRecord;

use super::RawStation;

/// Builds a `StationRecord` out of one station object published by the
/// Trentino open data hub.
pub fn adapt(
    raw: &RawStation,
    collected_at: DateTime<FixedOffset>,
    city: &str,
) -> Result<StationRecord> {
    let station = TrentinoStation::deserialize(raw)
        .map_err(|e| Error::MalformedPayload(format!("station: {}", e)))?;

    Ok(station.into_record(collected_at, city))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrentinoStation {
    id: StationId,
    name: String,
    address: String,
    bikes: u32,
    slots: u32,
    total_slots: u32,
    /// `[latitude, longitude]`
    position: [f64; 2],
}

/// Some feeds publish numeric ids.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StationId {
    Text(String),
    Number(serde_json::Number),
}

impl From<StationId> for String {
    fn from(value: StationId) -> Self {
        match value {
            StationId::Text(s) => s,
            StationId::Number(n) => n.to_string(),
        }
    }
}

impl TrentinoStation {
    fn into_record(self, collected_at: DateTime<FixedOffset>, city: &str) -> StationRecord {
        let [latitude, longitude] = self.position;

        StationRecord {
            station_id: self.id.into(),
            name: self.name,
            address: self.address,
            bikes_available: self.bikes,
            slots_available: self.slots,
            total_slots: self.total_slots,
            latitude,
            longitude,
            timestamp: collected_at,
            city: city.to_string(),
        }
    }
}
