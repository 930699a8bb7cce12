use chrono::{
    DateTime, FixedOffset, Local, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

/// One timestamped observation of a bike-sharing station.
///
/// Serializes to the flat layout used by the file store:
/// `id, name, address, bikes, slots, totalSlots, latitude, longitude, timestamp, city`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Identifier assigned by the source, unique only within a city.
    #[serde(rename = "id")]
    pub station_id: String,
    pub name: String,
    pub address: String,
    #[serde(rename = "bikes")]
    pub bikes_available: u32,
    #[serde(rename = "slots")]
    pub slots_available: u32,
    #[serde(rename = "totalSlots")]
    pub total_slots: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Collection time, shared by every record of one cycle.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    pub city: String,
}

/// Formats a collection time as RFC 3339 with an explicit offset.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parses an RFC 3339 timestamp. Values without an offset, written by older
/// collectors in local time, are read in the local zone, or as UTC when that
/// local time does not exist.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts);
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| match Local.from_local_datetime(&naive).earliest() {
            Some(local) => local.into(),
            None => Utc.fix().from_utc_datetime(&naive),
        })
}

mod timestamp {
    use chrono::{DateTime, FixedOffset};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let s = String::deserialize(deserializer)?;

        super::parse_timestamp(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp `{}`", s)))
    }
}
