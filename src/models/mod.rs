pub use station::{format_timestamp, parse_timestamp, StationRecord};

mod station;
