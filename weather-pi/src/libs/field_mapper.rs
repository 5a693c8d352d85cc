//! Maps raw receiver messages to canonical reading fields.

use std::io::{Error as IoError, ErrorKind};

use chrono::{Local, NaiveDateTime, TimeZone};
use serde_json::{Map, Value};

use super::reading::{CanonicalField, PartialReading};

/// Raw receiver key to canonical field.
pub const FIELD_MAPPING: [(&'static str, CanonicalField); 9] = [
    ("id", CanonicalField::BroadcastedStationId),
    ("battery_ok", CanonicalField::Battery),
    ("time", CanonicalField::Timestamp),
    ("temperature_C", CanonicalField::Temperature),
    ("humidity", CanonicalField::Humidity),
    ("wind_avg_m_s", CanonicalField::WindSpeed),
    ("wind_dir_deg", CanonicalField::WindDir),
    ("wind_max_m_s", CanonicalField::WindGust),
    ("rain_mm", CanonicalField::Rain),
];

/// Receiver time format, for example `2025-10-05 19:55:21`.
pub const TIME_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

const RAW_TIME: &'static str = "time";
const RAW_BATTERY: &'static str = "battery_ok";

/// Normalize one raw message into the canonical fields it carries.
///
/// Values are copied verbatim except:
/// - `time` is parsed as a naive local time and becomes Unix epoch seconds.
/// - `battery_ok` becomes `true` when it equals 1 (`1`, `1.0` or `true`), otherwise `false`.
///
/// Unknown keys are dropped. An `InvalidData` error is returned when `time` is not a string in
/// [`TIME_FORMAT`].
pub fn normalize(raw: &Map<String, Value>) -> Result<PartialReading, IoError> {
    let mut reading = PartialReading::with_capacity(FIELD_MAPPING.len());
    for (raw_key, field) in FIELD_MAPPING.iter() {
        let value = match raw.get(*raw_key) {
            None => continue,
            Some(value) => value,
        };
        let value = match *raw_key {
            RAW_TIME => Value::from(parse_time(value)?),
            RAW_BATTERY => Value::Bool(is_battery_ok(value)),
            _ => value.clone(),
        };
        reading.push((*field, value));
    }
    Ok(reading)
}

fn is_battery_ok(value: &Value) -> bool {
    match value {
        Value::Bool(ok) => *ok,
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Parse a receiver time value into Unix epoch seconds in the local time zone.
pub fn parse_time(value: &Value) -> Result<i64, IoError> {
    let time_str = match value.as_str() {
        None => {
            return Err(IoError::new(
                ErrorKind::InvalidData,
                format!("`time` should be a string, got {}", value),
            ));
        }
        Some(s) => s,
    };
    let naive = match NaiveDateTime::parse_from_str(time_str, TIME_FORMAT) {
        Err(e) => {
            return Err(IoError::new(
                ErrorKind::InvalidData,
                format!("invalid `time` {}: {}", time_str, e),
            ));
        }
        Ok(naive) => naive,
    };
    match Local.from_local_datetime(&naive).earliest() {
        None => Err(IoError::new(
            ErrorKind::InvalidData,
            format!("`time` {} does not exist in the local time zone", time_str),
        )),
        Some(time) => Ok(time.timestamp()),
    }
}
