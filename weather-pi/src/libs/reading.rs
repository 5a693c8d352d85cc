//! The current reading shared between the collector and the uploader.

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

/// Canonical reading attributes. The string form is the JSON key sent to the ingestion API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    BroadcastedStationId,
    Battery,
    Timestamp,
    Temperature,
    Humidity,
    WindSpeed,
    WindDir,
    WindGust,
    Rain,
}

/// Fields produced by normalizing one raw sensor message.
pub type PartialReading = Vec<(CanonicalField, Value)>;

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::BroadcastedStationId,
        CanonicalField::Battery,
        CanonicalField::Timestamp,
        CanonicalField::Temperature,
        CanonicalField::Humidity,
        CanonicalField::WindSpeed,
        CanonicalField::WindDir,
        CanonicalField::WindGust,
        CanonicalField::Rain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::BroadcastedStationId => "broadcasted_station_id",
            CanonicalField::Battery => "battery",
            CanonicalField::Timestamp => "timestamp",
            CanonicalField::Temperature => "temperature",
            CanonicalField::Humidity => "humidity",
            CanonicalField::WindSpeed => "wind_speed",
            CanonicalField::WindDir => "wind_dir",
            CanonicalField::WindGust => "wind_gust",
            CanonicalField::Rain => "rain",
        }
    }
}

/// The single current snapshot of all known canonical fields.
///
/// Cloning gives another handle to the same state. Fields are only ever inserted or overwritten,
/// never removed.
#[derive(Clone, Default)]
pub struct SharedReading {
    fields: Arc<Mutex<Map<String, Value>>>,
}

impl SharedReading {
    pub fn new() -> Self {
        SharedReading::default()
    }

    pub fn set_field(&self, field: CanonicalField, value: Value) {
        let mut mutex = self.fields.lock().unwrap();
        (*mutex).insert(field.as_str().to_string(), value);
    }

    /// Merge all fields of one normalized message under a single lock so that a snapshot never
    /// sees half of a message.
    pub fn merge(&self, update: PartialReading) {
        if update.is_empty() {
            return;
        }
        let mut mutex = self.fields.lock().unwrap();
        for (field, value) in update {
            (*mutex).insert(field.as_str().to_string(), value);
        }
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.fields.lock().unwrap().clone()
    }

    /// Number of canonical fields observed so far.
    pub fn len(&self) -> usize {
        self.fields.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when every canonical field has been set at least once.
    pub fn is_complete(&self) -> bool {
        let mutex = self.fields.lock().unwrap();
        CanonicalField::ALL
            .iter()
            .all(|field| (*mutex).contains_key(field.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn starts_empty_and_incomplete() {
        let reading = SharedReading::new();
        assert!(reading.is_empty());
        assert!(!reading.is_complete());
        assert_eq!(reading.snapshot(), Map::new());
    }

    #[test]
    fn last_write_wins() {
        let reading = SharedReading::new();
        reading.set_field(CanonicalField::Temperature, json!(18.5));
        reading.set_field(CanonicalField::Temperature, json!(19.25));
        assert_eq!(reading.len(), 1);
        assert_eq!(reading.snapshot()["temperature"], json!(19.25));
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let reading = SharedReading::new();
        reading.set_field(CanonicalField::Rain, json!(1.2));
        reading.merge(vec![
            (CanonicalField::Humidity, json!(60)),
            (CanonicalField::Battery, json!(true)),
        ]);
        let snapshot = reading.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot["rain"], json!(1.2));
        assert_eq!(snapshot["humidity"], json!(60));
        assert_eq!(snapshot["battery"], json!(true));
    }

    #[test]
    fn complete_after_all_fields() {
        let reading = SharedReading::new();
        for (i, field) in CanonicalField::ALL.iter().enumerate() {
            assert!(!reading.is_complete());
            reading.set_field(*field, json!(i));
        }
        assert!(reading.is_complete());
    }

    #[test]
    fn clones_share_state() {
        let reading = SharedReading::new();
        let other = reading.clone();
        other.set_field(CanonicalField::WindDir, json!(270));
        assert_eq!(reading.snapshot()["wind_dir"], json!(270));
    }
}
