//! Weather records accepted and returned by the data API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON type of one required record field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldType {
    Int,
    Bool,
    Float,
}

/// Required fields of an uploaded record and their JSON types.
pub const RECORD_SCHEMA: [(&'static str, FieldType); 9] = [
    ("broadcasted_station_id", FieldType::Int),
    ("battery", FieldType::Bool),
    ("timestamp", FieldType::Int),
    ("temperature", FieldType::Float),
    ("humidity", FieldType::Int),
    ("wind_speed", FieldType::Float),
    ("wind_dir", FieldType::Int),
    ("wind_gust", FieldType::Float),
    ("rain", FieldType::Float),
];

/// A validated record from a station.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NewRecord {
    pub broadcasted_station_id: i64,
    pub battery: bool,
    pub timestamp: i64,
    pub temperature: f64,
    pub humidity: i64,
    pub wind_speed: f64,
    pub wind_dir: i64,
    pub wind_gust: f64,
    pub rain: f64,
}

/// A stored record.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Record {
    pub id: i64,
    pub broadcasted_station_id: i64,
    pub battery: bool,
    pub timestamp: i64,
    pub temperature: f64,
    pub humidity: i64,
    pub wind_speed: f64,
    pub wind_dir: i64,
    pub wind_gust: f64,
    pub rain: f64,
    pub station_id: i64,
}

impl FieldType {
    /// Integers must be JSON integers and floats must be JSON numbers with a fraction or exponent.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::Int => value.is_i64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Float => value.is_f64(),
        }
    }
}

/// Check an uploaded body against [`RECORD_SCHEMA`].
///
/// All fields must be present before types are checked. Unknown fields are ignored.
pub fn validate(body: &Map<String, Value>) -> Result<NewRecord, String> {
    let missing: Vec<&str> = RECORD_SCHEMA
        .iter()
        .filter(|(name, _)| !body.contains_key(*name))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing field: {}", missing.join(", ")));
    }

    let wrong: Vec<&str> = RECORD_SCHEMA
        .iter()
        .filter(|(name, field_type)| !field_type.matches(&body[*name]))
        .map(|(name, _)| *name)
        .collect();
    if !wrong.is_empty() {
        return Err(format!("wrong type: {}", wrong.join(", ")));
    }

    let mut record = Map::new();
    for (name, _) in RECORD_SCHEMA.iter() {
        record.insert(name.to_string(), body[*name].clone());
    }
    serde_json::from_value(Value::Object(record)).map_err(|e| format!("wrong type: {}", e))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body() -> Map<String, Value> {
        match json!({
            "broadcasted_station_id": 7,
            "battery": true,
            "timestamp": 1759694121,
            "temperature": 18.5,
            "humidity": 60,
            "wind_speed": 2.25,
            "wind_dir": 202,
            "wind_gust": 3.5,
            "rain": 12.75
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn valid() {
        let mut body = body();
        body.insert("extra".to_string(), json!("ignored"));
        let record = validate(&body).unwrap();
        assert_eq!(record.broadcasted_station_id, 7);
        assert!(record.battery);
        assert_eq!(record.timestamp, 1759694121);
        assert_eq!(record.temperature, 18.5);
        assert_eq!(record.rain, 12.75);
    }

    #[test]
    fn missing_rain() {
        let mut body = body();
        body.remove("rain");
        assert_eq!(validate(&body).unwrap_err(), "missing field: rain");
    }

    #[test]
    fn missing_before_wrong_type() {
        let mut body = body();
        body.remove("humidity");
        body.insert("battery".to_string(), json!(1));
        assert_eq!(validate(&body).unwrap_err(), "missing field: humidity");
    }

    #[test]
    fn wrong_types() {
        for (name, value) in [
            ("broadcasted_station_id", json!("7")),
            ("broadcasted_station_id", json!(7.0)),
            ("battery", json!(1)),
            ("timestamp", json!(null)),
            ("temperature", json!(18)),
            ("humidity", json!(60.5)),
            ("wind_speed", json!(true)),
            ("wind_dir", json!([202])),
            ("rain", json!("12.75")),
        ] {
            let mut body = body();
            body.insert(name.to_string(), value.clone());
            assert_eq!(
                validate(&body).unwrap_err(),
                format!("wrong type: {}", name),
                "{} = {}",
                name,
                value
            );
        }
    }
}
