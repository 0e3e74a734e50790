//! Request and response types for the CommonSense API

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Types
// =============================================================================

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Opaque session token issued by `/login.json`
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

// =============================================================================
// Sensor Types
// =============================================================================

/// Sensor definition
///
/// `id` is assigned by the server and stays empty until the sensor has been
/// created with [`SenseClient::post_sensor`](crate::SenseClient::post_sensor).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    #[serde(
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "de::text"
    )]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "String::is_empty",
        deserialize_with = "de::text"
    )]
    pub sensor_type: String,
    #[serde(default, deserialize_with = "de::text")]
    pub device_type: String,
    #[serde(default, deserialize_with = "de::text")]
    pub display_name: String,
    /// Whether the service persists raw values for this sensor
    #[serde(default, deserialize_with = "de::flag")]
    pub use_data_storage: bool,
    #[serde(default, deserialize_with = "de::text")]
    pub data_type: String,
    /// Structure hint for `json` sensors
    #[serde(
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "de::text"
    )]
    pub data_structure: String,
}

impl Sensor {
    /// Create a sensor definition that stores its data
    pub fn new(
        name: impl Into<String>,
        device_type: impl Into<String>,
        display_name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            display_name: display_name.into(),
            data_type: data_type.into(),
            use_data_storage: true,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, sensor_type: impl Into<String>) -> Self {
        self.sensor_type = sensor_type.into();
        self
    }

    pub fn with_data_structure(mut self, data_structure: impl Into<String>) -> Self {
        self.data_structure = data_structure.into();
        self
    }

    pub fn with_data_storage(mut self, enabled: bool) -> Self {
        self.use_data_storage = enabled;
        self
    }
}

/// Sensor together with the metatags of one namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorMetatags {
    #[serde(flatten)]
    pub sensor: Sensor,
    /// Free-form tags; shape is defined by whoever wrote them
    #[serde(default, deserialize_with = "de::tag_map")]
    pub metatags: HashMap<String, serde_json::Value>,
}

/// Request envelope for create/update
#[derive(Debug, Serialize)]
pub(crate) struct SensorEnvelope<'a> {
    pub sensor: &'a Sensor,
}

/// Sensor listing response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorListResponse {
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Metatags listing response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetatagsListResponse {
    #[serde(default)]
    pub sensors: Vec<SensorMetatags>,
    #[serde(default)]
    pub total: Option<u64>,
}

// =============================================================================
// Data Types
// =============================================================================

/// One timestamped value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Owning sensor; set by the server on multi-sensor reads
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de::optional_text"
    )]
    pub sensor_id: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub value: String,
    /// Seconds since the Unix epoch
    #[serde(serialize_with = "ser::date", deserialize_with = "de::date")]
    pub date: f64,
}

impl DataPoint {
    pub fn new(value: impl Into<String>, date: f64) -> Self {
        Self {
            sensor_id: None,
            value: value.into(),
            date,
        }
    }

    /// Create a point stamped with a wall-clock time
    pub fn at(value: impl Into<String>, time: DateTime<Utc>) -> Self {
        let date = time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1e6;
        Self::new(value, date)
    }

    /// The point's date as a UTC timestamp, if representable
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if !self.date.is_finite() {
            return None;
        }
        let secs = self.date.floor();
        let nanos = ((self.date - secs) * 1e9).round() as u32;
        Utc.timestamp_opt(secs as i64, nanos.min(999_999_999)).single()
    }

    pub(crate) fn truncate_date(&mut self) {
        self.date = self.date.trunc();
    }
}

/// Ordered data points of a single sensor, as uploaded in bulk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    #[serde(
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "de::text"
    )]
    pub sensor_id: String,
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

impl SensorData {
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, point: DataPoint) {
        self.data.push(point);
    }

    pub fn with_point(mut self, point: DataPoint) -> Self {
        self.data.push(point);
        self
    }
}

/// Bulk upload envelope
#[derive(Debug, Serialize)]
pub(crate) struct SensorsDataUpload<'a> {
    pub sensors: &'a [SensorData],
}

/// Data read response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataListResponse {
    #[serde(default)]
    pub data: Vec<DataPoint>,
    #[serde(default)]
    pub total: Option<u64>,
}

// =============================================================================
// Serde helpers
// =============================================================================

mod ser {
    use serde::ser::Error;
    use serde::Serializer;

    /// Whole seconds go out as integers, everything else as floats
    pub fn date<S: Serializer>(date: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if !date.is_finite() {
            return Err(S::Error::custom(format!("date {} is not a finite number", date)));
        }
        if date.fract() == 0.0 && date.abs() < 9_007_199_254_740_992.0 {
            serializer.serialize_i64(*date as i64)
        } else {
            serializer.serialize_f64(*date)
        }
    }
}

mod de {
    use std::collections::HashMap;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Any scalar as text; null becomes empty
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(optional_text(deserializer)?.unwrap_or_default())
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        })
    }

    /// Booleans arrive as `true`, `1` or `"true"` depending on the endpoint
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::Number(n)) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" | "" => Ok(false),
                other => Err(D::Error::custom(format!("invalid flag: {}", other))),
            },
            Some(other) => Err(D::Error::custom(format!("invalid flag: {}", other))),
        }
    }

    pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| D::Error::custom("date out of range")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| D::Error::custom(format!("invalid date {:?}: {}", s, e))),
            other => Err(D::Error::custom(format!("invalid date: {}", other))),
        }
    }

    /// Empty tag sets are sometimes sent as `[]` instead of `{}`
    pub fn tag_map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<String, Value>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(HashMap::new()),
            Some(Value::Object(map)) => Ok(map.into_iter().collect()),
            Some(Value::Array(items)) if items.is_empty() => Ok(HashMap::new()),
            Some(other) => Err(D::Error::custom(format!(
                "metatags must be an object, got {}",
                other
            ))),
        }
    }
}
