//! Generic event records produced by device decoders

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Well-known field names shared by every device decoder
pub mod fields {
    pub const TYPE: &str = "type";
    pub const SUB_TYPE: &str = "subType";
    pub const ID: &str = "id";
    pub const DEVICE_ID: &str = "deviceId";
    pub const TS: &str = "ts";
    pub const DEVICE_TIME: &str = "deviceTime";
    pub const SOURCE: &str = "source";
    pub const DELIVERY_TYPE: &str = "deliveryType";
    pub const DURATION: &str = "duration";
    pub const TEMP_ID: &str = "tempId";
}

/// Event type tag for basal insulin delivery
pub const BASAL: &str = "basal";

/// Delivery type of a temporary basal rate
pub const DELIVERY_TEMP: &str = "temp";

/// Delivery type of a synthesized temporary basal stop
pub const DELIVERY_TEMP_STOP: &str = "temp-stop";

/// A generic, typed, timestamped clinical or device record
///
/// Events are open records: decoders populate the well-known fields in
/// [`fields`] plus whatever type-specific fields their format carries.
/// The record serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: Map<String, Value>,
}

impl Event {
    /// Create an event with the given `type`
    pub fn new(event_type: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(fields::TYPE.to_string(), Value::String(event_type.into()));
        Self { fields }
    }

    /// Wrap an existing JSON object
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Parse an event from a JSON object literal
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Set a field, builder style
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Remove a field, returning its previous value
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Get a field; JSON `null` counts as absent
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Get a string field
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Whether the field is present and non-null
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.get_str(fields::TYPE)
    }

    pub fn sub_type(&self) -> Option<&str> {
        self.get_str(fields::SUB_TYPE)
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str(fields::ID)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.set(fields::ID, Value::String(id.into()));
    }

    pub fn device_id(&self) -> Option<&str> {
        self.get_str(fields::DEVICE_ID)
    }

    /// Instant timestamp, either epoch milliseconds or an RFC 3339 string
    pub fn ts(&self) -> Option<&Value> {
        self.get(fields::TS)
    }

    pub fn device_time(&self) -> Option<&Value> {
        self.get(fields::DEVICE_TIME)
    }

    pub fn source(&self) -> Option<&Value> {
        self.get(fields::SOURCE)
    }

    pub fn delivery_type(&self) -> Option<&str> {
        self.get_str(fields::DELIVERY_TYPE)
    }

    /// Delivery duration, if the event carries a numeric one
    pub fn duration(&self) -> Option<f64> {
        self.get(fields::DURATION).and_then(Value::as_f64)
    }

    /// Whether this is a basal record with temporary delivery
    pub fn is_temp_basal(&self) -> bool {
        self.event_type() == Some(BASAL) && self.delivery_type() == Some(DELIVERY_TEMP)
    }

    /// Borrow the underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Render the `ts` field for diagnostics
    pub fn ts_display(&self) -> String {
        match self.ts() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "<none>".to_string(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event {{ type: {}, deviceId: {}, ts: {} }}",
            self.event_type().unwrap_or("<none>"),
            self.device_id().unwrap_or("<none>"),
            self.ts_display()
        )
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}
