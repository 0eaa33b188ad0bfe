use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dialogue slots tracked in a session context. Each slot is stored as a
/// value key and a `missing*` flag key; at most one of the two is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    EmergencyType,
    Location,
    Datetime,
    LocationToFind,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::EmergencyType,
        Slot::Location,
        Slot::Datetime,
        Slot::LocationToFind,
    ];

    pub fn value_key(&self) -> &'static str {
        match self {
            Slot::EmergencyType => "emergencyType",
            Slot::Location => "location",
            Slot::Datetime => "datetime",
            Slot::LocationToFind => "locationToFind",
        }
    }

    pub fn missing_key(&self) -> &'static str {
        match self {
            Slot::EmergencyType => "missingEmergencyType",
            Slot::Location => "missingLocation",
            Slot::Datetime => "missingDatetime",
            Slot::LocationToFind => "missingLocationToFind",
        }
    }
}

/// Mutable key/value state attached to a session and rewritten by dialogue
/// actions. Serialized as a plain JSON object.
///
/// ```
/// use serde_json::json;
/// use sos_session::{Context, Slot};
///
/// let mut ctx = Context::new();
/// ctx.set_slot(Slot::Location, Some(json!("Montreal")));
/// assert_eq!(ctx.slot(Slot::Location), Some(&json!("Montreal")));
/// ctx.set_slot(Slot::Location, None);
/// assert!(ctx.is_missing(Slot::Location));
/// assert_eq!(ctx.slot(Slot::Location), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Stores `value` in the slot and drops its missing flag, or flags the
    /// slot as missing and drops any previous value.
    pub fn set_slot(&mut self, slot: Slot, value: Option<Value>) {
        match value {
            Some(value) => {
                self.0.insert(slot.value_key().to_string(), value);
                self.0.remove(slot.missing_key());
            }
            None => {
                self.0
                    .insert(slot.missing_key().to_string(), Value::Bool(true));
                self.0.remove(slot.value_key());
            }
        }
    }

    pub fn slot(&self, slot: Slot) -> Option<&Value> {
        self.0.get(slot.value_key())
    }

    /// Slot value rendered as text; JSON strings are returned unquoted.
    pub fn slot_text(&self, slot: Slot) -> Option<String> {
        self.slot(slot).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn is_missing(&self, slot: Slot) -> bool {
        self.0.contains_key(slot.missing_key())
    }

    /// Removes both keys of the slot.
    pub fn clear_slot(&mut self, slot: Slot) {
        self.0.remove(slot.value_key());
        self.0.remove(slot.missing_key());
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Context {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}
