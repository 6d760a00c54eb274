use serde::{Deserialize, Serialize};

use crate::domain::{Coordinates, Record, RecordId};

/// One element of the remote list body. Only `id` and `name` are required;
/// every other field the server sends is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPayload {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub favorite: bool,
}

impl From<RecordPayload> for Record {
    fn from(value: RecordPayload) -> Self {
        Self {
            id: value.id,
            name: value.name,
            favorite: value.favorite,
        }
    }
}

/// A single event from a position watch: `{coords: {latitude, longitude}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub coords: Coordinates,
}

impl SensorReading {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coords: Coordinates::new(latitude, longitude),
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
