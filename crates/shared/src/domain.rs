use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, SensorError};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(RecordId);

/// One remote repository as the browser tracks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub favorite: bool,
}

impl Record {
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            favorite: false,
        }
    }

    /// Shallow copy with the favorite flag inverted.
    pub fn with_favorite_toggled(&self) -> Self {
        Self {
            favorite: !self.favorite,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Latest known location. `Pending` until the first sensor event arrives.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Pending,
    Fixed(Coordinates),
    Unavailable(SensorError),
}

impl PositionState {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Fixed(coords) => Some(*coords),
            Self::Pending | Self::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(LoadError),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}
