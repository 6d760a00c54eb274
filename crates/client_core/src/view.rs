//! Declarative view tree handed to the rendering host.

use serde::Serialize;
use shared::{
    domain::{LoadState, PositionState, RecordId},
    records::RecordList,
};

use crate::input::InputKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum View {
    Loading,
    Ready(Screen),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Screen {
    pub repositories: Vec<RepositoryRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
    pub location: LocationPanel,
    pub form: Vec<FieldView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRow {
    pub id: RecordId,
    pub name: String,
    /// Favorited rows are shown emphasized.
    pub favorite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPanel {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub name: String,
    pub kind: InputKind,
    pub value: String,
}

impl View {
    pub fn screen(&self) -> Option<&Screen> {
        match self {
            Self::Ready(screen) => Some(screen),
            Self::Loading => None,
        }
    }
}

impl LocationPanel {
    pub fn from_state(position: &PositionState) -> Self {
        match position {
            PositionState::Pending => Self {
                latitude: None,
                longitude: None,
                unavailable: None,
            },
            PositionState::Fixed(coords) => Self {
                latitude: Some(coords.latitude),
                longitude: Some(coords.longitude),
                unavailable: None,
            },
            PositionState::Unavailable(reason) => Self {
                latitude: None,
                longitude: None,
                unavailable: Some(reason.to_string()),
            },
        }
    }
}

/// Pure view function: the same inputs always produce the same tree.
pub fn render_view(
    records: &RecordList,
    load: &LoadState,
    position: &PositionState,
    form: Vec<FieldView>,
) -> View {
    if load.is_loading() {
        return View::Loading;
    }

    View::Ready(Screen {
        repositories: records
            .iter()
            .map(|record| RepositoryRow {
                id: record.id,
                name: record.name.clone(),
                favorite: record.favorite,
            })
            .collect(),
        load_error: load.error().map(ToString::to_string),
        location: LocationPanel::from_state(position),
        form,
    })
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
