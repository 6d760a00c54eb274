use chrono::NaiveDate;
use reactive::{Binder, Dependency, Setter, StateCell};
use serde::Serialize;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Number,
    Date,
}

/// A form field bound to a text cell.
///
/// The stored value is always the raw text the user typed; the typed
/// accessors parse on read and never rewrite it.
#[derive(Debug, Clone)]
pub struct InputBinding {
    kind: InputKind,
    value: StateCell<String>,
    set_value: Setter<String>,
}

impl InputBinding {
    pub fn new<V: 'static>(binder: &Binder<V>, name: &str, kind: InputKind) -> Self {
        let (value, set_value) = binder.create_cell(name, String::new());
        Self {
            kind,
            value,
            set_value,
        }
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.value.name()
    }

    pub fn value(&self) -> String {
        self.value.get()
    }

    /// The change handler: replaces the field text.
    pub fn set(&self, text: impl Into<String>) -> bool {
        self.set_value.set(text.into())
    }

    pub fn clear(&self) -> bool {
        self.set_value.set(String::new())
    }

    pub fn as_number(&self) -> Option<f64> {
        self.value.with(|text| text.trim().parse().ok())
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        self.value
            .with(|text| NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok())
    }

    pub fn dependency(&self) -> Dependency {
        self.value.dependency()
    }
}

#[cfg(test)]
#[path = "tests/input_tests.rs"]
mod tests;
