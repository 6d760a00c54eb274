use std::{collections::HashSet, fmt, rc::Rc};

use crate::domain::{Record, RecordId};

/// Ordered, id-unique sequence of records.
///
/// The list is never edited in place: every change produces a new list.
/// Records are shared between successive lists, so a record that did not
/// change keeps its identity and downstream equality checks stay cheap.
#[derive(Clone, Default)]
pub struct RecordList {
    records: Rc<Vec<Rc<Record>>>,
}

impl RecordList {
    /// Builds a list from raw records. When the same id appears more than
    /// once the first occurrence wins.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|record| seen.insert(record.id))
            .map(Rc::new)
            .collect();
        Self {
            records: Rc::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().map(|record| record.as_ref())
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.iter().find(|record| record.id == id)
    }

    pub fn favorite_count(&self) -> usize {
        self.iter().filter(|record| record.favorite).count()
    }

    /// Returns a new list where only the record with `id` is replaced by a
    /// copy with `favorite` inverted. An unknown id yields a list sharing
    /// this one's storage.
    pub fn toggle_favorite(&self, id: RecordId) -> Self {
        if self.get(id).is_none() {
            return self.clone();
        }

        let records = self
            .records
            .iter()
            .map(|record| {
                if record.id == id {
                    Rc::new(record.with_favorite_toggled())
                } else {
                    Rc::clone(record)
                }
            })
            .collect();
        Self {
            records: Rc::new(records),
        }
    }

    /// True when both lists hold the very same allocation for `id`.
    pub fn shares_record(&self, other: &Self, id: RecordId) -> bool {
        let mine = self.records.iter().find(|record| record.id == id);
        let theirs = other.records.iter().find(|record| record.id == id);
        match (mine, theirs) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// True when both lists are the same allocation.
    pub fn same_storage(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.records, &other.records)
    }

    pub fn to_vec(&self) -> Vec<Record> {
        self.iter().cloned().collect()
    }
}

impl PartialEq for RecordList {
    fn eq(&self, other: &Self) -> bool {
        if self.same_storage(other) {
            return true;
        }
        self.records.len() == other.records.len()
            && self
                .records
                .iter()
                .zip(other.records.iter())
                .all(|(a, b)| Rc::ptr_eq(a, b) || a == b)
    }
}

impl Eq for RecordList {}

impl fmt::Debug for RecordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<Record> for RecordList {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}

#[cfg(test)]
#[path = "tests/records_tests.rs"]
mod tests;
