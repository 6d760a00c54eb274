use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use tracing::debug;

use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) u64);

struct Slot<T> {
    id: CellId,
    name: Rc<str>,
    value: RefCell<T>,
    version: Rc<Cell<u64>>,
}

/// Read handle to a named cell.
///
/// Cloning creates another handle to the same slot. There is no way to write
/// through a `StateCell`; only the matching [`Setter`] can change the value.
pub struct StateCell<T> {
    slot: Rc<Slot<T>>,
}

/// The single write handle of a cell.
///
/// Setters hold the scheduler weakly; once the binder is torn down every
/// call is a no-op.
pub struct Setter<T> {
    slot: Rc<Slot<T>>,
    scheduler: Weak<Scheduler>,
}

/// Type-erased view of a cell used to declare what a subscription or a
/// derived value depends on.
#[derive(Clone)]
pub struct Dependency {
    id: CellId,
    name: Rc<str>,
    version: Rc<Cell<u64>>,
}

pub(crate) fn new_cell<T>(
    id: CellId,
    name: Rc<str>,
    initial: T,
    scheduler: Weak<Scheduler>,
) -> (StateCell<T>, Setter<T>) {
    let slot = Rc::new(Slot {
        id,
        name,
        value: RefCell::new(initial),
        version: Rc::new(Cell::new(0)),
    });
    (
        StateCell {
            slot: Rc::clone(&slot),
        },
        Setter { slot, scheduler },
    )
}

impl<T> StateCell<T> {
    pub fn id(&self) -> CellId {
        self.slot.id
    }

    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Number of accepted changes since creation.
    pub fn version(&self) -> u64 {
        self.slot.version.get()
    }

    /// Borrows the current value. Calling the cell's setter from inside `f`
    /// panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.value.borrow())
    }

    pub fn dependency(&self) -> Dependency {
        Dependency {
            id: self.slot.id,
            name: Rc::clone(&self.slot.name),
            version: Rc::clone(&self.slot.version),
        }
    }
}

impl<T: Clone> StateCell<T> {
    pub fn get(&self) -> T {
        self.slot.value.borrow().clone()
    }
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("name", &self.slot.name)
            .field("value", &*self.slot.value.borrow())
            .field("version", &self.slot.version.get())
            .finish()
    }
}

impl<T: PartialEq> Setter<T> {
    /// Replaces the value and schedules a settle pass.
    ///
    /// Returns `false` when nothing changed: the new value equals the current
    /// one, or the binder is gone.
    pub fn set(&self, value: T) -> bool {
        let Some(scheduler) = self.scheduler.upgrade() else {
            debug!(cell = %self.slot.name, "ignoring update: binder dropped");
            return false;
        };
        if scheduler.is_closed() {
            debug!(cell = %self.slot.name, "ignoring update after teardown");
            return false;
        }

        {
            let mut current = self.slot.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.slot.version.set(self.slot.version.get() + 1);
        scheduler.mark_dirty(self.slot.id);
        debug!(cell = %self.slot.name, version = self.slot.version.get(), "cell updated");
        true
    }

    /// Computes the next value from the current one, then [`set`](Self::set)s it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.slot.value.borrow());
        self.set(next)
    }
}

impl<T> Setter<T> {
    pub fn id(&self) -> CellId {
        self.slot.id
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
            scheduler: Weak::clone(&self.scheduler),
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("name", &self.slot.name)
            .finish_non_exhaustive()
    }
}

impl Dependency {
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version.get()
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("name", &self.name)
            .field("version", &self.version.get())
            .finish()
    }
}

impl<T> From<&StateCell<T>> for Dependency {
    fn from(cell: &StateCell<T>) -> Self {
        cell.dependency()
    }
}

#[cfg(test)]
#[path = "tests/cell_tests.rs"]
mod tests;
