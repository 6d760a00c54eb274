//! Shared, non-generic state behind a binder: cell ids, the dirty set,
//! registered subscriptions, teardown cleanups and the wake-up signal for the
//! settle loop.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeSet,
    fmt,
    rc::{Rc, Weak},
};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::{
    cancel::{CancelSource, CancelToken},
    cell::{CellId, Dependency},
};

pub(crate) struct Scheduler {
    next_cell: Cell<u64>,
    next_subscription: Cell<u64>,
    dirty: RefCell<BTreeSet<CellId>>,
    subscriptions: RefCell<Vec<Rc<Entry>>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    pub(crate) notify: Notify,
    cancel: CancelSource,
    pub(crate) mounted: Cell<bool>,
    pub(crate) settling: Cell<bool>,
    closed: Cell<bool>,
}

pub(crate) struct Entry {
    id: u64,
    deps: Vec<CellId>,
    effect: RefCell<Box<dyn FnMut()>>,
    active: Cell<bool>,
}

impl Entry {
    pub(crate) fn depends_on_any(&self, dirty: &BTreeSet<CellId>) -> bool {
        self.deps.iter().any(|id| dirty.contains(id))
    }

    pub(crate) fn run(&self) {
        if !self.active.get() {
            return;
        }
        match self.effect.try_borrow_mut() {
            Ok(mut effect) => {
                let effect: &mut dyn FnMut() = &mut **effect;
                effect();
            }
            Err(_) => warn!(subscription = self.id, "skipping re-entrant effect"),
        }
    }
}

/// Guard for a registered effect. Dropping it unregisters the effect before
/// the next settle pass.
#[must_use = "dropping a Subscription unregisters its effect"]
pub struct Subscription {
    id: u64,
    scheduler: Weak<Scheduler>,
}

impl Subscription {
    pub fn cancel(self) {}

    /// Keeps the effect registered until the binder is torn down.
    pub fn detach(mut self) {
        self.scheduler = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Resets a flag on scope exit, including when an effect panics.
pub(crate) struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    pub(crate) fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            next_cell: Cell::new(0),
            next_subscription: Cell::new(0),
            dirty: RefCell::new(BTreeSet::new()),
            subscriptions: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            notify: Notify::new(),
            cancel: CancelSource::new(),
            mounted: Cell::new(false),
            settling: Cell::new(false),
            closed: Cell::new(false),
        }
    }

    pub(crate) fn allocate_cell(&self) -> CellId {
        let id = self.next_cell.get();
        self.next_cell.set(id + 1);
        CellId(id)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub(crate) fn cancellation(&self) -> CancelToken {
        self.cancel.token()
    }

    pub(crate) fn mark_dirty(&self, id: CellId) {
        self.dirty.borrow_mut().insert(id);
        // Notify keeps a single permit, so a burst of updates wakes the
        // settle loop once.
        self.notify.notify_one();
    }

    pub(crate) fn has_dirty(&self) -> bool {
        !self.dirty.borrow().is_empty()
    }

    pub(crate) fn take_dirty(&self) -> BTreeSet<CellId> {
        std::mem::take(&mut *self.dirty.borrow_mut())
    }

    pub(crate) fn subscribe(
        self: &Rc<Self>,
        deps: impl IntoIterator<Item = Dependency>,
        effect: Box<dyn FnMut()>,
    ) -> Subscription {
        let id = self.next_subscription.get();
        self.next_subscription.set(id + 1);

        let deps: Vec<CellId> = deps.into_iter().map(|dep| dep.id()).collect();
        debug!(subscription = id, deps = deps.len(), "effect registered");

        if self.is_closed() {
            return Subscription {
                id,
                scheduler: Weak::new(),
            };
        }

        self.subscriptions.borrow_mut().push(Rc::new(Entry {
            id,
            deps,
            effect: RefCell::new(effect),
            active: Cell::new(true),
        }));

        Subscription {
            id,
            scheduler: Rc::downgrade(self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        let removed = {
            let mut subscriptions = self.subscriptions.borrow_mut();
            subscriptions
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| subscriptions.remove(index))
        };
        if let Some(entry) = removed {
            entry.active.set(false);
            debug!(subscription = id, "effect unregistered");
        }
    }

    /// Registration-ordered copy, so effects may (un)subscribe while a pass
    /// iterates.
    pub(crate) fn snapshot(&self) -> Vec<Rc<Entry>> {
        self.subscriptions.borrow().clone()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Registers a release action for teardown. After teardown it runs at
    /// once.
    pub(crate) fn push_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        if self.is_closed() {
            cleanup();
            return;
        }
        self.cleanups.borrow_mut().push(cleanup);
    }

    /// Returns `false` when already torn down.
    pub(crate) fn teardown(&self) -> bool {
        if self.closed.replace(true) {
            return false;
        }

        self.cancel.cancel();

        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        let released = cleanups.len();
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }

        let entries = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for entry in &entries {
            entry.active.set(false);
        }
        drop(entries);

        self.dirty.borrow_mut().clear();
        self.notify.notify_one();
        info!(released, "binder torn down");
        true
    }
}
