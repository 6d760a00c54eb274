use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    cancel::CancelToken,
    cell::{new_cell, Dependency, Setter, StateCell},
    derived::Derived,
    scheduler::{FlagGuard, Scheduler, Subscription},
};

/// Upper bound on effect-triggered follow-up rounds within one settle pass.
/// Changes still pending after that are left for the next pass.
pub const MAX_SETTLE_ROUNDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BinderError {
    #[error("binder is already mounted")]
    AlreadyMounted,
    #[error("binder has been torn down")]
    TornDown,
}

type Renderer<V> = Box<dyn Fn() -> V>;

struct Core<V> {
    scheduler: Rc<Scheduler>,
    renderer: RefCell<Option<Renderer<V>>>,
    frames: watch::Sender<Option<Rc<V>>>,
    renders: Cell<u64>,
}

impl<V> Drop for Core<V> {
    fn drop(&mut self) {
        self.scheduler.teardown();
    }
}

/// Holds a set of named cells and keeps a rendered view of type `V` in sync
/// with them.
///
/// Lifecycle: [`mount`](Self::mount) once, then one
/// [`settle`](Self::settle) pass per batch of changes (usually driven by
/// [`spawn_settle_loop`](Self::spawn_settle_loop)), then
/// [`teardown`](Self::teardown). Dropping the last handle tears down too.
///
/// Cloning creates another handle to the same binder.
pub struct Binder<V: 'static> {
    core: Rc<Core<V>>,
}

impl<V: 'static> Clone for Binder<V> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<V: 'static> Default for Binder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> Binder<V> {
    pub fn new() -> Self {
        let (frames, _) = watch::channel(None);
        Self {
            core: Rc::new(Core {
                scheduler: Rc::new(Scheduler::new()),
                renderer: RefCell::new(None),
                frames,
                renders: Cell::new(0),
            }),
        }
    }

    pub fn create_cell<T: 'static>(
        &self,
        name: impl Into<Rc<str>>,
        initial: T,
    ) -> (StateCell<T>, Setter<T>) {
        let scheduler = &self.core.scheduler;
        new_cell(
            scheduler.allocate_cell(),
            name.into(),
            initial,
            Rc::downgrade(scheduler),
        )
    }

    /// Registers `effect` to run after any of `deps` changed. An empty `deps`
    /// list makes it a mount-only effect.
    pub fn subscribe(
        &self,
        deps: impl IntoIterator<Item = Dependency>,
        effect: impl FnMut() + 'static,
    ) -> Subscription {
        self.core.scheduler.subscribe(deps, Box::new(effect))
    }

    pub fn derive<T: Clone + 'static>(
        &self,
        deps: impl IntoIterator<Item = Dependency>,
        compute: impl Fn() -> T + 'static,
    ) -> Derived<T> {
        Derived::new(deps, compute)
    }

    /// Installs the view function. It must only read cells.
    pub fn set_renderer(&self, render: impl Fn() -> V + 'static) {
        *self.core.renderer.borrow_mut() = Some(Box::new(render));
    }

    /// Runs every registered effect once, in registration order, then
    /// renders the first view.
    pub fn mount(&self) -> Result<(), BinderError> {
        let scheduler = &self.core.scheduler;
        if scheduler.is_closed() {
            return Err(BinderError::TornDown);
        }
        if scheduler.mounted.replace(true) {
            return Err(BinderError::AlreadyMounted);
        }

        // Initial values count as seen: mount effects observe them directly.
        scheduler.take_dirty();
        {
            let _settling = FlagGuard::raise(&scheduler.settling);
            for entry in scheduler.snapshot() {
                if scheduler.is_closed() {
                    break;
                }
                entry.run();
            }
        }

        self.settle_pass(true);
        info!(
            subscriptions = scheduler.subscription_count(),
            "binder mounted"
        );
        Ok(())
    }

    /// Applies all pending changes: runs the affected effects, repeats while
    /// effects changed more cells, then renders once. Returns whether
    /// anything changed.
    ///
    /// Before mount this is a no-op; pending changes are folded into mount.
    pub fn settle(&self) -> bool {
        if !self.core.scheduler.mounted.get() {
            return false;
        }
        self.settle_pass(false)
    }

    fn settle_pass(&self, force_render: bool) -> bool {
        let scheduler = &self.core.scheduler;
        if scheduler.is_closed() || scheduler.settling.get() {
            return false;
        }

        let mut changed = false;
        {
            let _settling = FlagGuard::raise(&scheduler.settling);
            let mut rounds = 0;
            while scheduler.has_dirty() {
                if rounds == MAX_SETTLE_ROUNDS {
                    warn!(rounds, "settle pass did not converge; deferring the rest");
                    scheduler.notify.notify_one();
                    break;
                }
                rounds += 1;
                changed = true;

                let dirty = scheduler.take_dirty();
                for entry in scheduler.snapshot() {
                    if scheduler.is_closed() {
                        break;
                    }
                    if entry.depends_on_any(&dirty) {
                        entry.run();
                    }
                }
            }
            if changed {
                debug!(rounds, "settle pass complete");
            }
        }

        if scheduler.is_closed() {
            return changed;
        }
        if changed || force_render {
            self.render();
        }
        changed
    }

    fn render(&self) {
        let view = {
            let renderer = self.core.renderer.borrow();
            match renderer.as_ref() {
                Some(render) => render(),
                None => return,
            }
        };
        let renders = self.core.renders.get() + 1;
        self.core.renders.set(renders);
        self.core.frames.send_replace(Some(Rc::new(view)));
        debug!(renders, "view rendered");
    }

    /// Spawns the task that settles after each batch of changes. Must be
    /// called from within a `tokio::task::LocalSet`.
    ///
    /// The task holds the binder weakly and stops at teardown.
    pub fn spawn_settle_loop(&self) -> JoinHandle<()> {
        let scheduler = Rc::clone(&self.core.scheduler);
        let core = Rc::downgrade(&self.core);
        let cancel = scheduler.cancellation();

        tokio::task::spawn_local(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = scheduler.notify.notified() => {}
                }
                // Let the rest of this tick's updates land in the same batch.
                tokio::task::yield_now().await;

                let Some(core) = core.upgrade() else {
                    break;
                };
                Binder { core }.settle();
            }
            debug!("settle loop stopped");
        })
    }

    /// Registers a release action that runs exactly once at teardown, in
    /// reverse registration order. After teardown it runs immediately.
    pub fn on_teardown(&self, cleanup: impl FnOnce() + 'static) {
        self.core.scheduler.push_cleanup(Box::new(cleanup));
    }

    /// Releases everything acquired through [`on_teardown`](Self::on_teardown),
    /// resolves the cancellation token and makes every setter inert.
    /// Returns `false` when already torn down.
    pub fn teardown(&self) -> bool {
        self.core.scheduler.teardown()
    }

    pub fn is_mounted(&self) -> bool {
        self.core.scheduler.mounted.get()
    }

    pub fn is_torn_down(&self) -> bool {
        self.core.scheduler.is_closed()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.core.scheduler.has_dirty()
    }

    pub fn cancellation(&self) -> CancelToken {
        self.core.scheduler.cancellation()
    }

    /// Latest rendered view, updated after every render.
    pub fn frames(&self) -> watch::Receiver<Option<Rc<V>>> {
        self.core.frames.subscribe()
    }

    pub fn current_view(&self) -> Option<Rc<V>> {
        self.core.frames.borrow().clone()
    }

    pub fn render_count(&self) -> u64 {
        self.core.renders.get()
    }
}

#[cfg(test)]
#[path = "tests/binder_tests.rs"]
mod tests;
