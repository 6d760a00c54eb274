#![forbid(unsafe_code)]

//! Single-threaded reactive state for view binding.
//!
//! - [`StateCell`] / [`Setter`]: a named value and the only handle allowed to
//!   change it.
//! - [`Binder`]: owns the cells' scheduler, runs subscriptions after a batch
//!   of changes, and re-renders the view once per settle pass.
//! - [`Derived`]: a value computed from cells, memoized on their versions.
//! - [`CancelToken`]: resolved at teardown so pending async work can stop.
//!
//! # Invariants
//!
//! 1. A cell's version increments exactly once per accepted change.
//! 2. Setting a value equal to the current one is a no-op.
//! 3. Subscriptions never run inside a setter; they run during the next
//!    settle pass, at most once per pass, in registration order.
//! 4. Each settle pass that changed something renders exactly once.
//! 5. After teardown every setter is inert and no subscription runs again.

mod binder;
mod cancel;
mod cell;
mod derived;
mod scheduler;

pub use binder::{Binder, BinderError, MAX_SETTLE_ROUNDS};
pub use cancel::CancelToken;
pub use cell::{CellId, Dependency, Setter, StateCell};
pub use derived::Derived;
pub use scheduler::Subscription;
