use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use crate::cell::Dependency;

struct DerivedInner<T> {
    deps: Vec<Dependency>,
    compute: Box<dyn Fn() -> T>,
    /// Dependency versions the cached value was computed from.
    cache: RefCell<Option<(Vec<u64>, T)>>,
    computations: Cell<u64>,
}

/// A value computed from one or more cells.
///
/// The result is memoized against the versions of its dependencies, so it is
/// recomputed only after one of them changed and can never be read stale.
/// `deps` must list every cell the compute function reads.
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

impl<T: Clone + 'static> Derived<T> {
    pub fn new(
        deps: impl IntoIterator<Item = Dependency>,
        compute: impl Fn() -> T + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(DerivedInner {
                deps: deps.into_iter().collect(),
                compute: Box::new(compute),
                cache: RefCell::new(None),
                computations: Cell::new(0),
            }),
        }
    }

    pub fn get(&self) -> T {
        let versions: Vec<u64> = self.inner.deps.iter().map(Dependency::version).collect();
        if let Some((seen, value)) = self.inner.cache.borrow().as_ref() {
            if *seen == versions {
                return value.clone();
            }
        }

        let value = (self.inner.compute)();
        self.inner
            .computations
            .set(self.inner.computations.get() + 1);
        *self.inner.cache.borrow_mut() = Some((versions, value.clone()));
        value
    }
}

impl<T> Derived<T> {
    /// How many times the compute function has run.
    pub fn computations(&self) -> u64 {
        self.inner.computations.get()
    }

    pub fn dependencies(&self) -> impl Iterator<Item = Dependency> + '_ {
        self.inner.deps.iter().cloned()
    }
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.cache.borrow();
        f.debug_struct("Derived")
            .field("cached", &cache.as_ref().map(|(_, value)| value))
            .field("deps", &self.inner.deps)
            .field("computations", &self.inner.computations.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/derived_tests.rs"]
mod tests;
