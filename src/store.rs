use std::sync::Arc;

use parking_lot::Mutex;

/// The cell holding a mock's state.
///
/// Cloning yields a handle to the same cell, which is how several mock
/// instances come to share one backing state ("a database and its clients").
/// All access goes through closures; the closure given to [`swap`] must be
/// free of external side effects.
///
/// [`swap`]: StateCell::swap
pub struct StateCell<S>(Arc<Mutex<S>>);

impl<S> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> From<S> for StateCell<S> {
    fn from(state: S) -> Self {
        Self::new(state)
    }
}

impl<S> StateCell<S> {
    pub fn new(state: S) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Atomically replace the state by applying `f` to the current value,
    /// returning `f`'s by-product. Swaps on one cell commit in a single
    /// total order; each caller's by-product corresponds to its position in
    /// that order.
    pub fn swap<T>(&self, f: impl FnOnce(S) -> (S, T)) -> T
    where
        S: Clone,
    {
        let mut guard = self.0.lock();
        let (next, out) = f(guard.clone());
        *guard = next;
        out
    }

    /// Observe the state without changing it.
    pub fn read<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&self.0.lock())
    }

    /// A cloned copy of the current state.
    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.0.lock().clone()
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for StateCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.read(|state| f.debug_tuple("StateCell").field(state).finish())
    }
}
