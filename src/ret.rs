use std::fmt::Debug;

use proptest::prelude::*;
use proptest::strategy::SBoxedStrategy;

use crate::predicate::Predicate;

/// The model's prediction for one call: what the implementation may return,
/// how a mock would fabricate such a return, and the state the model is in
/// once the call completes.
///
/// A missing `next` means the call leaves the state unchanged. A missing
/// generator falls back to the strategy attached to the predicate; if neither
/// exists the descriptor cannot drive a mock.
#[derive(Clone, derive_more::Debug)]
pub struct Return<S, R> {
    predicate: Predicate<R>,
    #[debug(skip)]
    gen: Option<SBoxedStrategy<R>>,
    next: Option<S>,
}

impl<S, R: Debug> Return<S, R> {
    pub fn new(predicate: Predicate<R>) -> Self {
        Self {
            predicate,
            gen: None,
            next: None,
        }
    }

    /// The state after this call. Without it the call is a pure observation.
    pub fn with_next(mut self, next: S) -> Self {
        self.next = Some(next);
        self
    }

    /// Override the mock-value strategy, taking precedence over whatever the
    /// predicate carries.
    pub fn with_gen(mut self, gen: impl Strategy<Value = R> + Send + Sync + 'static) -> Self {
        self.gen = Some(gen.sboxed());
        self
    }

    pub fn predicate(&self) -> &Predicate<R> {
        &self.predicate
    }

    pub fn next_state(&self) -> Option<&S> {
        self.next.as_ref()
    }

    /// The state after this call, given the state it was made in.
    pub fn state_after(&self, current: &S) -> S
    where
        S: Clone,
    {
        self.next.clone().unwrap_or_else(|| current.clone())
    }

    /// The strategy mock values are sampled from: the override if set,
    /// otherwise the predicate's attached strategy.
    pub fn generator(&self) -> Option<SBoxedStrategy<R>> {
        self.gen.clone().or_else(|| self.predicate.attached_gen())
    }
}

impl<S, R> Return<S, R>
where
    R: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    /// Shorthand for the common case: the implementation must return exactly
    /// this value, and a mock returns it verbatim.
    pub fn eq(expected: R) -> Self {
        Self::new(Predicate::eq(expected))
    }
}
