use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;

use proptest::prelude::*;
use proptest::strategy::SBoxedStrategy;

/// A labelled check over implementation returns, optionally carrying a
/// strategy that produces values satisfying it.
///
/// This is the engine's view of the caller's predicate library: the check is
/// opaque, the label is what failure reports print, and the attached strategy
/// (when present) is what mocks sample return values from.
#[derive(Clone, derive_more::Debug)]
pub struct Predicate<R> {
    label: Cow<'static, str>,
    #[debug(skip)]
    check: Arc<dyn Fn(&R) -> bool + Send + Sync>,
    #[debug(skip)]
    gen: Option<SBoxedStrategy<R>>,
}

impl<R: Debug> Predicate<R> {
    /// A predicate with no attached strategy. Returns described only by such
    /// a predicate cannot be mocked unless the enclosing
    /// [`Return`](crate::ret::Return) supplies its own generator.
    pub fn new(
        label: impl Into<Cow<'static, str>>,
        check: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            check: Arc::new(check),
            gen: None,
        }
    }

    /// Attach a strategy producing values that satisfy this predicate.
    pub fn with_gen(mut self, gen: impl Strategy<Value = R> + Send + Sync + 'static) -> Self {
        self.gen = Some(gen.sboxed());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn check(&self, value: &R) -> bool {
        (self.check)(value)
    }

    /// The attached strategy, if any.
    pub fn attached_gen(&self) -> Option<SBoxedStrategy<R>> {
        self.gen.clone()
    }
}

impl<R> Predicate<R>
where
    R: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    /// Equality with an expected value. The generator is derived from the
    /// predicate itself: the only satisfying value is the expected one.
    pub fn eq(expected: R) -> Self {
        let label = format!("== {expected:?}");
        let gen = Just(expected.clone()).sboxed();
        Self {
            label: label.into(),
            check: Arc::new(move |value| *value == expected),
            gen: Some(gen),
        }
    }
}
