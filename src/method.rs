use std::sync::Arc;

use proptest::strategy::SBoxedStrategy;

use crate::ret::Return;

/// Stable identifier of one operation of a modeled interface.
pub type MethodId = &'static str;

/// Ties an argument value back to the method it invokes.
///
/// Models describe a whole interface with a single args enum, one variant per
/// method; this trait is the dispatch seam that lets mocks and proxies route
/// a caller-made call to the right [`Method`].
pub trait Op {
    fn id(&self) -> MethodId;
}

/// One operation of a modeled interface.
///
/// `requires` says whether the method is interesting to call in a given state
/// (method-selection time); `precondition` says whether generated args are
/// acceptable (argument-selection time). Both default to always-true. `body`
/// is the model's transition reducer: from a state and args to a
/// [`Return`] descriptor.
#[derive(derive_more::Debug)]
pub struct Method<S, A, R> {
    id: MethodId,
    #[debug(skip)]
    requires: Arc<dyn Fn(&S) -> bool + Send + Sync>,
    #[debug(skip)]
    args: Arc<dyn Fn(&S) -> SBoxedStrategy<A> + Send + Sync>,
    #[debug(skip)]
    precondition: Arc<dyn Fn(&S, &A) -> bool + Send + Sync>,
    #[debug(skip)]
    body: Arc<dyn Fn(&S, &A) -> Return<S, R> + Send + Sync>,
}

// Not derived: the fields are shared handles, so clones need no bounds on
// the type parameters.
impl<S, A, R> Clone for Method<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            requires: self.requires.clone(),
            args: self.args.clone(),
            precondition: self.precondition.clone(),
            body: self.body.clone(),
        }
    }
}

impl<S, A, R> Method<S, A, R> {
    pub fn new(
        id: MethodId,
        args: impl Fn(&S) -> SBoxedStrategy<A> + Send + Sync + 'static,
        body: impl Fn(&S, &A) -> Return<S, R> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            requires: Arc::new(|_| true),
            args: Arc::new(args),
            precondition: Arc::new(|_, _| true),
            body: Arc::new(body),
        }
    }

    /// Restrict when this method is selected by the sequence generator.
    pub fn with_requires(mut self, requires: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        self.requires = Arc::new(requires);
        self
    }

    /// Reject generated args that make no sense in the current state.
    pub fn with_precondition(
        mut self,
        precondition: impl Fn(&S, &A) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.precondition = Arc::new(precondition);
        self
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    pub fn requires(&self, state: &S) -> bool {
        (self.requires)(state)
    }

    /// Argument strategy for this method in the given state.
    pub fn args_gen(&self, state: &S) -> SBoxedStrategy<A> {
        (self.args)(state)
    }

    pub fn precondition(&self, state: &S, args: &A) -> bool {
        (self.precondition)(state, args)
    }

    pub fn body(&self, state: &S, args: &A) -> Return<S, R> {
        (self.body)(state, args)
    }
}
