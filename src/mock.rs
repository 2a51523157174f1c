use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::test_runner::{Config, TestRunner};

use crate::error::ModelError;
use crate::method::Op;
use crate::model::Model;
use crate::sample::{self, Sample};
use crate::store::StateCell;
use crate::verify::Subject;

/// Options for building a [`Mock`].
pub struct MockOptions<S> {
    /// Share an existing cell instead of a private one, so several mocks
    /// observe one backing state.
    pub store: Option<StateCell<S>>,
    /// Fix the return-sampling seed for reproducible mock behavior.
    pub seed: Option<u64>,
}

impl<S> Default for MockOptions<S> {
    fn default() -> Self {
        Self {
            store: None,
            seed: None,
        }
    }
}

/// A synthesized implementation of the modeled interface.
///
/// Each call advances the model state through the method's `body` and
/// returns a value sampled from the return descriptor's generator. Clones
/// share the same state cell and sampler, and the mock is safe to call from
/// several threads: state transitions commit in a single total order.
///
/// Deliberately, `requires` and `precondition` are *not* enforced here;
/// those filters shape generated sequences, not caller-made calls.
pub struct Mock<S, A, R> {
    model: Model<S, A, R>,
    state: StateCell<S>,
    sampler: Arc<Mutex<TestRunner>>,
}

impl<S, A, R> Clone for Mock<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            state: self.state.clone(),
            sampler: self.sampler.clone(),
        }
    }
}

impl<S, A, R> Mock<S, A, R>
where
    S: Clone + fmt::Debug + Send + Sync + 'static,
    A: Op + fmt::Debug + 'static,
    R: Clone + fmt::Debug + 'static,
{
    pub(crate) fn new(model: Model<S, A, R>, options: MockOptions<S>) -> Self {
        let state = options
            .store
            .unwrap_or_else(|| StateCell::new(model.initial_state()));
        Self {
            model,
            state,
            sampler: Arc::new(Mutex::new(sample::runner(Config::default(), options.seed))),
        }
    }

    /// Make one call against the mock.
    ///
    /// Errors are model bugs, not usage bugs: a return descriptor without a
    /// usable generator, or a generator producing values its own predicate
    /// rejects. [`check_model`](crate::verify::check_model) finds both ahead
    /// of time.
    pub fn call(&self, args: &A) -> Result<R, ModelError> {
        let method = self
            .model
            .get_method(args.id())
            .ok_or(ModelError::UnknownMethod(args.id()))?;
        // Lock order: sampler before state, everywhere.
        let mut sampler = self.sampler.lock();
        self.state.swap(|state| {
            let ret = method.body(&state, args);
            let gen = match ret.generator() {
                Some(gen) => gen,
                None => {
                    return (
                        state,
                        Err(ModelError::MissingGenerator {
                            method: method.id(),
                            predicate: ret.predicate().label().to_owned(),
                        }),
                    )
                }
            };
            let value = match sampler.sample(&gen) {
                Ok(value) => value,
                Err(reason) => {
                    return (
                        state,
                        Err(ModelError::GeneratorFailed {
                            method: method.id(),
                            reason: reason.to_string(),
                        }),
                    )
                }
            };
            if !ret.predicate().check(&value) {
                return (
                    state,
                    Err(ModelError::InconsistentReturn {
                        method: method.id(),
                        value: format!("{value:?}"),
                        predicate: ret.predicate().label().to_owned(),
                    }),
                );
            }
            tracing::trace!(method = method.id(), ret = ?value, "mock call");
            let next = ret.state_after(&state);
            (next, Ok(value))
        })
    }

    /// Handle to this mock's state cell, for sharing with further mocks.
    pub fn store(&self) -> StateCell<S> {
        self.state.clone()
    }

    /// A snapshot of the current model state.
    pub fn state(&self) -> S {
        self.state.get()
    }
}

impl<S, A, R> Subject<A> for Mock<S, A, R>
where
    S: Clone + fmt::Debug + Send + Sync + 'static,
    A: Op + fmt::Debug + 'static,
    R: Clone + fmt::Debug + 'static,
{
    type Ret = R;

    /// Like [`Mock::call`], but panics on model errors, which is what test
    /// code wants from a drop-in instance.
    fn apply(&mut self, args: &A) -> R {
        match self.call(args) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<S: fmt::Debug, A, R> fmt::Debug for Mock<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state.read(|state| f.debug_tuple("Mock").field(state).finish())
    }
}
