use std::fmt::Debug;
use std::sync::Arc;

use proptest::collection::SizeRange;
use proptest::prelude::*;
use proptest::strategy::SBoxedStrategy;

use crate::error::{ModelError, ReplayError};
use crate::method::{Method, MethodId, Op};
use crate::mock::{Mock, MockOptions};
use crate::proxy::{Proxy, ProxyOptions};
use crate::sequence::CallSequence;
use crate::trace::{Call, Trace};
use crate::verify::Subject;

/// A declarative specification of a stateful interface: its operations, the
/// state machine they induce, and the return each call must produce.
///
/// The engine never interprets the state type `S`; it only threads owned
/// values of it through method bodies. `A` is the args enum of the interface
/// (one variant per method, tied back to its method by [`Op`]) and `R` the
/// return enum.
#[derive(derive_more::Debug)]
pub struct Model<S, A, R> {
    methods: Vec<Method<S, A, R>>,
    #[debug(skip)]
    initial: Arc<dyn Fn() -> S + Send + Sync>,
    #[debug(skip)]
    gen_method: Option<Arc<dyn Fn(&S) -> SBoxedStrategy<MethodId> + Send + Sync>>,
}

impl<S, A, R> Clone for Model<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            methods: self.methods.clone(),
            initial: self.initial.clone(),
            gen_method: self.gen_method.clone(),
        }
    }
}

impl<S, A, R> Model<S, A, R> {
    /// Build a model from an initial-state thunk and a set of methods.
    /// Method ids must be unique.
    pub fn new(
        initial: impl Fn() -> S + Send + Sync + 'static,
        methods: impl IntoIterator<Item = Method<S, A, R>>,
    ) -> Result<Self, ModelError> {
        let methods: Vec<_> = methods.into_iter().collect();
        for (ix, method) in methods.iter().enumerate() {
            if methods[..ix].iter().any(|m| m.id() == method.id()) {
                return Err(ModelError::DuplicateMethod(method.id()));
            }
        }
        Ok(Self {
            methods,
            initial: Arc::new(initial),
            gen_method: None,
        })
    }

    /// Replace the default uniform method selector. The strategy must only
    /// emit ids of methods whose `requires` holds in the given state; the
    /// generator retries otherwise.
    pub fn with_gen_method(
        mut self,
        gen_method: impl Fn(&S) -> SBoxedStrategy<MethodId> + Send + Sync + 'static,
    ) -> Self {
        self.gen_method = Some(Arc::new(gen_method));
        self
    }

    pub fn initial_state(&self) -> S {
        (self.initial)()
    }

    pub fn get_method(&self, id: MethodId) -> Option<&Method<S, A, R>> {
        self.methods.iter().find(|m| m.id() == id)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method<S, A, R>> {
        self.methods.iter()
    }

    /// The method-selection strategy for a state: the caller-supplied one if
    /// set, otherwise uniform over the methods whose `requires` holds.
    ///
    /// A state in which no method qualifies is a contract violation by the
    /// model, not a property failure.
    pub fn gen_method(&self, state: &S) -> Result<SBoxedStrategy<MethodId>, ModelError>
    where
        S: Debug,
    {
        if let Some(custom) = &self.gen_method {
            return Ok(custom(state));
        }
        let enabled: Vec<MethodId> = self
            .methods
            .iter()
            .filter(|m| m.requires(state))
            .map(|m| m.id())
            .collect();
        if enabled.is_empty() {
            return Err(ModelError::NoMethodAvailable {
                state: format!("{state:?}"),
            });
        }
        Ok(proptest::sample::select(enabled).sboxed())
    }

    /// Check that generation can start at all: at least one method must be
    /// open in the initial state.
    pub fn validate(&self) -> Result<(), ModelError>
    where
        S: Debug,
    {
        self.gen_method(&self.initial_state()).map(|_| ())
    }

    /// Replay `(method, args)` pairs from the initial state, checking
    /// `requires` and `precondition` at every step and recomputing each
    /// call's return along the way. The returned trace's state path is
    /// authoritative for exactly these calls.
    pub fn replay(
        &self,
        calls: impl IntoIterator<Item = (MethodId, A)>,
    ) -> Result<Trace<S, A, R>, ReplayError>
    where
        S: Clone + Debug,
        A: Debug,
        R: Debug,
    {
        let mut state = self.initial_state();
        let mut out = Vec::new();
        for (index, (id, args)) in calls.into_iter().enumerate() {
            let method = self
                .get_method(id)
                .ok_or(ReplayError::UnknownMethod { index, method: id })?;
            if !method.requires(&state) {
                return Err(ReplayError::Requires {
                    index,
                    method: id,
                    state: format!("{state:?}"),
                });
            }
            if !method.precondition(&state, &args) {
                return Err(ReplayError::Precondition {
                    index,
                    method: id,
                    args: format!("{args:?}"),
                    state: format!("{state:?}"),
                });
            }
            let ret = method.body(&state, &args);
            state = ret.state_after(&state);
            out.push(Call {
                method: id,
                args,
                ret,
            });
        }
        Ok(Trace::new(out))
    }
}

impl<S, A, R> Model<S, A, R>
where
    S: Clone + Debug + 'static,
    A: Op + Clone + Debug + 'static,
    R: Clone + Debug + 'static,
{
    /// A strategy over valid call sequences, with the sequence length drawn
    /// from `size`.
    pub fn calls(&self, size: impl Into<SizeRange>) -> CallSequence<S, A, R> {
        CallSequence::new(self.clone(), size.into())
    }
}

impl<S, A, R> Model<S, A, R>
where
    S: Clone + Debug + Send + Sync + 'static,
    A: Op + Debug + 'static,
    R: Clone + Debug + 'static,
{
    /// A mock instance with its own ephemeral state.
    pub fn mock(&self) -> Mock<S, A, R> {
        Mock::new(self.clone(), MockOptions::default())
    }

    /// A mock instance with explicit options (shared store, fixed seed).
    pub fn mock_with(&self, options: MockOptions<S>) -> Mock<S, A, R> {
        Mock::new(self.clone(), options)
    }

    /// Wrap a real implementation in a proxy that cross-checks every call
    /// against this model.
    pub fn proxy<I>(&self, subject: I) -> Proxy<S, A, R, I>
    where
        I: Subject<A, Ret = R>,
    {
        Proxy::new(self.clone(), subject, ProxyOptions::default())
    }

    pub fn proxy_with<I>(&self, subject: I, options: ProxyOptions<S>) -> Proxy<S, A, R, I>
    where
        I: Subject<A, Ret = R>,
    {
        Proxy::new(self.clone(), subject, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ret::Return;

    #[derive(Clone, Debug, PartialEq)]
    enum Toggle {
        On,
        Off,
    }

    impl Op for Toggle {
        fn id(&self) -> MethodId {
            match self {
                Toggle::On => "on",
                Toggle::Off => "off",
            }
        }
    }

    fn toggle_model() -> Model<bool, Toggle, bool> {
        Model::new(
            || false,
            [
                Method::new(
                    "on",
                    |_: &bool| Just(Toggle::On).sboxed(),
                    |_: &bool, _: &Toggle| Return::eq(true).with_next(true),
                )
                .with_requires(|lit: &bool| !lit),
                Method::new(
                    "off",
                    |_: &bool| Just(Toggle::Off).sboxed(),
                    |_: &bool, _: &Toggle| Return::eq(true).with_next(false),
                )
                .with_requires(|lit: &bool| *lit),
            ],
        )
        .unwrap()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = Model::<bool, Toggle, bool>::new(
            || false,
            [
                Method::new(
                    "on",
                    |_: &bool| Just(Toggle::On).sboxed(),
                    |_: &bool, _: &Toggle| Return::eq(true),
                ),
                Method::new(
                    "on",
                    |_: &bool| Just(Toggle::On).sboxed(),
                    |_: &bool, _: &Toggle| Return::eq(true),
                ),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ModelError::DuplicateMethod("on"));
    }

    #[test]
    fn replay_checks_requires_stepwise() {
        let model = toggle_model();
        let trace = model
            .replay([("on", Toggle::On), ("off", Toggle::Off), ("on", Toggle::On)])
            .unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[2].ret.next_state(), Some(&true));

        // `off` is not enabled while the light is off.
        let err = model.replay([("off", Toggle::Off)]).unwrap_err();
        assert!(matches!(err, ReplayError::Requires { index: 0, .. }));
    }

    #[test]
    fn replay_rejects_unknown_methods() {
        let model = toggle_model();
        let err = model.replay([("dim", Toggle::On)]).unwrap_err();
        assert_eq!(
            err,
            ReplayError::UnknownMethod {
                index: 0,
                method: "dim"
            }
        );
    }

    #[test]
    fn validate_requires_an_open_method() {
        let stuck = Model::<bool, Toggle, bool>::new(
            || false,
            [Method::new(
                "off",
                |_: &bool| Just(Toggle::Off).sboxed(),
                |_: &bool, _: &Toggle| Return::eq(true),
            )
            .with_requires(|lit: &bool| *lit)],
        )
        .unwrap();
        assert!(matches!(
            stuck.validate(),
            Err(ModelError::NoMethodAvailable { .. })
        ));
        assert!(toggle_model().validate().is_ok());
    }
}
