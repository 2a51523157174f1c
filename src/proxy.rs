use std::fmt;

use proptest::test_runner::{Config, TestRunner};

use crate::error::{ContractViolation, ModelError, ProxyError};
use crate::method::Op;
use crate::model::Model;
use crate::sample::{self, Sample};
use crate::store::StateCell;
use crate::trace::Executed;
use crate::verify::Subject;

/// Which value a proxy call yields after the cross-check passed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReturnSource {
    /// The real implementation's return, untouched.
    #[default]
    Implementation,
    /// One value freshly sampled from the model's return generator.
    Model,
}

/// Options for building a [`Proxy`].
pub struct ProxyOptions<S> {
    pub store: Option<StateCell<S>>,
    pub returns: ReturnSource,
    pub seed: Option<u64>,
}

impl<S> Default for ProxyOptions<S> {
    fn default() -> Self {
        Self {
            store: None,
            returns: ReturnSource::default(),
            seed: None,
        }
    }
}

/// A pass-through instance of the modeled interface.
///
/// Every call first advances the model state, then forwards to the wrapped
/// implementation and checks its return against the model's predicate.
/// Integration tests run real code paths through it and get the model's
/// post-conditions checked continuously for free.
pub struct Proxy<S, A, R, I> {
    model: Model<S, A, R>,
    state: StateCell<S>,
    sampler: TestRunner,
    returns: ReturnSource,
    subject: I,
}

impl<S, A, R, I> Proxy<S, A, R, I>
where
    S: Clone + fmt::Debug + Send + Sync + 'static,
    A: Op + fmt::Debug + 'static,
    R: Clone + fmt::Debug + 'static,
    I: Subject<A, Ret = R>,
{
    pub(crate) fn new(model: Model<S, A, R>, subject: I, options: ProxyOptions<S>) -> Self {
        let state = options
            .store
            .unwrap_or_else(|| StateCell::new(model.initial_state()));
        Self {
            model,
            state,
            sampler: sample::runner(Config::default(), options.seed),
            returns: options.returns,
            subject,
        }
    }

    /// Forward one call, failing if the implementation's return violates the
    /// model's predicate for it.
    ///
    /// The model state advances regardless of the check's outcome; the model
    /// had committed to its prediction before the implementation ran.
    pub fn try_apply(&mut self, args: &A) -> Result<R, ProxyError> {
        let method = self
            .model
            .get_method(args.id())
            .ok_or(ModelError::UnknownMethod(args.id()))?;
        let ret = self.state.swap(|state| {
            let ret = method.body(&state, args);
            let next = ret.state_after(&state);
            (next, ret)
        });
        let actual = self.subject.apply(args);
        if !ret.predicate().check(&actual) {
            let violation = ContractViolation {
                method: method.id(),
                args: format!("{args:?}"),
                expected: ret.predicate().label().to_owned(),
                actual: format!("{actual:?}"),
            };
            tracing::debug!(%violation, "proxy cross-check failed");
            return Err(violation.into());
        }
        match self.returns {
            ReturnSource::Implementation => Ok(actual),
            ReturnSource::Model => {
                let gen = ret.generator().ok_or(ModelError::MissingGenerator {
                    method: method.id(),
                    predicate: ret.predicate().label().to_owned(),
                })?;
                let value =
                    self.sampler
                        .sample(&gen)
                        .map_err(|reason| ModelError::GeneratorFailed {
                            method: method.id(),
                            reason: reason.to_string(),
                        })?;
                Ok(value)
            }
        }
    }

    /// The wrapped implementation, back out of the proxy.
    pub fn into_inner(self) -> I {
        self.subject
    }
}

impl<S, A, R, I> Subject<A> for Proxy<S, A, R, I>
where
    S: Clone + fmt::Debug + Send + Sync + 'static,
    A: Op + fmt::Debug + 'static,
    R: Clone + fmt::Debug + 'static,
    I: Subject<A, Ret = R>,
{
    type Ret = R;

    /// Like [`Proxy::try_apply`], but panics on a contract violation, which
    /// is what integration-test code wants from a drop-in instance.
    fn apply(&mut self, args: &A) -> R {
        match self.try_apply(args) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    fn cleanup(&mut self, executed: &[Executed<A, R>]) -> anyhow::Result<()> {
        self.subject.cleanup(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{Method, MethodId};
    use crate::ret::Return;
    use proptest::prelude::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Bump;

    impl Op for Bump {
        fn id(&self) -> MethodId {
            "bump"
        }
    }

    fn bump_model() -> Model<u32, Bump, u32> {
        Model::new(
            || 0,
            [Method::new(
                "bump",
                |_: &u32| Just(Bump).sboxed(),
                |n: &u32, _: &Bump| Return::eq(n + 1).with_next(n + 1),
            )],
        )
        .unwrap()
    }

    struct Real(u32);

    impl Subject<Bump> for Real {
        type Ret = u32;

        fn apply(&mut self, _: &Bump) -> u32 {
            self.0 += 1;
            self.0
        }
    }

    struct Stuck;

    impl Subject<Bump> for Stuck {
        type Ret = u32;

        fn apply(&mut self, _: &Bump) -> u32 {
            1
        }
    }

    #[test]
    fn forwards_conforming_returns() {
        let mut proxy = bump_model().proxy(Real(0));
        assert_eq!(proxy.try_apply(&Bump).unwrap(), 1);
        assert_eq!(proxy.try_apply(&Bump).unwrap(), 2);
        assert_eq!(proxy.into_inner().0, 2);
    }

    #[test]
    fn flags_the_first_divergence() {
        let mut proxy = bump_model().proxy(Stuck);
        assert_eq!(proxy.try_apply(&Bump).unwrap(), 1);
        let err = proxy.try_apply(&Bump).unwrap_err();
        let ProxyError::Violation(violation) = err else {
            panic!("expected a contract violation")
        };
        assert_eq!(violation.method, "bump");
        assert_eq!(violation.expected, "== 2");
        assert_eq!(violation.actual, "1");
    }

    #[test]
    fn model_returns_come_from_the_model_generator() {
        let mut proxy = bump_model().proxy_with(
            Real(0),
            ProxyOptions {
                store: None,
                returns: ReturnSource::Model,
                seed: Some(3),
            },
        );
        // `Return::eq` generates exactly the expected value.
        assert_eq!(proxy.try_apply(&Bump).unwrap(), 1);
        assert_eq!(proxy.try_apply(&Bump).unwrap(), 2);
    }
}
