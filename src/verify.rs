use std::fmt::Debug;
use std::panic::AssertUnwindSafe;

use proptest::collection::SizeRange;
use proptest::test_runner::{Config, TestCaseError, TestCaseResult, TestError};

use crate::error::{ContractViolation, ModelError, VerifyError};
use crate::method::Op;
use crate::model::Model;
use crate::sample::{self, Sample};
use crate::trace::{Executed, Trace};

/// A concrete implementation of the modeled interface.
///
/// `apply` executes one call. `cleanup` runs after every property case with
/// the calls actually executed, on all exit paths: success, predicate
/// failure, or a panic out of `apply`. Errors from `cleanup` are logged and
/// never mask the case's own result.
pub trait Subject<A: Op> {
    type Ret: Debug;

    fn apply(&mut self, args: &A) -> Self::Ret;

    fn cleanup(&mut self, executed: &[Executed<A, Self::Ret>]) -> anyhow::Result<()> {
        let _ = executed;
        Ok(())
    }
}

/// Knobs for [`verify`] and [`check_model`].
#[derive(Clone, Debug)]
pub struct VerifyOptions {
    /// How many calls a generated sequence may contain.
    pub calls: SizeRange,
    /// How many sequences to run.
    pub cases: u32,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            calls: (1..=10).into(),
            cases: 100,
            seed: None,
        }
    }
}

/// Scoped acquisition of a subject: cleanup runs when the session drops,
/// whichever way the run ended.
struct Session<A: Op, I: Subject<A>> {
    subject: I,
    executed: Vec<Executed<A, I::Ret>>,
}

impl<A: Op, I: Subject<A>> Drop for Session<A, I> {
    fn drop(&mut self) {
        let executed = std::mem::take(&mut self.executed);
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.subject.cleanup(&executed))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!("cleanup failed: {err:#}"),
            Err(_) => tracing::warn!("cleanup panicked"),
        }
    }
}

/// Execute one trace against a subject, checking every implementation return
/// against the model's predicate for that call.
///
/// Panics raised by the subject propagate (after cleanup); under a property
/// runner they fail the case and shrink like any other failure.
pub fn run_trace<S, A, R, I>(trace: &Trace<S, A, R>, subject: I) -> TestCaseResult
where
    A: Op + Clone + Debug,
    R: Debug,
    I: Subject<A, Ret = R>,
{
    let mut session = Session {
        subject,
        executed: Vec::with_capacity(trace.len()),
    };
    for call in trace.iter() {
        let actual = session.subject.apply(&call.args);
        tracing::trace!(method = call.method, ret = ?actual, "applied");
        let holds = call.ret.predicate().check(&actual);
        let shown = format!("{actual:?}");
        session.executed.push(Executed {
            method: call.method,
            args: call.args.clone(),
            ret: actual,
        });
        if !holds {
            let violation = ContractViolation {
                method: call.method,
                args: format!("{:?}", call.args),
                expected: call.ret.predicate().label().to_owned(),
                actual: shown,
            };
            return Err(TestCaseError::fail(violation.to_string()));
        }
    }
    Ok(())
}

/// The conformance property: run randomized call sequences against fresh
/// implementations from `subject`, shrinking any failure to a minimal trace.
pub fn verify<S, A, R, I>(
    model: &Model<S, A, R>,
    subject: impl Fn() -> I,
    options: &VerifyOptions,
) -> Result<(), VerifyError<S, A, R>>
where
    S: Clone + Debug + 'static,
    A: Op + Clone + Debug + 'static,
    R: Clone + Debug + 'static,
    I: Subject<A, Ret = R>,
{
    model.validate()?;
    let mut config = Config::default();
    config.cases = options.cases;
    // An embedded runner must not write regression files.
    config.failure_persistence = None;
    let mut runner = sample::runner(config, options.seed);
    let strategy = model.calls(options.calls.clone());
    match runner.run(&strategy, |trace| run_trace(&trace, subject())) {
        Ok(()) => Ok(()),
        Err(TestError::Fail(reason, trace)) => {
            tracing::debug!(%reason, "contract falsified");
            Err(VerifyError::Falsified { reason, trace })
        }
        Err(TestError::Abort(reason)) => Err(VerifyError::Aborted(reason)),
    }
}

/// Self-check a model: every generated call's return descriptor must carry a
/// usable generator, and values sampled from it must satisfy the
/// descriptor's own predicate. Run this once per model before trusting its
/// mocks.
pub fn check_model<S, A, R>(
    model: &Model<S, A, R>,
    options: &VerifyOptions,
) -> Result<(), VerifyError<S, A, R>>
where
    S: Clone + Debug + 'static,
    A: Op + Clone + Debug + 'static,
    R: Clone + Debug + 'static,
{
    model.validate()?;
    let mut config = Config::default();
    config.cases = options.cases;
    config.failure_persistence = None;
    let mut runner = sample::runner(config, options.seed);
    let strategy = model.calls(options.calls.clone());
    let seed = options.seed;
    match runner.run(&strategy, move |trace| {
        let mut sampler = sample::runner(Config::default(), seed);
        for call in trace.iter() {
            let gen = call.ret.generator().ok_or_else(|| {
                TestCaseError::fail(
                    ModelError::MissingGenerator {
                        method: call.method,
                        predicate: call.ret.predicate().label().to_owned(),
                    }
                    .to_string(),
                )
            })?;
            let value = sampler.sample(&gen).map_err(|reason| {
                TestCaseError::fail(
                    ModelError::GeneratorFailed {
                        method: call.method,
                        reason: reason.to_string(),
                    }
                    .to_string(),
                )
            })?;
            if !call.ret.predicate().check(&value) {
                return Err(TestCaseError::fail(
                    ModelError::InconsistentReturn {
                        method: call.method,
                        value: format!("{value:?}"),
                        predicate: call.ret.predicate().label().to_owned(),
                    }
                    .to_string(),
                ));
            }
        }
        Ok(())
    }) {
        Ok(()) => Ok(()),
        Err(TestError::Fail(reason, trace)) => Err(VerifyError::Falsified { reason, trace }),
        Err(TestError::Abort(reason)) => Err(VerifyError::Aborted(reason)),
    }
}
