use proptest::test_runner::Reason;

use crate::method::MethodId;
use crate::trace::Trace;

/// Errors raised by the model itself: construction mistakes and internal
/// inconsistencies discovered at generation or mock time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("duplicate method id `{0}` in model")]
    DuplicateMethod(MethodId),

    #[error("`{0}` is not a method of this model")]
    UnknownMethod(MethodId),

    /// No method's `requires` holds in the given state, so nothing can be
    /// generated from it. A model must always leave at least one method open.
    #[error("no method satisfies `requires` in state {state}")]
    NoMethodAvailable { state: String },

    #[error("return of `{method}` has no generator and its predicate `{predicate}` carries none")]
    MissingGenerator {
        method: MethodId,
        predicate: String,
    },

    #[error("return generator of `{method}` failed to produce a value: {reason}")]
    GeneratorFailed { method: MethodId, reason: String },

    /// The model contradicts itself: a value sampled from a return's own
    /// generator fails that return's predicate.
    #[error("return generator of `{method}` produced {value}, which fails its own predicate `{predicate}`")]
    InconsistentReturn {
        method: MethodId,
        value: String,
        predicate: String,
    },
}

/// A call is inconsistent with the state machine when replayed from the
/// initial state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("call {index} names `{method}`, which is not a method of this model")]
    UnknownMethod { index: usize, method: MethodId },

    #[error("`requires` of `{method}` does not hold at call {index} in state {state}")]
    Requires {
        index: usize,
        method: MethodId,
        state: String,
    },

    #[error("precondition of `{method}` rejects args {args} at call {index} in state {state}")]
    Precondition {
        index: usize,
        method: MethodId,
        args: String,
        state: String,
    },
}

/// An implementation return that the model's predicate rejects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("contract violation in `{method}`: called with {args}, model requires {expected}, implementation returned {actual}")]
pub struct ContractViolation {
    pub method: MethodId,
    pub args: String,
    pub expected: String,
    pub actual: String,
}

/// Outcome of a failed [`verify`](crate::verify::verify) or
/// [`check_model`](crate::verify::check_model) run.
#[derive(Debug)]
pub enum VerifyError<S, A, R> {
    /// The model is unusable (construction error or internal inconsistency).
    Model(ModelError),
    /// The property was falsified; carries the shrunk counterexample.
    Falsified { reason: Reason, trace: Trace<S, A, R> },
    /// Generation gave up, e.g. a precondition rejected every candidate the
    /// retry budget allowed.
    Aborted(Reason),
}

impl<S, A, R> VerifyError<S, A, R> {
    /// The minimal failing trace, if the property was falsified.
    pub fn counterexample(&self) -> Option<&Trace<S, A, R>> {
        match self {
            VerifyError::Falsified { trace, .. } => Some(trace),
            _ => None,
        }
    }
}

impl<S, A, R> From<ModelError> for VerifyError<S, A, R> {
    fn from(err: ModelError) -> Self {
        VerifyError::Model(err)
    }
}

impl<S, A: std::fmt::Debug, R: std::fmt::Debug> std::fmt::Display for VerifyError<S, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::Model(err) => write!(f, "{err}"),
            VerifyError::Falsified { reason, trace } => {
                write!(f, "contract falsified: {reason}\nminimal failing trace:\n{trace:?}")
            }
            VerifyError::Aborted(reason) => write!(f, "verification aborted: {reason}"),
        }
    }
}

impl<S, A, R> std::error::Error for VerifyError<S, A, R>
where
    S: std::fmt::Debug,
    A: std::fmt::Debug,
    R: std::fmt::Debug,
{
}

/// Errors surfaced by [`Proxy::try_apply`](crate::proxy::Proxy::try_apply).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Violation(#[from] ContractViolation),
}
