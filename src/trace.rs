use std::fmt;

use derive_more::derive::Deref;
use itertools::Itertools;

use crate::method::MethodId;
use crate::ret::Return;

/// One step of a trace: a method, the args it was generated with, and the
/// model's return descriptor for that step.
#[derive(Clone)]
pub struct Call<S, A, R> {
    pub method: MethodId,
    pub args: A,
    pub ret: Return<S, R>,
}

// Renders as `CreateFile("/foo") => == Ok`, which is what a shrunk
// counterexample prints line by line.
impl<S, A: fmt::Debug, R: fmt::Debug> fmt::Debug for Call<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} => {}", self.args, self.ret.predicate().label())
    }
}

/// A generated call sequence, each call consistent with the state machine
/// when replayed from the model's initial state.
#[derive(Clone, Deref)]
pub struct Trace<S, A, R> {
    #[deref]
    calls: Vec<Call<S, A, R>>,
}

impl<S, A, R> Trace<S, A, R> {
    pub(crate) fn new(calls: Vec<Call<S, A, R>>) -> Self {
        Self { calls }
    }

    /// The `(method, args)` pairs of this trace, the input
    /// [`Model::replay`](crate::model::Model::replay) accepts.
    pub fn pairs(&self) -> Vec<(MethodId, A)>
    where
        A: Clone,
    {
        self.calls
            .iter()
            .map(|call| (call.method, call.args.clone()))
            .collect()
    }
}

impl<S, A: fmt::Debug, R: fmt::Debug> fmt::Debug for Trace<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.calls.is_empty() {
            return write!(f, "  <empty>");
        }
        write!(
            f,
            "{}",
            self.calls.iter().map(|call| format!("  {call:?}")).join("\n")
        )
    }
}

impl<S, A, R> IntoIterator for Trace<S, A, R> {
    type Item = Call<S, A, R>;
    type IntoIter = std::vec::IntoIter<Call<S, A, R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.calls.into_iter()
    }
}

/// A call that was actually made against an implementation, with the return
/// the implementation produced. The executed prefix of a run is handed to
/// [`Subject::cleanup`](crate::verify::Subject::cleanup).
#[derive(Clone)]
pub struct Executed<A, T> {
    pub method: MethodId,
    pub args: A,
    pub ret: T,
}

impl<A: fmt::Debug, T: fmt::Debug> fmt::Debug for Executed<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {:?}", self.args, self.ret)
    }
}
