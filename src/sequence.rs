//! The strategy over valid call sequences and its shrinking tree.
//!
//! Plain vector shrinking of a stateful trace is unsound: removing call `k`
//! may invalidate calls `k+1..` whose `requires` or `precondition` depended
//! on the state `k` established. Every shrinking operation here is therefore
//! gated by replaying the surviving calls from the initial state; a candidate
//! that stops replaying is undone before anyone observes it.

use std::fmt;

use proptest::bits::{BitSetLike, VarBitSet};
use proptest::collection::SizeRange;
use proptest::num::sample_uniform_incl;
use proptest::strategy::{NewTree, Strategy, ValueTree};
use proptest::test_runner::TestRunner;

use crate::method::{MethodId, Op};
use crate::model::Model;
use crate::trace::Trace;

/// Strategy producing a [`Trace`]: a sequence of calls, each consistent with
/// the model's state machine. Built by [`Model::calls`].
pub struct CallSequence<S, A, R> {
    model: Model<S, A, R>,
    size: SizeRange,
}

impl<S, A, R> CallSequence<S, A, R> {
    pub(crate) fn new(model: Model<S, A, R>, size: SizeRange) -> Self {
        Self { model, size }
    }
}

impl<S, A, R> fmt::Debug for CallSequence<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSequence")
            .field("size", &self.size)
            .finish()
    }
}

impl<S, A, R> Strategy for CallSequence<S, A, R>
where
    S: Clone + fmt::Debug + 'static,
    A: Op + Clone + fmt::Debug + 'static,
    R: Clone + fmt::Debug + 'static,
{
    type Tree = CallSequenceTree<S, A, R>;
    type Value = Trace<S, A, R>;

    fn new_tree(&self, runner: &mut TestRunner) -> NewTree<Self> {
        let (min, max) = self.size.start_end_incl();
        // Traces carry at least one call.
        let (min, max) = (min.max(1), max.max(1));
        let target = sample_uniform_incl(runner, min, max);

        let mut state = self.model.initial_state();
        let mut calls: Vec<CallSlot<A>> = Vec::with_capacity(target);
        while calls.len() < target {
            let method_gen = match self.model.gen_method(&state) {
                Ok(gen) => gen,
                // The model wedged itself: nothing is callable in a state it
                // steered generation into. Not recoverable by retrying.
                Err(err) => panic!("{err}"),
            };
            let id = method_gen.new_tree(runner)?.current();
            let method = match self.model.get_method(id) {
                Some(method) => method,
                None => panic!("{}", crate::error::ModelError::UnknownMethod(id)),
            };
            if !method.requires(&state) {
                // Only reachable through a caller-supplied `gen_method`.
                runner.reject_local("generated method's `requires` does not hold")?;
                continue;
            }
            let tree = method.args_gen(&state).new_tree(runner)?;
            let args = tree.current();
            if !method.precondition(&state, &args) {
                runner.reject_local("precondition rejected generated args")?;
                continue;
            }
            let ret = method.body(&state, &args);
            state = ret.state_after(&state);
            calls.push(CallSlot {
                method: id,
                tree,
                accepted: args,
                status: SlotStatus::Accepted,
            });
        }

        let max_ix = calls.len() - 1;
        Ok(CallSequenceTree {
            model: self.model.clone(),
            included: VarBitSet::saturated(calls.len()),
            shrinkable: VarBitSet::saturated(calls.len()),
            calls,
            max_ix,
            // Start by deleting calls from the back, which is least likely to
            // invalidate preconditions of what remains.
            shrink: Shrink::Delete(max_ix),
            last_shrink: None,
        })
    }
}

/// A shrinking operation.
#[derive(Clone, Copy, Debug)]
enum Shrink {
    /// Drop the call at this index.
    Delete(usize),
    /// Shrink the args of the call at this index.
    Args(usize),
}
use Shrink::*;

#[derive(Clone, Copy, Debug)]
enum SlotStatus {
    /// `accepted` equals the args tree's current value and replays cleanly.
    Accepted,
    /// The last simplification of this slot's args failed replay.
    SimplifyRejected,
    /// The last complication of this slot's args failed replay.
    ComplicateRejected,
}
use SlotStatus::*;

struct CallSlot<A> {
    method: MethodId,
    tree: Box<dyn ValueTree<Value = A>>,
    /// Last args value for this slot that passed the replay gate.
    accepted: A,
    status: SlotStatus,
}

/// The value tree of [`CallSequence`]: the root is the generated trace, the
/// candidates are call deletions and per-call arg shrinks, all filtered by
/// state replay.
pub struct CallSequenceTree<S, A, R> {
    model: Model<S, A, R>,
    calls: Vec<CallSlot<A>>,
    /// Calls not deleted by shrinking.
    included: VarBitSet,
    /// Calls whose args may shrink further.
    shrinkable: VarBitSet,
    max_ix: usize,
    shrink: Shrink,
    last_shrink: Option<Shrink>,
}

impl<S, A, R> CallSequenceTree<S, A, R>
where
    S: Clone + fmt::Debug + 'static,
    A: Op + Clone + fmt::Debug + 'static,
    R: Clone + fmt::Debug + 'static,
{
    /// The included `(method, args)` pairs. With `live_ix` set, that slot
    /// contributes its args tree's current value (which may not have been
    /// accepted yet) instead of its accepted one.
    fn included_pairs(&self, live_ix: Option<usize>) -> Vec<(MethodId, A)> {
        self.calls
            .iter()
            .enumerate()
            .filter(|(ix, _)| self.included.test(*ix))
            .map(|(ix, slot)| {
                let args = match live_ix {
                    Some(live) if live == ix => slot.tree.current(),
                    _ => slot.accepted.clone(),
                };
                (slot.method, args)
            })
            .collect()
    }

    /// The replay gate: do the included calls still satisfy `requires` and
    /// `precondition` at every step from the initial state?
    fn replays(&self, live_ix: Option<usize>) -> bool {
        self.model.replay(self.included_pairs(live_ix)).is_ok()
    }

    fn next_args_shrink(&self, ix: usize) -> Shrink {
        // Loop back to the front: a call's args sometimes only become
        // shrinkable after an earlier call shrank.
        if ix == self.max_ix {
            Args(0)
        } else {
            Args(ix + 1)
        }
    }

    fn can_simplify(&self) -> bool {
        !self
            .calls
            .iter()
            .enumerate()
            .filter(|(ix, _)| self.included.test(*ix))
            .all(|(_, slot)| matches!(slot.status, SimplifyRejected | ComplicateRejected))
    }

    fn try_simplify(&mut self) -> bool {
        if let Delete(ix) = self.shrink {
            self.included.clear(ix);
            self.last_shrink = Some(self.shrink);
            self.shrink = if ix == 0 { Args(0) } else { Delete(ix - 1) };
            // Never delete the last remaining call, and never present a
            // candidate that fails replay.
            if self.included.count() == 0 || !self.replays(None) {
                self.included.set(ix);
                self.last_shrink = None;
                return self.try_simplify();
            }
            self.shrinkable.clear(ix);
            return true;
        }

        while let Args(ix) = self.shrink {
            if self.shrinkable.count() == 0 {
                return false;
            }
            if !self.included.test(ix) {
                self.shrink = self.next_args_shrink(ix);
                continue;
            }
            if matches!(self.calls[ix].status, SimplifyRejected) {
                self.shrink = self.next_args_shrink(ix);
                continue;
            }
            if self.calls[ix].tree.simplify() {
                self.last_shrink = Some(self.shrink);
                if self.replays(Some(ix)) {
                    self.calls[ix].accepted = self.calls[ix].tree.current();
                    self.calls[ix].status = Accepted;
                    return true;
                } else {
                    self.calls[ix].status = SimplifyRejected;
                    self.shrinkable.clear(ix);
                    self.shrink = self.next_args_shrink(ix);
                    return self.simplify();
                }
            } else {
                self.shrinkable.clear(ix);
                self.shrink = self.next_args_shrink(ix);
            }
        }

        false
    }

    /// All included slots are currently rejected; scan for one whose args
    /// tree's current value replays after all.
    fn try_to_find_acceptable(&mut self, ix: usize) -> bool {
        let mut candidate = ix;
        loop {
            if self.included.test(candidate) && self.replays(Some(candidate)) {
                self.calls[candidate].accepted = self.calls[candidate].tree.current();
                self.calls[candidate].status = Accepted;
                return true;
            }
            candidate = if candidate == self.max_ix {
                0
            } else {
                candidate + 1
            };
            if candidate == ix {
                return false;
            }
        }
    }
}

impl<S, A, R> ValueTree for CallSequenceTree<S, A, R>
where
    S: Clone + fmt::Debug + 'static,
    A: Op + Clone + fmt::Debug + 'static,
    R: Clone + fmt::Debug + 'static,
{
    type Value = Trace<S, A, R>;

    fn current(&self) -> Self::Value {
        // Returns are recomputed along the surviving calls, so each call's
        // `next_state` describes the shrunk path, not the originally
        // generated one.
        match self.model.replay(self.included_pairs(None)) {
            Ok(trace) => trace,
            Err(err) => panic!("accepted call sequence stopped replaying: {err}"),
        }
    }

    fn simplify(&mut self) -> bool {
        if self.can_simplify() {
            self.try_simplify()
        } else {
            if let Some(Args(ix)) = self.last_shrink {
                return self.try_to_find_acceptable(ix);
            }
            false
        }
    }

    fn complicate(&mut self) -> bool {
        match self.last_shrink {
            None => false,
            Some(Delete(ix)) => {
                // Undo the deletion; it cannot be complicated further.
                self.included.set(ix);
                self.shrinkable.set(ix);
                self.last_shrink = None;
                true
            }
            Some(Args(ix)) => {
                if self.calls[ix].tree.complicate() {
                    if self.replays(Some(ix)) {
                        self.calls[ix].accepted = self.calls[ix].tree.current();
                        self.calls[ix].status = Accepted;
                        // Keep last_shrink: complicating may continue.
                        return true;
                    } else {
                        self.calls[ix].status = ComplicateRejected;
                    }
                }
                self.last_shrink = None;
                false
            }
        }
    }
}
