//! Model-based contract testing.
//!
//! Describe a stateful interface once (its operations, the state machine
//! they induce, and the return each call must produce) and reuse that one
//! [`Model`] three ways:
//!
//! - [`verify`]: run randomized, state-consistent call sequences against a
//!   real implementation and shrink any divergence to a minimal trace;
//! - [`Mock`]: synthesize a conforming in-memory implementation for unit
//!   tests;
//! - [`Proxy`]: wrap a real implementation and cross-check every return in
//!   integration tests.
//!
//! Generation and shrinking sit on proptest; shrinking a stateful trace is
//! kept sound by replaying every candidate through the model's `requires`
//! and `precondition` filters before it is ever reported.

pub mod error;
pub mod method;
pub mod mock;
pub mod model;
pub mod predicate;
pub mod proxy;
pub mod ret;
pub mod sample;
pub mod sequence;
pub mod store;
pub mod trace;
pub mod verify;

pub use error::{ContractViolation, ModelError, ProxyError, ReplayError, VerifyError};
pub use method::{Method, MethodId, Op};
pub use mock::{Mock, MockOptions};
pub use model::Model;
pub use predicate::Predicate;
pub use proxy::{Proxy, ProxyOptions, ReturnSource};
pub use ret::Return;
pub use store::StateCell;
pub use verify::{check_model, run_trace, verify, Subject, VerifyOptions};

pub mod prelude {
    pub use crate::error::{
        ContractViolation, ModelError, ProxyError, ReplayError, VerifyError,
    };
    pub use crate::method::{Method, MethodId, Op};
    pub use crate::mock::{Mock, MockOptions};
    pub use crate::model::Model;
    pub use crate::predicate::Predicate;
    pub use crate::proxy::{Proxy, ProxyOptions, ReturnSource};
    pub use crate::ret::Return;
    pub use crate::sample::Sample;
    pub use crate::sequence::CallSequence;
    pub use crate::store::StateCell;
    pub use crate::trace::{Call, Executed, Trace};
    pub use crate::verify::{check_model, run_trace, verify, Subject, VerifyOptions};
}
