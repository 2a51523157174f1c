use std::fmt::Debug;

use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::{Config, Reason, RngAlgorithm, TestRng, TestRunner};

/// Draw single values out of a strategy.
pub trait Sample {
    fn sample<T: Debug>(&mut self, strategy: &impl Strategy<Value = T>) -> Result<T, Reason>;
}

impl Sample for TestRunner {
    fn sample<T: Debug>(&mut self, strategy: &impl Strategy<Value = T>) -> Result<T, Reason> {
        Ok(strategy.new_tree(self)?.current())
    }
}

/// A runner seeded for reproducible sampling, or an OS-seeded one when no
/// seed is given.
pub(crate) fn runner(config: Config, seed: Option<u64>) -> TestRunner {
    match seed {
        Some(seed) => {
            let mut bytes = [0u8; 32];
            bytes[..8].copy_from_slice(&seed.to_le_bytes());
            TestRunner::new_with_rng(config, TestRng::from_seed(RngAlgorithm::ChaCha, &bytes))
        }
        None => TestRunner::new(config),
    }
}
