//! The `patterns` module provides the library of pattern-fill-and-compare tests.
//!
//! Every test fills half A and half B of the region and then checks them against each
//! other. Two families exist:
//! - arithmetic relations: A is random, B an invertible function of A
//! - deterministic sweeps: A and B receive the same closed-form pattern per pass
//!
//! The [`PatternLibrary`] holds the tests in the order the runner executes them.
mod compare;
mod relation;
mod sweep;

pub use self::relation::{
    compare_and, compare_div, compare_mul, compare_or, compare_sub, compare_xor, random_value,
};
pub use self::sweep::{
    bit_flip, bit_spread, block_seq, checkerboard, seq_inc, solid_bits, walking_ones,
    walking_zeroes,
};

use crate::context::{TestContext, TestOutcome};
use crate::memory::CellView;

/// Signature of a pattern test: fill and verify half A and half B.
pub type PatternFn = fn(&CellView<'_>, &CellView<'_>, &mut TestContext) -> TestOutcome;

/// A named pattern test.
#[derive(Clone, Copy)]
pub struct TestDescriptor {
    name: &'static str,
    passes: usize,
    run: PatternFn,
}

impl TestDescriptor {
    /// Creates a descriptor for `run`, which performs `passes` verification sweeps.
    pub const fn new(name: &'static str, passes: usize, run: PatternFn) -> Self {
        TestDescriptor { name, passes, run }
    }

    /// Display name of the test.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of verification sweeps of a fault-free run.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Runs the test on half `a` and half `b`, overwriting both.
    ///
    /// # Panics
    ///
    /// Panics if the halves differ in length or overlap.
    pub fn run(&self, a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
        assert_eq!(a.len(), b.len(), "halves A and B must have the same length");
        assert!(!a.overlaps(b), "halves A and B must not overlap");
        (self.run)(a, b, ctx)
    }
}

impl std::fmt::Debug for TestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("name", &self.name)
            .field("passes", &self.passes)
            .finish()
    }
}

/// An ordered, immutable collection of pattern tests.
#[derive(Clone, Debug)]
pub struct PatternLibrary {
    tests: Vec<TestDescriptor>,
}

impl PatternLibrary {
    /// Creates a library running `tests` in the given order.
    pub fn new(tests: Vec<TestDescriptor>) -> Self {
        PatternLibrary { tests }
    }

    /// The full library: the arithmetic relations followed by the deterministic sweeps.
    pub fn standard() -> Self {
        let tests = relation::RELATION_TESTS
            .into_iter()
            .chain(sweep::SWEEP_TESTS)
            .collect();
        PatternLibrary { tests }
    }

    /// Iterates over the tests in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, TestDescriptor> {
        self.tests.iter()
    }

    /// Number of tests in the library.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns `true` if the library contains no tests.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Looks up a test by its display name.
    pub fn get(&self, name: &str) -> Option<&TestDescriptor> {
        self.tests.iter().find(|t| t.name == name)
    }

    /// Display names of all tests, in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tests.iter().map(|t| t.name).collect()
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'a> IntoIterator for &'a PatternLibrary {
    type Item = &'a TestDescriptor;
    type IntoIter = std::slice::Iter<'a, TestDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tests.iter()
    }
}
