//! Shared state handed to every fault-detection test.

use indicatif::ProgressBar;
use serde::Serialize;

use crate::memory::{CellView, FaultObservation, FaultReport};
use crate::util::Rng;

/// Result of one test invocation.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[must_use]
pub enum TestOutcome {
    /// No mismatch was found
    Pass,
    /// At least one cell did not hold its expected value
    Fail(FaultReport),
}

impl TestOutcome {
    /// Returns `true` if the test passed.
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Pass)
    }

    /// The reported fault observations; empty for a passing test.
    pub fn faults(&self) -> &[FaultObservation] {
        match self {
            TestOutcome::Pass => &[],
            TestOutcome::Fail(report) => &report.faults,
        }
    }
}

impl From<Option<FaultReport>> for TestOutcome {
    fn from(value: Option<FaultReport>) -> Self {
        match value {
            Some(report) => TestOutcome::Fail(report),
            None => TestOutcome::Pass,
        }
    }
}

/// Callback invoked right before every verification sweep.
///
/// Receives the zero-based pass number and the views about to be verified. Used to
/// simulate hardware faults by corrupting cells between the write and the read phase.
pub type Interference = Box<dyn FnMut(usize, &[&CellView<'_>])>;

/// Per-run state shared by all tests: the random source, cache flushing, progress
/// reporting and an optional fault injector.
pub struct TestContext {
    rng: Rng,
    flush: bool,
    progress: Option<ProgressBar>,
    interference: Option<Interference>,
}

impl TestContext {
    /// Creates a context drawing random operands from `rng`.
    pub fn new(rng: Rng) -> Self {
        TestContext {
            rng,
            flush: false,
            progress: None,
            interference: None,
        }
    }

    /// Flush the verified views from the CPU caches before every verification sweep.
    pub fn with_flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    /// Installs a callback that runs before every verification sweep.
    pub fn with_interference(
        mut self,
        interference: impl FnMut(usize, &[&CellView<'_>]) + 'static,
    ) -> Self {
        self.interference = Some(Box::new(interference));
        self
    }

    /// Sets (or clears) the progress bar ticked once per verified pass.
    pub fn set_progress(&mut self, progress: Option<ProgressBar>) {
        self.progress = progress;
    }

    /// The random source for test operands and random fills.
    pub fn rng(&mut self) -> &mut Rng {
        &mut self.rng
    }

    /// Prepares `views` for verification of `pass`.
    pub(crate) fn settle(&mut self, pass: usize, views: &[&CellView<'_>]) {
        if self.flush {
            for view in views {
                view.flush();
            }
        }
        if let Some(progress) = &self.progress {
            progress.set_position(pass as u64 + 1);
        }
        if let Some(interference) = self.interference.as_mut() {
            interference(pass, views);
        }
    }
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("rng", &self.rng)
            .field("flush", &self.flush)
            .field("interference", &self.interference.is_some())
            .finish()
    }
}
