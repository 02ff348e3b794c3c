use std::time::Instant;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info};
use serde::Serialize;

use crate::context::{TestContext, TestOutcome};
use crate::memory::MemoryRegion;
use crate::patterns::PatternLibrary;
use crate::stuck_address::{STUCK_ADDRESS, STUCK_ADDRESS_PASSES, stuck_address};
use crate::util::{NamedProgress, Rng};

/// Configuration of a test run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Number of loops over the whole test suite (None = run forever)
    pub loops: Option<u64>,
    /// Seed for random operands (None = draw a random seed)
    pub seed: Option<u64>,
    /// Flush the tested cells from the CPU caches before every verification
    pub flush: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            loops: Some(1),
            seed: None,
            flush: false,
        }
    }
}

/// Outcome and duration of one test within a loop.
#[derive(Clone, Debug, Serialize)]
pub struct TestResult {
    /// Display name of the test
    pub name: &'static str,
    /// Pass or the faults found
    pub outcome: TestOutcome,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Results of one loop over the test suite.
#[derive(Clone, Debug, Serialize)]
pub struct LoopReport {
    /// RFC 3339 timestamp of the end of the loop
    pub date: String,
    /// Zero-based loop index
    pub loop_index: u64,
    /// Configured number of loops (None = forever)
    pub loops: Option<u64>,
    /// Seed of the run the loop belongs to
    pub seed: u64,
    /// One result per test, in execution order
    pub results: Vec<TestResult>,
}

impl LoopReport {
    /// Number of failed tests in this loop.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.outcome.is_pass()).count()
    }
}

/// Totals of a finished run.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    /// Seed used for random operands
    pub seed: u64,
    /// Number of completed loops
    pub loops_completed: u64,
    /// Number of test invocations
    pub tests_run: usize,
    /// Number of failed test invocations
    pub tests_failed: usize,
}

impl RunSummary {
    /// Returns `true` if no test failed.
    pub fn is_pass(&self) -> bool {
        self.tests_failed == 0
    }
}

/// Runs the stuck-address test and a [`PatternLibrary`] over a [`MemoryRegion`], loop
/// after loop.
///
/// Every loop runs the stuck-address test on the whole region, then every library test
/// on the A/B halves. A failing test is reported and the loop continues with the next
/// test.
pub struct Runner {
    library: PatternLibrary,
    config: RunnerConfig,
    progress: Option<MultiProgress>,
}

impl Runner {
    /// Creates a runner executing `library` with `config`.
    pub fn new(library: PatternLibrary, config: RunnerConfig) -> Self {
        Runner {
            library,
            config,
            progress: None,
        }
    }

    /// Shows per-test progress bars in `progress`.
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The library run in every loop.
    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// The run configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs the configured number of loops over `region`, handing every finished loop
    /// to `sink`.
    pub fn run(&self, region: &mut MemoryRegion, mut sink: impl FnMut(&LoopReport)) -> RunSummary {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        info!("Using seed {}", seed);
        let mut ctx = TestContext::new(Rng::from_seed(seed)).with_flush(self.config.flush);
        let loop_progress = match (self.config.loops, self.progress.as_ref()) {
            (Some(loops), Some(p)) => {
                let p = p.add(ProgressBar::new(loops));
                p.set_style(ProgressStyle::named_bar("Loops"));
                Some(p)
            }
            _ => None,
        };
        let mut summary = RunSummary {
            seed,
            loops_completed: 0,
            tests_run: 0,
            tests_failed: 0,
        };
        let mut loop_index = 0;
        while self.config.loops.is_none_or(|loops| loop_index < loops) {
            let report = self.run_loop(region, &mut ctx, seed, loop_index);
            summary.loops_completed += 1;
            summary.tests_run += report.results.len();
            summary.tests_failed += report.failed();
            sink(&report);
            loop_index += 1;
            if let Some(loop_progress) = &loop_progress {
                loop_progress.set_position(loop_index);
            }
        }
        if let Some(loop_progress) = loop_progress {
            loop_progress.finish();
        }
        info!("Done.");
        summary
    }

    /// Runs one loop: the stuck-address test, then every library test.
    pub fn run_loop(
        &self,
        region: &mut MemoryRegion,
        ctx: &mut TestContext,
        seed: u64,
        loop_index: u64,
    ) -> LoopReport {
        match self.config.loops {
            Some(loops) => info!("Loop {}/{}:", loop_index + 1, loops),
            None => info!("Loop {}:", loop_index + 1),
        }
        let mut results = Vec::with_capacity(self.library.len() + 1);
        {
            let cells = region.cells();
            results.push(self.timed(STUCK_ADDRESS, STUCK_ADDRESS_PASSES, ctx, |ctx| {
                stuck_address(&cells, ctx)
            }));
        }
        let (a, b) = region.halves();
        for test in &self.library {
            results.push(self.timed(test.name(), test.passes(), ctx, |ctx| {
                test.run(&a, &b, ctx)
            }));
        }
        LoopReport {
            date: chrono::Local::now().to_rfc3339(),
            loop_index,
            loops: self.config.loops,
            seed,
            results,
        }
    }

    fn timed(
        &self,
        name: &'static str,
        passes: usize,
        ctx: &mut TestContext,
        test: impl FnOnce(&mut TestContext) -> TestOutcome,
    ) -> TestResult {
        let bar = self.progress.as_ref().map(|p| {
            let bar = p.add(ProgressBar::new(passes as u64));
            bar.set_style(ProgressStyle::named_bar(name));
            bar
        });
        ctx.set_progress(bar.clone());
        let start = Instant::now();
        let outcome = test(ctx);
        let duration = start.elapsed();
        ctx.set_progress(None);
        if let (Some(p), Some(bar)) = (self.progress.as_ref(), bar) {
            bar.finish_and_clear();
            p.remove(&bar);
        }
        match &outcome {
            TestOutcome::Pass => info!("  {:<20}: ok", name),
            TestOutcome::Fail(report) => error!(
                "  {:<20}: FAILED in pass {} ({} faulty cells)",
                name, report.pass, report.total
            ),
        }
        TestResult {
            name,
            outcome,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("library", &self.library)
            .field("config", &self.config)
            .finish()
    }
}
