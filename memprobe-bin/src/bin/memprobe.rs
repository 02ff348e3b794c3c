use std::{
    fs::File,
    io::{BufWriter, Write},
    time::Instant,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use memprobe_bin::allocator::{AllocStrategy, make_allocator};
use memprobe_bin::{init_logging, init_logging_with_progress};
use memprobe_core::memory::{LockStatus, MemoryRegion, RegionError, RegionOptions};
use memprobe_core::patterns::PatternLibrary;
use memprobe_core::util::{Size, page_size};
use memprobe_core::{LoopReport, Runner, RunnerConfig};

/// CLI arguments for the `memprobe` binary.
#[derive(Debug, Parser, Clone)]
#[clap(version, about = "A user-space RAM tester")]
struct CliArgs {
    /// The amount of memory to test in MB.
    #[clap(value_name = "SIZE_MB")]
    size_mb: usize,
    /// The number of loops over all tests (0 = run forever).
    #[clap(value_name = "LOOPS", default_value = "0")]
    loops: u64,
    /// The seed for random test values. Drawn randomly if absent.
    #[clap(long = "seed")]
    seed: Option<u64>,
    /// The allocation strategy to use.
    #[clap(long = "allocator", value_enum, default_value_t = AllocStrategy::Heap)]
    allocator: AllocStrategy,
    /// Do not lock the tested memory with mlock.
    #[clap(long = "no-lock")]
    no_lock: bool,
    /// Flush tested cache lines before every verification (x86_64 only).
    #[clap(long = "flush")]
    flush: bool,
    /// Output file for loop results (JSON lines).
    #[clap(long = "output")]
    output: Option<String>,
    /// Do not show progress bars.
    #[clap(long = "no-progress")]
    no_progress: bool,
}

fn write_report(writer: &mut impl Write, report: &LoopReport) -> Result<()> {
    serde_json::to_writer(&mut *writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let progress = if args.no_progress {
        init_logging()?;
        None
    } else {
        Some(init_logging_with_progress()?)
    };
    info!("CLI args: {:?}", args);

    let page_size = page_size();
    info!("pagesize is {}", page_size);
    let requested = Size::MB(args.size_mb);
    let bytes = requested
        .checked_bytes()
        .ok_or(RegionError::SizeOverflow(requested))?;

    let mut allocator = make_allocator(args.allocator)?;
    let options = RegionOptions {
        page_size,
        lock: !args.no_lock,
    };
    let mut region = MemoryRegion::setup(allocator.as_mut(), bytes, options)
        .context("failed to set up the memory region")?;
    match region.lock_status() {
        LockStatus::Locked => info!("locked {} bytes", region.usable()),
        LockStatus::Disabled => info!("memory locking disabled"),
        LockStatus::Unlocked(_) => {}
    }

    let mut output = match &args.output {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path))?,
        )),
        None => None,
    };

    let config = RunnerConfig {
        loops: (args.loops != 0).then_some(args.loops),
        seed: args.seed,
        flush: args.flush,
    };
    let mut runner = Runner::new(PatternLibrary::standard(), config);
    if let Some(progress) = progress {
        runner = runner.with_progress(progress);
    }

    let start = Instant::now();
    let mut write_error = None;
    let summary = runner.run(&mut region, |report| {
        let Some(writer) = output.as_mut() else {
            return;
        };
        if write_error.is_some() {
            return;
        }
        if let Err(e) = write_report(writer, report) {
            warn!("Failed to write loop report: {:?}", e);
            write_error = Some(e);
        }
    });
    drop(region);

    info!("=== SUMMARY ===");
    info!("Seed: {}", summary.seed);
    info!("Loops completed: {}", summary.loops_completed);
    info!(
        "Tests failed: {}/{}",
        summary.tests_failed, summary.tests_run
    );
    info!("Total time: {:.2}s", start.elapsed().as_secs_f64());
    if let Some(path) = &args.output {
        info!("Results saved to {}", path);
    }

    if let Some(e) = write_error {
        return Err(e.context("failed to write the output file"));
    }
    if !summary.is_pass() {
        bail!(
            "{} of {} tests failed; rerun with --seed {} to reproduce",
            summary.tests_failed,
            summary.tests_run,
            summary.seed
        );
    }
    Ok(())
}
