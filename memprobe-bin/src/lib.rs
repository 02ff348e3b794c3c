//! # Memprobe
//!
//! Memprobe is a user-space RAM tester. It reserves a memory region, pins it in
//! physical memory and runs a library of fault-detection tests over it, loop after
//! loop.
//!
//! ## Quickstart guide
//!
//! ```sh
//! # Build and test 1024 MB of memory, three times
//! cargo build --release
//! sudo target/release/memprobe 1024 3
//! ```
//!
//! Locking the tested region in memory requires root privileges or a sufficiently
//! large `RLIMIT_MEMLOCK`. Without it, testing continues on pageable memory. Use
//! `target/release/memprobe --help` to see available options.
//!
//! ## Modules
//!
//! - `allocator`: Selects the strategy for obtaining the memory under test.
pub mod allocator;

#[macro_use]
extern crate log;

use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

fn logger_builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
}

/// Installs the logger so that log lines and progress bars in the returned
/// [`MultiProgress`] do not interleave.
pub fn init_logging_with_progress() -> anyhow::Result<MultiProgress> {
    let logger = logger_builder().build();
    let progress = MultiProgress::new();
    LogWrapper::new(progress.clone(), logger).try_init()?;
    Ok(progress)
}

/// Installs the logger without progress bar support.
pub fn init_logging() -> anyhow::Result<()> {
    logger_builder().try_init()?;
    Ok(())
}
