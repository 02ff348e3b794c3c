//! # Memprobe Core
//!
//! `memprobe-core` is the foundational library of the memprobe RAM tester. It reserves
//! a memory region, pins it in physical memory and exercises it with a library of
//! fault-detection algorithms that expose stuck bits, address decoder faults and
//! coupling faults between cells.
//!
//! ## Architecture Overview
//!
//! - [`allocator::RegionAllocator`] - Defines strategies for obtaining the raw buffer
//!   behind a region. [`allocator::alloc_shrinking`] retries with smaller sizes until an
//!   allocation succeeds.
//!
//! - [`memory::MemoryRegion`] - The page-aligned, optionally locked region under test,
//!   partitioned into the equal halves A and B ([`memory::Partition`]) and accessed
//!   through volatile [`memory::CellView`]s.
//!
//! - [`stuck_address`] - Verifies that every cell is independently addressable.
//!
//! - [`patterns::PatternLibrary`] - The ordered library of pattern-fill-and-compare
//!   tests operating on halves A and B.
//!
//! - [`Runner`] - Runs the stuck-address test and the library loop after loop and
//!   reports a [`LoopReport`] per loop.
//!
//! ## Platform Support
//!
//! Memprobe runs on Unix systems. Locking the region with `mlock` may require raising
//! `RLIMIT_MEMLOCK` or elevated privileges; without it, testing continues on pageable
//! memory.

#![warn(missing_docs)]

pub mod allocator;
mod context;
pub mod memory;
pub mod patterns;
mod runner;
mod stuck_address;
pub mod util;

pub use crate::context::{Interference, TestContext, TestOutcome};
pub use crate::runner::{LoopReport, RunSummary, Runner, RunnerConfig, TestResult};
pub use crate::stuck_address::{STUCK_ADDRESS, STUCK_ADDRESS_PASSES, stuck_address};
