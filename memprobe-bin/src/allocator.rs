//! Memory allocation strategies for the region under test.
//!
//! This module maps the `--allocator` command line option to a
//! [`RegionAllocator`]. The strategies are the heap (the default), anonymous `mmap`
//! and anonymous hugepage mappings.
//!
//! To add a new allocation strategy, implement the `RegionAllocator` trait for the new
//! strategy and add a new variant to the `AllocStrategy` enum.

use clap::ValueEnum;
use memprobe_core::allocator::{HeapAllocator, MmapAllocator, RegionAllocator};
use serde::Serialize;

/// Allocation strategy selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize)]
pub enum AllocStrategy {
    /// Page-aligned heap memory from `posix_memalign`
    Heap,
    /// Anonymous, pre-faulted `mmap`
    Mmap,
    /// Anonymous hugepage mappings; requires reserved hugepages
    Hugepage,
}

/// Creates the allocator for `strategy`.
///
/// # Errors
///
/// Fails if the strategy is not available on this system.
pub fn make_allocator(strategy: AllocStrategy) -> anyhow::Result<Box<dyn RegionAllocator>> {
    let allocator: Box<dyn RegionAllocator> = match strategy {
        AllocStrategy::Heap => Box::new(HeapAllocator),
        AllocStrategy::Mmap => Box::new(MmapAllocator { populate: true }),
        #[cfg(target_os = "linux")]
        AllocStrategy::Hugepage => {
            let allocator = memprobe_hugepage::HugepageAllocator::new()?;
            info!("Using hugepages of {} bytes", allocator.hugepage_size());
            Box::new(allocator)
        }
        #[cfg(not(target_os = "linux"))]
        AllocStrategy::Hugepage => anyhow::bail!("hugepage allocation is only supported on Linux"),
    };
    Ok(allocator)
}
