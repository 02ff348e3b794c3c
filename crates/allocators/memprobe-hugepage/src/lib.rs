//! Hugepage-backed region allocator for memprobe.
//!
//! This crate provides [`HugepageAllocator`], which backs the region under test with
//! anonymous `MAP_HUGETLB` mappings. Testing on hugepages reduces TLB pressure, and
//! every hugepage is physically contiguous.
//!
//! Implements the [`memprobe_core::allocator::RegionAllocator`] trait.
//!
//! # Platform Requirements
//!
//! - Linux with hugetlbfs support
//! - Hugepages must be reserved, e.g. via `/proc/sys/vm/nr_hugepages` or kernel boot
//!   parameters

#![warn(missing_docs)]

#[cfg(target_os = "linux")]
mod hugepage;

#[cfg(target_os = "linux")]
pub use hugepage::*;
