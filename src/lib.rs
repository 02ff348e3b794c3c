//! # memprobe
//!
//! User-space RAM integrity tester. This crate re-exports [`memprobe_core`] and, behind
//! cargo features, the optional region allocators:
//!
//! - `hugepage`: [`memprobe_hugepage::HugepageAllocator`]

pub use memprobe_core::*;

#[cfg(feature = "hugepage")]
pub use memprobe_hugepage;
