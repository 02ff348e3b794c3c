//! Utility functions and types used throughout memprobe.
//!
//! This module provides various helper types and functions including:
//! - [`Size`] - Memory size representation
//! - Constants for memory operations ([`PAGE_SIZE`], [`WORD_SIZE`], etc.)
//! - [`page_size`] - Page size discovery
//! - Progress reporting utilities ([`NamedProgress`])
//! - Random number generation ([`Rng`])

mod constants;
mod named_progress;
mod rng;
mod size;

pub use self::constants::*;
pub use self::named_progress::NamedProgress;
pub use self::rng::Rng;
pub use self::size::Size;

use log::warn;

/// Returns the system page size in bytes.
///
/// Queries `sysconf(_SC_PAGESIZE)`. Falls back to [`PAGE_SIZE`] if the query fails
/// or reports something that is not a power of two.
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 || !(size as usize).is_power_of_two() {
        warn!(
            "sysconf(_SC_PAGESIZE) failed ({}); using pagesize of {}",
            size, PAGE_SIZE
        );
        return PAGE_SIZE;
    }
    size as usize
}

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. Returns `None` on overflow.
///
/// ```
/// use memprobe_core::util::align_up;
///
/// assert_eq!(align_up(4097, 4096), Some(8192));
/// assert_eq!(align_up(8192, 4096), Some(8192));
/// assert_eq!(align_up(usize::MAX, 4096), None);
/// ```
pub fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

/// Rounds `value` down to the previous multiple of `align`.
///
/// `align` must be a power of two.
pub fn align_down(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}
