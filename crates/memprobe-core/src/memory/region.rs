use std::ptr::NonNull;

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use super::{Cell, CellView, Partition};
use crate::allocator::{RawBuffer, RegionAllocator, alloc_shrinking};
use crate::util::{align_down, align_up, page_size};

/// Errors that prevent a memory region from being set up.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The requested size is smaller than one page
    #[error("requested {requested} bytes is less than one page ({page_size} bytes)")]
    RequestTooSmall {
        /// Requested size in bytes
        requested: usize,
        /// System page size in bytes
        page_size: usize,
    },
    /// The requested size is smaller than one allocation granule, so no attempt is made
    #[error("requested {requested} bytes is less than the allocation granularity ({granularity} bytes)")]
    BelowGranularity {
        /// Requested size in bytes
        requested: usize,
        /// Allocation granularity in bytes
        granularity: usize,
    },
    /// The requested size cannot be expressed in bytes
    #[error("requested size of {0} overflows the address space")]
    SizeOverflow(crate::util::Size),
    /// No allocation succeeded, not even at one page
    #[error("failed to allocate memory: {requested} bytes requested, nothing obtainable down to {page_size} bytes")]
    AllocationExhausted {
        /// Requested size in bytes
        requested: usize,
        /// System page size in bytes
        page_size: usize,
    },
    /// The aligned, usable region cannot be split into two non-empty halves
    #[error("usable region of {usable} bytes is too small to split (need at least {min} bytes)")]
    RegionTooSmall {
        /// Usable size in bytes after alignment
        usable: usize,
        /// Minimum usable size in bytes
        min: usize,
    },
}

/// Why pinning the region in physical memory failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LockFailure {
    /// `ENOMEM`: the region exceeds the lockable memory limit
    TooManyPages,
    /// `EPERM`: the process lacks the privilege to lock memory
    InsufficientPermission,
    /// Any other errno
    Unknown(i32),
}

impl std::fmt::Display for LockFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockFailure::TooManyPages => write!(f, "too many pages"),
            LockFailure::InsufficientPermission => write!(f, "insufficient permission"),
            LockFailure::Unknown(errno) => write!(f, "unknown reason (errno {})", errno),
        }
    }
}

/// Whether the region is pinned in physical memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LockStatus {
    /// The region is locked with `mlock`
    Locked,
    /// Locking was not requested
    Disabled,
    /// Locking was requested but failed; testing continues on pageable memory
    Unlocked(LockFailure),
}

/// Options for [`MemoryRegion::setup`].
#[derive(Clone, Copy, Debug)]
pub struct RegionOptions {
    /// Page size used for shrinking, alignment and the minimum request
    pub page_size: usize,
    /// Try to pin the region with `mlock`
    pub lock: bool,
}

impl Default for RegionOptions {
    fn default() -> Self {
        RegionOptions {
            page_size: page_size(),
            lock: true,
        }
    }
}

/// The memory region under test.
///
/// Owns the raw allocation, knows its page-aligned usable part and the A/B partition
/// of that part. Dropping the region unlocks and frees the memory.
pub struct MemoryRegion {
    aligned: NonNull<Cell>,
    usable: usize,
    page_size: usize,
    partition: Partition,
    lock: LockStatus,
    buffer: RawBuffer,
}

impl MemoryRegion {
    /// Allocates, aligns, partitions and (optionally) pins a region of at most
    /// `requested` bytes.
    ///
    /// # Errors
    ///
    /// * [`RegionError::RequestTooSmall`] if `requested` is below one page
    /// * [`RegionError::BelowGranularity`] if `requested` is below the allocator's
    ///   granularity
    /// * [`RegionError::AllocationExhausted`] if no buffer could be obtained
    /// * [`RegionError::RegionTooSmall`] if the aligned region cannot be split
    ///
    /// A failure to pin the region is not an error; it is reported through
    /// [`MemoryRegion::lock_status`].
    pub fn setup(
        allocator: &mut dyn RegionAllocator,
        requested: usize,
        options: RegionOptions,
    ) -> Result<Self, RegionError> {
        let page_size = options.page_size;
        info!("want {}MB ({} bytes)", requested >> 20, requested);
        let buffer = alloc_shrinking(allocator, requested, page_size)?;
        info!("got  {}MB ({} bytes)", buffer.len() >> 20, buffer.len());

        let (offset, usable) = align_within(buffer.ptr() as usize, buffer.len(), page_size);
        if offset != 0 {
            debug!("aligning to page (skipping {} bytes)", offset);
        }
        let partition = Partition::new(usable)?;
        // usable > 0 here, so offset + usable <= buffer.len()
        let aligned = unsafe { NonNull::new_unchecked(buffer.ptr().add(offset) as *mut Cell) };

        let lock = if options.lock {
            lock_region(aligned.as_ptr() as *const libc::c_void, usable)
        } else {
            LockStatus::Disabled
        };
        Ok(MemoryRegion {
            aligned,
            usable,
            page_size,
            partition,
            lock,
            buffer,
        })
    }

    /// Usable (aligned) size of the region in bytes.
    pub fn usable(&self) -> usize {
        self.usable
    }

    /// Size of the underlying allocation in bytes.
    pub fn allocated(&self) -> usize {
        self.buffer.len()
    }

    /// Page size the region was aligned to.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Start address of the usable region.
    pub fn aligned_ptr(&self) -> *mut u8 {
        self.aligned.as_ptr() as *mut u8
    }

    /// The A/B partition of the usable region.
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Whether the region is pinned in physical memory.
    pub fn lock_status(&self) -> LockStatus {
        self.lock
    }

    /// Returns `true` if the region is pinned in physical memory.
    pub fn is_locked(&self) -> bool {
        self.lock == LockStatus::Locked
    }

    /// View of every cell of the usable region.
    pub fn cells(&mut self) -> CellView<'_> {
        unsafe { CellView::from_raw_parts(self.aligned, self.partition.total_cells()) }
    }

    /// Views of half A and half B.
    pub fn halves(&mut self) -> (CellView<'_>, CellView<'_>) {
        let partition = self.partition;
        partition.split(self.cells())
    }
}

impl Drop for MemoryRegion {
    fn drop(&mut self) {
        if self.lock == LockStatus::Locked {
            let r = unsafe { libc::munlock(self.aligned.as_ptr() as *const libc::c_void, self.usable) };
            if r != 0 {
                warn!("munlock failed: {}", std::io::Error::last_os_error());
            }
        }
        debug!("releasing {} bytes", self.buffer.len());
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("aligned", &self.aligned)
            .field("usable", &self.usable)
            .field("page_size", &self.page_size)
            .field("partition", &self.partition)
            .field("lock", &self.lock)
            .finish()
    }
}

/// Offset of the first page boundary at or after `addr`, and the number of whole
/// pages from there to `addr + len`, in bytes.
pub(crate) fn align_within(addr: usize, len: usize, page_size: usize) -> (usize, usize) {
    let offset = match align_up(addr, page_size) {
        Some(aligned) => aligned - addr,
        None => return (0, 0),
    };
    let usable = align_down(len.saturating_sub(offset), page_size);
    (offset, usable)
}

fn lock_region(ptr: *const libc::c_void, len: usize) -> LockStatus {
    if unsafe { libc::mlock(ptr, len) } == 0 {
        return LockStatus::Locked;
    }
    let failure = lock_failure(std::io::Error::last_os_error().raw_os_error());
    warn!("mlock() failed: {}", failure);
    warn!("Continuing with unlocked memory; testing will be slower and less reliable.");
    LockStatus::Unlocked(failure)
}

/// Maps the errno of a failed `mlock` to its reason.
fn lock_failure(errno: Option<i32>) -> LockFailure {
    match errno {
        Some(libc::ENOMEM) => LockFailure::TooManyPages,
        Some(libc::EPERM) => LockFailure::InsufficientPermission,
        errno => LockFailure::Unknown(errno.unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        LockFailure, LockStatus, MemoryRegion, RegionError, RegionOptions, align_within,
        lock_failure,
    };
    use crate::allocator::{HeapAllocator, MmapAllocator};
    use crate::util::{WORD_SIZE, page_size};

    #[test]
    fn test_align_within() {
        assert_eq!(align_within(0x1000, 0x4000, 0x1000), (0, 0x4000));
        assert_eq!(align_within(0x1010, 0x4000, 0x1000), (0xff0, 0x3000));
        assert_eq!(align_within(0x1010, 0x800, 0x1000), (0xff0, 0));
        assert_eq!(align_within(0x1000, 0x1800, 0x1000), (0, 0x1000));
    }

    #[test]
    fn test_usable_is_page_multiple() {
        let page = 0x1000;
        for addr in [0x1000, 0x1008, 0x1ff8, 0x2010] {
            for len in [page, 2 * page, 10 * page + 24] {
                let (offset, usable) = align_within(addr, len, page);
                assert_eq!((addr + offset) % page, 0);
                assert_eq!(usable % page, 0);
                assert!(offset + usable <= len);
                assert!(usable + page > len.saturating_sub(offset));
            }
        }
    }

    #[test]
    fn test_setup_heap_region() {
        let page = page_size();
        let options = RegionOptions {
            page_size: page,
            lock: false,
        };
        let mut region = MemoryRegion::setup(&mut HeapAllocator, 16 * page, options).expect("setup");
        assert_eq!(region.lock_status(), LockStatus::Disabled);
        assert_eq!(region.aligned_ptr() as usize % page, 0);
        assert_eq!(region.usable() % page, 0);
        assert_eq!(region.usable(), 16 * page);
        let partition = region.partition();
        assert_eq!(partition.count(), region.usable() / 2 / WORD_SIZE);
        let (a, b) = region.halves();
        assert_eq!(a.len(), b.len());
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_setup_heap_one_page() {
        let page = page_size();
        let options = RegionOptions {
            page_size: page,
            lock: false,
        };
        let region = MemoryRegion::setup(&mut HeapAllocator, page, options).expect("setup");
        assert_eq!(region.usable(), page);
        assert_eq!(region.partition().count(), page / 2 / WORD_SIZE);
    }

    #[test]
    fn test_lock_failure_reasons() {
        assert_eq!(lock_failure(Some(libc::ENOMEM)), LockFailure::TooManyPages);
        assert_eq!(
            lock_failure(Some(libc::EPERM)),
            LockFailure::InsufficientPermission
        );
        assert_eq!(
            lock_failure(Some(libc::EINVAL)),
            LockFailure::Unknown(libc::EINVAL)
        );
        assert_eq!(lock_failure(None), LockFailure::Unknown(0));
    }

    #[test]
    fn test_setup_mmap_region_fully_usable() {
        let page = page_size();
        let options = RegionOptions {
            page_size: page,
            lock: true,
        };
        let region = MemoryRegion::setup(&mut MmapAllocator::default(), 8 * page, options)
            .expect("setup");
        assert_eq!(region.usable(), 8 * page);
        // locking may legitimately fail in unprivileged environments
        assert!(matches!(
            region.lock_status(),
            LockStatus::Locked | LockStatus::Unlocked(_)
        ));
    }

    #[test]
    fn test_setup_request_below_page() {
        let page = page_size();
        let err = MemoryRegion::setup(&mut HeapAllocator, page - 1, RegionOptions::default())
            .unwrap_err();
        assert!(matches!(err, RegionError::RequestTooSmall { .. }));
    }
}
