//! Region allocation strategies.
//!
//! This module defines the [`RegionAllocator`] trait, the built-in [`HeapAllocator`]
//! and [`MmapAllocator`] strategies, and [`alloc_shrinking`], which obtains the
//! largest buffer not exceeding a requested size.

use std::ptr::{NonNull, null_mut};

use log::{debug, warn};
use thiserror::Error;

use crate::memory::RegionError;
use crate::util::page_size;

/// How a [`RawBuffer`] was obtained, and therefore how it is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backing {
    /// Allocated with `posix_memalign`, released with `free`
    Heap,
    /// Mapped with `mmap`, released with `munmap`
    Mapped,
}

/// An owned, raw allocation returned by a [`RegionAllocator`].
///
/// The buffer is released according to its [`Backing`] when dropped.
#[derive(Debug)]
pub struct RawBuffer {
    ptr: NonNull<u8>,
    len: usize,
    backing: Backing,
}

impl RawBuffer {
    /// Takes ownership of a raw allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` readable and writable bytes obtained in the way
    /// described by `backing`, and must not be released by anyone else.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize, backing: Backing) -> Self {
        RawBuffer { ptr, len, backing }
    }

    /// Returns a pointer to the start of the buffer.
    pub fn ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Returns the length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns how the buffer was obtained.
    pub fn backing(&self) -> Backing {
        self.backing
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        match self.backing {
            Backing::Heap => unsafe { libc::free(self.ptr.as_ptr() as *mut libc::c_void) },
            Backing::Mapped => {
                let r = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len) };
                if r != 0 {
                    warn!(
                        "munmap({:p}, {}): {}",
                        self.ptr,
                        self.len,
                        std::io::Error::last_os_error()
                    );
                }
            }
        }
    }
}

/// Errors returned by a single allocation attempt.
#[derive(Debug, Error)]
pub enum AllocError {
    /// The heap allocation of the given size failed
    #[error("heap allocation of {0} bytes failed")]
    OutOfMemory(usize),
    /// `mmap` failed
    #[error("mmap failed: {0}")]
    Mmap(#[from] std::io::Error),
    /// The requested size is not a multiple of the allocator's granularity
    #[error("size {size} is not a multiple of {granularity}")]
    Unaligned {
        /// Requested size in bytes
        size: usize,
        /// Required granularity in bytes
        granularity: usize,
    },
}

/// Trait for strategies that obtain the raw buffer backing a memory region.
///
/// Implementors make a single allocation attempt per call. Shrinking on failure is
/// handled by [`alloc_shrinking`].
pub trait RegionAllocator {
    /// Step in bytes by which a failed request is shrunk.
    ///
    /// Defaults to the page size.
    fn granularity(&self, page_size: usize) -> usize {
        page_size
    }

    /// Attempts to allocate exactly `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocError`] if the allocation cannot be satisfied.
    fn try_alloc(&mut self, size: usize) -> Result<RawBuffer, AllocError>;
}

/// Allocates from the heap with `posix_memalign`.
///
/// Buffers start on a page boundary, so a request of whole pages is fully usable.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl RegionAllocator for HeapAllocator {
    fn try_alloc(&mut self, size: usize) -> Result<RawBuffer, AllocError> {
        let mut p: *mut libc::c_void = null_mut();
        let r = unsafe { libc::posix_memalign(&mut p, page_size(), size) };
        if r != 0 {
            debug!("posix_memalign({}): {}", size, std::io::Error::from_raw_os_error(r));
            return Err(AllocError::OutOfMemory(size));
        }
        match NonNull::new(p as *mut u8) {
            Some(ptr) => Ok(unsafe { RawBuffer::from_raw_parts(ptr, size, Backing::Heap) }),
            None => Err(AllocError::OutOfMemory(size)),
        }
    }
}

/// Allocates anonymous private mappings with `mmap`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapAllocator {
    /// Pre-fault all pages of the mapping (`MAP_POPULATE`, Linux only)
    pub populate: bool,
}

impl RegionAllocator for MmapAllocator {
    fn try_alloc(&mut self, size: usize) -> Result<RawBuffer, AllocError> {
        #[cfg(target_os = "linux")]
        let populate = if self.populate { libc::MAP_POPULATE } else { 0 };
        #[cfg(not(target_os = "linux"))]
        let populate = 0;
        let p = unsafe {
            libc::mmap(
                null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | populate,
                -1,
                0,
            )
        };
        if p == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error().into());
        }
        let ptr = NonNull::new(p as *mut u8).ok_or(AllocError::OutOfMemory(size))?;
        Ok(unsafe { RawBuffer::from_raw_parts(ptr, size, Backing::Mapped) })
    }
}

/// Obtain the largest buffer not exceeding `requested` bytes.
///
/// Starts at `requested` rounded down to the allocator's granularity and shrinks by
/// one granule after every failed attempt, as long as the size stays at or above one
/// page.
///
/// # Errors
///
/// * [`RegionError::RequestTooSmall`] if `requested` is below one page
/// * [`RegionError::BelowGranularity`] if `requested` is below one granule of the
///   allocator, so that not even a single attempt could be made
/// * [`RegionError::AllocationExhausted`] if no attempt succeeds
pub fn alloc_shrinking(
    allocator: &mut dyn RegionAllocator,
    requested: usize,
    page_size: usize,
) -> Result<RawBuffer, RegionError> {
    if requested < page_size {
        return Err(RegionError::RequestTooSmall {
            requested,
            page_size,
        });
    }
    let step = allocator.granularity(page_size).max(1);
    if requested < step {
        return Err(RegionError::BelowGranularity {
            requested,
            granularity: step,
        });
    }
    let mut size = requested - requested % step;
    while size >= page_size {
        match allocator.try_alloc(size) {
            Ok(buffer) => return Ok(buffer),
            Err(e) => {
                debug!("allocation of {} bytes failed: {}", size, e);
                if size < step + page_size {
                    warn!("last allocation attempt ({} bytes) failed: {}", size, e);
                }
            }
        }
        size -= step;
    }
    Err(RegionError::AllocationExhausted {
        requested,
        page_size,
    })
}
