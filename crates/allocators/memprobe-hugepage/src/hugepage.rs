use lazy_static::lazy_static;
use log::{debug, warn};
use memprobe_core::allocator::{AllocError, Backing, RawBuffer, RegionAllocator};
use std::ptr::{NonNull, null_mut};
use thiserror::Error;
// https://www.kernel.org/doc/Documentation/vm/hugetlbpage.txt
//
// The output of "cat /proc/meminfo" will include lines like:
// ...
// HugePages_Total: uuu
// HugePages_Free:  vvv
// HugePages_Rsvd:  www
// HugePages_Surp:  xxx
// Hugepagesize:    yyy kB
// Hugetlb:         zzz kB

const MEMINFO_PATH: &str = "/proc/meminfo";
const TOKEN: &str = "Hugepagesize:";

lazy_static! {
    static ref HUGEPAGE_SIZE: Option<usize> = {
        match std::fs::read_to_string(MEMINFO_PATH) {
            Ok(meminfo) => parse_hugepage_size(&meminfo),
            Err(e) => {
                warn!("Failed to read {}: {}", MEMINFO_PATH, e);
                None
            }
        }
    };
}

/// Parses the `Hugepagesize:` line of `/proc/meminfo` into bytes.
fn parse_hugepage_size(s: &str) -> Option<usize> {
    let line = s.lines().find(|line| line.starts_with(TOKEN))?;
    let mut parts = line.strip_prefix(TOKEN)?.split_whitespace();
    let size = parts.next()?.parse::<usize>().ok()?;
    let unit = match parts.next() {
        Some("kB") => 1024,
        Some(_) => return None,
        None => 1,
    };
    size.checked_mul(unit).filter(|size| *size > 0)
}

/// Errors of the hugepage allocator.
#[derive(Debug, Error)]
pub enum HugepageError {
    /// The system does not report a hugepage size
    #[error("hugepage size not found in /proc/meminfo; are hugepages supported?")]
    UnknownHugepageSize,
}

/// Returns the system's default hugepage size in bytes, if hugepages are supported.
pub fn hugepage_size() -> Option<usize> {
    *HUGEPAGE_SIZE
}

/// Region allocator backed by anonymous hugepage mappings (`MAP_HUGETLB`).
///
/// Requests are shrunk in steps of the hugepage size, so a region always consists of
/// whole hugepages. Mappings are populated eagerly, so an exhausted hugepage pool shows
/// up as an allocation failure instead of a `SIGBUS` during testing.
#[derive(Debug, Clone, Copy)]
pub struct HugepageAllocator {
    hugepage_size: usize,
}

impl HugepageAllocator {
    /// Creates an allocator for the system's default hugepage size.
    ///
    /// # Errors
    ///
    /// Returns [`HugepageError::UnknownHugepageSize`] if `/proc/meminfo` does not report
    /// a hugepage size.
    pub fn new() -> Result<Self, HugepageError> {
        let hugepage_size = hugepage_size().ok_or(HugepageError::UnknownHugepageSize)?;
        debug!("Hugepage size: {} bytes", hugepage_size);
        Ok(HugepageAllocator { hugepage_size })
    }

    /// The hugepage size this allocator maps, in bytes.
    pub fn hugepage_size(&self) -> usize {
        self.hugepage_size
    }
}

impl RegionAllocator for HugepageAllocator {
    fn granularity(&self, page_size: usize) -> usize {
        self.hugepage_size.max(page_size)
    }

    fn try_alloc(&mut self, size: usize) -> Result<RawBuffer, AllocError> {
        if size == 0 || size % self.hugepage_size != 0 {
            return Err(AllocError::Unaligned {
                size,
                granularity: self.hugepage_size,
            });
        }
        let p = unsafe {
            libc::mmap(
                null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_HUGETLB | libc::MAP_POPULATE,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hugepage_size() {
        // correct.
        assert_eq!(parse_hugepage_size("Hugepagesize:1024"), Some(1024));
        assert_eq!(parse_hugepage_size("Hugepagesize: 2 kB"), Some(2048));
        assert_eq!(
            parse_hugepage_size("HugePages_Free: 0\nHugepagesize:    2048 kB\nHugetlb: 0 kB"),
            Some(2 << 20)
        );

        // wrong.
        assert_eq!(parse_hugepage_size("Hugepagesize:1kB"), None);
        assert_eq!(parse_hugepage_size("Hugepagesize: 2kB"), None);
        assert_eq!(parse_hugepage_size("Hugepagesize: 0 kB"), None);
        assert_eq!(parse_hugepage_size("MemTotal: 1024 kB"), None);
    }

    #[test]
    fn test_rejects_unaligned_sizes() {
        let mut allocator = HugepageAllocator {
            hugepage_size: 2 << 20,
        };
        assert!(matches!(
            allocator.try_alloc(3 << 20),
            Err(AllocError::Unaligned { .. })
        ));
        assert!(matches!(
            allocator.try_alloc(0),
            Err(AllocError::Unaligned { .. })
        ));
        assert_eq!(allocator.granularity(4096), 2 << 20);
    }

    #[test]
    fn test_allocator() {
        let Ok(mut allocator) = HugepageAllocator::new() else {
            return;
        };
        // the hugepage pool may be empty
        let Ok(buffer) = allocator.try_alloc(allocator.hugepage_size()) else {
            return;
        };
        assert_eq!(buffer.len(), allocator.hugepage_size());
        assert_eq!(buffer.ptr() as usize % allocator.hugepage_size(), 0);
        unsafe {
            *buffer.ptr() = 20;
            assert_eq!(*buffer.ptr(), 20);
        }
    }
}
