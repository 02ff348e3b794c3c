/// Page shift value (12 bits) for 4KB pages
pub const PAGE_SHIFT: usize = 12;
/// Fallback page size (4096 bytes), used when the system page size cannot be queried
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Cache line size (64 bytes) for x86_64
pub const CL_SIZE: usize = 64;

/// Size of one memory cell (machine word) in bytes
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();
/// Number of bits in one memory cell
pub const CELL_BITS: usize = usize::BITS as usize;

/// Maximum number of fault observations kept per failing test pass
pub const MAX_REPORTED_FAULTS: usize = 16;
