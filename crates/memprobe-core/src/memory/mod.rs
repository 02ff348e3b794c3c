//! The `memory` module provides the region under test and the primitives the tests
//! operate on.
//!
//! The `memory` module provides the following abstractions:
//! - `MemoryRegion`: The owned, page-aligned and optionally locked region under test.
//! - `Partition`: The split of the usable region into the equal halves A and B.
//! - `CellView`: A bounds-checked, volatile-access view of machine-word cells.
//! - `FaultObservation`: A mismatch between an expected and an observed cell value.
//! - `FaultReport`: The faults found in one failing test pass.
mod fault;
mod partition;
mod region;
mod view;

pub use self::fault::{FaultObservation, FaultReport, FlipDirection};
pub(crate) use self::fault::FaultCollector;
pub use self::partition::Partition;
pub use self::region::{LockFailure, LockStatus, MemoryRegion, RegionError, RegionOptions};
pub use self::view::CellView;

/// One machine-word-sized memory cell.
pub type Cell = usize;
