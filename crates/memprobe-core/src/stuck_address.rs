//! The stuck-address test.
//!
//! Writes every cell's own virtual address (or its complement) into the cell and reads
//! it back in reverse order. A cell that does not hold its own address afterwards was
//! overwritten through another address, which means the memory behind it is not
//! independently addressable.

use crate::context::{TestContext, TestOutcome};
use crate::memory::{Cell, CellView, FaultCollector, FaultObservation};

/// Display name of the stuck-address test.
pub const STUCK_ADDRESS: &str = "Stuck Address";

/// Number of write/verify passes of the stuck-address test.
pub const STUCK_ADDRESS_PASSES: usize = 16;

/// Runs the stuck-address test over all cells in `cells`.
///
/// Stops after the first pass that finds a mismatch.
pub fn stuck_address(cells: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    for pass in 0..STUCK_ADDRESS_PASSES {
        for i in 0..cells.len() {
            cells.write(i, address_value(cells, pass, i));
        }
        ctx.settle(pass, &[cells]);
        let mut collector = FaultCollector::new(pass);
        for i in (0..cells.len()).rev() {
            let expected = address_value(cells, pass, i);
            let observed = cells.read(i);
            if observed != expected {
                collector.record(FaultObservation::new(i, cells.addr(i), expected, observed));
            }
        }
        if let Some(report) = collector.finish() {
            return TestOutcome::Fail(report);
        }
    }
    TestOutcome::Pass
}

/// The value cell `i` holds in `pass`: its address, complemented on odd `pass + i`.
fn address_value(cells: &CellView<'_>, pass: usize, i: usize) -> Cell {
    let addr = cells.addr(i) as Cell;
    if (pass + i) % 2 == 1 { !addr } else { addr }
}

#[cfg(test)]
mod tests {
    use super::{STUCK_ADDRESS_PASSES, address_value, stuck_address};
    use crate::context::{TestContext, TestOutcome};
    use crate::memory::CellView;
    use crate::util::Rng;

    #[test]
    fn test_fault_free() {
        let mut cells = vec![0usize; 1024];
        let view = CellView::new(&mut cells);
        let outcome = stuck_address(&view, &mut TestContext::new(Rng::from_seed(1)));
        assert_eq!(outcome, TestOutcome::Pass);
    }

    #[test]
    fn test_fault_free_with_flush() {
        let mut cells = vec![0usize; 256];
        let view = CellView::new(&mut cells);
        let mut ctx = TestContext::new(Rng::from_seed(1)).with_flush(true);
        assert!(stuck_address(&view, &mut ctx).is_pass());
    }

    #[test]
    fn test_values_alternate() {
        let mut cells = vec![0usize; 2];
        let view = CellView::new(&mut cells);
        let addr = view.addr(0) as usize;
        assert_eq!(address_value(&view, 0, 0), addr);
        assert_eq!(address_value(&view, 1, 0), !addr);
        assert_eq!(address_value(&view, 0, 1), !(addr + crate::util::WORD_SIZE));
    }

    #[test]
    fn test_detects_simulated_aliasing() {
        // writes to cell 5 land in cell 3
        let mut cells = vec![0usize; 64];
        let view = CellView::new(&mut cells);
        let mut ctx = TestContext::new(Rng::from_seed(1)).with_interference(|_, views| {
            let cells = views[0];
            cells.write(5, cells.read(3));
        });
        let outcome = stuck_address(&view, &mut ctx);
        let TestOutcome::Fail(report) = outcome else {
            panic!("aliasing not detected");
        };
        assert_eq!(report.pass, 0);
        assert_eq!(report.total, 1);
        assert_eq!(report.faults[0].index, 5);
        assert_eq!(report.faults[0].addr, view.addr(5) as usize);
    }

    #[test]
    fn test_detects_fault_in_late_pass() {
        let mut cells = vec![0usize; 64];
        let view = CellView::new(&mut cells);
        let mut ctx = TestContext::new(Rng::from_seed(1)).with_interference(|pass, views| {
            if pass == STUCK_ADDRESS_PASSES - 1 {
                views[0].write(17, views[0].read(17) ^ 0x10);
            }
        });
        let outcome = stuck_address(&view, &mut ctx);
        assert_eq!(outcome.faults().len(), 1);
        assert_eq!(outcome.faults()[0].index, 17);
        assert_eq!(outcome.faults()[0].bitmask(), 0x10);
    }

    /// Maps the same shared memory object at two adjacent pages, so cell `i` and cell
    /// `i + cells_per_page` are backed by the same physical storage.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_detects_double_mapping() {
        use std::ffi::CString;
        use std::ptr::{NonNull, null_mut};

        let page = crate::util::page_size();
        let name = CString::new(format!("/memprobe-alias-{}", std::process::id())).unwrap();
        unsafe {
            let reserved = libc::mmap(
                null_mut(),
                2 * page,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            );
            assert_ne!(reserved, libc::MAP_FAILED);
            let shm = libc::shm_open(
                name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT,
                libc::S_IRUSR | libc::S_IWUSR,
            );
            assert_ne!(shm, -1, "shm_open: {}", std::io::Error::last_os_error());
            libc::shm_unlink(name.as_ptr());
            assert_eq!(libc::ftruncate(shm, page as libc::off_t), 0);
            for half in 0..2 {
                let addr = (reserved as *mut u8).add(half * page) as *mut libc::c_void;
                let v = libc::mmap(
                    addr,
                    page,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED | libc::MAP_FIXED,
                    shm,
                    0,
                );
                assert_eq!(v, addr, "mmap: {}", std::io::Error::last_os_error());
            }
            libc::close(shm);

            let cells_per_page = page / crate::util::WORD_SIZE;
            let view = CellView::from_raw_parts(
                NonNull::new(reserved as *mut usize).unwrap(),
                2 * cells_per_page,
            );
            let outcome = stuck_address(&view, &mut TestContext::new(Rng::from_seed(1)));
            let TestOutcome::Fail(report) = outcome else {
                panic!("double mapping not detected");
            };
            assert_eq!(report.pass, 0);
            assert_eq!(report.total, cells_per_page);
            assert!(report.faults.iter().all(|f| f.index < cells_per_page));
            drop(view);
            libc::munmap(reserved, 2 * page);
        }
    }
}
