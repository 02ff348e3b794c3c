use std::marker::PhantomData;
use std::ops::Range;
use std::ptr::NonNull;

use super::Cell;
use crate::util::WORD_SIZE;

/// A borrowed, volatile-access view of memory cells.
///
/// Every read and write goes through [`std::ptr::read_volatile`] and
/// [`std::ptr::write_volatile`], so the compiler can neither elide nor merge the
/// accesses a test relies on. The view never hands out references to the cells,
/// which keeps it sound even when the underlying storage is aliased by hardware
/// or by a double mapping.
pub struct CellView<'a> {
    ptr: NonNull<Cell>,
    len: usize,
    _marker: PhantomData<&'a mut [Cell]>,
}

impl<'a> CellView<'a> {
    /// Creates a view over a mutable slice of cells.
    pub fn new(cells: &'a mut [Cell]) -> Self {
        let len = cells.len();
        CellView {
            ptr: NonNull::from(cells).cast(),
            len,
            _marker: PhantomData,
        }
    }

    /// Creates a view from a raw pointer and a cell count.
    ///
    /// # Safety
    ///
    /// * `ptr` must be aligned for [`Cell`] and valid for volatile reads and writes of
    ///   `len` cells for the lifetime `'a`.
    /// * No other code may access the cells through references while the view is alive.
    pub unsafe fn from_raw_parts(ptr: NonNull<Cell>, len: usize) -> Self {
        debug_assert!(ptr.as_ptr().is_aligned());
        CellView {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    /// Returns the number of cells in this view.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the view contains no cells.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a pointer to the cell at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn addr(&self, index: usize) -> *mut Cell {
        assert!(
            index < self.len,
            "CellView::addr failed. Index {} >= {}",
            index,
            self.len
        );
        unsafe { self.ptr.as_ptr().add(index) }
    }

    /// Reads the cell at `index`.
    pub fn read(&self, index: usize) -> Cell {
        unsafe { std::ptr::read_volatile(self.addr(index)) }
    }

    /// Writes `value` to the cell at `index`.
    pub fn write(&self, index: usize, value: Cell) {
        unsafe { std::ptr::write_volatile(self.addr(index), value) }
    }

    /// Virtual address range covered by this view, in bytes.
    pub fn byte_range(&self) -> Range<usize> {
        let start = self.ptr.as_ptr() as usize;
        start..start + self.len * WORD_SIZE
    }

    /// Returns `true` if the byte ranges of `self` and `other` intersect.
    pub fn overlaps(&self, other: &CellView<'_>) -> bool {
        let a = self.byte_range();
        let b = other.byte_range();
        a.start < b.end && b.start < a.end
    }

    /// Splits the view into two non-overlapping views at cell `mid`.
    ///
    /// # Panics
    ///
    /// Panics if `mid > len`.
    pub fn split_at(self, mid: usize) -> (CellView<'a>, CellView<'a>) {
        assert!(mid <= self.len, "mid {} > len {}", mid, self.len);
        let tail = unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(mid)) };
        (
            CellView {
                ptr: self.ptr,
                len: mid,
                _marker: PhantomData,
            },
            CellView {
                ptr: tail,
                len: self.len - mid,
                _marker: PhantomData,
            },
        )
    }

    /// Evicts the cells of this view from the CPU caches.
    ///
    /// Subsequent reads are served from RAM instead of the cache hierarchy. On
    /// targets without a cache flush instruction this only issues a full fence.
    pub fn flush(&self) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use crate::util::CL_SIZE;
            use std::arch::x86_64::{_mm_clflush, _mm_mfence};
            let start = self.ptr.as_ptr() as *const u8;
            for offset in (0..self.len * WORD_SIZE).step_by(CL_SIZE) {
                _mm_clflush(start.add(offset));
            }
            _mm_mfence();
        }
        #[cfg(not(target_arch = "x86_64"))]
        std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
    }
}

impl std::fmt::Debug for CellView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellView")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::CellView;
    use crate::util::WORD_SIZE;

    #[test]
    fn test_read_write() {
        let mut cells = vec![0usize; 8];
        let view = CellView::new(&mut cells);
        for i in 0..view.len() {
            view.write(i, i * 3);
        }
        for i in 0..view.len() {
            assert_eq!(view.read(i), i * 3);
        }
        drop(view);
        assert_eq!(cells[7], 21);
    }

    #[test]
    #[should_panic]
    fn test_out_of_bounds() {
        let mut cells = vec![0usize; 4];
        let view = CellView::new(&mut cells);
        view.read(4);
    }

    #[test]
    fn test_split_disjoint() {
        let mut cells = vec![0usize; 10];
        let (a, b) = CellView::new(&mut cells).split_at(5);
        assert_eq!(a.len(), 5);
        assert_eq!(b.len(), 5);
        assert!(!a.overlaps(&b));
        assert_eq!(a.byte_range().end, b.byte_range().start);
        assert_eq!(b.byte_range().len(), 5 * WORD_SIZE);
        a.write(4, 1);
        b.write(0, 2);
        assert_eq!(a.read(4), 1);
    }

    #[test]
    fn test_flush_keeps_contents() {
        let mut cells = vec![0xA5usize; 64];
        let view = CellView::new(&mut cells);
        view.flush();
        assert!((0..view.len()).all(|i| view.read(i) == 0xA5));
    }
}
