use serde::Serialize;

use super::{CellView, RegionError};
use crate::util::WORD_SIZE;

/// Layout of the two comparison halves within a usable region.
///
/// Half A covers the first `count` cells and half B the `count` cells directly after
/// it. Trailing bytes that do not fill a whole cell of both halves are unused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Partition {
    usable: usize,
    half_len: usize,
    count: usize,
}

impl Partition {
    /// Computes the partition of a usable region of `usable` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::RegionTooSmall`] if the region cannot hold at least one
    /// cell per half.
    pub fn new(usable: usize) -> Result<Self, RegionError> {
        let half_len = usable / 2;
        let count = half_len / WORD_SIZE;
        if count == 0 {
            return Err(RegionError::RegionTooSmall {
                usable,
                min: 2 * WORD_SIZE,
            });
        }
        Ok(Partition {
            usable,
            half_len,
            count,
        })
    }

    /// Usable size in bytes this partition was computed from.
    pub fn usable(&self) -> usize {
        self.usable
    }

    /// Half of the usable size in bytes.
    pub fn half_len(&self) -> usize {
        self.half_len
    }

    /// Number of cells in each half.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of cells in the whole usable region.
    pub fn total_cells(&self) -> usize {
        self.usable / WORD_SIZE
    }

    /// Byte offset of half B from the start of the region.
    pub fn b_offset(&self) -> usize {
        self.count * WORD_SIZE
    }

    /// Splits a view of the whole region into half A and half B.
    ///
    /// # Panics
    ///
    /// Panics if `view` holds fewer than `2 * count` cells or if the resulting halves
    /// overlap.
    pub fn split<'a>(&self, view: CellView<'a>) -> (CellView<'a>, CellView<'a>) {
        assert!(
            view.len() >= 2 * self.count,
            "view of {} cells cannot hold two halves of {} cells",
            view.len(),
            self.count
        );
        let (a, rest) = view.split_at(self.count);
        let (b, _) = rest.split_at(self.count);
        assert!(!a.overlaps(&b), "halves A and B must not overlap");
        (a, b)
    }
}
