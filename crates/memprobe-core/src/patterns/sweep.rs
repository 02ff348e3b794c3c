//! Tests that write the same closed-form pattern into A and B and compare the halves.

use super::TestDescriptor;
use super::compare::compare_views;
use crate::context::{TestContext, TestOutcome};
use crate::memory::{Cell, CellView};
use crate::util::CELL_BITS;

/// 0x0101...01
const ONES_PER_BYTE: Cell = Cell::MAX / 0xFF;
/// 0x5555...55
const CHECKER: Cell = Cell::MAX / 3;

/// A deterministic fill pattern.
trait Sweep {
    const PASSES: usize;

    /// Value of cell `index` in `pass`.
    fn value(&self, pass: usize, index: usize) -> Cell;
}

fn run_sweep<S: Sweep>(
    sweep: S,
    a: &CellView<'_>,
    b: &CellView<'_>,
    ctx: &mut TestContext,
) -> TestOutcome {
    for pass in 0..S::PASSES {
        for i in 0..a.len() {
            let value = sweep.value(pass, i);
            a.write(i, value);
            b.write(i, value);
        }
        ctx.settle(pass, &[a, b]);
        if let Some(report) = compare_views(a, b, pass) {
            return TestOutcome::Fail(report);
        }
    }
    TestOutcome::Pass
}

/// `value` on even cells, its complement on odd cells.
fn alternate(index: usize, value: Cell) -> Cell {
    if index % 2 == 0 { value } else { !value }
}

/// Bit position walking up over the first `CELL_BITS` passes and back down after.
fn bounce(pass: usize) -> u32 {
    let k = if pass < CELL_BITS {
        pass
    } else {
        2 * CELL_BITS - 1 - pass
    };
    k as u32
}

struct SeqInc {
    base: Cell,
}

impl Sweep for SeqInc {
    const PASSES: usize = 1;

    fn value(&self, _pass: usize, index: usize) -> Cell {
        self.base.wrapping_add(index)
    }
}

struct SolidBits;

impl Sweep for SolidBits {
    const PASSES: usize = 64;

    fn value(&self, pass: usize, index: usize) -> Cell {
        let solid = if pass % 2 == 0 { !0 } else { 0 };
        alternate(index, solid)
    }
}

struct BlockSeq;

impl Sweep for BlockSeq {
    const PASSES: usize = 256;

    fn value(&self, pass: usize, index: usize) -> Cell {
        ((pass + index / 8) % 256) * ONES_PER_BYTE
    }
}

struct Checkerboard;

impl Sweep for Checkerboard {
    const PASSES: usize = 64;

    fn value(&self, pass: usize, index: usize) -> Cell {
        let checker = if pass % 2 == 0 { CHECKER } else { !CHECKER };
        alternate(index, checker)
    }
}

struct BitSpread;

impl Sweep for BitSpread {
    const PASSES: usize = 2 * CELL_BITS;

    fn value(&self, pass: usize, index: usize) -> Cell {
        let k = bounce(pass);
        let spread = (1 as Cell).rotate_left(k) | (1 as Cell).rotate_left(k + 2);
        alternate(index, spread)
    }
}

struct BitFlip;

impl Sweep for BitFlip {
    const PASSES: usize = 8 * CELL_BITS;

    fn value(&self, pass: usize, index: usize) -> Cell {
        let bit = (1 as Cell) << (pass / 8);
        let flip = if (pass % 8) % 2 == 0 { !bit } else { bit };
        alternate(index, flip)
    }
}

struct WalkingOnes;

impl Sweep for WalkingOnes {
    const PASSES: usize = 2 * CELL_BITS;

    fn value(&self, pass: usize, index: usize) -> Cell {
        let k = bounce(pass) as usize;
        (1 as Cell) << ((k + index) % CELL_BITS)
    }
}

struct WalkingZeroes;

impl Sweep for WalkingZeroes {
    const PASSES: usize = 2 * CELL_BITS;

    fn value(&self, pass: usize, index: usize) -> Cell {
        !WalkingOnes.value(pass, index)
    }
}

/// The tests of this module, in library order.
pub(crate) const SWEEP_TESTS: [TestDescriptor; 8] = [
    TestDescriptor::new("Sequential Increment", SeqInc::PASSES, seq_inc),
    TestDescriptor::new("Solid Bits", SolidBits::PASSES, solid_bits),
    TestDescriptor::new("Block Sequential", BlockSeq::PASSES, block_seq),
    TestDescriptor::new("Checkerboard", Checkerboard::PASSES, checkerboard),
    TestDescriptor::new("Bit Spread", BitSpread::PASSES, bit_spread),
    TestDescriptor::new("Bit Flip", BitFlip::PASSES, bit_flip),
    TestDescriptor::new("Walking Ones", WalkingOnes::PASSES, walking_ones),
    TestDescriptor::new("Walking Zeroes", WalkingZeroes::PASSES, walking_zeroes),
];

/// Sequential Increment: `base + i`, with a random `base`.
pub fn seq_inc(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    let base = ctx.rng().next_cell();
    run_sweep(SeqInc { base }, a, b, ctx)
}

/// Solid Bits: all ones and all zeroes, alternating per cell and per pass.
pub fn solid_bits(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_sweep(SolidBits, a, b, ctx)
}

/// Block Sequential: runs of eight cells holding the same byte replicated across the
/// word, the byte increasing with the run and the pass.
pub fn block_seq(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_sweep(BlockSeq, a, b, ctx)
}

/// Checkerboard: `0x55...` and `0xAA...`, alternating per cell and per pass.
pub fn checkerboard(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_sweep(Checkerboard, a, b, ctx)
}

/// Bit Spread: two set bits two positions apart, walking up and down.
pub fn bit_spread(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_sweep(BitSpread, a, b, ctx)
}

/// Bit Flip: a single bit and its complement, eight passes per bit position.
pub fn bit_flip(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_sweep(BitFlip, a, b, ctx)
}

/// Walking Ones: a single set bit, shifted by the cell index, walking up and down.
pub fn walking_ones(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_sweep(WalkingOnes, a, b, ctx)
}

/// Walking Zeroes: the complement of Walking Ones.
pub fn walking_zeroes(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_sweep(WalkingZeroes, a, b, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_counts() {
        let passes: Vec<usize> = SWEEP_TESTS.iter().map(|t| t.passes()).collect();
        assert_eq!(
            passes,
            vec![
                1,
                64,
                256,
                64,
                2 * CELL_BITS,
                8 * CELL_BITS,
                2 * CELL_BITS,
                2 * CELL_BITS
            ]
        );
    }

    #[test]
    fn test_bounce() {
        assert_eq!(bounce(0), 0);
        assert_eq!(bounce(CELL_BITS - 1), CELL_BITS as u32 - 1);
        assert_eq!(bounce(CELL_BITS), CELL_BITS as u32 - 1);
        assert_eq!(bounce(2 * CELL_BITS - 1), 0);
    }

    #[test]
    fn test_block_seq_values() {
        assert_eq!(BlockSeq.value(0, 0), 0);
        assert_eq!(BlockSeq.value(0, 8), ONES_PER_BYTE);
        assert_eq!(BlockSeq.value(1, 7) & 0xFF, 0x01);
        assert_eq!(BlockSeq.value(255, 8), 0);
        assert_eq!(BlockSeq.value(0xAB, 0), 0xAB * ONES_PER_BYTE);
    }

    #[test]
    fn test_checkerboard_values() {
        assert_eq!(Checkerboard.value(0, 0) & 0xFF, 0x55);
        assert_eq!(Checkerboard.value(0, 1) & 0xFF, 0xAA);
        assert_eq!(Checkerboard.value(1, 0) & 0xFF, 0xAA);
    }

    #[test]
    fn test_bit_spread_rotates() {
        assert_eq!(BitSpread.value(0, 0), 0b101);
        assert_eq!(BitSpread.value(0, 1), !0b101);
        let top = BitSpread.value(CELL_BITS - 1, 0);
        assert_eq!(top.count_ones(), 2);
        assert_eq!(top, (1 << (CELL_BITS - 1)) | 0b10);
    }

    #[test]
    fn test_bit_flip_values() {
        assert_eq!(BitFlip.value(0, 0), !1);
        assert_eq!(BitFlip.value(1, 0), 1);
        assert_eq!(BitFlip.value(8, 0), !2);
        assert_eq!(BitFlip.value(9, 1), !2);
        assert_eq!(BitFlip.value(8 * CELL_BITS - 1, 0), 1 << (CELL_BITS - 1));
    }

    #[test]
    fn test_walking_values() {
        for pass in 0..WalkingOnes::PASSES {
            for index in 0..3 * CELL_BITS {
                let one = WalkingOnes.value(pass, index);
                assert_eq!(one.count_ones(), 1);
                assert_eq!(WalkingZeroes.value(pass, index), !one);
            }
        }
        assert_eq!(WalkingOnes.value(0, 3), 0b1000);
        assert_eq!(WalkingOnes.value(CELL_BITS + 1, 0), 1 << (CELL_BITS - 2));
    }
}
