//! Tests that fill A with random values and B with an arithmetic function of A.
//!
//! Verification recovers A from B by inverting the function, so every bit of B takes
//! part in the check.

use super::TestDescriptor;
use crate::context::{TestContext, TestOutcome};
use crate::memory::{Cell, CellView, FaultCollector, FaultObservation};
use crate::util::Rng;

/// An invertible relation between the cells of A and B.
trait Relation {
    /// Draws the operand `q`, once per invocation.
    fn operand(&self, rng: &mut Rng) -> Cell {
        rng.next_cell()
    }

    /// Shapes a random value `r` into a value of A that `forward` can invert.
    fn shape(&self, r: Cell, _q: Cell) -> Cell {
        r
    }

    fn forward(&self, a: Cell, q: Cell) -> Cell;

    fn inverse(&self, b: Cell, q: Cell) -> Cell;
}

fn run_relation(
    relation: impl Relation,
    a: &CellView<'_>,
    b: &CellView<'_>,
    ctx: &mut TestContext,
) -> TestOutcome {
    let q = relation.operand(ctx.rng());
    for i in 0..a.len() {
        let value = relation.shape(ctx.rng().next_cell(), q);
        a.write(i, value);
        b.write(i, relation.forward(value, q));
    }
    ctx.settle(0, &[a, b]);
    let mut collector = FaultCollector::new(0);
    for i in 0..a.len() {
        let expected = a.read(i);
        let observed = relation.inverse(b.read(i), q);
        if expected != observed {
            collector.record(FaultObservation::new(i, b.addr(i), expected, observed));
        }
    }
    collector.finish().into()
}

struct Identity;

impl Relation for Identity {
    fn operand(&self, _rng: &mut Rng) -> Cell {
        0
    }

    fn forward(&self, a: Cell, _q: Cell) -> Cell {
        a
    }

    fn inverse(&self, b: Cell, _q: Cell) -> Cell {
        b
    }
}

struct Xor;

impl Relation for Xor {
    fn forward(&self, a: Cell, q: Cell) -> Cell {
        a ^ q
    }

    fn inverse(&self, b: Cell, q: Cell) -> Cell {
        b ^ q
    }
}

struct Sub;

impl Relation for Sub {
    fn forward(&self, a: Cell, q: Cell) -> Cell {
        a.wrapping_sub(q)
    }

    fn inverse(&self, b: Cell, q: Cell) -> Cell {
        b.wrapping_add(q)
    }
}

struct Mul;

impl Relation for Mul {
    // odd, hence invertible modulo 2^N
    fn operand(&self, rng: &mut Rng) -> Cell {
        rng.next_cell() | 1
    }

    fn forward(&self, a: Cell, q: Cell) -> Cell {
        a.wrapping_mul(q)
    }

    fn inverse(&self, b: Cell, q: Cell) -> Cell {
        b.wrapping_mul(mul_inverse(q))
    }
}

/// Multiplicative inverse of odd `q` modulo 2^N (Newton iteration).
fn mul_inverse(q: Cell) -> Cell {
    debug_assert!(q & 1 == 1);
    // q * q == 1 mod 8; every step doubles the number of correct low bits
    let mut x = q;
    for _ in 0..6 {
        x = x.wrapping_mul((2 as Cell).wrapping_sub(q.wrapping_mul(x)));
    }
    x
}

struct Div;

impl Relation for Div {
    // odd, in 3..=0xFFFD
    fn operand(&self, rng: &mut Rng) -> Cell {
        (rng.next_cell() % 0x7FFE) * 2 + 3
    }

    fn shape(&self, r: Cell, q: Cell) -> Cell {
        (r % (Cell::MAX / q)) * q
    }

    fn forward(&self, a: Cell, q: Cell) -> Cell {
        a / q
    }

    fn inverse(&self, b: Cell, q: Cell) -> Cell {
        b.wrapping_mul(q)
    }
}

struct Or;

impl Relation for Or {
    fn shape(&self, r: Cell, q: Cell) -> Cell {
        r & !q
    }

    fn forward(&self, a: Cell, q: Cell) -> Cell {
        a | q
    }

    fn inverse(&self, b: Cell, q: Cell) -> Cell {
        b ^ q
    }
}

struct And;

impl Relation for And {
    fn shape(&self, r: Cell, q: Cell) -> Cell {
        r | !q
    }

    fn forward(&self, a: Cell, q: Cell) -> Cell {
        a & q
    }

    fn inverse(&self, b: Cell, q: Cell) -> Cell {
        b ^ !q
    }
}

/// The tests of this module, in library order.
pub(crate) const RELATION_TESTS: [TestDescriptor; 7] = [
    TestDescriptor::new("Random Value", 1, random_value),
    TestDescriptor::new("Compare XOR", 1, compare_xor),
    TestDescriptor::new("Compare SUB", 1, compare_sub),
    TestDescriptor::new("Compare MUL", 1, compare_mul),
    TestDescriptor::new("Compare DIV", 1, compare_div),
    TestDescriptor::new("Compare OR", 1, compare_or),
    TestDescriptor::new("Compare AND", 1, compare_and),
];

/// Random Value: A and B receive the same random values.
pub fn random_value(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_relation(Identity, a, b, ctx)
}

/// Compare XOR: `B = A ^ q`.
pub fn compare_xor(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_relation(Xor, a, b, ctx)
}

/// Compare SUB: `B = A - q`, wrapping.
pub fn compare_sub(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_relation(Sub, a, b, ctx)
}

/// Compare MUL: `B = A * q`, wrapping, with odd `q`.
pub fn compare_mul(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_relation(Mul, a, b, ctx)
}

/// Compare DIV: `B = A / q`, with A a multiple of the odd `q`.
pub fn compare_div(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_relation(Div, a, b, ctx)
}

/// Compare OR: `B = A | q`, with the bits of `q` cleared in A.
pub fn compare_or(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_relation(Or, a, b, ctx)
}

/// Compare AND: `B = A & q`, with the bits of `!q` set in A.
pub fn compare_and(a: &CellView<'_>, b: &CellView<'_>, ctx: &mut TestContext) -> TestOutcome {
    run_relation(And, a, b, ctx)
}

#[cfg(test)]
mod tests {
    use super::{Div, Mul, Relation, mul_inverse};
    use crate::util::Rng;

    #[test]
    fn test_mul_inverse() {
        for q in [1usize, 3, 5, 0xFFFF, usize::MAX, 0x1234_5679] {
            assert_eq!(q.wrapping_mul(mul_inverse(q)), 1, "q = {:#x}", q);
        }
        let mut rng = Rng::from_seed(3);
        for _ in 0..100 {
            let q = Mul.operand(&mut rng);
            assert_eq!(q & 1, 1);
            assert_eq!(q.wrapping_mul(mul_inverse(q)), 1);
        }
    }

    #[test]
    fn test_div_operand_range() {
        let mut rng = Rng::from_seed(5);
        for _ in 0..1000 {
            let q = Div.operand(&mut rng);
            assert_eq!(q & 1, 1);
            assert!((3..=0xFFFD).contains(&q));
            let a = Div.shape(rng.next_cell(), q);
            assert_eq!(a % q, 0);
            assert_eq!(Div.inverse(Div.forward(a, q), q), a);
        }
    }
}
