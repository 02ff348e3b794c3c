use log::error;
use serde::Serialize;

use super::Cell;
use crate::util::{CELL_BITS, MAX_REPORTED_FAULTS, WORD_SIZE};

/// A mismatch observed by a fault-detection test.
///
/// `expected` is the value the cell should hold and `observed` the value that was
/// read back (or recovered by inverting the test's operator).
#[derive(Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub struct FaultObservation {
    /// Cell index within the tested view
    pub index: usize,
    /// Virtual address of the faulty cell
    pub addr: usize,
    /// The value that should have been read
    pub expected: Cell,
    /// The value that was actually read
    pub observed: Cell,
}

/// Direction of bit flip transitions.
///
/// Indicates whether bits flipped from 0→1, 1→0, or multiple directions.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub enum FlipDirection {
    /// Bit flipped from 0 to 1
    ZeroToOne,
    /// Bit flipped from 1 to 0
    OneToZero,
    /// Multiple bits flipped in (potentially) different directions
    Multiple(Vec<FlipDirection>),
    /// No bit flip occurred
    None,
}

impl core::fmt::Debug for FaultObservation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FaultObservation")
            .field("index", &self.index)
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("expected", &format_args!("{:#x}", self.expected))
            .field("observed", &format_args!("{:#x}", self.observed))
            .finish()
    }
}

impl core::fmt::Display for FaultObservation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let width = WORD_SIZE * 2;
        write!(
            f,
            "0x{:0width$x} != 0x{:0width$x} at cell {} (address 0x{:x})",
            self.expected,
            self.observed,
            self.index,
            self.addr,
            width = width
        )
    }
}

impl FaultObservation {
    /// Constructor for FaultObservation
    pub fn new(index: usize, addr: *const Cell, expected: Cell, observed: Cell) -> Self {
        FaultObservation {
            index,
            addr: addr as usize,
            expected,
            observed,
        }
    }

    /// Bitmask of the bits that differ (1 = bit flipped)
    pub fn bitmask(&self) -> Cell {
        self.expected ^ self.observed
    }

    /// Calculate the FlipDirection (1->0 or 0->1 or Multiple) observed in this fault
    pub fn flip_direction(&self) -> FlipDirection {
        let bitmask = self.bitmask();
        match bitmask.count_ones() {
            0 => FlipDirection::None,
            1 => match bitmask & self.expected {
                0 => FlipDirection::ZeroToOne,
                _ => FlipDirection::OneToZero,
            },
            2.. => FlipDirection::Multiple(
                (0..CELL_BITS)
                    .filter(|i| bitmask & (1 << i) != 0)
                    .map(|i| {
                        if self.expected & (1 << i) != 0 {
                            FlipDirection::OneToZero
                        } else {
                            FlipDirection::ZeroToOne
                        }
                    })
                    .collect(),
            ),
        }
    }
}

/// The faults found in one failing test pass.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct FaultReport {
    /// Zero-based pass in which the mismatches were found
    pub pass: usize,
    /// The first [`MAX_REPORTED_FAULTS`] observations
    pub faults: Vec<FaultObservation>,
    /// Total number of mismatching cells in the pass
    pub total: usize,
}

/// Accumulates fault observations of one verification sweep.
///
/// Keeps the first [`MAX_REPORTED_FAULTS`] observations and logs them, counting the rest.
pub(crate) struct FaultCollector {
    pass: usize,
    faults: Vec<FaultObservation>,
    total: usize,
}

impl FaultCollector {
    pub(crate) fn new(pass: usize) -> Self {
        FaultCollector {
            pass,
            faults: vec![],
            total: 0,
        }
    }

    pub(crate) fn record(&mut self, fault: FaultObservation) {
        self.total += 1;
        if self.faults.len() < MAX_REPORTED_FAULTS {
            error!("FAILURE: {}", fault);
            self.faults.push(fault);
        }
    }

    /// Returns the report if any fault was recorded.
    pub(crate) fn finish(self) -> Option<FaultReport> {
        if self.total == 0 {
            return None;
        }
        if self.total > self.faults.len() {
            error!(
                "... and {} more faults (total: {})",
                self.total - self.faults.len(),
                self.total
            );
        }
        Some(FaultReport {
            pass: self.pass,
            faults: self.faults,
            total: self.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FaultCollector, FaultObservation, FlipDirection};
    use crate::util::MAX_REPORTED_FAULTS;

    fn fault(expected: usize, observed: usize) -> FaultObservation {
        FaultObservation::new(0, std::ptr::null(), expected, observed)
    }

    #[test]
    fn test_flip_direction() {
        assert_eq!(fault(0xFF, 0xFF).flip_direction(), FlipDirection::None);
        assert_eq!(fault(0b01, 0b00).flip_direction(), FlipDirection::OneToZero);
        assert_eq!(
            fault(0b1111_1110, 0b1111_1111).flip_direction(),
            FlipDirection::ZeroToOne
        );
        assert_eq!(
            fault(0b10, 0b01).flip_direction(),
            FlipDirection::Multiple(vec![FlipDirection::ZeroToOne, FlipDirection::OneToZero])
        );
        assert_eq!(
            fault(usize::MAX, usize::MAX >> 1).flip_direction(),
            FlipDirection::OneToZero
        );
    }

    #[test]
    fn test_collector_caps_reported_faults() {
        let mut collector = FaultCollector::new(3);
        for i in 0..MAX_REPORTED_FAULTS + 5 {
            collector.record(FaultObservation::new(i, std::ptr::null(), 0, 1));
        }
        let report = collector.finish().expect("faults were recorded");
        assert_eq!(report.pass, 3);
        assert_eq!(report.total, MAX_REPORTED_FAULTS + 5);
        assert_eq!(report.faults.len(), MAX_REPORTED_FAULTS);
        assert_eq!(report.faults[0].index, 0);
    }

    #[test]
    fn test_collector_empty() {
        assert!(FaultCollector::new(0).finish().is_none());
    }

    #[test]
    fn test_display() {
        let f = FaultObservation::new(2, 0x1000 as *const usize, 0xF0, 0xF1);
        let s = f.to_string();
        assert!(s.contains("at cell 2"));
        assert!(s.contains("0x1000"));
        assert_eq!(f.bitmask(), 1);
    }
}
