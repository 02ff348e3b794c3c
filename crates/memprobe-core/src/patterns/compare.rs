use crate::memory::{CellView, FaultCollector, FaultObservation, FaultReport};

/// Compares `a` and `b` cell by cell.
///
/// Mismatches are reported with the value of A as expected and the value of B as
/// observed, at the address of the B cell.
pub(crate) fn compare_views(a: &CellView<'_>, b: &CellView<'_>, pass: usize) -> Option<FaultReport> {
    let mut collector = FaultCollector::new(pass);
    for i in 0..a.len() {
        let expected = a.read(i);
        let observed = b.read(i);
        if expected != observed {
            collector.record(FaultObservation::new(i, b.addr(i), expected, observed));
        }
    }
    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::compare_views;
    use crate::memory::CellView;

    #[test]
    fn test_compare_equal() {
        let mut a = vec![1usize, 2, 3];
        let mut b = a.clone();
        assert!(compare_views(&CellView::new(&mut a), &CellView::new(&mut b), 0).is_none());
    }

    #[test]
    fn test_compare_mismatch() {
        let mut a = vec![1usize, 2, 3, 4];
        let mut b = vec![1usize, 2, 7, 4];
        let b = CellView::new(&mut b);
        let report = compare_views(&CellView::new(&mut a), &b, 4).expect("mismatch");
        assert_eq!(report.pass, 4);
        assert_eq!(report.total, 1);
        assert_eq!(report.faults[0].index, 2);
        assert_eq!(report.faults[0].expected, 3);
        assert_eq!(report.faults[0].observed, 7);
        assert_eq!(report.faults[0].addr, b.addr(2) as usize);
    }
}
