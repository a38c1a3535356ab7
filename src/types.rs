use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Position on a chromosome, in bases.
pub type GenomicPos = u64;

/// Anything that occupies a half-open-like span `[start, end]` on a
/// chromosome. Base trait for all three core subsystems.
pub trait IntervalLike {
    fn start(&self) -> GenomicPos;
    fn end(&self) -> GenomicPos;

    fn width(&self) -> GenomicPos {
        self.end().saturating_sub(self.start())
    }

    fn overlaps(&self, start: GenomicPos, end: GenomicPos) -> bool {
        self.start() < end && start < self.end()
    }
}

/// Canonical feature ordering: ascending by `(start, end)`.
///
/// Every consumer of a sorted feature sequence assumes this ordering and
/// never re-establishes it itself.
pub fn compare_intervals<F: IntervalLike>(a: &F, b: &F) -> Ordering {
    a.start()
        .cmp(&b.start())
        .then_with(|| a.end().cmp(&b.end()))
}

/// A chromosome-worth of parsed data: a name, overall bounds, and a
/// feature sequence sorted by [`compare_intervals`].
pub trait ChromosomeModel {
    type Feature: IntervalLike;

    fn name(&self) -> &str;
    fn start(&self) -> GenomicPos;
    fn end(&self) -> GenomicPos;
    /// Features sorted ascending by `(start, end)`.
    fn features(&self) -> &[Self::Feature];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl From<bool> for Strand {
    fn from(forward: bool) -> Self {
        if forward {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

impl From<Strand> for char {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl Strand {
    /// GFF3 column 7: `+`, `-`, or `.`/`?` for unstranded/unknown.
    pub fn from_gff3(c: char) -> Option<Strand> {
        match c {
            '+' => Some(Strand::Forward),
            '-' => Some(Strand::Reverse),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Span(GenomicPos, GenomicPos);

    impl IntervalLike for Span {
        fn start(&self) -> GenomicPos {
            self.0
        }
        fn end(&self) -> GenomicPos {
            self.1
        }
    }

    #[test]
    fn test_interval_ordering() {
        let mut spans = vec![Span(10, 20), Span(0, 30), Span(0, 10)];
        spans.sort_by(compare_intervals);
        assert_eq!(spans[0].0, 0);
        assert_eq!(spans[0].1, 10);
        assert_eq!(spans[1].1, 30);
        assert_eq!(spans[2].0, 10);
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = Span(0, 10);
        assert!(a.overlaps(5, 15));
        assert!(!a.overlaps(10, 20));
        assert!(!a.overlaps(10, 10));
    }

    #[test]
    fn test_strand_from_gff3() {
        assert_eq!(Strand::from_gff3('+'), Some(Strand::Forward));
        assert_eq!(Strand::from_gff3('-'), Some(Strand::Reverse));
        assert_eq!(Strand::from_gff3('.'), None);
        assert_eq!(Strand::from_gff3('?'), None);
    }
}
