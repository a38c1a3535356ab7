//! Streaming interval aggregation.
//!
//! A single-pass, resumable reducer over a pre-sorted feature sequence.
//! Density and histogram views sample it window by window: a monotonic
//! sequence of [`move_to`](IntervalAggregator::move_to) calls partitions
//! the domain, each feature counted once against every window it overlaps,
//! in amortized O(n) total regardless of how many resolution refinements
//! the renderer drives.

use crate::types::{ChromosomeModel, GenomicPos, IntervalLike};

/// Customization points of an aggregation: the neutral accumulator, the
/// per-feature fold, and the window finalizer.
///
/// `window` is the `[pos, end)` interval the current
/// [`move_to`](IntervalAggregator::move_to) covers; width-weighted
/// summarizers clip features against it.
pub trait Summarizer<F: IntervalLike> {
    type Value;

    fn initial(&self) -> Self::Value;
    fn add(&self, acc: &mut Self::Value, feature: &F, window: (GenomicPos, GenomicPos));
    fn finish(&self, acc: Self::Value, _window: (GenomicPos, GenomicPos)) -> Self::Value {
        acc
    }
}

/// Counts features overlapping the window.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountSummarizer;

impl<F: IntervalLike> Summarizer<F> for CountSummarizer {
    type Value = usize;

    fn initial(&self) -> usize {
        0
    }

    fn add(&self, acc: &mut usize, _feature: &F, _window: (GenomicPos, GenomicPos)) {
        *acc += 1;
    }
}

/// Resumable cursor over a sorted feature sequence.
///
/// Two positions make up the state: the current boundary `pos`, and an
/// index such that every feature fully left of `pos` has been consumed.
/// A feature spanning the boundary stays active, so the next window
/// resumes mid-feature instead of re-adding it from scratch.
#[derive(Debug)]
pub struct IntervalAggregator<'a, F: IntervalLike, S: Summarizer<F>> {
    summarizer: S,
    features: &'a [F],
    domain_start: GenomicPos,
    domain_end: GenomicPos,
    idx: usize,
    pos: GenomicPos,
}

impl<'a, F: IntervalLike, S: Summarizer<F>> IntervalAggregator<'a, F, S> {
    /// Bind a sorted feature sequence spanning `[start, end]`.
    ///
    /// The sequence must be sorted ascending by `(start, end)`; aggregation
    /// over an unsorted sequence is undefined.
    pub fn new(summarizer: S, features: &'a [F], start: GenomicPos, end: GenomicPos) -> Self {
        Self {
            summarizer,
            features,
            domain_start: start,
            domain_end: end,
            idx: 0,
            pos: start,
        }
    }

    /// Bind a chromosome model's feature sequence.
    pub fn for_chromosome<C>(summarizer: S, chromosome: &'a C) -> Self
    where
        C: ChromosomeModel<Feature = F>,
    {
        Self::new(
            summarizer,
            chromosome.features(),
            chromosome.start(),
            chromosome.end(),
        )
    }

    /// Rewind to the domain start.
    pub fn reset(&mut self) {
        self.idx = 0;
        self.pos = self.domain_start;
    }

    /// Current boundary position.
    pub fn pos(&self) -> GenomicPos {
        self.pos
    }

    /// Relocate the cursor for a non-sequential seek, e.g. a backward
    /// scroll. Bisect-left on feature starts.
    pub fn set_pos(&mut self, pos: GenomicPos) {
        self.pos = pos;
        self.idx = self.features.partition_point(|f| f.start() < pos);
    }

    /// Aggregate the increment `[pos, end)` and move the boundary to `end`.
    pub fn move_to(&mut self, end: GenomicPos) -> S::Value {
        let window = (self.pos, end);
        let mut acc = self.summarizer.initial();
        let mut i = self.idx;
        while i < self.features.len() && self.features[i].start() < end {
            self.summarizer.add(&mut acc, &self.features[i], window);
            if self.features[i].end() > end {
                // spans the boundary; stays active for the next window
                break;
            }
            i += 1;
        }
        self.idx = i;
        self.pos = end;
        self.summarizer.finish(acc, window)
    }

    /// Next coordinate at which the aggregate is guaranteed to change:
    /// the start of the next un-begun feature, the end of the active one,
    /// or the start of the one after it when there is no gap.
    pub fn next_break(&self) -> GenomicPos {
        if self.idx >= self.features.len() {
            return self.domain_end;
        }
        let f = &self.features[self.idx];
        if self.pos <= f.start() {
            f.start()
        } else if self.pos < f.end() || self.idx + 1 >= self.features.len() {
            f.end()
        } else {
            self.features[self.idx + 1].start()
        }
    }
}
