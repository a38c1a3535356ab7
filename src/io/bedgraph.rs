//! bedGraph signal reader and its aggregation summarizers.
//!
//! Four space- or tab-separated columns: chromosome, start, end, value.
//! Values aggregate into density and histogram windows through
//! [`IntervalAggregator`](crate::aggregate::IntervalAggregator).

use crate::aggregate::Summarizer;
use crate::types::{compare_intervals, ChromosomeModel, GenomicPos, IntervalLike};
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::time::Instant;

/// One scored span of the signal track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BedGraphFeature {
    pub start: GenomicPos,
    pub end: GenomicPos,
    pub value: f64,
}

impl IntervalLike for BedGraphFeature {
    fn start(&self) -> GenomicPos {
        self.start
    }

    fn end(&self) -> GenomicPos {
        self.end
    }
}

/// One chromosome's signal, sorted by position after `optimize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BedGraphChromosome {
    name: String,
    values: Vec<BedGraphFeature>,
    start: GenomicPos,
    end: GenomicPos,
}

impl BedGraphChromosome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            start: 0,
            end: 1,
        }
    }

    pub fn add_value(&mut self, value: BedGraphFeature) {
        self.values.push(value);
    }

    /// Sort the values and derive the chromosome bounds from them.
    pub fn optimize(&mut self) {
        self.values.sort_by(compare_intervals);
        if let (Some(first), Some(last)) = (self.values.first(), self.values.last()) {
            self.start = first.start;
            self.end = last.end;
        }
    }
}

impl ChromosomeModel for BedGraphChromosome {
    type Feature = BedGraphFeature;

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> GenomicPos {
        self.start
    }

    fn end(&self) -> GenomicPos {
        self.end
    }

    fn features(&self) -> &[BedGraphFeature] {
        &self.values
    }
}

/// The parsed chromosomes of one bedGraph input.
#[derive(Debug, Default)]
pub struct BedGraphSet {
    chromosomes: HashMap<String, BedGraphChromosome>,
    names: Vec<String>,
}

impl BedGraphSet {
    pub fn chromosome(&self, name: &str) -> Option<&BedGraphChromosome> {
        self.chromosomes.get(name)
    }

    pub fn chromosome_names(&self) -> &[String] {
        &self.names
    }
}

/// Read a whole bedGraph stream, one sorted chromosome per seen name.
pub fn read(input: impl BufRead) -> Result<BedGraphSet> {
    let started = Instant::now();
    let mut set = BedGraphSet::default();
    for (lineno, line) in input.lines().enumerate() {
        let line = line.context("failed to read bedGraph line")?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = if line.contains('\t') {
            line.split('\t').collect()
        } else {
            line.split(' ').collect()
        };
        match fields[0] {
            "browser" => continue,
            "track" => {
                if !fields.iter().any(|f| *f == "type=bedGraph") {
                    bail!("track line {} is not type=bedGraph", lineno + 1);
                }
                continue;
            }
            _ => {}
        }
        if fields.len() != 4 {
            bail!(
                "bedGraph line {}: expected 4 fields, got {}",
                lineno + 1,
                fields.len()
            );
        }
        let start: GenomicPos = fields[1]
            .parse()
            .with_context(|| format!("bedGraph line {}: start", lineno + 1))?;
        let end: GenomicPos = fields[2]
            .parse()
            .with_context(|| format!("bedGraph line {}: end", lineno + 1))?;
        let value: f64 = fields[3]
            .parse()
            .with_context(|| format!("bedGraph line {}: value", lineno + 1))?;
        let name = fields[0];
        if !set.chromosomes.contains_key(name) {
            set.chromosomes
                .insert(name.to_string(), BedGraphChromosome::new(name));
            set.names.push(name.to_string());
        }
        set.chromosomes
            .get_mut(name)
            .unwrap()
            .add_value(BedGraphFeature { start, end, value });
    }
    for chromosome in set.chromosomes.values_mut() {
        chromosome.optimize();
    }
    debug!("bedGraph parse: {:?}", started.elapsed());
    Ok(set)
}

/// Largest magnitude in the window, for density shading.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxAbsSummarizer;

impl Summarizer<BedGraphFeature> for MaxAbsSummarizer {
    type Value = f64;

    fn initial(&self) -> f64 {
        0.0
    }

    fn add(&self, acc: &mut f64, feature: &BedGraphFeature, _window: (GenomicPos, GenomicPos)) {
        *acc = acc.max(feature.value.abs());
    }
}

/// Signal extent in the window, zero-anchored.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMaxSummarizer;

impl Summarizer<BedGraphFeature> for MinMaxSummarizer {
    type Value = (f64, f64);

    fn initial(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn add(
        &self,
        acc: &mut (f64, f64),
        feature: &BedGraphFeature,
        _window: (GenomicPos, GenomicPos),
    ) {
        acc.0 = acc.0.min(feature.value);
        acc.1 = acc.1.max(feature.value);
    }
}

/// Window mean of the signal, each value weighted by the width of its
/// overlap with the window.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegralSummarizer;

impl Summarizer<BedGraphFeature> for IntegralSummarizer {
    type Value = f64;

    fn initial(&self) -> f64 {
        0.0
    }

    fn add(&self, acc: &mut f64, feature: &BedGraphFeature, window: (GenomicPos, GenomicPos)) {
        let overlap = feature.end.min(window.1) - feature.start.max(window.0);
        *acc += overlap as f64 * feature.value;
    }

    fn finish(&self, acc: f64, window: (GenomicPos, GenomicPos)) -> f64 {
        acc / (window.1 - window.0) as f64
    }
}

/// Like [`IntegralSummarizer`], over absolute values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagIntegralSummarizer;

impl Summarizer<BedGraphFeature> for MagIntegralSummarizer {
    type Value = f64;

    fn initial(&self) -> f64 {
        0.0
    }

    fn add(&self, acc: &mut f64, feature: &BedGraphFeature, window: (GenomicPos, GenomicPos)) {
        let overlap = feature.end.min(window.1) - feature.start.max(window.0);
        *acc += overlap as f64 * feature.value.abs();
    }

    fn finish(&self, acc: f64, window: (GenomicPos, GenomicPos)) -> f64 {
        acc / (window.1 - window.0) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::IntervalAggregator;

    const SAMPLE: &str = "\
track type=bedGraph name=sample
chr1 0 100 1.0
chr1 100 200 -3.0
chr1 200 300 2.0
chr2 0 50 0.5
";

    #[test]
    fn test_parse_sample() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        assert_eq!(set.chromosome_names(), ["chr1", "chr2"]);
        let chr1 = set.chromosome("chr1").unwrap();
        assert_eq!(chr1.features().len(), 3);
        assert_eq!(chr1.start(), 0);
        assert_eq!(chr1.end(), 300);
    }

    #[test]
    fn test_tab_separated_and_comments() {
        let text = "# a comment\nchr1\t0\t10\t1.5\nchr1\t10\t20\t2.5\n";
        let set = read(text.as_bytes()).unwrap();
        assert_eq!(set.chromosome("chr1").unwrap().features().len(), 2);
    }

    #[test]
    fn test_unsorted_input_gets_sorted() {
        let text = "chr1 50 60 1.0\nchr1 0 10 2.0\n";
        let set = read(text.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        assert_eq!(chr1.features()[0].start, 0);
        assert_eq!(chr1.start(), 0);
        assert_eq!(chr1.end(), 60);
    }

    #[test]
    fn test_wrong_track_type_is_an_error() {
        assert!(read("track type=wiggle_0\n".as_bytes()).is_err());
    }

    #[test]
    fn test_max_abs_over_windows() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        let mut agg = IntervalAggregator::for_chromosome(MaxAbsSummarizer, chr1);
        assert_eq!(agg.move_to(150), 3.0);
        assert_eq!(agg.move_to(300), 3.0);
    }

    #[test]
    fn test_min_max_over_window() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        let mut agg = IntervalAggregator::for_chromosome(MinMaxSummarizer, chr1);
        assert_eq!(agg.move_to(300), (-3.0, 2.0));
    }

    #[test]
    fn test_integral_is_width_weighted_mean() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        let mut agg = IntervalAggregator::for_chromosome(IntegralSummarizer, chr1);
        // [0,150): 100*1.0 + 50*-3.0 over 150 bases
        let v = agg.move_to(150);
        assert!((v - (-50.0 / 150.0)).abs() < 1e-12);
        // [150,300): 50*-3.0 + 100*2.0 over 150 bases
        let v = agg.move_to(300);
        assert!((v - (50.0 / 150.0)).abs() < 1e-12);
    }

    #[test]
    fn test_mag_integral() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        let mut agg = IntervalAggregator::for_chromosome(MagIntegralSummarizer, chr1);
        let v = agg.move_to(300);
        // 100*1 + 100*3 + 100*2 over 300 bases
        assert!((v - 2.0).abs() < 1e-12);
    }
}
