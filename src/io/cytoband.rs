//! Cytogenetic band (ideogram) reader.
//!
//! Five tab-separated columns: chromosome, start, end, band name and
//! Giemsa stain. Stains map to a gray intensity; `acen` rows alternate
//! between the two centromere halves; `stalk` marks ribosomal stalks.

use crate::aggregate::Summarizer;
use crate::types::{compare_intervals, ChromosomeModel, GenomicPos, IntervalLike};
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::ops::{BitOr, BitOrAssign};
use std::time::Instant;

/// What kinds of bands a drawing window contains, as a bitset so
/// windows covering several bands keep every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BandFlags(pub u8);

impl BandFlags {
    pub const NONE: BandFlags = BandFlags(0);
    pub const BAND: BandFlags = BandFlags(1);
    pub const CENTROMERE_START: BandFlags = BandFlags(2);
    pub const CENTROMERE_END: BandFlags = BandFlags(4);
    pub const STALK: BandFlags = BandFlags(8);

    pub fn contains(self, other: BandFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for BandFlags {
    type Output = BandFlags;

    fn bitor(self, rhs: BandFlags) -> BandFlags {
        BandFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for BandFlags {
    fn bitor_assign(&mut self, rhs: BandFlags) {
        self.0 |= rhs.0;
    }
}

/// One cytogenetic band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CytobandFeature {
    pub start: GenomicPos,
    pub end: GenomicPos,
    pub name: String,
    /// Giemsa stain darkness, 0 to 100.
    pub intensity: u8,
    pub flags: BandFlags,
}

impl IntervalLike for CytobandFeature {
    fn start(&self) -> GenomicPos {
        self.start
    }

    fn end(&self) -> GenomicPos {
        self.end
    }
}

/// One chromosome's bands, sorted and name-indexed after `optimize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CytobandChromosome {
    name: String,
    bands: Vec<CytobandFeature>,
    by_name: HashMap<String, usize>,
    start: GenomicPos,
    end: GenomicPos,
}

impl CytobandChromosome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            end: 1,
            ..Default::default()
        }
    }

    pub fn add_band(&mut self, band: CytobandFeature) {
        self.bands.push(band);
    }

    pub fn band(&self, name: &str) -> Option<&CytobandFeature> {
        self.by_name.get(name).map(|&i| &self.bands[i])
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn optimize(&mut self) {
        self.bands.sort_by(compare_intervals);
        if let (Some(first), Some(last)) = (self.bands.first(), self.bands.last()) {
            self.start = first.start;
            self.end = last.end;
        }
        self.by_name = self
            .bands
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
    }
}

impl ChromosomeModel for CytobandChromosome {
    type Feature = CytobandFeature;

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> GenomicPos {
        self.start
    }

    fn end(&self) -> GenomicPos {
        self.end
    }

    fn features(&self) -> &[CytobandFeature] {
        &self.bands
    }
}

/// The parsed chromosomes of one cytoband input.
#[derive(Debug, Default)]
pub struct CytobandSet {
    chromosomes: HashMap<String, CytobandChromosome>,
    names: Vec<String>,
}

impl CytobandSet {
    pub fn chromosome(&self, name: &str) -> Option<&CytobandChromosome> {
        self.chromosomes.get(name)
    }

    pub fn chromosome_names(&self) -> &[String] {
        &self.names
    }
}

fn stain_intensity(stain: &str) -> u8 {
    match stain {
        "gpos25" => 25,
        "gpos33" => 33,
        "gpos50" => 50,
        "gpos66" => 66,
        "gpos75" => 75,
        "gpos100" => 100,
        // gneg, gvar and anything unrecognized draw unstained
        _ => 0,
    }
}

/// Read a whole cytoband stream.
pub fn read(input: impl BufRead) -> Result<CytobandSet> {
    let started = Instant::now();
    let mut set = CytobandSet::default();
    // acen rows come in pairs; the first is the p-side half. The toggle
    // is stream-wide, not per chromosome: it stays correct because every
    // chromosome contributes exactly two consecutive acen rows.
    let mut centromere_seen = false;
    for (lineno, line) in input.lines().enumerate() {
        let line = line.context("failed to read cytoband line")?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 5 {
            bail!(
                "cytoband line {}: expected 5 fields, got {}",
                lineno + 1,
                fields.len()
            );
        }
        let start: GenomicPos = fields[1]
            .parse()
            .with_context(|| format!("cytoband line {}: start", lineno + 1))?;
        let end: GenomicPos = fields[2]
            .parse()
            .with_context(|| format!("cytoband line {}: end", lineno + 1))?;
        let name = fields[3].to_string();
        let stain = fields[4];

        let (flags, intensity) = match stain {
            "acen" => {
                let flags = if centromere_seen {
                    BandFlags::CENTROMERE_END
                } else {
                    BandFlags::CENTROMERE_START
                };
                centromere_seen = !centromere_seen;
                (flags, 0)
            }
            "stalk" => (BandFlags::STALK, 0),
            _ => (BandFlags::BAND, stain_intensity(stain)),
        };

        let chroname = fields[0];
        if !set.chromosomes.contains_key(chroname) {
            set.chromosomes
                .insert(chroname.to_string(), CytobandChromosome::new(chroname));
            set.names.push(chroname.to_string());
        }
        set.chromosomes
            .get_mut(chroname)
            .unwrap()
            .add_band(CytobandFeature {
                start,
                end,
                name,
                intensity,
                flags,
            });
    }
    for chromosome in set.chromosomes.values_mut() {
        chromosome.optimize();
    }
    debug!("cytoband parse: {:?}", started.elapsed());
    Ok(set)
}

/// Summary of the bands under one drawing window: the darkest stain,
/// the union of band kinds and the last band's name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BandSummary {
    pub intensity: u8,
    pub flags: BandFlags,
    pub name: String,
}

/// Folds bands into a [`BandSummary`] per window.
#[derive(Debug, Clone, Copy, Default)]
pub struct BandSummarizer;

impl Summarizer<CytobandFeature> for BandSummarizer {
    type Value = BandSummary;

    fn initial(&self) -> BandSummary {
        BandSummary::default()
    }

    fn add(
        &self,
        acc: &mut BandSummary,
        band: &CytobandFeature,
        _window: (GenomicPos, GenomicPos),
    ) {
        acc.intensity = acc.intensity.max(band.intensity);
        acc.flags |= band.flags;
        acc.name = band.name.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::IntervalAggregator;

    const SAMPLE: &str = "\
chr1\t0\t2300000\tp36.33\tgneg
chr1\t2300000\t5400000\tp36.32\tgpos25
chr1\t5400000\t7200000\tp36.31\tgpos100
chr1\t7200000\t9200000\tp13\tstalk
chr1\t9200000\t12000000\tp11\tacen
chr1\t12000000\t15000000\tq11\tacen
chr1\t15000000\t20000000\tq12\tgpos50
";

    #[test]
    fn test_parse_sample() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        assert_eq!(set.chromosome_names(), ["chr1"]);
        let chr1 = set.chromosome("chr1").unwrap();
        assert_eq!(chr1.features().len(), 7);
        assert_eq!(chr1.start(), 0);
        assert_eq!(chr1.end(), 20000000);
    }

    #[test]
    fn test_stain_mapping() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        assert_eq!(chr1.band("p36.33").unwrap().intensity, 0);
        assert_eq!(chr1.band("p36.32").unwrap().intensity, 25);
        assert_eq!(chr1.band("p36.31").unwrap().intensity, 100);
        assert_eq!(chr1.band("p13").unwrap().flags, BandFlags::STALK);
    }

    #[test]
    fn test_centromere_halves_alternate() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        assert_eq!(chr1.band("p11").unwrap().flags, BandFlags::CENTROMERE_START);
        assert_eq!(chr1.band("q11").unwrap().flags, BandFlags::CENTROMERE_END);
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        assert!(read("chr1\t0\t100\tp1\n".as_bytes()).is_err());
    }

    #[test]
    fn test_band_summarizer_unions_flags() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        let mut agg = IntervalAggregator::for_chromosome(BandSummarizer, chr1);
        let summary = agg.move_to(13000000);
        assert_eq!(summary.intensity, 100);
        assert!(summary.flags.contains(BandFlags::BAND));
        assert!(summary.flags.contains(BandFlags::STALK));
        assert!(summary.flags.contains(BandFlags::CENTROMERE_START));
        assert!(summary.flags.contains(BandFlags::CENTROMERE_END));
        assert_eq!(summary.name, "q11");
    }

    #[test]
    fn test_band_names_in_position_order() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        assert_eq!(chr1.band_names()[0], "p36.33");
        assert_eq!(*chr1.band_names().last().unwrap(), "q12");
    }
}
