//! ISF binding-site reader.
//!
//! Two header lines (an `@HD` metadata line, then the column header),
//! followed by tab-separated binding rows: chromosome, start, end,
//! network id, interaction id, direct-binding flag, p-value and PET
//! count. Bindings sharing an interaction id form a cluster, drawn as
//! an arc chain. The chromosome column is optional; without it the
//! caller must name the chromosome the rows belong to.

use crate::aggregate::Summarizer;
use crate::types::{compare_intervals, ChromosomeModel, GenomicPos, IntervalLike};
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::time::Instant;

/// One protein binding site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BindingFeature {
    pub start: GenomicPos,
    pub end: GenomicPos,
    pub network: u32,
    pub direct: bool,
    pub p_value: f64,
    pub pet: f64,
}

impl IntervalLike for BindingFeature {
    fn start(&self) -> GenomicPos {
        self.start
    }

    fn end(&self) -> GenomicPos {
        self.end
    }
}

/// One chromosome's bindings, sorted after `optimize`, with the
/// multi-member interaction clusters alongside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsfChromosome {
    name: String,
    bindings: Vec<BindingFeature>,
    pre_clusters: HashMap<u32, Vec<BindingFeature>>,
    clusters: Vec<Vec<BindingFeature>>,
    start: GenomicPos,
    end: GenomicPos,
}

impl IsfChromosome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            end: 1,
            ..Default::default()
        }
    }

    pub fn add_binding(&mut self, interaction: u32, binding: BindingFeature) {
        self.bindings.push(binding);
        self.pre_clusters.entry(interaction).or_default().push(binding);
    }

    /// Sort the bindings, derive the chromosome end, and keep only the
    /// interaction groups with more than one member as clusters.
    pub fn optimize(&mut self) {
        self.bindings.sort_by(compare_intervals);
        if let Some(last) = self.bindings.last() {
            self.end = last.end;
        }
        let mut groups: Vec<(u32, Vec<BindingFeature>)> = self
            .pre_clusters
            .drain()
            .filter(|(_, cluster)| cluster.len() > 1)
            .collect();
        groups.sort_by_key(|&(id, _)| id);
        self.clusters = groups
            .into_iter()
            .map(|(_, mut cluster)| {
                cluster.sort_by(compare_intervals);
                cluster
            })
            .collect();
    }

    /// Interaction clusters (two or more bindings), each sorted by
    /// position, ordered by interaction id.
    pub fn clusters(&self) -> &[Vec<BindingFeature>] {
        &self.clusters
    }
}

impl ChromosomeModel for IsfChromosome {
    type Feature = BindingFeature;

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> GenomicPos {
        self.start
    }

    fn end(&self) -> GenomicPos {
        self.end
    }

    fn features(&self) -> &[BindingFeature] {
        &self.bindings
    }
}

/// The parsed chromosomes of one ISF input.
#[derive(Debug, Default)]
pub struct IsfSet {
    chromosomes: HashMap<String, IsfChromosome>,
    names: Vec<String>,
}

impl IsfSet {
    pub fn chromosome(&self, name: &str) -> Option<&IsfChromosome> {
        self.chromosomes.get(name)
    }

    pub fn chromosome_names(&self) -> &[String] {
        &self.names
    }

    fn chromosome_entry(&mut self, name: &str) -> &mut IsfChromosome {
        if !self.chromosomes.contains_key(name) {
            self.chromosomes
                .insert(name.to_string(), IsfChromosome::new(name));
            self.names.push(name.to_string());
        }
        self.chromosomes.get_mut(name).unwrap()
    }
}

/// Read a whole ISF stream. The column header must carry the `#Chr`
/// column; use [`read_chromosome`] for inputs without it.
pub fn read(input: impl BufRead) -> Result<IsfSet> {
    parse(input, None)
}

/// Read an ISF stream for one named chromosome. Handles both column
/// layouts: with a `#Chr` column only matching rows are kept, without
/// one every row is attributed to `name`.
pub fn read_chromosome(input: impl BufRead, name: &str) -> Result<IsfSet> {
    parse(input, Some(name))
}

fn parse(input: impl BufRead, desired: Option<&str>) -> Result<IsfSet> {
    let started = Instant::now();
    let mut lines = input.lines();
    let header = match lines.next() {
        Some(line) => line.context("failed to read ISF header")?,
        None => bail!("empty ISF input"),
    };
    if !header.starts_with("@HD") {
        bail!("ISF input does not start with an @HD header");
    }
    let columns = match lines.next() {
        Some(line) => line.context("failed to read ISF column header")?,
        None => bail!("ISF input has no column header"),
    };
    let fields: Vec<&str> = columns.split('\t').collect();
    let has_chro = fields.first() == Some(&"#Chr");
    let expected = if has_chro { 8 } else { 7 };
    if fields.len() != expected {
        bail!(
            "ISF column header has {} fields, expected {}",
            fields.len(),
            expected
        );
    }
    if !has_chro && desired.is_none() {
        bail!("ISF input has no #Chr column and no chromosome was named");
    }

    let mut set = IsfSet::default();
    for (lineno, line) in lines.enumerate() {
        let line = line.context("failed to read ISF line")?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let mut vals = line.split('\t');
        let chroname = if has_chro {
            match vals.next() {
                Some(c) => c,
                None => bail!("ISF line {}: missing chromosome", lineno + 3),
            }
        } else {
            desired.unwrap_or_default()
        };
        if let Some(desired) = desired {
            if chroname != desired {
                continue;
            }
        }
        let vals: Vec<&str> = vals.collect();
        if vals.len() != 7 {
            bail!(
                "ISF line {}: expected 7 value fields, got {}",
                lineno + 3,
                vals.len()
            );
        }
        let context = |what| format!("ISF line {}: {}", lineno + 3, what);
        let start: GenomicPos = vals[0].parse().with_context(|| context("start"))?;
        let end: GenomicPos = vals[1].parse().with_context(|| context("end"))?;
        let network: u32 = vals[2].parse().with_context(|| context("network id"))?;
        let interaction: u32 = vals[3].parse().with_context(|| context("interaction id"))?;
        let direct = vals[4] == "TRUE";
        let p_value: f64 = vals[5].parse().with_context(|| context("p-value"))?;
        let pet: f64 = vals[6].parse().with_context(|| context("PET count"))?;
        set.chromosome_entry(chroname).add_binding(
            interaction,
            BindingFeature {
                start,
                end,
                network,
                direct,
                p_value,
                pet,
            },
        );
    }
    for chromosome in set.chromosomes.values_mut() {
        chromosome.optimize();
    }
    debug!("ISF parse: {:?}", started.elapsed());
    Ok(set)
}

/// Largest PET magnitude in the window, for density shading.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxBindingSummarizer;

impl Summarizer<BindingFeature> for MaxBindingSummarizer {
    type Value = f64;

    fn initial(&self) -> f64 {
        0.0
    }

    fn add(&self, acc: &mut f64, binding: &BindingFeature, _window: (GenomicPos, GenomicPos)) {
        *acc = acc.max(binding.pet.abs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::IntervalAggregator;

    const SAMPLE: &str = "\
@HD\tVN\t0.7\tAS\tMM9\tSP\tMus_Musculus
#Chr\tStart\tEnd\tNetwork_ID\tInteraction_ID\tDirect_binding\tpValue\tPET
chr1\t83145602\t83148597\t606\t606\tTRUE\t1.28817e-05\t2
chr1\t137853959\t137856772\t606\t606\t.\t1.28817e-05\t2
chr1\t10000\t12000\t41\t100\tTRUE\t3e-04\t7
chr2\t5000\t6000\t41\t200\t.\t2e-03\t1
";

    #[test]
    fn test_parse_sample() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        assert_eq!(set.chromosome_names(), ["chr1", "chr2"]);
        let chr1 = set.chromosome("chr1").unwrap();
        assert_eq!(chr1.features().len(), 3);
        assert_eq!(chr1.features()[0].start, 10000);
        assert_eq!(chr1.end(), 137856772);
    }

    #[test]
    fn test_binding_fields() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        let b = chr1.features()[0];
        assert_eq!(b.network, 41);
        assert!(b.direct);
        assert!((b.p_value - 3e-04).abs() < 1e-12);
        assert_eq!(b.pet, 7.0);
        // '.' in the direct column means indirect
        assert!(!chr1.features()[2].direct);
    }

    #[test]
    fn test_only_multi_member_interactions_cluster() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        assert_eq!(chr1.clusters().len(), 1);
        let cluster = &chr1.clusters()[0];
        assert_eq!(cluster.len(), 2);
        assert!(cluster[0].start < cluster[1].start);
        // chr2's single binding of interaction 200 forms no cluster
        assert!(set.chromosome("chr2").unwrap().clusters().is_empty());
    }

    #[test]
    fn test_read_chromosome_filters() {
        let set = read_chromosome(SAMPLE.as_bytes(), "chr2").unwrap();
        assert_eq!(set.chromosome_names(), ["chr2"]);
        assert_eq!(set.chromosome("chr2").unwrap().features().len(), 1);
        assert!(set.chromosome("chr1").is_none());
    }

    #[test]
    fn test_chromosome_column_is_optional_when_named() {
        let text = "\
@HD\tVN\t0.7
Start\tEnd\tNetwork_ID\tInteraction_ID\tDirect_binding\tpValue\tPET
100\t200\t1\t1\tTRUE\t0.01\t3
300\t400\t1\t1\t.\t0.02\t5
";
        let set = read_chromosome(text.as_bytes(), "chrX").unwrap();
        let chrx = set.chromosome("chrX").unwrap();
        assert_eq!(chrx.features().len(), 2);
        assert_eq!(chrx.clusters().len(), 1);
    }

    #[test]
    fn test_missing_chromosome_column_without_name_is_an_error() {
        let text = "\
@HD\tVN\t0.7
Start\tEnd\tNetwork_ID\tInteraction_ID\tDirect_binding\tpValue\tPET
100\t200\t1\t1\tTRUE\t0.01\t3
";
        assert!(read(text.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_hd_header_is_an_error() {
        let text = "#Chr\tStart\tEnd\tNetwork_ID\tInteraction_ID\tDirect_binding\tpValue\tPET\n";
        assert!(read(text.as_bytes()).is_err());
    }

    #[test]
    fn test_max_binding_over_windows() {
        let set = read(SAMPLE.as_bytes()).unwrap();
        let chr1 = set.chromosome("chr1").unwrap();
        let mut agg = IntervalAggregator::for_chromosome(MaxBindingSummarizer, chr1);
        assert_eq!(agg.move_to(50000), 7.0);
        assert_eq!(agg.move_to(chr1.end()), 2.0);
    }
}
