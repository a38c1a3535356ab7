//! GFF3 annotation reader.
//!
//! Builds one [`FeatureTree`] per seqid. Lines sharing an `ID` merge
//! into a single discontinuous feature; `Parent` links are resolved in
//! the trees' `optimize` step after the whole input is read.

use crate::feature::FeatureRecord;
use crate::tree::FeatureTree;
use crate::types::{GenomicPos, Strand};
use anyhow::{bail, Context, Result};
use log::debug;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::io::BufRead;
use std::time::Instant;

/// The parsed chromosomes of one GFF3 input, keyed by seqid.
#[derive(Debug, Default)]
pub struct Gff3Set {
    trees: HashMap<String, FeatureTree>,
    names: Vec<String>,
}

impl Gff3Set {
    pub fn chromosome(&self, name: &str) -> Option<&FeatureTree> {
        self.trees.get(name)
    }

    pub fn chromosome_mut(&mut self, name: &str) -> Option<&mut FeatureTree> {
        self.trees.get_mut(name)
    }

    /// Seqids in order of first appearance.
    pub fn chromosome_names(&self) -> &[String] {
        &self.names
    }

    fn tree_mut(&mut self, name: &str) -> &mut FeatureTree {
        if !self.trees.contains_key(name) {
            self.trees.insert(name.to_string(), FeatureTree::new(name));
            self.names.push(name.to_string());
        }
        self.trees.get_mut(name).unwrap()
    }
}

pub struct Gff3Reader {
    hex_re: Regex,
}

impl Default for Gff3Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Gff3Reader {
    pub fn new() -> Self {
        Self {
            // the escapes GFF3 requires: %XX with two hex digits
            hex_re: Regex::new("(?i)%[0-9a-f]{2}").unwrap(),
        }
    }

    fn unescape(&self, input: &str) -> String {
        if !input.contains('%') {
            return input.to_string();
        }
        self.hex_re
            .replace_all(input, |caps: &Captures| {
                let byte = u8::from_str_radix(&caps[0][1..], 16).unwrap();
                (byte as char).to_string()
            })
            .into_owned()
    }

    /// Read a whole GFF3 stream and finalize every chromosome tree.
    pub fn read(&self, input: impl BufRead) -> Result<Gff3Set> {
        let started = Instant::now();
        let mut set = Gff3Set::default();
        for (lineno, line) in input.lines().enumerate() {
            let line = line.context("failed to read GFF3 line")?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if let Some(pragma) = line.strip_prefix("##") {
                self.parse_pragma(pragma, &mut set)
                    .with_context(|| format!("GFF3 line {}", lineno + 1))?;
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            self.parse_feature_line(line, &mut set)
                .with_context(|| format!("GFF3 line {}", lineno + 1))?;
        }
        debug!("GFF3 parse: {:?}", started.elapsed());
        for name in &set.names {
            let tree = set.trees.get_mut(name).unwrap();
            tree.optimize()
                .with_context(|| format!("chromosome {name}"))?;
        }
        debug!("GFF3 parse and optimize: {:?}", started.elapsed());
        Ok(set)
    }

    fn parse_pragma(&self, pragma: &str, set: &mut Gff3Set) -> Result<()> {
        let Some(rest) = pragma.strip_prefix("sequence-region ") else {
            return Ok(());
        };
        let mut parts = rest.split_ascii_whitespace();
        let (Some(seqid), Some(start), Some(end)) = (parts.next(), parts.next(), parts.next())
        else {
            bail!("malformed sequence-region pragma");
        };
        if set.trees.contains_key(seqid) {
            bail!("duplicate sequence-region pragma for {seqid}");
        }
        let start: GenomicPos = start.parse().context("sequence-region start")?;
        let end: GenomicPos = end.parse().context("sequence-region end")?;
        set.tree_mut(seqid).set_bounds(start, end);
        Ok(())
    }

    fn parse_feature_line(&self, line: &str, set: &mut Gff3Set) -> Result<()> {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 9 {
            bail!("expected 9 tab-separated fields, got {}", parts.len());
        }
        let seqid = parts[0];
        let source = self.unescape(parts[1]);
        let ftype = self.unescape(parts[2]);
        let start: GenomicPos = parts[3].parse().context("start")?;
        let end: GenomicPos = parts[4].parse().context("end")?;
        let score = match parts[5] {
            "." => None,
            s => Some(s.parse::<f64>().context("score")?),
        };
        let strand = parts[6].chars().next().and_then(Strand::from_gff3);
        let phase = match parts[7] {
            "." => None,
            p => Some(p.parse::<u8>().context("phase")?),
        };

        let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
        for pair in parts[8].split(';') {
            if pair.is_empty() {
                continue;
            }
            let Some((key, values)) = pair.split_once('=') else {
                bail!("malformed attribute {pair:?}");
            };
            let values = values.split(',').map(|v| self.unescape(v)).collect();
            attributes.insert(key.to_string(), values);
        }

        // without a Parent, a feature hangs off the landmark itself
        let parents = match attributes.remove("Parent") {
            Some(parents) => parents,
            None => vec![seqid.to_string()],
        };
        let display_name = attributes.remove("Name").map(|mut v| v.swap_remove(0));
        let alias = attributes.remove("Alias").map(|mut v| v.swap_remove(0));
        let target = attributes.remove("Target").map(|mut v| v.swap_remove(0));
        let id = match attributes.remove("ID") {
            Some(mut v) => v.swap_remove(0),
            None => match &display_name {
                Some(name) => name.clone(),
                None => bail!("feature has neither ID nor Name"),
            },
        };

        let record = FeatureRecord {
            id,
            start,
            end,
            ftype,
            source,
            score,
            strand,
            phase,
            display_name,
            alias,
            target,
            attributes,
            parents,
        };
        set.tree_mut(seqid).add_record(record);
        Ok(())
    }
}
