//! File format readers.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub mod bedgraph;
pub mod cytoband;
pub mod gff3;
pub mod isf;

/// Open a text file for line-based reading, transparently decompressing
/// `.gz` input.
pub fn open_text(path: impl AsRef<Path>) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
