//! # BED Interval Masks
//!
//! Loads a BED file into per-contig sorted, merged interval lists and answers
//! overlap queries against them. Readers hold a mask by shared reference and
//! test each candidate site's `[pos, pos + rlen)` footprint, optionally
//! inverted to act as an exclusion mask.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use noodles::bed;

use crate::error::{RegattaError, Result};

/// Sorted, merged intervals per contig name; coordinates are 0-based
/// half-open
#[derive(Clone, Debug, Default)]
pub struct BedMask {
    intervals: HashMap<String, Vec<(i64, i64)>>,
}

impl BedMask {
    /// Load a 3-column BED file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = bed::io::Reader::<3, _>::new(BufReader::new(file));
        let mut record = bed::Record::<3>::default();

        let mut raw: HashMap<String, Vec<(i64, i64)>> = HashMap::new();
        let mut lineno = 0usize;
        loop {
            lineno += 1;
            match reader.read_record(&mut record) {
                Ok(0) => break,
                Ok(_) => {
                    let chrom = std::str::from_utf8(record.reference_sequence_name())
                        .map_err(|_| {
                            RegattaError::parse(lineno, "contig name is not UTF-8")
                        })?
                        .to_string();
                    let start = record.feature_start().map_err(|e| {
                        RegattaError::parse(lineno, format!("bad start: {}", e))
                    })?;
                    let end = record
                        .feature_end()
                        .ok_or_else(|| RegattaError::parse(lineno, "missing end position"))?
                        .map_err(|e| RegattaError::parse(lineno, format!("bad end: {}", e)))?;
                    let beg = usize::from(start) as i64 - 1;
                    let end = usize::from(end) as i64;
                    raw.entry(chrom).or_default().push((beg, end));
                }
                Err(e) => {
                    return Err(RegattaError::parse(
                        lineno,
                        format!("bad BED record: {}", e),
                    ))
                }
            }
        }
        Ok(Self::from_raw(raw))
    }

    /// Build a mask from unordered intervals (0-based half-open)
    pub fn from_intervals<I, S>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (S, i64, i64)>,
        S: Into<String>,
    {
        let mut raw: HashMap<String, Vec<(i64, i64)>> = HashMap::new();
        for (chrom, beg, end) in intervals {
            raw.entry(chrom.into()).or_default().push((beg, end));
        }
        Self::from_raw(raw)
    }

    fn from_raw(raw: HashMap<String, Vec<(i64, i64)>>) -> Self {
        let mut intervals = HashMap::with_capacity(raw.len());
        for (chrom, mut list) in raw {
            list.sort_unstable();
            let mut merged: Vec<(i64, i64)> = Vec::with_capacity(list.len());
            for (beg, end) in list {
                match merged.last_mut() {
                    Some(last) if beg <= last.1 => last.1 = last.1.max(end),
                    _ => merged.push((beg, end)),
                }
            }
            intervals.insert(chrom, merged);
        }
        Self { intervals }
    }

    /// Does `[beg, end)` on `chrom` intersect any interval?
    pub fn overlap(&self, chrom: &str, beg: i64, end: i64) -> bool {
        let list = match self.intervals.get(chrom) {
            Some(list) => list,
            None => return false,
        };
        // merged intervals are sorted by both ends; find the first interval
        // not entirely left of the query
        let i = list.partition_point(|&(_, iv_end)| iv_end <= beg);
        list.get(i).is_some_and(|&(iv_beg, _)| iv_beg < end)
    }

    /// Total interval count, mostly for logging
    pub fn len(&self) -> usize {
        self.intervals.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
