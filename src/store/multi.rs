//! # Multi-Cohort Reader
//!
//! Runs K single-cohort readers in lockstep over genomic coordinates and
//! merges same-site records into one output stream. Each call pulls the
//! smallest pending site, splices the children's bit planes (filling
//! all-missing for children without that site), annotates allele counts
//! per declared sample group, and optionally lets a filter callback drop
//! the record before it is emitted.
//!
//! The output stream is sorted by `(rid, pos, rlen, REF, ALT...)`; every
//! input site of every child appears exactly once.

use std::sync::Arc;

use tracing::info_span;

use crate::data::site::{InfoValue, Site};
use crate::error::{RegattaError, Result};
use crate::io::bed::BedMask;
use crate::io::vcf;
use crate::store::reader::{GroupSpec, Reader, Rec, MAX_GROUPS};
use crate::store::store::Store;

/// Below this many haplotypes the per-group tally loops over samples
/// directly; above it, a 256-entry histogram keyed by the group-mask byte
/// is cheaper. Both paths produce identical counts.
const DIRECT_TALLY_MAX_HAPS: usize = 1024;

/// Allele-count annotations handed to filter callbacks
#[derive(Clone, Debug, Default)]
pub struct CountSummary {
    /// Total called alleles
    pub an: i32,
    /// First-ALT allele count
    pub ac1: i32,
    /// Number of declared groups
    pub n_groups: usize,
    /// Per-group AN, 1-based like the `AN{g}` info keys
    pub group_an: [i32; MAX_GROUPS + 1],
    /// Per-group first-ALT count, 1-based
    pub group_ac1: [i32; MAX_GROUPS + 1],
}

/// A filter callback: return `true` to discard the record
pub type SiteFilter = Box<dyn FnMut(&Site, &CountSummary) -> bool>;

/// One fully merged output record
#[derive(Clone, Debug)]
pub struct MergedRec {
    pub site: Site,
    /// FORMAT GT typed bytes, two per output sample, unless suppressed
    pub genotypes: Option<Vec<u8>>,
}

enum Step {
    Rec(MergedRec),
    Filtered,
    End,
}

/// The k-way merging reader
pub struct MultiReader {
    readers: Vec<Reader>,
    pending: Vec<Option<Rec>>,
    n_groups: usize,
    n_out: usize,
    /// output column -> (child index, source sample index)
    sample_idx: Vec<(usize, usize)>,
    /// per-output-sample group masks
    group: Vec<u8>,
    header_out: Option<String>,
    /// merged plane scratch, `2 * n_out` bytes each, reused across records
    planes: [Vec<u8>; 2],
    no_genotypes: bool,
    allele_counts: bool,
    filter: Option<SiteFilter>,
}

impl MultiReader {
    /// Bind one reader per store
    pub fn new(stores: &[Arc<Store>]) -> Result<Self> {
        if stores.is_empty() {
            return Err(RegattaError::format("no stores to read"));
        }
        let readers = stores
            .iter()
            .map(|s| Reader::new(Arc::clone(s)))
            .collect::<Result<Vec<_>>>()?;
        let pending = readers.iter().map(|_| None).collect();
        Ok(Self {
            pending,
            readers,
            n_groups: 0,
            n_out: 0,
            sample_idx: Vec::new(),
            group: Vec::new(),
            header_out: None,
            planes: [Vec::new(), Vec::new()],
            no_genotypes: false,
            allele_counts: false,
            filter: None,
        })
    }

    /// Declare a sample group on every child
    pub fn add_group(&mut self, spec: &GroupSpec) -> Result<()> {
        for reader in &mut self.readers {
            reader.add_group(spec)?;
        }
        self.n_groups += 1;
        Ok(())
    }

    /// Constrain every child to a region
    pub fn set_region(&mut self, region: &str) -> Result<()> {
        for reader in &mut self.readers {
            reader.set_region(region)?;
        }
        Ok(())
    }

    /// Start every child at record `row`
    pub fn set_start(&mut self, row: i64) -> Result<()> {
        for reader in &mut self.readers {
            reader.set_start(row)?;
        }
        Ok(())
    }

    /// Attach an interval mask to every child
    pub fn set_bed(&mut self, bed: Arc<BedMask>, exclude: bool) {
        for reader in &mut self.readers {
            reader.set_bed(Arc::clone(&bed), exclude);
        }
    }

    /// Suppress FORMAT/sample output
    pub fn set_no_genotypes(&mut self, no_genotypes: bool) {
        self.no_genotypes = no_genotypes;
    }

    /// Annotate AC/AN (and AC{g}/AN{g} when more than one group is declared)
    pub fn set_allele_counts(&mut self, allele_counts: bool) {
        self.allele_counts = allele_counts;
    }

    /// Install a filter callback; counts are computed whenever a filter is
    /// present, whether or not annotation was requested
    pub fn set_filter(&mut self, filter: SiteFilter) {
        self.filter = Some(filter);
    }

    /// Prepare all children and the merged output layout. Requires every
    /// child store to carry an identical contig dictionary.
    pub fn prepare(&mut self) -> Result<()> {
        if self.header_out.is_some() {
            return Ok(());
        }
        info_span!("multi_prepare", stores = self.readers.len()).in_scope(|| {
            for reader in &mut self.readers {
                reader.prepare()?;
            }

            let contigs = &self.readers[0].store().header().contigs;
            for reader in &self.readers[1..] {
                if &reader.store().header().contigs != contigs {
                    return Err(RegattaError::format(format!(
                        "store '{}' has a different contig dictionary than '{}'",
                        reader.store().prefix().display(),
                        self.readers[0].store().prefix().display()
                    )));
                }
            }

            self.n_out = self.readers.iter().map(Reader::n_out).sum();
            self.sample_idx.clear();
            self.group.clear();
            for (child, reader) in self.readers.iter().enumerate() {
                for (&src, &mask) in reader.samples().iter().zip(reader.group_masks()) {
                    self.sample_idx.push((child, src));
                    self.group.push(mask);
                }
            }

            let names: Vec<&str> = self
                .readers
                .iter()
                .flat_map(|r| r.sample_names())
                .collect();
            self.header_out = Some(vcf::merged_header(contigs, &names, !self.no_genotypes));
            self.planes[0].resize(2 * self.n_out, 0);
            self.planes[1].resize(2 * self.n_out, 0);
            tracing::debug!(n_out = self.n_out, groups = self.n_groups, "prepared merge");
            Ok(())
        })
    }

    /// The synthesized output header (after prepare)
    pub fn header_out(&self) -> Option<&str> {
        self.header_out.as_deref()
    }

    /// Total output samples across children (after prepare)
    pub fn n_out(&self) -> usize {
        self.n_out
    }

    /// `(child, source sample)` for every output column (after prepare)
    pub fn sample_idx(&self) -> &[(usize, usize)] {
        &self.sample_idx
    }

    /// Contig name for an output record's rid
    pub fn contig_name(&self, rid: i32) -> Result<&str> {
        self.readers[0].store().header().contig_name(rid)
    }

    /// Pull the next merged record, skipping filtered ones
    pub fn read(&mut self) -> Result<Option<MergedRec>> {
        if self.header_out.is_none() {
            self.prepare()?;
        }
        loop {
            match self.read_one()? {
                Step::Rec(rec) => return Ok(Some(rec)),
                Step::Filtered => continue,
                Step::End => return Ok(None),
            }
        }
    }

    fn read_one(&mut self) -> Result<Step> {
        // refill pending slots
        let mut n_rest = 0;
        for i in 0..self.readers.len() {
            if self.pending[i].is_none() {
                self.pending[i] = self.readers[i].read()?;
            }
            if self.pending[i].is_some() {
                n_rest += 1;
            }
        }
        if n_rest == 0 {
            return Ok(Step::End);
        }

        // smallest pending site; ties keep the first child, and the allele
        // count is maximized over every tying child
        let mut best: Option<usize> = None;
        let mut max_alleles = 0;
        for (i, slot) in self.pending.iter().enumerate() {
            let rec = match slot {
                Some(rec) => rec,
                None => continue,
            };
            match best {
                None => {
                    best = Some(i);
                    max_alleles = rec.site.n_alleles();
                }
                Some(b) => match self.pending[b].as_ref().unwrap().site.cmp_order(&rec.site) {
                    std::cmp::Ordering::Greater => {
                        best = Some(i);
                        max_alleles = rec.site.n_alleles();
                    }
                    std::cmp::Ordering::Equal => {
                        max_alleles = max_alleles.max(rec.site.n_alleles());
                    }
                    std::cmp::Ordering::Less => {}
                },
            }
        }
        let best = best.expect("checked non-empty above");
        let chosen = self.pending[best].as_ref().unwrap().site.clone();

        let (mut site, ref_len) = chosen.copy_min(max_alleles);
        if ref_len as i64 != site.rlen {
            site.push_info("END", InfoValue::Int(site.pos + site.rlen));
        }

        // splice child planes, or fill missing (a0=0, a1=1 -> code 10)
        let mut off = 0;
        for i in 0..self.readers.len() {
            let n = 2 * self.readers[i].n_out();
            if n == 0 {
                continue;
            }
            let take = match &self.pending[i] {
                Some(rec) => rec.site.cmp_order(&chosen) == std::cmp::Ordering::Equal,
                None => false,
            };
            if take {
                let rec = self.pending[i].take().expect("pending checked above");
                self.planes[0][off..off + n].copy_from_slice(&rec.planes[0]);
                self.planes[1][off..off + n].copy_from_slice(&rec.planes[1]);
            } else {
                self.planes[0][off..off + n].fill(0);
                self.planes[1][off..off + n].fill(1);
            }
            off += n;
        }
        debug_assert_eq!(off, 2 * self.n_out);

        if self.allele_counts || self.filter.is_some() {
            let summary = self.tally(&mut site);
            if let Some(filter) = self.filter.as_mut() {
                if filter(&site, &summary) {
                    return Ok(Step::Filtered);
                }
            }
        }

        let genotypes = (!self.no_genotypes).then(|| {
            self.planes[0]
                .iter()
                .zip(&self.planes[1])
                .map(|(&a0, &a1)| vcf::bits_to_gt(a0, a1))
                .collect()
        });
        Ok(Step::Rec(MergedRec { site, genotypes }))
    }

    /// Histogram the merged planes, append AN/AC (and per-group pairs) to
    /// the record, and return the summary for filtering
    fn tally(&mut self, site: &mut Site) -> CountSummary {
        let n_haps = 2 * self.n_out;
        let mut cnt = [0i32; 4];
        for i in 0..n_haps {
            cnt[((self.planes[1][i] << 1) | self.planes[0][i]) as usize] += 1;
        }
        let an = cnt[0] + cnt[1] + cnt[3];
        let ac = [cnt[1], cnt[3]];

        let mut summary = CountSummary {
            an,
            ac1: ac[0],
            n_groups: self.n_groups,
            ..CountSummary::default()
        };

        site.push_info("AN", InfoValue::Int(an as i64));
        let n_ac = site.n_alleles().saturating_sub(1).min(2);
        site.push_info(
            "AC",
            InfoValue::Ints(ac[..n_ac].iter().map(|&v| v as i64).collect()),
        );

        if self.n_groups > 1 {
            let gcnt = if n_haps < DIRECT_TALLY_MAX_HAPS {
                tally_groups_direct(&self.planes, &self.group, self.n_groups)
            } else {
                tally_groups_table(&self.planes, &self.group, self.n_groups)
            };
            for g in 1..=self.n_groups {
                let gan = gcnt[g][0] + gcnt[g][1] + gcnt[g][3];
                let gac = [gcnt[g][1], gcnt[g][3]];
                summary.group_an[g] = gan;
                summary.group_ac1[g] = gac[0];
                site.push_info(format!("AN{}", g), InfoValue::Int(gan as i64));
                site.push_info(
                    format!("AC{}", g),
                    InfoValue::Ints(gac[..n_ac].iter().map(|&v| v as i64).collect()),
                );
            }
        }
        summary
    }
}

/// Per-group 4-bucket histograms via a direct per-sample loop
fn tally_groups_direct(
    planes: &[Vec<u8>; 2],
    group: &[u8],
    n_groups: usize,
) -> [[i32; 4]; MAX_GROUPS + 1] {
    let mut gcnt = [[0i32; 4]; MAX_GROUPS + 1];
    for i in 0..planes[0].len() {
        let code = ((planes[1][i] << 1) | planes[0][i]) as usize;
        let mask = group[i >> 1];
        if mask == 0 {
            continue;
        }
        for (g, row) in gcnt.iter_mut().enumerate().take(n_groups + 1).skip(1) {
            if mask & (1 << (g - 1)) != 0 {
                row[code] += 1;
            }
        }
    }
    gcnt
}

/// Per-group histograms via a 256-entry table keyed by the mask byte,
/// reduced afterwards; equivalent to the direct loop but one pass over the
/// haplotypes regardless of group count
fn tally_groups_table(
    planes: &[Vec<u8>; 2],
    group: &[u8],
    n_groups: usize,
) -> [[i32; 4]; MAX_GROUPS + 1] {
    let mut by_mask = [[0i32; 4]; 256];
    for i in 0..planes[0].len() {
        let code = ((planes[1][i] << 1) | planes[0][i]) as usize;
        by_mask[group[i >> 1] as usize][code] += 1;
    }
    let mut gcnt = [[0i32; 4]; MAX_GROUPS + 1];
    for (mask, counts) in by_mask.iter().enumerate() {
        if mask == 0 {
            continue;
        }
        for g in 1..=n_groups {
            if mask & (1 << (g - 1)) != 0 {
                for code in 0..4 {
                    gcnt[g][code] += counts[code];
                }
            }
        }
    }
    gcnt
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The two tally strategies are a performance contract: they must agree
    #[test]
    fn test_tally_strategies_agree() {
        // 300 samples spread over 3 groups with overlaps, varied codes
        let n = 300;
        let mut planes = [vec![0u8; 2 * n], vec![0u8; 2 * n]];
        let mut group = vec![0u8; n];
        for s in 0..n {
            group[s] = match s % 4 {
                0 => 0b001,
                1 => 0b011,
                2 => 0b100,
                _ => 0,
            };
            for p in 0..2 {
                let code = (s * 7 + p * 3) % 4;
                planes[0][2 * s + p] = (code & 1) as u8;
                planes[1][2 * s + p] = (code >> 1) as u8;
            }
        }
        let direct = tally_groups_direct(&planes, &group, 3);
        let table = tally_groups_table(&planes, &group, 3);
        assert_eq!(direct, table);
        // group 3 holds every s % 4 == 2 sample
        let g3_total: i32 = direct[3].iter().sum();
        assert_eq!(g3_total, 2 * (n as i32 / 4));
    }

    #[test]
    fn test_tally_ignores_unmasked_samples() {
        let planes = [vec![1u8, 1, 1, 1], vec![0u8, 0, 0, 0]];
        let group = vec![0b1u8, 0];
        let gcnt = tally_groups_direct(&planes, &group, 1);
        assert_eq!(gcnt[1][1], 2);
        assert_eq!(gcnt[1][0], 0);
    }
}
